use std::error::Error;
use std::path::PathBuf;

use haven::policy::{GraceIntervals, LifecyclePolicy};

const DEV_SECRET: &str = "haven-dev-secret-change-me";

/// Server settings read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub use_tls: bool,
    pub tls_cert: PathBuf,
    pub tls_key: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub admin_bootstrap_key: String,
    pub webhook_secret: String,
    pub checkout_base_url: String,
    pub policy: LifecyclePolicy,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, Box<dyn Error>> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let flag = |key: &str| lookup(key).map(|v| v == "true").unwrap_or(false);
        let number = |key: &str, default: i64| -> Result<i64, Box<dyn Error>> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| format!("{} must be an integer: {}", key, e).into()),
                None => Ok(default),
            }
        };

        let non_negative = |key: &str, default: i64| -> Result<i64, Box<dyn Error>> {
            let value = number(key, default)?;
            if value < 0 {
                return Err(format!("{} must not be negative", key).into());
            }
            Ok(value)
        };
        let minutes = |key: &str, default_secs: i64| -> Result<i64, Box<dyn Error>> {
            non_negative(key, default_secs / 60)?
                .checked_mul(60)
                .ok_or_else(|| format!("{} is too large", key).into())
        };

        let defaults = LifecyclePolicy::default();
        let max_open_cases = number("MAX_OPEN_CASES", defaults.max_open_cases)?;
        if max_open_cases < 1 {
            return Err("MAX_OPEN_CASES must be at least 1".into());
        }
        let policy = LifecyclePolicy {
            max_open_cases,
            grace: GraceIntervals {
                private_secs: minutes("PRIVATE_GRACE_MINUTES", defaults.grace.private_secs)?,
                group_secs: minutes("GROUP_GRACE_MINUTES", defaults.grace.group_secs)?,
            },
            emergency_fee_cents: non_negative("EMERGENCY_FEE_CENTS", defaults.emergency_fee_cents)?,
            session_fee_cents: non_negative("SESSION_FEE_CENTS", defaults.session_fee_cents)?,
            currency: text("CURRENCY", &defaults.currency).to_uppercase(),
        };

        let jwt_secret = text("JWT_SECRET", DEV_SECRET);
        let webhook_secret = text("WEBHOOK_SECRET", DEV_SECRET);
        if jwt_secret == DEV_SECRET || webhook_secret == DEV_SECRET {
            tracing::warn!("JWT_SECRET or WEBHOOK_SECRET not set, using the development secret");
        }

        let use_tls = flag("USE_TLS");
        Ok(ServerConfig {
            database_url: text("HAVEN_DB", "haven.db"),
            bind_addr: text("HAVEN_BIND", if use_tls { "0.0.0.0:8443" } else { "0.0.0.0:8080" }),
            use_tls,
            tls_cert: PathBuf::from(text("TLS_CERT", "cert.pem")),
            tls_key: PathBuf::from(text("TLS_KEY", "key.pem")),
            jwt_secret,
            token_ttl_secs: number("TOKEN_TTL_SECS", 3600)?.max(60) as u64,
            admin_bootstrap_key: text("ADMIN_BOOTSTRAP_KEY", ""),
            webhook_secret,
            checkout_base_url: text("CHECKOUT_BASE_URL", "https://checkout.example.com/pay"),
            policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_lifecycle_policy() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.policy, LifecyclePolicy::default());
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert!(!config.use_tls);
        assert!(config.admin_bootstrap_key.is_empty());
    }

    #[test]
    fn overrides_are_applied() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("USE_TLS", "true"),
            ("MAX_OPEN_CASES", "3"),
            ("PRIVATE_GRACE_MINUTES", "90"),
            ("CURRENCY", "eur"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8443");
        assert_eq!(config.policy.max_open_cases, 3);
        assert_eq!(config.policy.grace.private_secs, 90 * 60);
        assert_eq!(config.policy.grace.group_secs, 3600);
        assert_eq!(config.policy.currency, "EUR");
    }

    #[test]
    fn bad_numbers_are_rejected() {
        assert!(ServerConfig::from_lookup(lookup(&[("MAX_OPEN_CASES", "many")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("MAX_OPEN_CASES", "0")])).is_err());
    }

    #[test]
    fn negative_or_overflowing_grace_and_fees_are_rejected() {
        assert!(ServerConfig::from_lookup(lookup(&[("PRIVATE_GRACE_MINUTES", "-5")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("GROUP_GRACE_MINUTES", "-1")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("EMERGENCY_FEE_CENTS", "-100")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("SESSION_FEE_CENTS", "-1")])).is_err());
        let huge = i64::MAX.to_string();
        assert!(ServerConfig::from_lookup(lookup(&[("PRIVATE_GRACE_MINUTES", huge.as_str())])).is_err());

        let config = ServerConfig::from_lookup(lookup(&[("GROUP_GRACE_MINUTES", "0")])).unwrap();
        assert_eq!(config.policy.grace.group_secs, 0);
    }
}
