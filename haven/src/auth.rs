use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HavenError;
use crate::logger::{ldebug, lwarn, LoggerHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Counselor,
    Psychologist,
    Parent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Counselor => "counselor",
            Role::Psychologist => "psychologist",
            Role::Parent => "parent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = HavenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "counselor" => Ok(Role::Counselor),
            "psychologist" => Ok(Role::Psychologist),
            "parent" => Ok(Role::Parent),
            other => Err(HavenError::validation(format!("unknown role '{}'", other))),
        }
    }
}

/// The authenticated caller, passed explicitly into every lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Principal { id: id.into(), role }
    }

    pub fn require(&self, allowed: &[Role]) -> Result<(), HavenError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(HavenError::forbidden(format!(
                "{} accounts cannot perform this action",
                self.role
            )))
        }
    }

    /// Reviewers are the professionals who escalate incidents and hold cases.
    pub fn require_reviewer(&self) -> Result<(), HavenError> {
        self.require(&[Role::Psychologist])
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// JWT claims issued by the identity provider
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

/// Issues and validates HS256 bearer tokens
#[derive(Clone, Debug)]
pub struct TokenIssuer {
    secret: String,
    ttl_secs: u64,
    logger: LoggerHandle,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<String>, ttl_secs: u64, logger: LoggerHandle) -> Self {
        TokenIssuer {
            secret: secret.into(),
            ttl_secs,
            logger,
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn issue(&self, principal: &Principal) -> Result<String, HavenError> {
        self.issue_at(principal, chrono::Utc::now().timestamp().max(0) as u64)
    }

    /// Issue a token as if the current time were `now` (Unix seconds).
    pub fn issue_at(&self, principal: &Principal, now: u64) -> Result<String, HavenError> {
        let claims = Claims {
            sub: principal.id.clone(),
            role: principal.role,
            exp: (now + self.ttl_secs) as usize,
            iat: now as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| HavenError::transient(format!("token encoding failed: {}", e)))?;

        ldebug!(self.logger, "Issued {} token for {}", principal.role, principal.id);
        Ok(token)
    }

    pub fn validate(&self, token: &str) -> Result<Principal, HavenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 30;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            lwarn!(self.logger, "Token validation failed: {:?}", e.kind());
            HavenError::Unauthorized("invalid or expired token".to_string())
        })?;

        if data.claims.sub.trim().is_empty() {
            return Err(HavenError::Unauthorized("token has no subject".to_string()));
        }

        Ok(Principal {
            id: data.claims.sub,
            role: data.claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer(secret: &str) -> TokenIssuer {
        TokenIssuer::new(secret, 900, LoggerHandle::null())
    }

    #[test]
    fn issued_token_validates_to_same_principal() {
        let tokens = issuer("s3cret");
        let who = Principal::new("psy-1", Role::Psychologist);
        let token = tokens.issue(&who).unwrap();
        assert_eq!(tokens.validate(&token).unwrap(), who);
    }

    #[test]
    fn foreign_or_expired_tokens_are_rejected() {
        let who = Principal::new("parent-1", Role::Parent);
        let token = issuer("a").issue(&who).unwrap();
        assert!(matches!(issuer("b").validate(&token), Err(HavenError::Unauthorized(_))));

        let stale = issuer("a").issue_at(&who, 1_000).unwrap();
        assert!(matches!(issuer("a").validate(&stale), Err(HavenError::Unauthorized(_))));
    }

    #[test]
    fn role_gate() {
        let parent = Principal::new("p", Role::Parent);
        assert!(matches!(parent.require_reviewer(), Err(HavenError::Forbidden(_))));
        assert!(parent.require(&[Role::Parent, Role::Admin]).is_ok());
        assert_eq!("counselor".parse::<Role>().unwrap(), Role::Counselor);
    }
}
