use serde::{Deserialize, Serialize};

/// Which grace interval applies to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// One-on-one session under a case.
    Private,
    /// Public group session run by a counselor.
    Group,
}

/// Minimum time after a session's start before it may be marked completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraceIntervals {
    pub private_secs: i64,
    pub group_secs: i64,
}

impl Default for GraceIntervals {
    fn default() -> Self {
        GraceIntervals {
            private_secs: 2 * 60 * 60,
            group_secs: 60 * 60,
        }
    }
}

impl GraceIntervals {
    /// Earliest Unix timestamp at which a session starting at `starts_at` may complete.
    pub fn completion_allowed_at(&self, kind: SessionKind, starts_at: i64) -> i64 {
        let grace = match kind {
            SessionKind::Private => self.private_secs,
            SessionKind::Group => self.group_secs,
        };
        starts_at.saturating_add(grace)
    }
}

/// Tunables of the case lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecyclePolicy {
    /// Cases a reviewer may hold in `open` or `in_session` at once.
    pub max_open_cases: i64,
    pub grace: GraceIntervals,
    pub emergency_fee_cents: i64,
    pub session_fee_cents: i64,
    pub currency: String,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        LifecyclePolicy {
            max_open_cases: 5,
            grace: GraceIntervals::default(),
            emergency_fee_cents: 2900,
            session_fee_cents: 2900,
            currency: "USD".to_string(),
        }
    }
}

pub fn format_amount(cents: i64, currency: &str) -> String {
    format!("{}.{:02} {}", cents / 100, cents % 100, currency)
}
