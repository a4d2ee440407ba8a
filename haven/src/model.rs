// Status vocabularies and the transition rules that govern them
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HavenError;

/// Declares a status enum stored as lowercase text in the database.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = HavenError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(HavenError::validation(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum!(
    /// Ordered most to least urgent so the risk queue can sort on it.
    SeverityTier {
        Critical => "CRITICAL",
        High => "HIGH",
        Medium => "MEDIUM",
    }
);

impl PartialOrd for SeverityTier {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SeverityTier {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl SeverityTier {
    fn rank(&self) -> u8 {
        match self {
            SeverityTier::Critical => 0,
            SeverityTier::High => 1,
            SeverityTier::Medium => 2,
        }
    }
}

text_enum!(DetectionSource {
    Text => "text",
    Audio => "audio",
    System => "system",
});

text_enum!(IncidentStatus {
    Unreviewed => "unreviewed",
    Escalated => "escalated",
});

text_enum!(AlertStatus {
    Unread => "unread",
    Read => "read",
});

text_enum!(AlertKind {
    Emergency => "emergency",
    PaymentReminder => "payment_reminder",
});

text_enum!(PaymentStatus {
    Unpaid => "unpaid",
    Paid => "paid",
});

text_enum!(EmergencyCaseStatus {
    PendingPayment => "pending_payment",
    Ready => "ready",
});

text_enum!(CaseStatus {
    Open => "open",
    InSession => "in_session",
    Closed => "closed",
});

text_enum!(SessionStatus {
    Scheduled => "scheduled",
    Completed => "completed",
    Cancelled => "cancelled",
});

text_enum!(GroupSessionStatus {
    Scheduled => "scheduled",
    Completed => "completed",
});

impl IncidentStatus {
    /// Escalation is the only transition and it happens once.
    pub fn escalate(self) -> Result<IncidentStatus, HavenError> {
        match self {
            IncidentStatus::Unreviewed => Ok(IncidentStatus::Escalated),
            IncidentStatus::Escalated => Err(HavenError::conflict("incident already escalated")),
        }
    }
}

impl PaymentStatus {
    /// Returns the settled status and whether anything changed.
    pub fn settle(self) -> (PaymentStatus, bool) {
        match self {
            PaymentStatus::Unpaid => (PaymentStatus::Paid, true),
            PaymentStatus::Paid => (PaymentStatus::Paid, false),
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseEvent {
    SessionScheduled,
    /// The case's scheduled session was completed or deleted.
    SessionResolved,
    Close { scheduled_sessions: i64 },
}

impl CaseStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, CaseStatus::Open | CaseStatus::InSession)
    }

    pub fn apply(self, event: CaseEvent) -> Result<CaseStatus, HavenError> {
        match (self, event) {
            (CaseStatus::Closed, CaseEvent::Close { .. }) => {
                Err(HavenError::precondition("case is already closed"))
            }
            (CaseStatus::Closed, _) => Err(HavenError::precondition("case is closed")),
            (_, CaseEvent::Close { scheduled_sessions }) if scheduled_sessions > 0 => Err(
                HavenError::precondition("resolve the scheduled session before closing the case"),
            ),
            (_, CaseEvent::Close { .. }) => Ok(CaseStatus::Closed),
            (_, CaseEvent::SessionScheduled) => Ok(CaseStatus::InSession),
            (_, CaseEvent::SessionResolved) => Ok(CaseStatus::Open),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Edit,
    Delete,
    /// `now` and `not_before` are Unix seconds.
    Complete { now: i64, not_before: i64 },
}

impl SessionStatus {
    /// Returns the status after the event. `Delete` keeps `Scheduled`; the
    /// caller removes the row.
    pub fn apply(self, event: SessionEvent) -> Result<SessionStatus, HavenError> {
        if self != SessionStatus::Scheduled {
            return Err(HavenError::precondition(format!("session is {}", self)));
        }
        match event {
            SessionEvent::Edit | SessionEvent::Delete => Ok(SessionStatus::Scheduled),
            SessionEvent::Complete { now, not_before } if now < not_before => {
                Err(HavenError::precondition(format!(
                    "session can be marked completed from {}",
                    format_instant(not_before)
                )))
            }
            SessionEvent::Complete { .. } => Ok(SessionStatus::Completed),
        }
    }
}

impl GroupSessionStatus {
    pub fn apply(self, event: SessionEvent) -> Result<GroupSessionStatus, HavenError> {
        let as_private = match self {
            GroupSessionStatus::Scheduled => SessionStatus::Scheduled,
            GroupSessionStatus::Completed => SessionStatus::Completed,
        };
        match as_private.apply(event)? {
            SessionStatus::Completed => Ok(GroupSessionStatus::Completed),
            _ => Ok(GroupSessionStatus::Scheduled),
        }
    }
}

pub fn format_instant(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_round_trip_uses_stored_vocabulary() {
        assert_eq!(CaseStatus::InSession.as_str(), "in_session");
        assert_eq!("pending_payment".parse::<EmergencyCaseStatus>().unwrap(), EmergencyCaseStatus::PendingPayment);
        assert!("archived".parse::<CaseStatus>().is_err());
        assert_eq!(serde_json::to_string(&SeverityTier::Critical).unwrap(), "\"CRITICAL\"");
    }

    #[test]
    fn severity_sorts_most_urgent_first() {
        let mut tiers = vec![SeverityTier::Medium, SeverityTier::Critical, SeverityTier::High];
        tiers.sort();
        assert_eq!(tiers, vec![SeverityTier::Critical, SeverityTier::High, SeverityTier::Medium]);
    }

    #[test]
    fn incident_escalates_once() {
        let escalated = IncidentStatus::Unreviewed.escalate().unwrap();
        assert!(matches!(escalated.escalate(), Err(HavenError::Conflict(_))));
    }

    #[test]
    fn case_close_is_guarded_and_terminal() {
        let pending = CaseStatus::InSession.apply(CaseEvent::Close { scheduled_sessions: 1 });
        assert!(matches!(pending, Err(HavenError::Precondition(_))));

        let closed = CaseStatus::InSession.apply(CaseEvent::Close { scheduled_sessions: 0 }).unwrap();
        assert_eq!(closed, CaseStatus::Closed);
        assert!(closed.apply(CaseEvent::Close { scheduled_sessions: 0 }).is_err());
        assert!(closed.apply(CaseEvent::SessionScheduled).is_err());
    }

    #[test]
    fn case_moves_between_open_and_in_session() {
        let s = CaseStatus::Open.apply(CaseEvent::SessionScheduled).unwrap();
        assert_eq!(s, CaseStatus::InSession);
        assert_eq!(s.apply(CaseEvent::SessionResolved).unwrap(), CaseStatus::Open);
        assert!(s.is_active());
    }

    #[test]
    fn session_completion_waits_for_grace() {
        let early = SessionStatus::Scheduled.apply(SessionEvent::Complete { now: 99, not_before: 100 });
        assert!(matches!(early, Err(HavenError::Precondition(_))));

        let done = SessionStatus::Scheduled
            .apply(SessionEvent::Complete { now: 100, not_before: 100 })
            .unwrap();
        assert_eq!(done, SessionStatus::Completed);
        assert!(done.apply(SessionEvent::Complete { now: 200, not_before: 100 }).is_err());
        assert!(done.apply(SessionEvent::Edit).is_err());
    }

    #[test]
    fn settle_is_idempotent() {
        assert_eq!(PaymentStatus::Unpaid.settle(), (PaymentStatus::Paid, true));
        assert_eq!(PaymentStatus::Paid.settle(), (PaymentStatus::Paid, false));
    }
}
