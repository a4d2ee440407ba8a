// Case lifecycle services. Every mutation runs in one immediate transaction
// on the shared connection; the store triggers back up each pre-check.
use std::sync::{Arc, MutexGuard};

use diesel::sqlite::SqliteConnection;
use uuid::Uuid;

use haven::clock::Clock;
use haven::payment::PaymentProcessor;
use haven::policy::LifecyclePolicy;
use haven::HavenError;

use crate::db::{self, AuditLog, DbPool};

mod admin;
mod cases;
mod escalation;
mod group;
mod inbox;
mod incidents;
mod payments;
mod sessions;

pub use admin::GuardianLinkInput;
pub use group::GroupSessionDraft;
pub use incidents::DetectionInput;
pub use sessions::{ProgressInput, SessionDraft};

#[cfg(test)]
mod tests;

pub struct Lifecycle {
    db: DbPool,
    policy: LifecyclePolicy,
    clock: Arc<dyn Clock>,
    payments: Arc<dyn PaymentProcessor>,
}

impl Lifecycle {
    pub fn new(
        db: DbPool,
        policy: LifecyclePolicy,
        clock: Arc<dyn Clock>,
        payments: Arc<dyn PaymentProcessor>,
    ) -> Self {
        Lifecycle {
            db,
            policy,
            clock,
            payments,
        }
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    fn conn(&self) -> Result<MutexGuard<'_, SqliteConnection>, HavenError> {
        self.db
            .lock()
            .map_err(|_| HavenError::transient("database mutex poisoned"))
    }

    fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Append an audit entry. A failed write is logged and never fails the operation.
    fn audit(&self, conn: &mut SqliteConnection, actor: Option<&str>, event_type: &str, data: serde_json::Value) {
        let entry = AuditLog {
            id: Uuid::new_v4().to_string(),
            actor_id: actor.map(str::to_string),
            event_type: event_type.to_string(),
            event_data: data.to_string(),
            created_at: self.now(),
        };
        if let Err(e) = db::insert_audit_log(conn, &entry) {
            tracing::error!("Failed to save audit log: {:?}", e);
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Parse a stored status column; a value outside the vocabulary is a store fault.
fn stored<T>(column: &str, raw: &str) -> Result<T, HavenError>
where
    T: std::str::FromStr<Err = HavenError>,
{
    raw.parse::<T>()
        .map_err(|_| HavenError::transient(format!("unexpected {} '{}' in store", column, raw)))
}
