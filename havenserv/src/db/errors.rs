// Mapping of diesel errors onto the lifecycle error taxonomy
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;

use haven::HavenError;

use super::init::{CASE_CLOSED_TRIGGER, CASE_LIMIT_TRIGGER, CASE_SESSION_PENDING_TRIGGER, CASE_UNPAID_TRIGGER};

pub fn is_unique_violation(e: &DieselError) -> bool {
    match e {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => true,
        DieselError::DatabaseError(_, info) => info.message().contains("UNIQUE constraint failed"),
        _ => false,
    }
}

/// Translate a store failure. Trigger aborts carry a known message; everything
/// unexpected becomes `Transient` so the detail stays in the logs.
pub fn map_store_error(e: DieselError) -> HavenError {
    if let DieselError::DatabaseError(_, info) = &e {
        let msg = info.message();
        if msg.contains(CASE_LIMIT_TRIGGER) {
            return HavenError::conflict(
                "case limit reached: close a case before opening a new one",
            );
        }
        if msg.contains(CASE_UNPAID_TRIGGER) {
            return HavenError::precondition("payment not completed yet");
        }
        if msg.contains(CASE_SESSION_PENDING_TRIGGER) {
            return HavenError::precondition("resolve the scheduled session before closing the case");
        }
        if msg.contains(CASE_CLOSED_TRIGGER) {
            return HavenError::precondition("case is closed");
        }
    }
    match e {
        DieselError::NotFound => HavenError::not_found("record"),
        ref other if is_unique_violation(other) => HavenError::conflict("record already exists"),
        other => HavenError::transient(format!("store error: {:?}", other)),
    }
}

pub trait StoreResultExt<T> {
    /// Map any store error through `map_store_error`.
    fn store(self) -> Result<T, HavenError>;

    /// Treat a uniqueness violation as the expected "already exists" outcome.
    fn unique_as(self, conflict: &str) -> Result<T, HavenError>;
}

impl<T> StoreResultExt<T> for Result<T, DieselError> {
    fn store(self) -> Result<T, HavenError> {
        self.map_err(map_store_error)
    }

    fn unique_as(self, conflict: &str) -> Result<T, HavenError> {
        self.map_err(|e| {
            if is_unique_violation(&e) {
                HavenError::conflict(conflict)
            } else {
                map_store_error(e)
            }
        })
    }
}

enum TxError {
    Domain(HavenError),
    Store(DieselError),
}

impl From<DieselError> for TxError {
    fn from(e: DieselError) -> Self {
        TxError::Store(e)
    }
}

/// Run `f` inside `BEGIN IMMEDIATE`. Any error rolls the whole unit back.
pub fn immediate<T, F>(conn: &mut SqliteConnection, f: F) -> Result<T, HavenError>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T, HavenError>,
{
    conn.immediate_transaction::<T, TxError, _>(|conn| f(conn).map_err(TxError::Domain))
        .map_err(|e| match e {
            TxError::Domain(err) => err,
            TxError::Store(err) => map_store_error(err),
        })
}
