// Database initialization and connection management
use diesel::sql_query;
use diesel::sqlite::SqliteConnection;
use diesel::{Connection, RunQueryDsl};
use std::sync::{Arc, Mutex};

use haven::policy::LifecyclePolicy;

pub type DbPool = Arc<Mutex<SqliteConnection>>;

/// Messages raised by the store triggers. Mapped back to errors in `errors.rs`.
pub const CASE_LIMIT_TRIGGER: &str = "haven:case_limit_reached";
pub const CASE_UNPAID_TRIGGER: &str = "haven:case_payment_required";
pub const CASE_SESSION_PENDING_TRIGGER: &str = "haven:case_session_pending";
pub const CASE_CLOSED_TRIGGER: &str = "haven:case_closed";

/// Open the SQLite database at `database_url` (`:memory:` for tests).
/// Arc<Mutex<>> serializes access across actix workers
pub fn init_db(database_url: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
    let mut conn = SqliteConnection::establish(database_url)?;
    sql_query("PRAGMA foreign_keys = ON").execute(&mut conn)?;
    sql_query("PRAGMA busy_timeout = 5000").execute(&mut conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// Create tables, indexes and the triggers that enforce lifecycle invariants.
pub fn run_migrations(db: &DbPool, policy: &LifecyclePolicy) -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = db.lock().map_err(|_| "database mutex poisoned")?;

    let tables = vec![
        "CREATE TABLE IF NOT EXISTS incidents (
            id TEXT PRIMARY KEY NOT NULL,
            subject_id TEXT NOT NULL,
            detected_phrase TEXT NOT NULL,
            confidence DOUBLE,
            source TEXT NOT NULL DEFAULT 'text',
            severity_tier TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'unreviewed',
            created_at INTEGER NOT NULL,
            escalated_at INTEGER,
            escalated_by TEXT
        )",

        "CREATE TABLE IF NOT EXISTS guardian_alerts (
            id TEXT PRIMARY KEY NOT NULL,
            kind TEXT NOT NULL,
            incident_id TEXT UNIQUE REFERENCES incidents(id),
            session_id TEXT,
            subject_id TEXT NOT NULL,
            message TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'unread',
            created_at INTEGER NOT NULL
        )",

        "CREATE TABLE IF NOT EXISTS emergency_payments (
            id TEXT PRIMARY KEY NOT NULL,
            incident_id TEXT NOT NULL UNIQUE REFERENCES incidents(id),
            alert_id TEXT NOT NULL REFERENCES guardian_alerts(id),
            reviewer_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            payment_status TEXT NOT NULL DEFAULT 'unpaid',
            case_status TEXT NOT NULL DEFAULT 'pending_payment',
            created_at INTEGER NOT NULL,
            paid_at INTEGER
        )",

        "CREATE TABLE IF NOT EXISTS cases (
            id TEXT PRIMARY KEY NOT NULL,
            reviewer_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            incident_id TEXT NOT NULL UNIQUE REFERENCES incidents(id),
            payment_id TEXT NOT NULL REFERENCES emergency_payments(id),
            detected_phrase TEXT NOT NULL,
            severity_tier TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'open',
            opened_at INTEGER NOT NULL,
            closed_at INTEGER
        )",

        "CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY NOT NULL,
            case_id TEXT NOT NULL REFERENCES cases(id),
            reviewer_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            topic TEXT NOT NULL,
            scheduled_at INTEGER NOT NULL,
            location_ref TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'scheduled',
            payment_status TEXT NOT NULL,
            price_cents INTEGER NOT NULL,
            notes TEXT,
            created_at INTEGER NOT NULL
        )",

        "CREATE TABLE IF NOT EXISTS session_progress (
            session_id TEXT PRIMARY KEY NOT NULL REFERENCES sessions(id),
            subject_id TEXT NOT NULL,
            plan_level INTEGER NOT NULL CHECK (plan_level BETWEEN 0 AND 5),
            skills_level INTEGER NOT NULL CHECK (skills_level BETWEEN 0 AND 5),
            goals_level INTEGER NOT NULL CHECK (goals_level BETWEEN 0 AND 5),
            notes TEXT,
            updated_at INTEGER NOT NULL
        )",

        "CREATE TABLE IF NOT EXISTS reviewer_alerts (
            id TEXT PRIMARY KEY NOT NULL,
            reviewer_id TEXT NOT NULL,
            payment_id TEXT NOT NULL UNIQUE REFERENCES emergency_payments(id),
            incident_id TEXT NOT NULL,
            message TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'unread',
            created_at INTEGER NOT NULL
        )",

        "CREATE TABLE IF NOT EXISTS guardian_links (
            guardian_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (guardian_id, subject_id)
        )",

        "CREATE TABLE IF NOT EXISTS group_sessions (
            id TEXT PRIMARY KEY NOT NULL,
            counselor_id TEXT NOT NULL,
            topic TEXT NOT NULL,
            description TEXT,
            starts_at INTEGER NOT NULL,
            location_ref TEXT NOT NULL,
            meeting_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'scheduled',
            created_at INTEGER NOT NULL
        )",

        "CREATE TABLE IF NOT EXISTS group_attendance (
            session_id TEXT NOT NULL REFERENCES group_sessions(id) ON DELETE CASCADE,
            subject_id TEXT NOT NULL,
            joined_at INTEGER NOT NULL,
            PRIMARY KEY (session_id, subject_id)
        )",

        "CREATE TABLE IF NOT EXISTS audit_logs (
            id TEXT PRIMARY KEY NOT NULL,
            actor_id TEXT,
            event_type TEXT NOT NULL,
            event_data TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
    ];

    for table_sql in tables {
        sql_query(table_sql).execute(&mut *conn)?;
    }
    tracing::debug!("Tables created/verified");

    let indexes = vec![
        "CREATE INDEX IF NOT EXISTS idx_incidents_status ON incidents(status, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_cases_reviewer ON cases(reviewer_id, status)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_case ON sessions(case_id, scheduled_at)",
        "CREATE INDEX IF NOT EXISTS idx_guardian_alerts_subject ON guardian_alerts(subject_id, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_reviewer_alerts_reviewer ON reviewer_alerts(reviewer_id, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_audit_logs_event_type ON audit_logs(event_type)",
        // At most one scheduled session per case / per counselor
        "CREATE UNIQUE INDEX IF NOT EXISTS uq_sessions_scheduled_per_case
            ON sessions(case_id) WHERE status = 'scheduled'",
        "CREATE UNIQUE INDEX IF NOT EXISTS uq_group_sessions_scheduled_per_counselor
            ON group_sessions(counselor_id) WHERE status = 'scheduled'",
    ];

    for index_sql in indexes {
        sql_query(index_sql).execute(&mut *conn)?;
    }
    tracing::debug!("Indexes created/verified");

    // The open-case limit is policy driven, so this trigger is rebuilt on every start
    let triggers = vec![
        "DROP TRIGGER IF EXISTS trg_cases_open_limit".to_string(),
        format!(
            "CREATE TRIGGER trg_cases_open_limit BEFORE INSERT ON cases
             WHEN (SELECT COUNT(*) FROM cases
                   WHERE reviewer_id = NEW.reviewer_id AND status IN ('open', 'in_session')) >= {}
             BEGIN SELECT RAISE(ABORT, '{}'); END",
            policy.max_open_cases, CASE_LIMIT_TRIGGER
        ),
        format!(
            "CREATE TRIGGER IF NOT EXISTS trg_cases_require_payment BEFORE INSERT ON cases
             WHEN NOT EXISTS (SELECT 1 FROM emergency_payments
                              WHERE incident_id = NEW.incident_id AND payment_status = 'paid')
             BEGIN SELECT RAISE(ABORT, '{}'); END",
            CASE_UNPAID_TRIGGER
        ),
        format!(
            "CREATE TRIGGER IF NOT EXISTS trg_cases_close_guard BEFORE UPDATE OF status ON cases
             WHEN NEW.status = 'closed' AND EXISTS (SELECT 1 FROM sessions
                                                    WHERE case_id = NEW.id AND status = 'scheduled')
             BEGIN SELECT RAISE(ABORT, '{}'); END",
            CASE_SESSION_PENDING_TRIGGER
        ),
        format!(
            "CREATE TRIGGER IF NOT EXISTS trg_cases_closed_terminal BEFORE UPDATE OF status ON cases
             WHEN OLD.status = 'closed'
             BEGIN SELECT RAISE(ABORT, '{}'); END",
            CASE_CLOSED_TRIGGER
        ),
        format!(
            "CREATE TRIGGER IF NOT EXISTS trg_sessions_closed_case BEFORE INSERT ON sessions
             WHEN (SELECT status FROM cases WHERE id = NEW.case_id) = 'closed'
             BEGIN SELECT RAISE(ABORT, '{}'); END",
            CASE_CLOSED_TRIGGER
        ),
    ];

    for trigger_sql in triggers {
        sql_query(trigger_sql).execute(&mut *conn)?;
    }
    tracing::debug!("Triggers created/verified");

    Ok(())
}
