// Database query functions for all tables.
// They take a connection so callers can compose them inside one transaction.
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use diesel::sqlite::SqliteConnection;

use crate::db::schema::*;
use crate::db::{
    AuditLog, Case, EmergencyPayment, GroupAttendance, GroupSession, GuardianAlert, GuardianLink, Incident,
    ReviewerAlert, Session, SessionProgress,
};

// ==================== INCIDENT QUERIES ====================

pub fn insert_incident(conn: &mut SqliteConnection, incident: &Incident) -> QueryResult<()> {
    diesel::insert_into(incidents::table).values(incident).execute(conn)?;
    Ok(())
}

pub fn get_incident(conn: &mut SqliteConnection, incident_id: &str) -> QueryResult<Option<Incident>> {
    incidents::table
        .filter(incidents::id.eq(incident_id))
        .first::<Incident>(conn)
        .optional()
}

/// Most urgent tier first, newest first within a tier. The tier order applies before the limit.
pub fn list_incidents(conn: &mut SqliteConnection, status: Option<&str>, limit: i64) -> QueryResult<Vec<Incident>> {
    let tier_rank = sql::<Integer>(
        "CASE severity_tier WHEN 'CRITICAL' THEN 0 WHEN 'HIGH' THEN 1 ELSE 2 END",
    );
    let mut query = incidents::table.into_boxed();
    if let Some(status) = status {
        query = query.filter(incidents::status.eq(status.to_string()));
    }
    query
        .order_by((tier_rank.asc(), incidents::created_at.desc()))
        .limit(limit)
        .load::<Incident>(conn)
}

pub fn mark_incident_escalated(
    conn: &mut SqliteConnection,
    incident_id: &str,
    reviewer_id: &str,
    at: i64,
) -> QueryResult<usize> {
    diesel::update(incidents::table.filter(incidents::id.eq(incident_id)))
        .set((
            incidents::status.eq("escalated"),
            incidents::escalated_at.eq(Some(at)),
            incidents::escalated_by.eq(Some(reviewer_id)),
        ))
        .execute(conn)
}

// ==================== GUARDIAN ALERT QUERIES ====================

pub fn insert_guardian_alert(conn: &mut SqliteConnection, alert: &GuardianAlert) -> QueryResult<()> {
    diesel::insert_into(guardian_alerts::table).values(alert).execute(conn)?;
    Ok(())
}

pub fn get_guardian_alert(conn: &mut SqliteConnection, alert_id: &str) -> QueryResult<Option<GuardianAlert>> {
    guardian_alerts::table
        .filter(guardian_alerts::id.eq(alert_id))
        .first::<GuardianAlert>(conn)
        .optional()
}

#[cfg(test)]
pub fn count_guardian_alerts_for_incident(conn: &mut SqliteConnection, incident_id: &str) -> QueryResult<i64> {
    guardian_alerts::table
        .filter(guardian_alerts::incident_id.eq(incident_id))
        .count()
        .get_result(conn)
}

/// Alerts for every subject the guardian is linked to, newest first
pub fn list_guardian_alerts(conn: &mut SqliteConnection, guardian_id: &str) -> QueryResult<Vec<GuardianAlert>> {
    let subjects = guardian_links::table
        .filter(guardian_links::guardian_id.eq(guardian_id.to_string()))
        .select(guardian_links::subject_id);

    guardian_alerts::table
        .filter(guardian_alerts::subject_id.eq_any(subjects))
        .order_by(guardian_alerts::created_at.desc())
        .load::<GuardianAlert>(conn)
}

pub fn mark_guardian_alert_read(conn: &mut SqliteConnection, alert_id: &str) -> QueryResult<usize> {
    diesel::update(guardian_alerts::table.filter(guardian_alerts::id.eq(alert_id)))
        .set(guardian_alerts::status.eq("read"))
        .execute(conn)
}

// ==================== EMERGENCY PAYMENT QUERIES ====================

pub fn insert_emergency_payment(conn: &mut SqliteConnection, record: &EmergencyPayment) -> QueryResult<()> {
    diesel::insert_into(emergency_payments::table).values(record).execute(conn)?;
    Ok(())
}

pub fn get_emergency_payment(conn: &mut SqliteConnection, record_id: &str) -> QueryResult<Option<EmergencyPayment>> {
    emergency_payments::table
        .filter(emergency_payments::id.eq(record_id))
        .first::<EmergencyPayment>(conn)
        .optional()
}

pub fn get_emergency_payment_by_incident(
    conn: &mut SqliteConnection,
    incident_id: &str,
) -> QueryResult<Option<EmergencyPayment>> {
    emergency_payments::table
        .filter(emergency_payments::incident_id.eq(incident_id))
        .first::<EmergencyPayment>(conn)
        .optional()
}

pub fn mark_emergency_paid(conn: &mut SqliteConnection, record_id: &str, at: i64) -> QueryResult<usize> {
    diesel::update(emergency_payments::table.filter(emergency_payments::id.eq(record_id)))
        .set((
            emergency_payments::payment_status.eq("paid"),
            emergency_payments::case_status.eq("ready"),
            emergency_payments::paid_at.eq(Some(at)),
        ))
        .execute(conn)
}

pub fn count_emergency_payments(conn: &mut SqliteConnection, payment_status: &str) -> QueryResult<i64> {
    emergency_payments::table
        .filter(emergency_payments::payment_status.eq(payment_status))
        .count()
        .get_result(conn)
}

// ==================== CASE QUERIES ====================

pub fn insert_case(conn: &mut SqliteConnection, case: &Case) -> QueryResult<()> {
    diesel::insert_into(cases::table).values(case).execute(conn)?;
    Ok(())
}

pub fn get_case(conn: &mut SqliteConnection, case_id: &str) -> QueryResult<Option<Case>> {
    cases::table.filter(cases::id.eq(case_id)).first::<Case>(conn).optional()
}

pub fn get_case_by_incident(conn: &mut SqliteConnection, incident_id: &str) -> QueryResult<Option<Case>> {
    cases::table
        .filter(cases::incident_id.eq(incident_id))
        .first::<Case>(conn)
        .optional()
}

pub fn count_active_cases(conn: &mut SqliteConnection, reviewer_id: &str) -> QueryResult<i64> {
    cases::table
        .filter(cases::reviewer_id.eq(reviewer_id))
        .filter(cases::status.eq_any(["open", "in_session"]))
        .count()
        .get_result(conn)
}

pub fn list_cases_for_reviewer(conn: &mut SqliteConnection, reviewer_id: &str) -> QueryResult<Vec<Case>> {
    cases::table
        .filter(cases::reviewer_id.eq(reviewer_id))
        .order_by(cases::opened_at.desc())
        .load::<Case>(conn)
}

pub fn set_case_status(
    conn: &mut SqliteConnection,
    case_id: &str,
    status: &str,
    closed_at: Option<i64>,
) -> QueryResult<usize> {
    diesel::update(cases::table.filter(cases::id.eq(case_id)))
        .set((cases::status.eq(status), cases::closed_at.eq(closed_at)))
        .execute(conn)
}

pub fn count_cases_by_status(conn: &mut SqliteConnection, statuses: &[&str]) -> QueryResult<i64> {
    cases::table
        .filter(cases::status.eq_any(statuses.iter().map(|s| s.to_string()).collect::<Vec<_>>()))
        .count()
        .get_result(conn)
}

// ==================== SESSION QUERIES ====================

pub fn insert_session(conn: &mut SqliteConnection, session: &Session) -> QueryResult<()> {
    diesel::insert_into(sessions::table).values(session).execute(conn)?;
    Ok(())
}

pub fn get_session(conn: &mut SqliteConnection, session_id: &str) -> QueryResult<Option<Session>> {
    sessions::table
        .filter(sessions::id.eq(session_id))
        .first::<Session>(conn)
        .optional()
}

pub fn count_sessions_for_case(conn: &mut SqliteConnection, case_id: &str) -> QueryResult<i64> {
    sessions::table
        .filter(sessions::case_id.eq(case_id))
        .count()
        .get_result(conn)
}

pub fn count_scheduled_sessions_for_case(conn: &mut SqliteConnection, case_id: &str) -> QueryResult<i64> {
    sessions::table
        .filter(sessions::case_id.eq(case_id))
        .filter(sessions::status.eq("scheduled"))
        .count()
        .get_result(conn)
}

pub fn list_sessions_for_case(conn: &mut SqliteConnection, case_id: &str) -> QueryResult<Vec<Session>> {
    sessions::table
        .filter(sessions::case_id.eq(case_id))
        .order_by(sessions::scheduled_at.asc())
        .load::<Session>(conn)
}

pub fn update_session_details(
    conn: &mut SqliteConnection,
    session_id: &str,
    topic: &str,
    scheduled_at: i64,
    location_ref: &str,
    notes: Option<&str>,
) -> QueryResult<usize> {
    diesel::update(sessions::table.filter(sessions::id.eq(session_id)))
        .set((
            sessions::topic.eq(topic),
            sessions::scheduled_at.eq(scheduled_at),
            sessions::location_ref.eq(location_ref),
            sessions::notes.eq(notes),
        ))
        .execute(conn)
}

pub fn set_session_status(conn: &mut SqliteConnection, session_id: &str, status: &str) -> QueryResult<usize> {
    diesel::update(sessions::table.filter(sessions::id.eq(session_id)))
        .set(sessions::status.eq(status))
        .execute(conn)
}

pub fn mark_session_paid(conn: &mut SqliteConnection, session_id: &str) -> QueryResult<usize> {
    diesel::update(sessions::table.filter(sessions::id.eq(session_id)))
        .set(sessions::payment_status.eq("paid"))
        .execute(conn)
}

pub fn delete_session(conn: &mut SqliteConnection, session_id: &str) -> QueryResult<usize> {
    diesel::delete(sessions::table.filter(sessions::id.eq(session_id))).execute(conn)
}

pub fn count_sessions_by_status(conn: &mut SqliteConnection, status: &str) -> QueryResult<i64> {
    sessions::table
        .filter(sessions::status.eq(status))
        .count()
        .get_result(conn)
}

// ==================== SESSION PROGRESS QUERIES ====================

pub fn get_progress(conn: &mut SqliteConnection, session_id: &str) -> QueryResult<Option<SessionProgress>> {
    session_progress::table
        .filter(session_progress::session_id.eq(session_id))
        .first::<SessionProgress>(conn)
        .optional()
}

pub fn insert_progress(conn: &mut SqliteConnection, progress: &SessionProgress) -> QueryResult<()> {
    diesel::insert_into(session_progress::table).values(progress).execute(conn)?;
    Ok(())
}

pub fn update_progress(conn: &mut SqliteConnection, progress: &SessionProgress) -> QueryResult<usize> {
    diesel::update(session_progress::table.filter(session_progress::session_id.eq(&progress.session_id)))
        .set((
            session_progress::plan_level.eq(progress.plan_level),
            session_progress::skills_level.eq(progress.skills_level),
            session_progress::goals_level.eq(progress.goals_level),
            session_progress::notes.eq(progress.notes.as_deref()),
            session_progress::updated_at.eq(progress.updated_at),
        ))
        .execute(conn)
}

// ==================== REVIEWER ALERT QUERIES ====================

pub fn insert_reviewer_alert(conn: &mut SqliteConnection, alert: &ReviewerAlert) -> QueryResult<()> {
    diesel::insert_into(reviewer_alerts::table).values(alert).execute(conn)?;
    Ok(())
}

pub fn get_reviewer_alert(conn: &mut SqliteConnection, alert_id: &str) -> QueryResult<Option<ReviewerAlert>> {
    reviewer_alerts::table
        .filter(reviewer_alerts::id.eq(alert_id))
        .first::<ReviewerAlert>(conn)
        .optional()
}

pub fn list_reviewer_alerts(conn: &mut SqliteConnection, reviewer_id: &str) -> QueryResult<Vec<ReviewerAlert>> {
    reviewer_alerts::table
        .filter(reviewer_alerts::reviewer_id.eq(reviewer_id))
        .order_by(reviewer_alerts::created_at.desc())
        .load::<ReviewerAlert>(conn)
}

pub fn mark_reviewer_alert_read(conn: &mut SqliteConnection, alert_id: &str) -> QueryResult<usize> {
    diesel::update(reviewer_alerts::table.filter(reviewer_alerts::id.eq(alert_id)))
        .set(reviewer_alerts::status.eq("read"))
        .execute(conn)
}

// ==================== GUARDIAN LINK QUERIES ====================

pub fn insert_guardian_link(conn: &mut SqliteConnection, link: &GuardianLink) -> QueryResult<()> {
    diesel::insert_into(guardian_links::table).values(link).execute(conn)?;
    Ok(())
}

pub fn is_guardian_of(conn: &mut SqliteConnection, guardian_id: &str, subject_id: &str) -> QueryResult<bool> {
    let count: i64 = guardian_links::table
        .filter(guardian_links::guardian_id.eq(guardian_id))
        .filter(guardian_links::subject_id.eq(subject_id))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

// ==================== GROUP SESSION QUERIES ====================

pub fn insert_group_session(conn: &mut SqliteConnection, session: &GroupSession) -> QueryResult<()> {
    diesel::insert_into(group_sessions::table).values(session).execute(conn)?;
    Ok(())
}

pub fn get_group_session(conn: &mut SqliteConnection, session_id: &str) -> QueryResult<Option<GroupSession>> {
    group_sessions::table
        .filter(group_sessions::id.eq(session_id))
        .first::<GroupSession>(conn)
        .optional()
}

pub fn scheduled_group_session(conn: &mut SqliteConnection, counselor_id: &str) -> QueryResult<Option<GroupSession>> {
    group_sessions::table
        .filter(group_sessions::counselor_id.eq(counselor_id))
        .filter(group_sessions::status.eq("scheduled"))
        .first::<GroupSession>(conn)
        .optional()
}

pub fn list_group_sessions(conn: &mut SqliteConnection, counselor_id: &str) -> QueryResult<Vec<GroupSession>> {
    group_sessions::table
        .filter(group_sessions::counselor_id.eq(counselor_id))
        .order_by(group_sessions::starts_at.desc())
        .load::<GroupSession>(conn)
}

pub fn update_group_session_details(
    conn: &mut SqliteConnection,
    session_id: &str,
    topic: &str,
    description: Option<&str>,
    starts_at: i64,
    location_ref: &str,
    meeting_id: &str,
) -> QueryResult<usize> {
    diesel::update(group_sessions::table.filter(group_sessions::id.eq(session_id)))
        .set((
            group_sessions::topic.eq(topic),
            group_sessions::description.eq(description),
            group_sessions::starts_at.eq(starts_at),
            group_sessions::location_ref.eq(location_ref),
            group_sessions::meeting_id.eq(meeting_id),
        ))
        .execute(conn)
}

pub fn set_group_session_status(conn: &mut SqliteConnection, session_id: &str, status: &str) -> QueryResult<usize> {
    diesel::update(group_sessions::table.filter(group_sessions::id.eq(session_id)))
        .set(group_sessions::status.eq(status))
        .execute(conn)
}

pub fn delete_group_session(conn: &mut SqliteConnection, session_id: &str) -> QueryResult<usize> {
    diesel::delete(group_attendance::table.filter(group_attendance::session_id.eq(session_id))).execute(conn)?;
    diesel::delete(group_sessions::table.filter(group_sessions::id.eq(session_id))).execute(conn)
}

/// Returns false when the subject was already recorded
pub fn insert_attendance(conn: &mut SqliteConnection, attendance: &GroupAttendance) -> QueryResult<bool> {
    let inserted = diesel::insert_or_ignore_into(group_attendance::table)
        .values(attendance)
        .execute(conn)?;
    Ok(inserted > 0)
}

pub fn list_attendance(conn: &mut SqliteConnection, session_id: &str) -> QueryResult<Vec<GroupAttendance>> {
    group_attendance::table
        .filter(group_attendance::session_id.eq(session_id))
        .order_by(group_attendance::joined_at.asc())
        .load::<GroupAttendance>(conn)
}

// ==================== AUDIT LOG QUERIES ====================

pub fn insert_audit_log(conn: &mut SqliteConnection, log: &AuditLog) -> QueryResult<()> {
    diesel::insert_into(audit_logs::table).values(log).execute(conn)?;
    Ok(())
}

pub fn get_audit_logs(conn: &mut SqliteConnection, event_type: Option<&str>, limit: i64) -> QueryResult<Vec<AuditLog>> {
    let mut query = audit_logs::table.into_boxed();
    if let Some(event_type) = event_type {
        query = query.filter(audit_logs::event_type.eq(event_type.to_string()));
    }
    query
        .order_by(audit_logs::created_at.desc())
        .limit(limit)
        .load::<AuditLog>(conn)
}

pub fn count_incidents_by_status(conn: &mut SqliteConnection, status: &str) -> QueryResult<i64> {
    incidents::table
        .filter(incidents::status.eq(status))
        .count()
        .get_result(conn)
}
