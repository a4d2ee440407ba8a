use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};

use haven::auth::Principal;
use haven::meeting::MeetingLink;
use haven::model::{format_instant, AlertKind, AlertStatus, CaseEvent, CaseStatus, PaymentStatus, SessionEvent, SessionStatus};
use haven::policy::{format_amount, SessionKind};
use haven::HavenError;

use super::cases::owned_case;
use super::{new_id, stored, Lifecycle};
use crate::db::{self, immediate, GuardianAlert, Session, SessionProgress, StoreResultExt};

const SESSION_PENDING: &str = "a session is already scheduled for this case";
const MAX_LEVEL: i32 = 5;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionDraft {
    pub topic: String,
    /// Unix seconds.
    pub scheduled_at: i64,
    pub location_ref: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SessionDraft {
    fn validate(&self) -> Result<MeetingLink, HavenError> {
        if self.topic.trim().is_empty() {
            return Err(HavenError::validation("topic is required"));
        }
        MeetingLink::parse(&self.location_ref)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CaseSessions {
    pub upcoming: Vec<Session>,
    pub completed: Vec<Session>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProgressInput {
    pub plan_level: i32,
    pub skills_level: i32,
    pub goals_level: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ProgressInput {
    fn validate(&self) -> Result<(), HavenError> {
        for (name, level) in [
            ("plan_level", self.plan_level),
            ("skills_level", self.skills_level),
            ("goals_level", self.goals_level),
        ] {
            if !(0..=MAX_LEVEL).contains(&level) {
                return Err(HavenError::validation(format!(
                    "{} must be between 0 and {}",
                    name, MAX_LEVEL
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedProgress {
    pub progress: SessionProgress,
    pub created: bool,
}

fn owned_session(conn: &mut SqliteConnection, principal: &Principal, session_id: &str) -> Result<Session, HavenError> {
    let session = db::get_session(conn, session_id)
        .store()?
        .ok_or_else(|| HavenError::not_found("session"))?;
    if session.reviewer_id != principal.id {
        return Err(HavenError::forbidden("session belongs to another psychologist"));
    }
    Ok(session)
}

/// Move the case back to `open` once it has no scheduled session left.
fn resolve_case(conn: &mut SqliteConnection, case_id: &str) -> Result<(), HavenError> {
    let case = db::get_case(conn, case_id)
        .store()?
        .ok_or_else(|| HavenError::not_found("case"))?;
    if db::count_scheduled_sessions_for_case(conn, case_id).store()? > 0 {
        return Ok(());
    }
    let status: CaseStatus = stored("case status", &case.status)?;
    let next = status.apply(CaseEvent::SessionResolved)?;
    if next != status {
        db::set_case_status(conn, case_id, next.as_str(), None).store()?;
    }
    Ok(())
}

impl Lifecycle {
    /// Book the case's next session. The first session of a case is covered
    /// by the emergency fee; later ones start unpaid.
    pub fn create_session(&self, principal: &Principal, case_id: &str, draft: SessionDraft) -> Result<Session, HavenError> {
        principal.require_reviewer()?;
        let link = draft.validate()?;
        let now = self.now();

        let mut conn = self.conn()?;
        let session = immediate(&mut conn, |conn| {
            let case = owned_case(conn, principal, case_id)?;
            let status: CaseStatus = stored("case status", &case.status)?;
            let next = status.apply(CaseEvent::SessionScheduled)?;
            if db::count_scheduled_sessions_for_case(conn, case_id).store()? > 0 {
                return Err(HavenError::conflict(SESSION_PENDING));
            }

            let first = db::count_sessions_for_case(conn, case_id).store()? == 0;
            let payment_status = if first { PaymentStatus::Paid } else { PaymentStatus::Unpaid };
            let session = Session {
                id: new_id(),
                case_id: case.id.clone(),
                reviewer_id: principal.id.clone(),
                subject_id: case.subject_id.clone(),
                topic: draft.topic.trim().to_string(),
                scheduled_at: draft.scheduled_at,
                location_ref: link.url.clone(),
                status: SessionStatus::Scheduled.as_str().to_string(),
                payment_status: payment_status.as_str().to_string(),
                price_cents: self.policy.session_fee_cents,
                notes: draft.notes.clone(),
                created_at: now,
            };
            db::insert_session(conn, &session).unique_as(SESSION_PENDING)?;
            db::set_case_status(conn, case_id, next.as_str(), None).store()?;
            self.audit(
                conn,
                Some(&principal.id),
                "session_create",
                serde_json::json!({"case_id": case_id, "session_id": session.id, "paid": first}),
            );
            Ok(session)
        })?;

        tracing::info!(
            "Session {} scheduled for case {} at {}",
            session.id,
            case_id,
            format_instant(session.scheduled_at)
        );
        Ok(session)
    }

    /// Edit a scheduled session. Payment status is never touched.
    pub fn update_session(&self, principal: &Principal, session_id: &str, draft: SessionDraft) -> Result<Session, HavenError> {
        principal.require_reviewer()?;
        let link = draft.validate()?;

        let mut conn = self.conn()?;
        immediate(&mut conn, |conn| {
            let session = owned_session(conn, principal, session_id)?;
            stored::<SessionStatus>("session status", &session.status)?.apply(SessionEvent::Edit)?;

            db::update_session_details(
                conn,
                session_id,
                draft.topic.trim(),
                draft.scheduled_at,
                &link.url,
                draft.notes.as_deref(),
            )
            .store()?;
            db::get_session(conn, session_id)
                .store()?
                .ok_or_else(|| HavenError::not_found("session"))
        })
    }

    pub fn delete_session(&self, principal: &Principal, session_id: &str) -> Result<(), HavenError> {
        principal.require_reviewer()?;

        let mut conn = self.conn()?;
        immediate(&mut conn, |conn| {
            let session = owned_session(conn, principal, session_id)?;
            stored::<SessionStatus>("session status", &session.status)?.apply(SessionEvent::Delete)?;

            db::delete_session(conn, session_id).store()?;
            resolve_case(conn, &session.case_id)?;
            self.audit(
                conn,
                Some(&principal.id),
                "session_delete",
                serde_json::json!({"case_id": session.case_id, "session_id": session_id}),
            );
            Ok(())
        })?;

        tracing::info!("Session {} deleted by {}", session_id, principal.id);
        Ok(())
    }

    pub fn mark_completed(&self, principal: &Principal, session_id: &str) -> Result<Session, HavenError> {
        self.mark_completed_at(principal, session_id, self.now())
    }

    /// Complete a session no earlier than its start plus the private grace interval.
    pub fn mark_completed_at(&self, principal: &Principal, session_id: &str, now: i64) -> Result<Session, HavenError> {
        principal.require_reviewer()?;

        let mut conn = self.conn()?;
        let session = immediate(&mut conn, |conn| {
            let mut session = owned_session(conn, principal, session_id)?;
            let not_before = self
                .policy
                .grace
                .completion_allowed_at(SessionKind::Private, session.scheduled_at);
            let next = stored::<SessionStatus>("session status", &session.status)?
                .apply(SessionEvent::Complete { now, not_before })?;

            db::set_session_status(conn, session_id, next.as_str()).store()?;
            resolve_case(conn, &session.case_id)?;
            self.audit(
                conn,
                Some(&principal.id),
                "session_complete",
                serde_json::json!({"case_id": session.case_id, "session_id": session_id}),
            );

            session.status = next.as_str().to_string();
            Ok(session)
        })?;

        tracing::info!("Session {} marked completed", session_id);
        Ok(session)
    }

    /// Ask the guardian to pay for an unpaid session.
    pub fn send_payment_reminder(&self, principal: &Principal, session_id: &str) -> Result<GuardianAlert, HavenError> {
        principal.require_reviewer()?;
        let now = self.now();

        let mut conn = self.conn()?;
        let alert = immediate(&mut conn, |conn| {
            let session = owned_session(conn, principal, session_id)?;
            if stored::<PaymentStatus>("payment status", &session.payment_status)?.is_paid() {
                return Err(HavenError::precondition("session is already paid"));
            }

            let alert = GuardianAlert {
                id: new_id(),
                kind: AlertKind::PaymentReminder.as_str().to_string(),
                incident_id: None,
                session_id: Some(session.id.clone()),
                subject_id: session.subject_id.clone(),
                message: format!(
                    "Payment reminder: the session \"{}\" on {} ({}) is awaiting payment.",
                    session.topic,
                    format_instant(session.scheduled_at),
                    format_amount(session.price_cents, &self.policy.currency)
                ),
                status: AlertStatus::Unread.as_str().to_string(),
                created_at: now,
            };
            db::insert_guardian_alert(conn, &alert).store()?;
            self.audit(
                conn,
                Some(&principal.id),
                "payment_reminder",
                serde_json::json!({"session_id": session.id, "alert_id": alert.id}),
            );
            Ok(alert)
        })?;

        tracing::info!("Payment reminder sent for session {}", session_id);
        Ok(alert)
    }

    pub fn list_sessions(&self, principal: &Principal, case_id: &str) -> Result<CaseSessions, HavenError> {
        principal.require_reviewer()?;
        let mut conn = self.conn()?;
        owned_case(&mut conn, principal, case_id)?;

        let mut listing = CaseSessions::default();
        for session in db::list_sessions_for_case(&mut conn, case_id).store()? {
            match stored::<SessionStatus>("session status", &session.status)? {
                SessionStatus::Scheduled => listing.upcoming.push(session),
                SessionStatus::Completed => listing.completed.push(session),
                SessionStatus::Cancelled => {}
            }
        }
        listing.completed.reverse();
        Ok(listing)
    }

    /// Record or replace the progress scores of a completed session.
    pub fn save_progress(&self, principal: &Principal, session_id: &str, input: ProgressInput) -> Result<SavedProgress, HavenError> {
        principal.require_reviewer()?;
        input.validate()?;
        let now = self.now();

        let mut conn = self.conn()?;
        immediate(&mut conn, |conn| {
            let session = owned_session(conn, principal, session_id)?;
            if stored::<SessionStatus>("session status", &session.status)? != SessionStatus::Completed {
                return Err(HavenError::precondition(
                    "progress can only be recorded for completed sessions",
                ));
            }

            let progress = SessionProgress {
                session_id: session.id.clone(),
                subject_id: session.subject_id.clone(),
                plan_level: input.plan_level,
                skills_level: input.skills_level,
                goals_level: input.goals_level,
                notes: input.notes.clone(),
                updated_at: now,
            };
            let created = match db::get_progress(conn, session_id).store()? {
                Some(_) => {
                    db::update_progress(conn, &progress).store()?;
                    false
                }
                None => {
                    db::insert_progress(conn, &progress).store()?;
                    true
                }
            };
            Ok(SavedProgress { progress, created })
        })
    }
}
