use diesel::sqlite::SqliteConnection;
use serde::Serialize;

use haven::auth::Principal;
use haven::model::{CaseEvent, CaseStatus, PaymentStatus};
use haven::HavenError;

use super::{new_id, stored, Lifecycle};
use crate::db::{self, immediate, Case, StoreResultExt};

#[derive(Debug, Clone, Default, Serialize)]
pub struct CaseBoard {
    /// Cases in `open` or `in_session`.
    pub open: Vec<Case>,
    pub closed: Vec<Case>,
}

/// Load a case the reviewer owns.
pub(super) fn owned_case(conn: &mut SqliteConnection, principal: &Principal, case_id: &str) -> Result<Case, HavenError> {
    let case = db::get_case(conn, case_id)
        .store()?
        .ok_or_else(|| HavenError::not_found("case"))?;
    if case.reviewer_id != principal.id {
        return Err(HavenError::forbidden("case belongs to another psychologist"));
    }
    Ok(case)
}

impl Lifecycle {
    /// Open a case for a paid, escalated incident. Only the reviewer who
    /// escalated may open it and the open-case cap applies.
    pub fn open_case(&self, principal: &Principal, incident_id: &str) -> Result<Case, HavenError> {
        principal.require_reviewer()?;
        let now = self.now();

        let mut conn = self.conn()?;
        let case = immediate(&mut conn, |conn| {
            let incident = db::get_incident(conn, incident_id)
                .store()?
                .ok_or_else(|| HavenError::not_found("incident"))?;

            let record = db::get_emergency_payment_by_incident(conn, incident_id).store()?;
            let record = match record {
                Some(r) if stored::<PaymentStatus>("payment status", &r.payment_status)?.is_paid() => r,
                _ => return Err(HavenError::precondition("payment not completed yet")),
            };
            if record.reviewer_id != principal.id {
                return Err(HavenError::forbidden(
                    "only the psychologist who escalated this incident can open its case",
                ));
            }
            if db::get_case_by_incident(conn, incident_id).store()?.is_some() {
                return Err(HavenError::conflict("case already exists for this incident"));
            }
            if db::count_active_cases(conn, &principal.id).store()? >= self.policy.max_open_cases {
                return Err(HavenError::conflict(
                    "case limit reached: close a case before opening a new one",
                ));
            }

            let case = Case {
                id: new_id(),
                reviewer_id: principal.id.clone(),
                subject_id: incident.subject_id.clone(),
                incident_id: incident.id.clone(),
                payment_id: record.id.clone(),
                detected_phrase: incident.detected_phrase.clone(),
                severity_tier: incident.severity_tier.clone(),
                status: CaseStatus::Open.as_str().to_string(),
                opened_at: now,
                closed_at: None,
            };
            db::insert_case(conn, &case).unique_as("case already exists for this incident")?;
            self.audit(
                conn,
                Some(&principal.id),
                "case_open",
                serde_json::json!({"case_id": case.id, "incident_id": case.incident_id}),
            );
            Ok(case)
        })?;

        tracing::info!("Case {} opened by {} for incident {}", case.id, principal.id, incident_id);
        Ok(case)
    }

    /// Close a case once no session is pending. Closing is terminal.
    pub fn close_case(&self, principal: &Principal, case_id: &str) -> Result<Case, HavenError> {
        principal.require_reviewer()?;
        let now = self.now();

        let mut conn = self.conn()?;
        let case = immediate(&mut conn, |conn| {
            let mut case = owned_case(conn, principal, case_id)?;
            let status: CaseStatus = stored("case status", &case.status)?;
            let scheduled_sessions = db::count_scheduled_sessions_for_case(conn, case_id).store()?;
            let next = status.apply(CaseEvent::Close { scheduled_sessions })?;

            db::set_case_status(conn, case_id, next.as_str(), Some(now)).store()?;
            self.audit(
                conn,
                Some(&principal.id),
                "case_close",
                serde_json::json!({"case_id": case_id}),
            );

            case.status = next.as_str().to_string();
            case.closed_at = Some(now);
            Ok(case)
        })?;

        tracing::info!("Case {} closed by {}", case_id, principal.id);
        Ok(case)
    }

    pub fn list_cases(&self, principal: &Principal) -> Result<CaseBoard, HavenError> {
        principal.require_reviewer()?;
        let mut conn = self.conn()?;
        let cases = db::list_cases_for_reviewer(&mut conn, &principal.id).store()?;

        let mut board = CaseBoard::default();
        for case in cases {
            if stored::<CaseStatus>("case status", &case.status)?.is_active() {
                board.open.push(case);
            } else {
                board.closed.push(case);
            }
        }
        Ok(board)
    }
}
