use serde::{Deserialize, Serialize};

use haven::auth::{Principal, Role};
use haven::model::{CaseStatus, IncidentStatus, PaymentStatus, SessionStatus};
use haven::HavenError;

use super::Lifecycle;
use crate::db::{self, AuditLog, GuardianLink, StoreResultExt};

const AUDIT_LIMIT_MAX: i64 = 1000;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuardianLinkInput {
    pub guardian_id: String,
    pub subject_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub unreviewed_incidents: i64,
    pub escalated_incidents: i64,
    pub open_cases: i64,
    pub closed_cases: i64,
    pub scheduled_sessions: i64,
    pub completed_sessions: i64,
    pub unpaid_emergencies: i64,
}

impl Lifecycle {
    pub fn link_guardian(&self, principal: &Principal, input: GuardianLinkInput) -> Result<GuardianLink, HavenError> {
        principal.require(&[Role::Admin])?;
        if input.guardian_id.trim().is_empty() || input.subject_id.trim().is_empty() {
            return Err(HavenError::validation("guardian_id and subject_id are required"));
        }

        let link = GuardianLink {
            guardian_id: input.guardian_id.trim().to_string(),
            subject_id: input.subject_id.trim().to_string(),
            created_at: self.now(),
        };
        let mut conn = self.conn()?;
        db::insert_guardian_link(&mut conn, &link).unique_as("guardian is already linked to this subject")?;
        self.audit(
            &mut conn,
            Some(&principal.id),
            "guardian_link",
            serde_json::json!({"guardian_id": link.guardian_id, "subject_id": link.subject_id}),
        );

        tracing::info!("Guardian {} linked to subject {}", link.guardian_id, link.subject_id);
        Ok(link)
    }

    pub fn overview(&self, principal: &Principal) -> Result<Overview, HavenError> {
        principal.require(&[Role::Admin])?;
        let mut conn = self.conn()?;

        Ok(Overview {
            unreviewed_incidents: db::count_incidents_by_status(&mut conn, IncidentStatus::Unreviewed.as_str()).store()?,
            escalated_incidents: db::count_incidents_by_status(&mut conn, IncidentStatus::Escalated.as_str()).store()?,
            open_cases: db::count_cases_by_status(
                &mut conn,
                &[CaseStatus::Open.as_str(), CaseStatus::InSession.as_str()],
            )
            .store()?,
            closed_cases: db::count_cases_by_status(&mut conn, &[CaseStatus::Closed.as_str()]).store()?,
            scheduled_sessions: db::count_sessions_by_status(&mut conn, SessionStatus::Scheduled.as_str()).store()?,
            completed_sessions: db::count_sessions_by_status(&mut conn, SessionStatus::Completed.as_str()).store()?,
            unpaid_emergencies: db::count_emergency_payments(&mut conn, PaymentStatus::Unpaid.as_str()).store()?,
        })
    }

    pub fn audit_log(&self, principal: &Principal, event_type: Option<&str>, limit: i64) -> Result<Vec<AuditLog>, HavenError> {
        principal.require(&[Role::Admin])?;
        let mut conn = self.conn()?;
        db::get_audit_logs(&mut conn, event_type, limit.clamp(1, AUDIT_LIMIT_MAX)).store()
    }
}
