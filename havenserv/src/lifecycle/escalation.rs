use serde::Serialize;

use haven::auth::Principal;
use haven::model::{AlertKind, AlertStatus, EmergencyCaseStatus, IncidentStatus, PaymentStatus};
use haven::policy::format_amount;
use haven::HavenError;

use super::{new_id, stored, Lifecycle};
use crate::db::{self, immediate, EmergencyPayment, GuardianAlert, StoreResultExt};

const ALREADY_ESCALATED: &str = "incident already escalated";

#[derive(Debug, Clone, Serialize)]
pub struct Escalation {
    pub alert: GuardianAlert,
    pub payment: EmergencyPayment,
}

impl Lifecycle {
    /// Notify the guardian and open an unpaid emergency record, atomically.
    /// A second escalation of the same incident is a `Conflict` with no effect.
    pub fn escalate(&self, principal: &Principal, incident_id: &str) -> Result<Escalation, HavenError> {
        principal.require_reviewer()?;
        let now = self.now();

        let mut conn = self.conn()?;
        let escalation = immediate(&mut conn, |conn| {
            let incident = db::get_incident(conn, incident_id)
                .store()?
                .ok_or_else(|| HavenError::not_found("incident"))?;

            if db::get_emergency_payment_by_incident(conn, incident_id).store()?.is_some() {
                return Err(HavenError::conflict(ALREADY_ESCALATED));
            }
            let status: IncidentStatus = stored("incident status", &incident.status)?;
            let escalated = status.escalate()?;

            let fee = format_amount(self.policy.emergency_fee_cents, &self.policy.currency);
            let alert = GuardianAlert {
                id: new_id(),
                kind: AlertKind::Emergency.as_str().to_string(),
                incident_id: Some(incident.id.clone()),
                session_id: None,
                subject_id: incident.subject_id.clone(),
                message: format!(
                    "Psychologist {} flagged a {} concern (\"{}\"). An emergency session fee of {} is required to open a case.",
                    principal.id, incident.severity_tier, incident.detected_phrase, fee
                ),
                status: AlertStatus::Unread.as_str().to_string(),
                created_at: now,
            };
            db::insert_guardian_alert(conn, &alert).unique_as(ALREADY_ESCALATED)?;

            let payment = EmergencyPayment {
                id: new_id(),
                incident_id: incident.id.clone(),
                alert_id: alert.id.clone(),
                reviewer_id: principal.id.clone(),
                subject_id: incident.subject_id.clone(),
                amount_cents: self.policy.emergency_fee_cents,
                currency: self.policy.currency.clone(),
                payment_status: PaymentStatus::Unpaid.as_str().to_string(),
                case_status: EmergencyCaseStatus::PendingPayment.as_str().to_string(),
                created_at: now,
                paid_at: None,
            };
            db::insert_emergency_payment(conn, &payment).unique_as(ALREADY_ESCALATED)?;

            if db::mark_incident_escalated(conn, &incident.id, &principal.id, now).store()? == 0 {
                return Err(HavenError::not_found("incident"));
            }
            self.audit(
                conn,
                Some(&principal.id),
                "escalate",
                serde_json::json!({
                    "incident_id": incident.id,
                    "payment_id": payment.id,
                    "status": escalated.as_str(),
                }),
            );

            Ok(Escalation { alert, payment })
        })?;

        tracing::info!(
            "Incident {} escalated by {}; emergency record {}",
            incident_id,
            principal.id,
            escalation.payment.id
        );
        Ok(escalation)
    }
}
