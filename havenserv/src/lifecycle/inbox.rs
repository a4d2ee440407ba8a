use haven::auth::{Principal, Role};
use haven::model::AlertStatus;
use haven::HavenError;

use super::Lifecycle;
use crate::db::{self, GuardianAlert, ReviewerAlert, StoreResultExt};

impl Lifecycle {
    /// Alerts for every subject linked to the guardian.
    pub fn guardian_alerts(&self, principal: &Principal) -> Result<Vec<GuardianAlert>, HavenError> {
        principal.require(&[Role::Parent])?;
        let mut conn = self.conn()?;
        db::list_guardian_alerts(&mut conn, &principal.id).store()
    }

    pub fn mark_guardian_alert_read(&self, principal: &Principal, alert_id: &str) -> Result<GuardianAlert, HavenError> {
        principal.require(&[Role::Parent])?;
        let mut conn = self.conn()?;

        let mut alert = db::get_guardian_alert(&mut conn, alert_id)
            .store()?
            .ok_or_else(|| HavenError::not_found("alert"))?;
        if !db::is_guardian_of(&mut conn, &principal.id, &alert.subject_id).store()? {
            return Err(HavenError::forbidden("alert belongs to another guardian"));
        }
        db::mark_guardian_alert_read(&mut conn, alert_id).store()?;
        alert.status = AlertStatus::Read.as_str().to_string();
        Ok(alert)
    }

    pub fn reviewer_alerts(&self, principal: &Principal) -> Result<Vec<ReviewerAlert>, HavenError> {
        principal.require_reviewer()?;
        let mut conn = self.conn()?;
        db::list_reviewer_alerts(&mut conn, &principal.id).store()
    }

    pub fn mark_reviewer_alert_read(&self, principal: &Principal, alert_id: &str) -> Result<ReviewerAlert, HavenError> {
        principal.require_reviewer()?;
        let mut conn = self.conn()?;

        let mut alert = db::get_reviewer_alert(&mut conn, alert_id)
            .store()?
            .ok_or_else(|| HavenError::not_found("alert"))?;
        if alert.reviewer_id != principal.id {
            return Err(HavenError::forbidden("alert belongs to another psychologist"));
        }
        db::mark_reviewer_alert_read(&mut conn, alert_id).store()?;
        alert.status = AlertStatus::Read.as_str().to_string();
        Ok(alert)
    }
}
