use serde::Deserialize;

use haven::auth::{Principal, Role};
use haven::model::{DetectionSource, IncidentStatus};
use haven::risk;
use haven::HavenError;

use super::{new_id, Lifecycle};
use crate::db::{self, immediate, Incident, StoreResultExt};

pub(super) const QUEUE_LIMIT: i64 = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionInput {
    pub subject_id: String,
    pub detected_phrase: String,
    pub confidence: Option<f64>,
    #[serde(default)]
    pub source: Option<DetectionSource>,
}

impl DetectionInput {
    fn validate(&self) -> Result<(), HavenError> {
        if self.subject_id.trim().is_empty() {
            return Err(HavenError::validation("subject_id is required"));
        }
        if self.detected_phrase.trim().is_empty() {
            return Err(HavenError::validation("detected_phrase is required"));
        }
        if let Some(c) = self.confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(HavenError::validation("confidence must be between 0 and 1"));
            }
        }
        Ok(())
    }
}

impl Lifecycle {
    /// Classify a detection and store it as an unreviewed incident.
    pub fn intake(&self, principal: &Principal, input: DetectionInput) -> Result<Incident, HavenError> {
        principal.require(&[Role::Psychologist, Role::Admin])?;
        input.validate()?;

        let tier = risk::classify(&input.detected_phrase, input.confidence);
        let incident = Incident {
            id: new_id(),
            subject_id: input.subject_id.trim().to_string(),
            detected_phrase: input.detected_phrase.trim().to_string(),
            confidence: input.confidence,
            source: input.source.unwrap_or(DetectionSource::Text).as_str().to_string(),
            severity_tier: tier.as_str().to_string(),
            status: IncidentStatus::Unreviewed.as_str().to_string(),
            created_at: self.now(),
            escalated_at: None,
            escalated_by: None,
        };

        let mut conn = self.conn()?;
        immediate(&mut conn, |conn| {
            db::insert_incident(conn, &incident).store()?;
            self.audit(
                conn,
                Some(&principal.id),
                "incident_intake",
                serde_json::json!({"incident_id": incident.id, "tier": incident.severity_tier}),
            );
            Ok(())
        })?;

        tracing::info!("Incident {} classified as {}", incident.id, tier);
        Ok(incident)
    }

    /// Incidents ordered CRITICAL, HIGH, MEDIUM and newest first within a tier.
    pub fn risk_queue(&self, principal: &Principal, include_escalated: bool) -> Result<Vec<Incident>, HavenError> {
        principal.require(&[Role::Psychologist, Role::Admin])?;

        let status = if include_escalated {
            None
        } else {
            Some(IncidentStatus::Unreviewed.as_str())
        };
        let mut conn = self.conn()?;
        db::list_incidents(&mut conn, status, QUEUE_LIMIT).store()
    }
}
