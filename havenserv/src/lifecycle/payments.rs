use serde::Serialize;

use haven::auth::{Principal, Role};
use haven::model::{AlertStatus, PaymentStatus};
use haven::payment::{CheckoutRequest, PaymentRef, WebhookEvent};
use haven::HavenError;

use super::{new_id, stored, Lifecycle};
use crate::db::{self, immediate, ReviewerAlert, StoreResultExt};

#[derive(Debug, Clone, Serialize)]
pub struct Checkout {
    pub reference: PaymentRef,
    pub amount_cents: i64,
    pub currency: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    pub reference: PaymentRef,
    /// False when the reference was already paid.
    pub changed: bool,
}

impl Lifecycle {
    /// Ask the payment processor for a checkout redirect for an unpaid reference.
    pub fn request_checkout(&self, principal: &Principal, reference: PaymentRef) -> Result<Checkout, HavenError> {
        principal.require(&[Role::Parent, Role::Admin])?;

        let request = {
            let mut conn = self.conn()?;
            let (subject_id, status, amount_cents, currency) = match &reference {
                PaymentRef::Emergency(id) => {
                    let record = db::get_emergency_payment(&mut conn, id)
                        .store()?
                        .ok_or_else(|| HavenError::not_found("emergency payment"))?;
                    (record.subject_id, record.payment_status, record.amount_cents, record.currency)
                }
                PaymentRef::Session(id) => {
                    let session = db::get_session(&mut conn, id)
                        .store()?
                        .ok_or_else(|| HavenError::not_found("session"))?;
                    (
                        session.subject_id,
                        session.payment_status,
                        session.price_cents,
                        self.policy.currency.clone(),
                    )
                }
            };

            if !principal.is_admin() && !db::is_guardian_of(&mut conn, &principal.id, &subject_id).store()? {
                return Err(HavenError::forbidden("you are not a guardian of this subject"));
            }
            let status: PaymentStatus = stored("payment status", &status)?;
            if status.is_paid() {
                return Err(HavenError::conflict("already paid"));
            }

            CheckoutRequest {
                reference: reference.clone(),
                amount_cents,
                currency,
            }
        };

        let url = self.payments.checkout_url(&request)?;
        Ok(Checkout {
            reference,
            amount_cents: request.amount_cents,
            currency: request.currency,
            url,
        })
    }

    /// Apply a verified processor notification. Settling a paid reference is a no-op.
    pub fn settle(&self, event: WebhookEvent) -> Result<Settlement, HavenError> {
        if !event.status.is_paid() {
            return Err(HavenError::validation(format!(
                "unsupported payment status '{}'",
                event.status
            )));
        }
        let now = self.now();

        let mut conn = self.conn()?;
        let changed = immediate(&mut conn, |conn| match &event.reference {
            PaymentRef::Emergency(id) => {
                let record = db::get_emergency_payment(conn, id)
                    .store()?
                    .ok_or_else(|| HavenError::not_found("emergency payment"))?;
                let status: PaymentStatus = stored("payment status", &record.payment_status)?;
                let (_, changed) = status.settle();
                if !changed {
                    return Ok(false);
                }

                db::mark_emergency_paid(conn, &record.id, now).store()?;
                let alert = ReviewerAlert {
                    id: new_id(),
                    reviewer_id: record.reviewer_id.clone(),
                    payment_id: record.id.clone(),
                    incident_id: record.incident_id.clone(),
                    message: "Payment received, case can be opened".to_string(),
                    status: AlertStatus::Unread.as_str().to_string(),
                    created_at: now,
                };
                db::insert_reviewer_alert(conn, &alert).store()?;
                self.audit(
                    conn,
                    None,
                    "payment_settled",
                    serde_json::json!({"ledger": "emergency", "id": record.id, "incident_id": record.incident_id}),
                );
                Ok(true)
            }
            PaymentRef::Session(id) => {
                let session = db::get_session(conn, id)
                    .store()?
                    .ok_or_else(|| HavenError::not_found("session"))?;
                let status: PaymentStatus = stored("payment status", &session.payment_status)?;
                let (_, changed) = status.settle();
                if !changed {
                    return Ok(false);
                }

                db::mark_session_paid(conn, &session.id).store()?;
                self.audit(
                    conn,
                    None,
                    "payment_settled",
                    serde_json::json!({"ledger": "session", "id": session.id}),
                );
                Ok(true)
            }
        })?;

        if changed {
            tracing::info!("Payment settled for {} {}", event.reference.ledger(), event.reference.id());
        } else {
            tracing::debug!("Duplicate settlement ignored for {} {}", event.reference.ledger(), event.reference.id());
        }
        Ok(Settlement {
            reference: event.reference,
            changed,
        })
    }

    /// Emergency ledger: whether the incident's fee has been paid.
    pub fn is_paid(&self, incident_id: &str) -> Result<bool, HavenError> {
        let mut conn = self.conn()?;
        match db::get_emergency_payment_by_incident(&mut conn, incident_id).store()? {
            Some(record) => Ok(stored::<PaymentStatus>("payment status", &record.payment_status)?.is_paid()),
            None => Ok(false),
        }
    }

    /// Session ledger: whether a session's fee has been paid.
    pub fn is_session_paid(&self, session_id: &str) -> Result<bool, HavenError> {
        let mut conn = self.conn()?;
        let session = db::get_session(&mut conn, session_id)
            .store()?
            .ok_or_else(|| HavenError::not_found("session"))?;
        Ok(stored::<PaymentStatus>("payment status", &session.payment_status)?.is_paid())
    }
}
