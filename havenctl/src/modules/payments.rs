use haven::model::PaymentStatus;
use haven::payment::{PaymentRef, WebhookEvent, WebhookSigner, SIGNATURE_HEADER};
use reqwest::Method;

use super::client::{send, ApiClient};

/// Ask the server for a hosted checkout link
pub async fn checkout(client: &ApiClient, reference: &PaymentRef) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let checkout = client.post("payments/checkout", reference).await?;
    tracing::info!("Checkout link: {}", checkout["url"].as_str().unwrap_or("?"));
    Ok(checkout)
}

pub async fn status(client: &ApiClient, incident_id: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    client.get(&format!("payments/incidents/{}", incident_id)).await
}

pub async fn session_status(client: &ApiClient, session_id: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    client.get(&format!("payments/sessions/{}", session_id)).await
}

/// Signed body and header value for a "paid" processor notification.
pub fn signed_event(reference: PaymentRef, secret: &str) -> Result<(Vec<u8>, String), Box<dyn std::error::Error>> {
    let body = serde_json::to_vec(&WebhookEvent {
        reference,
        status: PaymentStatus::Paid,
    })?;
    let signature = WebhookSigner::new(secret).sign(&body)?;
    Ok((body, signature))
}

/// Replay a processor notification, for staging setups without a live processor
pub async fn simulate_paid(
    client: &ApiClient,
    reference: PaymentRef,
    secret: &str,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    tracing::warn!("Sending a signed payment notification for {} {}", reference.ledger(), reference.id());
    let (body, signature) = signed_event(reference, secret)?;
    let request = client
        .request(Method::POST, "payments/webhook")
        .header(SIGNATURE_HEADER, signature)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body);
    send(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_event_verifies_with_the_same_secret() {
        let (body, signature) = signed_event(PaymentRef::Session("s-1".into()), "whsec").unwrap();
        let event = WebhookSigner::new("whsec").open(&body, &signature).unwrap();
        assert_eq!(event.reference, PaymentRef::Session("s-1".into()));
        assert!(WebhookSigner::new("other").open(&body, &signature).is_err());
    }
}
