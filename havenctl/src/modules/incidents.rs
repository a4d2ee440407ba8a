use haven::model::DetectionSource;

use super::client::ApiClient;

/// Report a detection for classification
pub async fn report(
    client: &ApiClient,
    subject_id: &str,
    phrase: &str,
    confidence: Option<f64>,
    source: DetectionSource,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let payload = serde_json::json!({
        "subject_id": subject_id,
        "detected_phrase": phrase,
        "confidence": confidence,
        "source": source,
    });
    let incident = client.post("incidents", &payload).await?;
    tracing::info!(
        "Incident {} classified as {}",
        incident["id"].as_str().unwrap_or("?"),
        incident["severity_tier"].as_str().unwrap_or("?")
    );
    Ok(incident)
}

pub async fn queue(client: &ApiClient, include_escalated: bool) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    client
        .get(&format!("incidents?include_escalated={}", include_escalated))
        .await
}

/// Notify the guardian and open the emergency payment record
pub async fn escalate(client: &ApiClient, incident_id: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    tracing::info!("Escalating incident {}", incident_id);
    let escalation = client
        .post(&format!("incidents/{}/escalate", incident_id), &serde_json::json!({}))
        .await?;
    tracing::info!(
        "✅ Guardian alerted, emergency record {}",
        escalation["payment"]["id"].as_str().unwrap_or("?")
    );
    Ok(escalation)
}
