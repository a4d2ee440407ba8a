use chrono::{DateTime, NaiveDateTime};

use super::client::ApiClient;

/// Accepts Unix seconds, RFC 3339, or `YYYY-MM-DD HH:MM` (UTC).
pub fn parse_when(raw: &str) -> Result<i64, String> {
    let raw = raw.trim();
    if let Ok(ts) = raw.parse::<i64>() {
        return Ok(ts);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.timestamp());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .map(|dt| dt.and_utc().timestamp())
        .map_err(|_| format!("cannot read '{}' as a time", raw))
}

pub fn draft(topic: &str, at: i64, link: &str, notes: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "topic": topic,
        "scheduled_at": at,
        "location_ref": link,
        "notes": notes,
    })
}

pub async fn list(client: &ApiClient, case_id: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    client.get(&format!("cases/{}/sessions", case_id)).await
}

pub async fn create(
    client: &ApiClient,
    case_id: &str,
    draft: &serde_json::Value,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let session = client.post(&format!("cases/{}/sessions", case_id), draft).await?;
    tracing::info!(
        "✅ Session {} scheduled ({})",
        session["id"].as_str().unwrap_or("?"),
        session["payment_status"].as_str().unwrap_or("?")
    );
    Ok(session)
}

pub async fn update(
    client: &ApiClient,
    session_id: &str,
    draft: &serde_json::Value,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    client.put(&format!("sessions/{}", session_id), draft).await
}

pub async fn delete(client: &ApiClient, session_id: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let resp = client.delete(&format!("sessions/{}", session_id)).await?;
    tracing::info!("✅ Session {} deleted", session_id);
    Ok(resp)
}

pub async fn complete(client: &ApiClient, session_id: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    client
        .post(&format!("sessions/{}/complete", session_id), &serde_json::json!({}))
        .await
}

pub async fn remind(client: &ApiClient, session_id: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let alert = client
        .post(&format!("sessions/{}/reminder", session_id), &serde_json::json!({}))
        .await?;
    tracing::info!("✅ Payment reminder sent");
    Ok(alert)
}

pub async fn progress(
    client: &ApiClient,
    session_id: &str,
    levels: (i32, i32, i32),
    notes: Option<&str>,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let (plan, skills, goals) = levels;
    let payload = serde_json::json!({
        "plan_level": plan,
        "skills_level": skills,
        "goals_level": goals,
        "notes": notes,
    });
    client.put(&format!("sessions/{}/progress", session_id), &payload).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_parse_in_three_shapes() {
        assert_eq!(parse_when("1700000000").unwrap(), 1_700_000_000);
        assert_eq!(parse_when("2023-11-14T22:13:20Z").unwrap(), 1_700_000_000);
        assert_eq!(parse_when("2023-11-14 22:13").unwrap(), 1_700_000_000 - 20);
        assert!(parse_when("next friday").is_err());
    }
}
