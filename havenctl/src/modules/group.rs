use super::client::ApiClient;

pub fn draft(topic: &str, description: Option<&str>, starts_at: i64, link: &str) -> serde_json::Value {
    serde_json::json!({
        "topic": topic,
        "description": description,
        "starts_at": starts_at,
        "location_ref": link,
    })
}

pub async fn list(client: &ApiClient) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    client.get("group_sessions").await
}

pub async fn create(client: &ApiClient, draft: &serde_json::Value) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let session = client.post("group_sessions", draft).await?;
    tracing::info!(
        "✅ Group session {} scheduled (meeting {})",
        session["id"].as_str().unwrap_or("?"),
        session["meeting_id"].as_str().unwrap_or("?")
    );
    Ok(session)
}

pub async fn update(
    client: &ApiClient,
    session_id: &str,
    draft: &serde_json::Value,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    client.put(&format!("group_sessions/{}", session_id), draft).await
}

pub async fn delete(client: &ApiClient, session_id: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    client.delete(&format!("group_sessions/{}", session_id)).await
}

pub async fn complete(client: &ApiClient, session_id: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    client
        .post(&format!("group_sessions/{}/complete", session_id), &serde_json::json!({}))
        .await
}

pub async fn attend(
    client: &ApiClient,
    session_id: &str,
    subject_id: &str,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    client
        .post(
            &format!("group_sessions/{}/attendance", session_id),
            &serde_json::json!({"subject_id": subject_id}),
        )
        .await
}
