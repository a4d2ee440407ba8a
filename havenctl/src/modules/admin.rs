use haven::auth::Role;

use super::client::ApiClient;

/// Mint a bearer token with the server's bootstrap key
pub async fn issue_token(
    client: &ApiClient,
    bootstrap_key: &str,
    subject_id: &str,
    role: Role,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    tracing::info!("Requesting {} token for {}", role, subject_id);
    let payload = serde_json::json!({
        "bootstrap_key": bootstrap_key,
        "subject_id": subject_id,
        "role": role,
    });
    let resp = client.post("admin/issue_token", &payload).await?;
    tracing::info!("✅ Token issued, expires in {}s", resp["expires_in"].as_u64().unwrap_or(0));
    Ok(resp)
}

pub async fn link_guardian(
    client: &ApiClient,
    guardian_id: &str,
    subject_id: &str,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    client
        .post(
            "admin/guardian_links",
            &serde_json::json!({"guardian_id": guardian_id, "subject_id": subject_id}),
        )
        .await
}

pub async fn overview(client: &ApiClient) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    client.get("admin/overview").await
}

pub async fn audit(
    client: &ApiClient,
    event_type: Option<&str>,
    limit: i64,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let mut path = format!("admin/audit?limit={}", limit);
    if let Some(event_type) = event_type {
        path.push_str(&format!("&event_type={}", event_type));
    }
    client.get(&path).await
}
