use super::client::ApiClient;

pub async fn open(client: &ApiClient, incident_id: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let case = client
        .post(&format!("incidents/{}/case", incident_id), &serde_json::json!({}))
        .await?;
    tracing::info!("✅ Case {} opened", case["id"].as_str().unwrap_or("?"));
    Ok(case)
}

pub async fn list(client: &ApiClient) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    client.get("cases").await
}

pub async fn close(client: &ApiClient, case_id: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let case = client
        .post(&format!("cases/{}/close", case_id), &serde_json::json!({}))
        .await?;
    tracing::info!("✅ Case {} closed", case_id);
    Ok(case)
}
