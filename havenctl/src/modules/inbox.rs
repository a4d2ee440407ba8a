use super::client::ApiClient;

/// Which inbox to address: guardians see subject alerts, psychologists see payment notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Inbox {
    Guardian,
    Reviewer,
}

impl Inbox {
    fn path(&self) -> &'static str {
        match self {
            Inbox::Guardian => "guardian/alerts",
            Inbox::Reviewer => "reviewer/alerts",
        }
    }
}

pub async fn list(client: &ApiClient, inbox: Inbox) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let alerts = client.get(inbox.path()).await?;
    let unread = alerts
        .as_array()
        .map(|a| a.iter().filter(|x| x["status"] == "unread").count())
        .unwrap_or(0);
    tracing::info!("{} unread alert(s)", unread);
    Ok(alerts)
}

pub async fn mark_read(
    client: &ApiClient,
    inbox: Inbox,
    alert_id: &str,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    client
        .post(&format!("{}/{}/read", inbox.path(), alert_id), &serde_json::json!({}))
        .await
}
