use reqwest::{ClientBuilder, Method, RequestBuilder, StatusCode};
use serde::Serialize;

/// Thin wrapper over reqwest that carries the server address and bearer token.
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base: &str, token: Option<String>) -> reqwest::Result<Self> {
        let http = ClientBuilder::new()
            .gzip(true)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(ApiClient {
            http,
            base: base.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base, path.trim_start_matches('/'))
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn get(&self, path: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
        send(self.request(Method::GET, path)).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
        send(self.request(Method::POST, path).json(body)).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
        send(self.request(Method::PUT, path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
        send(self.request(Method::DELETE, path)).await
    }
}

/// Send a request and decode the JSON body; non-2xx becomes an error with the server's message.
pub async fn send(request: RequestBuilder) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let resp = request.send().await?;
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        let error_msg = describe_error(status, &body);
        tracing::debug!("Request failed: {}", error_msg);
        return Err(error_msg.into());
    }
    if body.trim().is_empty() {
        return Ok(serde_json::json!({"status": status.as_u16()}));
    }
    Ok(serde_json::from_str(&body)?)
}

pub fn describe_error(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => {
            let kind = json.get("error").and_then(|v| v.as_str()).unwrap_or("error");
            let message = json.get("message").and_then(|v| v.as_str()).unwrap_or(body);
            format!("{} ({}): {}", status.as_u16(), kind, message)
        }
        Err(_) if body.trim().is_empty() => format!("{}", status),
        Err(_) => format!("{}: {}", status.as_u16(), body.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_joined_under_api() {
        let client = ApiClient::new("http://127.0.0.1:8080/", None).unwrap();
        assert_eq!(client.url("cases"), "http://127.0.0.1:8080/api/cases");
        assert_eq!(client.url("/sessions/s-1"), "http://127.0.0.1:8080/api/sessions/s-1");
    }

    #[test]
    fn server_errors_are_rendered_with_kind() {
        let body = r#"{"error":"precondition","message":"payment not completed yet"}"#;
        assert_eq!(
            describe_error(StatusCode::PRECONDITION_FAILED, body),
            "412 (precondition): payment not completed yet"
        );
        assert_eq!(describe_error(StatusCode::BAD_GATEWAY, "upstream down"), "502: upstream down");
    }
}
