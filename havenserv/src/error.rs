use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use std::fmt;

use haven::HavenError;

/// HTTP face of `HavenError`: `{"error": kind, "message": ...}` with the mapped status.
#[derive(Debug)]
pub struct ApiError(pub HavenError);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<HavenError> for ApiError {
    fn from(e: HavenError) -> Self {
        ApiError(e)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        self.0.log_event();
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        }))
    }
}
