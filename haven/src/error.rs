use thiserror::Error;

/// Every failure a lifecycle operation can report to its caller.
///
/// No variant implies a partial state change: operations either commit all of
/// their effects or none of them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HavenError {
    /// Malformed input (invalid meeting link, missing field, out of range score).
    #[error("{0}")]
    Validation(String),

    /// Uniqueness or capacity violation (duplicate escalation, case limit).
    #[error("{0}")]
    Conflict(String),

    /// The transition's guard is not satisfied.
    #[error("{0}")]
    Precondition(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    /// Store or collaborator unavailable. Safe to retry.
    #[error("something went wrong")]
    Transient(String),
}

impl HavenError {
    pub fn validation(msg: impl Into<String>) -> Self {
        HavenError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        HavenError::Conflict(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        HavenError::Precondition(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        HavenError::NotFound(what.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        HavenError::Forbidden(msg.into())
    }

    pub fn transient(detail: impl Into<String>) -> Self {
        HavenError::Transient(detail.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            HavenError::Validation(_) => 400,
            HavenError::Unauthorized(_) => 401,
            HavenError::Forbidden(_) => 403,
            HavenError::NotFound(_) => 404,
            HavenError::Conflict(_) => 409,
            HavenError::Precondition(_) => 412,
            HavenError::Transient(_) => 503,
        }
    }

    /// Stable label used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            HavenError::Validation(_) => "validation",
            HavenError::Conflict(_) => "conflict",
            HavenError::Precondition(_) => "precondition",
            HavenError::NotFound(_) => "not_found",
            HavenError::Unauthorized(_) => "unauthorized",
            HavenError::Forbidden(_) => "forbidden",
            HavenError::Transient(_) => "transient",
        }
    }

    /// Log the error at a level matching how surprising it is.
    pub fn log_event(&self) {
        match self {
            HavenError::Transient(detail) => {
                tracing::error!("Transient failure: {}", detail);
            }
            HavenError::Unauthorized(msg) | HavenError::Forbidden(msg) => {
                tracing::warn!("Access rejected: {}", msg);
            }
            _ => {
                tracing::debug!("Request rejected ({}): {}", self.kind(), self);
            }
        }
    }
}

impl From<serde_json::Error> for HavenError {
    fn from(e: serde_json::Error) -> Self {
        HavenError::Validation(format!("invalid payload: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_hides_detail_from_display() {
        let err = HavenError::transient("database is locked");
        assert_eq!(err.to_string(), "something went wrong");
        assert_eq!(err.status_code(), 503);
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(HavenError::validation("x").status_code(), 400);
        assert_eq!(HavenError::conflict("x").status_code(), 409);
        assert_eq!(HavenError::precondition("x").status_code(), 412);
        assert_eq!(HavenError::not_found("case").to_string(), "case not found");
    }
}
