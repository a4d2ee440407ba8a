use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};

use haven::auth::{Principal, TokenIssuer};
use haven::HavenError;

use crate::error::ApiError;

/// Principal taken from the `Authorization: Bearer <jwt>` header.
pub struct Authenticated(pub Principal);

fn bearer_principal(req: &HttpRequest) -> Result<Principal, HavenError> {
    let issuer = req
        .app_data::<web::Data<TokenIssuer>>()
        .ok_or_else(|| HavenError::transient("token issuer missing from app data"))?;

    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| HavenError::Unauthorized("missing bearer token".to_string()))?;
    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| HavenError::Unauthorized("missing bearer token".to_string()))?;

    issuer.validate(token)
}

impl FromRequest for Authenticated {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(bearer_principal(req).map(Authenticated).map_err(ApiError))
    }
}
