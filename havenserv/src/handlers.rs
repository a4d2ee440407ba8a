use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use haven::auth::{Principal, TokenIssuer};
use haven::payment::{PaymentRef, WebhookSigner, SIGNATURE_HEADER};
use haven::HavenError;

use crate::admin::{AdminBootstrap, IssueTokenRequest};
use crate::auth::Authenticated;
use crate::error::ApiError;
use crate::lifecycle::{
    DetectionInput, GroupSessionDraft, GuardianLinkInput, Lifecycle, ProgressInput, SessionDraft,
};

type ApiResult = Result<HttpResponse, ApiError>;

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    #[serde(default)]
    pub include_escalated: bool,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub event_type: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub subject_id: String,
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}

// ==================== INCIDENTS ====================

pub async fn intake(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    body: web::Json<DetectionInput>,
) -> ApiResult {
    let incident = lifecycle.intake(&principal, body.into_inner())?;
    Ok(HttpResponse::Created().json(incident))
}

pub async fn risk_queue(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    query: web::Query<QueueQuery>,
) -> ApiResult {
    let incidents = lifecycle.risk_queue(&principal, query.include_escalated)?;
    Ok(HttpResponse::Ok().json(incidents))
}

pub async fn escalate(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    path: web::Path<String>,
) -> ApiResult {
    let escalation = lifecycle.escalate(&principal, &path)?;
    Ok(HttpResponse::Created().json(escalation))
}

pub async fn open_case(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    path: web::Path<String>,
) -> ApiResult {
    let case = lifecycle.open_case(&principal, &path)?;
    Ok(HttpResponse::Created().json(case))
}

// ==================== CASES & SESSIONS ====================

pub async fn list_cases(lifecycle: web::Data<Lifecycle>, Authenticated(principal): Authenticated) -> ApiResult {
    Ok(HttpResponse::Ok().json(lifecycle.list_cases(&principal)?))
}

pub async fn close_case(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    path: web::Path<String>,
) -> ApiResult {
    Ok(HttpResponse::Ok().json(lifecycle.close_case(&principal, &path)?))
}

pub async fn list_sessions(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    path: web::Path<String>,
) -> ApiResult {
    Ok(HttpResponse::Ok().json(lifecycle.list_sessions(&principal, &path)?))
}

pub async fn create_session(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    path: web::Path<String>,
    body: web::Json<SessionDraft>,
) -> ApiResult {
    let session = lifecycle.create_session(&principal, &path, body.into_inner())?;
    Ok(HttpResponse::Created().json(session))
}

pub async fn update_session(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    path: web::Path<String>,
    body: web::Json<SessionDraft>,
) -> ApiResult {
    Ok(HttpResponse::Ok().json(lifecycle.update_session(&principal, &path, body.into_inner())?))
}

pub async fn delete_session(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    path: web::Path<String>,
) -> ApiResult {
    lifecycle.delete_session(&principal, &path)?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn complete_session(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    path: web::Path<String>,
) -> ApiResult {
    Ok(HttpResponse::Ok().json(lifecycle.mark_completed(&principal, &path)?))
}

pub async fn payment_reminder(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    path: web::Path<String>,
) -> ApiResult {
    let alert = lifecycle.send_payment_reminder(&principal, &path)?;
    Ok(HttpResponse::Created().json(alert))
}

pub async fn save_progress(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    path: web::Path<String>,
    body: web::Json<ProgressInput>,
) -> ApiResult {
    let saved = lifecycle.save_progress(&principal, &path, body.into_inner())?;
    if saved.created {
        Ok(HttpResponse::Created().json(saved.progress))
    } else {
        Ok(HttpResponse::Ok().json(saved.progress))
    }
}

// ==================== PAYMENTS ====================

pub async fn checkout(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    body: web::Json<PaymentRef>,
) -> ApiResult {
    Ok(HttpResponse::Ok().json(lifecycle.request_checkout(&principal, body.into_inner())?))
}

/// Processor notification. Authenticated by the body signature, not a bearer token.
pub async fn payment_webhook(
    lifecycle: web::Data<Lifecycle>,
    signer: web::Data<WebhookSigner>,
    req: HttpRequest,
    body: web::Bytes,
) -> ApiResult {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| HavenError::Unauthorized("missing webhook signature".to_string()))?;

    let event = signer.open(&body, signature)?;
    tracing::info!("Webhook received for {} {}", event.reference.ledger(), event.reference.id());

    let settlement = lifecycle.settle(event)?;
    Ok(HttpResponse::Ok().json(settlement))
}

pub async fn payment_status(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(_principal): Authenticated,
    path: web::Path<String>,
) -> ApiResult {
    let paid = lifecycle.is_paid(&path)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"incident_id": path.as_str(), "paid": paid})))
}

pub async fn session_payment_status(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(_principal): Authenticated,
    path: web::Path<String>,
) -> ApiResult {
    let paid = lifecycle.is_session_paid(&path)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"session_id": path.as_str(), "paid": paid})))
}

// ==================== INBOXES ====================

pub async fn guardian_alerts(lifecycle: web::Data<Lifecycle>, Authenticated(principal): Authenticated) -> ApiResult {
    Ok(HttpResponse::Ok().json(lifecycle.guardian_alerts(&principal)?))
}

pub async fn read_guardian_alert(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    path: web::Path<String>,
) -> ApiResult {
    Ok(HttpResponse::Ok().json(lifecycle.mark_guardian_alert_read(&principal, &path)?))
}

pub async fn reviewer_alerts(lifecycle: web::Data<Lifecycle>, Authenticated(principal): Authenticated) -> ApiResult {
    Ok(HttpResponse::Ok().json(lifecycle.reviewer_alerts(&principal)?))
}

pub async fn read_reviewer_alert(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    path: web::Path<String>,
) -> ApiResult {
    Ok(HttpResponse::Ok().json(lifecycle.mark_reviewer_alert_read(&principal, &path)?))
}

// ==================== GROUP SESSIONS ====================

pub async fn list_group_sessions(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
) -> ApiResult {
    Ok(HttpResponse::Ok().json(lifecycle.list_group_sessions(&principal)?))
}

pub async fn create_group_session(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    body: web::Json<GroupSessionDraft>,
) -> ApiResult {
    let session = lifecycle.create_group_session(&principal, body.into_inner())?;
    Ok(HttpResponse::Created().json(session))
}

pub async fn update_group_session(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    path: web::Path<String>,
    body: web::Json<GroupSessionDraft>,
) -> ApiResult {
    Ok(HttpResponse::Ok().json(lifecycle.update_group_session(&principal, &path, body.into_inner())?))
}

pub async fn delete_group_session(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    path: web::Path<String>,
) -> ApiResult {
    lifecycle.delete_group_session(&principal, &path)?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn complete_group_session(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    path: web::Path<String>,
) -> ApiResult {
    Ok(HttpResponse::Ok().json(lifecycle.complete_group_session(&principal, &path)?))
}

pub async fn record_attendance(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    path: web::Path<String>,
    body: web::Json<AttendanceRequest>,
) -> ApiResult {
    let recorded = lifecycle.record_attendance(&principal, &path, &body.subject_id)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"recorded": recorded})))
}

// ==================== ADMIN ====================

/// Mint a token for any role. Gated by the bootstrap key instead of a bearer token.
pub async fn admin_issue_token(
    bootstrap: web::Data<AdminBootstrap>,
    tokens: web::Data<TokenIssuer>,
    body: web::Json<IssueTokenRequest>,
) -> ApiResult {
    if !bootstrap.verify(&body.bootstrap_key) {
        return Err(HavenError::Unauthorized("invalid bootstrap key".to_string()).into());
    }
    if body.subject_id.trim().is_empty() {
        return Err(HavenError::validation("subject_id is required").into());
    }

    let principal = Principal::new(body.subject_id.trim(), body.role);
    let token = tokens.issue(&principal)?;
    tracing::info!("Issued {} token for {}", principal.role, principal.id);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "token": token,
        "subject_id": principal.id,
        "role": principal.role,
        "expires_in": tokens.ttl_secs(),
    })))
}

pub async fn admin_link_guardian(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    body: web::Json<GuardianLinkInput>,
) -> ApiResult {
    let link = lifecycle.link_guardian(&principal, body.into_inner())?;
    Ok(HttpResponse::Created().json(link))
}

pub async fn admin_overview(lifecycle: web::Data<Lifecycle>, Authenticated(principal): Authenticated) -> ApiResult {
    Ok(HttpResponse::Ok().json(lifecycle.overview(&principal)?))
}

pub async fn admin_audit(
    lifecycle: web::Data<Lifecycle>,
    Authenticated(principal): Authenticated,
    query: web::Query<AuditQuery>,
) -> ApiResult {
    let logs = lifecycle.audit_log(&principal, query.event_type.as_deref(), query.limit.unwrap_or(100))?;
    Ok(HttpResponse::Ok().json(logs))
}
