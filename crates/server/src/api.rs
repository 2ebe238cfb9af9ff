//! Intake and verification endpoints.
//!
//! - `POST /api/submit`         — accept a submission, assign a code, enqueue
//!   the notification, return `{success, certificateNumber}`
//! - `GET  /api/verify/{code}`  — read-only lookup by certificate code

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

use medicert_core::clock::Clock;
use medicert_core::codes::CertificateCode;
use medicert_core::domain::certificate::{CertificateRecord, CertificateRequest};
use medicert_core::validation::{validate_request, DatePolicy};
use medicert_db::{CertificateIssuer, CertificateRepository};
use medicert_notify::NotifyHandle;

#[derive(Clone)]
pub struct ApiState {
    pub issuer: Arc<CertificateIssuer>,
    pub repository: Arc<dyn CertificateRepository>,
    pub notifier: NotifyHandle,
    pub clock: Arc<dyn Clock>,
    pub policy: DatePolicy,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    #[serde(rename = "certificateNumber", skip_serializing_if = "Option::is_none")]
    pub certificate_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SubmitResponse {
    fn accepted(code: &CertificateCode) -> Self {
        Self { success: true, certificate_number: Some(code.as_str().to_string()), message: None }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self { success: false, certificate_number: None, message: Some(message.into()) }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<VerifiedCertificate>,
}

/// Display subset of the record exposed to the verification interface.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedCertificate {
    pub certificate_number: String,
    pub first_name: String,
    pub last_name: String,
    pub cert_type: String,
    pub reason: String,
    pub from_date: String,
    pub to_date: String,
    pub issued_at: String,
}

impl From<&CertificateRecord> for VerifiedCertificate {
    fn from(record: &CertificateRecord) -> Self {
        Self {
            certificate_number: record.code.as_str().to_string(),
            first_name: record.request.first_name.clone(),
            last_name: record.request.last_name.clone(),
            cert_type: record.request.cert_type.clone(),
            reason: record.request.reason.clone(),
            from_date: record.request.from_date.clone(),
            to_date: record.request.to_date.clone(),
            issued_at: record.issued_at.to_rfc3339(),
        }
    }
}

pub fn router(state: ApiState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/api/submit", post(submit))
        .route("/api/verify/{code}", get(verify))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(
                    event_name = "system.cors.invalid_origin",
                    origin = %origin,
                    "ignoring unparseable allowed origin"
                );
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

pub async fn submit(
    State(state): State<ApiState>,
    Json(request): Json<CertificateRequest>,
) -> (StatusCode, Json<SubmitResponse>) {
    if let Err(validation) = validate_request(&request, state.policy, state.clock.today()) {
        info!(
            event_name = "api.submit.rejected",
            reason = %validation,
            "submission failed validation"
        );
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(SubmitResponse::rejected(validation.to_string())),
        );
    }

    match state.issuer.issue(request).await {
        Ok(record) => {
            info!(
                event_name = "api.submit.accepted",
                certificate = %record.code,
                "submission accepted and persisted"
            );
            let response = SubmitResponse::accepted(&record.code);
            state.notifier.enqueue(record);
            (StatusCode::OK, Json(response))
        }
        Err(issue_error) => {
            error!(
                event_name = "api.submit.storage_failed",
                error = %issue_error,
                "submission could not be persisted"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(SubmitResponse::rejected(
                    "certificate storage is temporarily unavailable; please retry",
                )),
            )
        }
    }
}

pub async fn verify(
    State(state): State<ApiState>,
    Path(raw_code): Path<String>,
) -> (StatusCode, Json<VerifyResponse>) {
    // Malformed codes are simply "not found"; the store is never consulted.
    let Ok(code) = CertificateCode::parse(&raw_code) else {
        return (StatusCode::NOT_FOUND, Json(VerifyResponse { valid: false, certificate: None }));
    };

    match state.repository.find_by_code(&code).await {
        Ok(Some(record)) => (
            StatusCode::OK,
            Json(VerifyResponse {
                valid: true,
                certificate: Some(VerifiedCertificate::from(&record)),
            }),
        ),
        Ok(None) => {
            (StatusCode::NOT_FOUND, Json(VerifyResponse { valid: false, certificate: None }))
        }
        Err(lookup_error) => {
            error!(
                event_name = "api.verify.lookup_failed",
                certificate = %code,
                error = %lookup_error,
                "verification lookup failed"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(VerifyResponse { valid: false, certificate: None }),
            )
        }
    }
}
