use crate::admin;
use crate::db::{self, IssuanceRecord};
use crate::errors::ApiError;
use crate::models::*;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use rand::rngs::OsRng;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;
use zkp_visa_core::commitment::{is_valid_commitment, to_hex};
use zkp_visa_core::credential::{CredentialPackage, ZkpCredential};
use zkp_visa_core::documents::DocumentVerifier;
use zkp_visa_core::payment::{format_card_number, order_summary};
use zkp_visa_core::types::{parse_address, DocumentFile, PaymentData, UserData, VerificationStatus, VerifierForm};
use zkp_visa_core::wizard::WizardSession;

pub fn router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/api/v1/registry", get(registry_info))
        .route("/api/v1/verifiers", get(list_verifiers).post(add_verifier))
        .route("/api/v1/verifiers/:address", delete(revoke_verifier))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/payment", get(payment_info))
        .route("/api/v1/sessions", post(create_session))
        .route("/api/v1/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/v1/sessions/:id/start", post(start))
        .route("/api/v1/sessions/:id/info", post(submit_info))
        .route("/api/v1/sessions/:id/documents/sample", post(sample_documents))
        .route("/api/v1/sessions/:id/documents/verify", post(verify_documents))
        .route("/api/v1/sessions/:id/documents/continue", post(continue_to_payment))
        .route("/api/v1/sessions/:id/documents/:slot", put(upload_document))
        .route("/api/v1/sessions/:id/payment", post(pay))
        .route("/api/v1/sessions/:id/back", post(back))
        .route("/api/v1/sessions/:id/restart", post(restart))
        .route("/api/v1/sessions/:id/credential", get(get_credential))
        .route("/api/v1/sessions/:id/credential/files/:name", get(download_credential_file))
        .route("/api/v1/issuances/:commitment", get(get_issuance))
        .merge(admin_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(provided_key) = headers.get("X-API-KEY") {
        if provided_key.as_bytes() == state.api_key.as_bytes() {
            return Ok(next.run(request).await);
        }
    }

    tracing::warn!("unauthorized access attempt");
    Err(ApiError::Unauthorized)
}

async fn payment_info() -> Json<PaymentInfoResponse> {
    Json(PaymentInfoResponse {
        order_summary: order_summary(),
        sample_card: PaymentData::sample(),
    })
}

async fn create_session(State(state): State<AppState>) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let (id, session) = state.sessions.create().await?;
    tracing::info!(session = %id, "session created");
    Ok((StatusCode::CREATED, Json(SessionView::new(id, &session))))
}

async fn get_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<SessionView>, ApiError> {
    let session = state.sessions.get(id).await?;
    Ok(Json(SessionView::new(id, &session)))
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    state.sessions.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn start(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<SessionView>, ApiError> {
    let (screen, session) = state.sessions.update(id, |s| Ok(s.start()?)).await?;
    tracing::info!(session = %id, %screen, "wizard started");
    Ok(Json(SessionView::new(id, &session)))
}

async fn submit_info(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(user): Json<UserData>,
) -> Result<Json<SessionView>, ApiError> {
    let (screen, session) = state.sessions.update(id, |s| Ok(s.submit_info(user)?)).await?;
    tracing::info!(session = %id, %screen, "personal information accepted");
    Ok(Json(SessionView::new(id, &session)))
}

async fn upload_document(
    State(state): State<AppState>,
    Path((id, slot)): Path<(Uuid, String)>,
    Json(upload): Json<DocumentUpload>,
) -> Result<Json<SessionView>, ApiError> {
    let file = DocumentFile {
        id: slot,
        name: upload.name,
        media_type: upload.media_type,
        size: upload.size,
        uploaded: true,
    };
    let (_, session) = state.sessions.update(id, |s| Ok(s.upload_document(file)?)).await?;
    Ok(Json(SessionView::new(id, &session)))
}

async fn sample_documents(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<SessionView>, ApiError> {
    let (_, session) = state
        .sessions
        .update(id, |s| Ok(s.one_tap_upload(&mut OsRng)?))
        .await?;
    tracing::info!(session = %id, "sample documents uploaded");
    Ok(Json(SessionView::new(id, &session)))
}

/// Run the simulated verification timer, then record a pass or fail. A back or restart issued
/// during the timer makes this call fail with a conflict.
async fn verify_documents(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<SessionView>, ApiError> {
    let (step, _) = state.sessions.update(id, |s| Ok(s.begin_verification()?)).await?;

    tokio::time::sleep(state.simulation.verification_delay).await;
    let outcome = DocumentVerifier::new(state.simulation.verification_success_rate).verify(&mut OsRng);

    let (status, session) = state
        .sessions
        .update(id, |s| Ok(s.finish_verification(step, outcome == VerificationStatus::Success)?))
        .await?;
    tracing::info!(session = %id, ?status, "document verification finished");
    Ok(Json(SessionView::new(id, &session)))
}

async fn continue_to_payment(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<SessionView>, ApiError> {
    let (screen, session) = state.sessions.update(id, |s| Ok(s.proceed_to_payment()?)).await?;
    tracing::info!(session = %id, %screen, "documents accepted");
    Ok(Json(SessionView::new(id, &session)))
}

/// Simulated payment followed by issuance. A failed issuance leaves the session on the payment
/// screen in a retryable failed state.
async fn pay(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut payment): Json<PaymentData>,
) -> Result<Json<SessionView>, ApiError> {
    payment.card_number = format_card_number(&payment.card_number);
    let (step, _) = state.sessions.update(id, |s| Ok(s.begin_payment(payment)?)).await?;
    tracing::info!(session = %id, "payment processing");

    tokio::time::sleep(state.simulation.payment_delay).await;
    let (ticket, _) = state.sessions.update(id, |s| Ok(s.confirm_payment(step)?)).await?;
    tracing::info!(session = %id, "payment confirmed");

    tokio::time::sleep(state.simulation.backend_call_delay).await;
    let issued = async {
        let credential = state.issuer.issue(&ticket, Utc::now()).await?;
        db::insert_issuance(
            &state.db,
            &IssuanceRecord {
                commitment: credential.commitment.clone(),
                session_id: id,
                issuer_mode: state.issuer.mode().as_str().to_string(),
                request_id: credential.request_id.clone(),
                tx_hash: credential.tx_hash.clone(),
                issued_at: credential.issued_at,
                expires_at: credential.expires_at,
            },
        )
        .await?;
        Ok::<_, ApiError>(credential)
    }
    .await;

    match issued {
        Ok(credential) => {
            let commitment = credential.commitment.clone();
            let (_, session) = state.sessions.update(id, |s| Ok(s.complete(step, credential)?)).await?;
            tracing::info!(session = %id, %commitment, mode = state.issuer.mode().as_str(), "credential issued");
            Ok(Json(SessionView::new(id, &session)))
        }
        Err(e) => {
            let message = e.message();
            tracing::error!(session = %id, error = %message, "credential issuance failed");
            // A session that moved on since this payment started keeps its newer state.
            let _ = state.sessions.update(id, |s| Ok(s.fail_payment(step, message)?)).await;
            Err(e)
        }
    }
}

async fn back(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<SessionView>, ApiError> {
    let (screen, session) = state.sessions.update(id, |s| Ok(s.back()?)).await?;
    tracing::info!(session = %id, %screen, "navigated back");
    Ok(Json(SessionView::new(id, &session)))
}

async fn restart(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<SessionView>, ApiError> {
    let (_, session) = state
        .sessions
        .update(id, |s| {
            s.restart();
            Ok(())
        })
        .await?;
    tracing::info!(session = %id, "session restarted");
    Ok(Json(SessionView::new(id, &session)))
}

fn package_for(session: &WizardSession) -> Result<(ZkpCredential, CredentialPackage), ApiError> {
    let credential = session
        .credential()
        .cloned()
        .ok_or_else(|| ApiError::NotFound("no credential has been issued for this session".to_string()))?;
    let package = CredentialPackage::build(&credential, Utc::now()).map_err(|_| ApiError::Internal)?;
    Ok((credential, package))
}

async fn get_credential(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<CredentialView>, ApiError> {
    let session = state.sessions.get(id).await?;
    let (credential, package) = package_for(&session)?;
    Ok(Json(CredentialView::new(id, &credential, &package)))
}

async fn download_credential_file(
    State(state): State<AppState>,
    Path((id, name)): Path<(Uuid, String)>,
) -> Result<Response, ApiError> {
    let session = state.sessions.get(id).await?;
    let (_, package) = package_for(&session)?;
    let file = package
        .file(&name)
        .ok_or_else(|| ApiError::NotFound(format!("no file named {name} in the credential package")))?;

    Response::builder()
        .header(header::CONTENT_TYPE, file.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file.name),
        )
        .header("X-Package-Path", package.path_of(file))
        .body(Body::from(file.bytes.clone()))
        .map_err(|_| ApiError::Internal)
}

async fn get_issuance(
    State(state): State<AppState>,
    Path(commitment): Path<String>,
) -> Result<Json<IssuanceView>, ApiError> {
    let commitment = commitment.to_ascii_lowercase();
    if !is_valid_commitment(&commitment) {
        return Err(ApiError::BadRequest("commitment must be 0x followed by 64 hex digits".to_string()));
    }

    let record = db::get_issuance(&state.db, &commitment)
        .await?
        .ok_or_else(|| ApiError::NotFound("issuance not found".to_string()))?;
    Ok(Json(IssuanceView::new(record, Utc::now())))
}

async fn registry_info(State(state): State<AppState>) -> Result<Json<RegistryInfoResponse>, ApiError> {
    let registry = state.registry.as_ref();
    let owner = registry.owner().await?;
    let signer = registry.signer_address();

    Ok(Json(RegistryInfoResponse {
        owner: owner.to_checksum(None),
        signer: signer.to_checksum(None),
        is_owner: admin::is_owner(registry).await?,
        verifier_count: registry.get_verifier_count().await?,
        merkle_root: to_hex(&registry.current_merkle_root().await?),
        issuer_mode: state.issuer.mode(),
        ledger_issuances: db::count_issuances(&state.db).await?,
    }))
}

async fn list_verifiers(State(state): State<AppState>) -> Result<Json<VerifierListResponse>, ApiError> {
    let verifiers = admin::list_verifiers(state.registry.as_ref()).await?;
    Ok(Json(VerifierListResponse { count: verifiers.len(), verifiers }))
}

async fn add_verifier(
    State(state): State<AppState>,
    Json(form): Json<VerifierForm>,
) -> Result<(StatusCode, Json<VerifierMutationResponse>), ApiError> {
    let (tx_hash, verifiers) = admin::add_verifier(state.registry.as_ref(), &form).await?;
    Ok((StatusCode::CREATED, Json(VerifierMutationResponse { tx_hash, verifiers })))
}

async fn revoke_verifier(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<VerifierMutationResponse>, ApiError> {
    let address = parse_address(&address)
        .ok_or_else(|| ApiError::BadRequest("Please enter a valid Ethereum address (0x...)".to_string()))?;
    let (tx_hash, verifiers) = admin::revoke_verifier(state.registry.as_ref(), address).await?;
    Ok(Json(VerifierMutationResponse { tx_hash, verifiers }))
}
