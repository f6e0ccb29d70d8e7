use crate::config::IssuerMode;
use crate::db::IssuanceRecord;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zkp_visa_core::constants::TOTAL_STEPS;
use zkp_visa_core::credential::{CredentialPackage, ZkpCredential};
use zkp_visa_core::payment::OrderSummary;
use zkp_visa_core::types::{DocumentFile, PaymentData, PaymentStatus, UserData, Verifier, VerificationStatus};
use zkp_visa_core::wizard::{Screen, WizardSession};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSummary {
    pub commitment: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub tx_hash: Option<String>,
    pub request_id: Option<String>,
    pub qr_payload: String,
}

impl From<&ZkpCredential> for CredentialSummary {
    fn from(c: &ZkpCredential) -> Self {
        Self {
            commitment: c.commitment.clone(),
            issued_at: c.issued_at,
            expires_at: c.expires_at,
            tx_hash: c.tx_hash.clone(),
            request_id: c.request_id.clone(),
            qr_payload: c.qr_payload.clone(),
        }
    }
}

/// Everything the client needs to render the current screen. Payment card data is never
/// echoed back.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: Uuid,
    pub screen: Screen,
    pub step: u8,
    pub total_steps: u8,
    pub user_data: Option<UserData>,
    pub documents: Vec<DocumentFile>,
    pub missing_documents: Vec<&'static str>,
    pub verification_status: VerificationStatus,
    pub payment_status: PaymentStatus,
    pub payment_error: Option<String>,
    pub credential: Option<CredentialSummary>,
}

impl SessionView {
    pub fn new(session_id: Uuid, s: &WizardSession) -> Self {
        Self {
            session_id,
            screen: s.screen(),
            step: s.screen().step(),
            total_steps: TOTAL_STEPS,
            user_data: s.user().cloned(),
            documents: s.documents().files().to_vec(),
            missing_documents: s.documents().missing_slots(),
            verification_status: s.verification(),
            payment_status: s.payment_status(),
            payment_error: s.payment_error().map(str::to_string),
            credential: s.credential().map(CredentialSummary::from),
        }
    }
}

/// Body of `PUT /documents/:slot`. The slot comes from the path.
#[derive(Debug, Deserialize)]
pub struct DocumentUpload {
    pub name: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub size: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageFileView {
    pub name: &'static str,
    pub path: String,
    pub content_type: &'static str,
    pub size: usize,
    pub download_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialView {
    #[serde(flatten)]
    pub credential: ZkpCredential,
    pub wasm_b64: String,
    pub zkey_b64: String,
    pub folder: String,
    pub files: Vec<PackageFileView>,
}

impl CredentialView {
    pub fn new(session_id: Uuid, credential: &ZkpCredential, package: &CredentialPackage) -> Self {
        let b64 = base64::engine::general_purpose::STANDARD;
        let files = package
            .files
            .iter()
            .map(|f| PackageFileView {
                name: f.name,
                path: package.path_of(f),
                content_type: f.content_type,
                size: f.bytes.len(),
                download_url: format!("/api/v1/sessions/{session_id}/credential/files/{}", f.name),
            })
            .collect();

        Self {
            credential: credential.clone(),
            wasm_b64: b64.encode(&credential.wasm),
            zkey_b64: b64.encode(&credential.zkey),
            folder: package.folder.clone(),
            files,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfoResponse {
    pub order_summary: OrderSummary,
    /// Card used by one-tap fill.
    pub sample_card: PaymentData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceView {
    pub commitment: String,
    pub session_id: Uuid,
    pub issuer_mode: String,
    pub request_id: Option<String>,
    pub tx_hash: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub expired: bool,
}

impl IssuanceView {
    pub fn new(record: IssuanceRecord, now: DateTime<Utc>) -> Self {
        Self {
            expired: now >= record.expires_at,
            commitment: record.commitment,
            session_id: record.session_id,
            issuer_mode: record.issuer_mode,
            request_id: record.request_id,
            tx_hash: record.tx_hash,
            issued_at: record.issued_at,
            expires_at: record.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryInfoResponse {
    pub owner: String,
    pub signer: String,
    pub is_owner: bool,
    pub verifier_count: u64,
    pub merkle_root: String,
    pub issuer_mode: IssuerMode,
    pub ledger_issuances: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifierListResponse {
    pub verifiers: Vec<Verifier>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifierMutationResponse {
    pub tx_hash: String,
    /// List re-read after the transaction was mined.
    pub verifiers: Vec<Verifier>,
}
