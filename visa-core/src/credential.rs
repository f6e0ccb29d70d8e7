//! Credential bundle and its downloadable package.
//!
//! The circuit artifacts (`.wasm`, `.zkey`) are mocks: byte strings with the right magic
//! header followed by a ChaCha20 stream seeded from the commitment. No proof system is involved.

use crate::commitment::{merkle_leaf, UserCommitment};
use crate::constants::{
    COMMITMENT_FILE, METADATA_FILE, MOCK_WASM_BODY_LEN, MOCK_ZKEY_BODY_LEN, WASM_FILE, ZKEY_FILE,
};
use crate::types::UserData;
use alloy_primitives::keccak256;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

/// What the issuing path reported back, if anything.
#[derive(Debug, Clone, Default)]
pub struct IssuanceReceipt {
    pub tx_hash: Option<String>,
    pub request_id: Option<String>,
    pub qr_payload: Option<String>,
    /// Full verifiable credential returned by the external issuance API.
    pub vc: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkpCredential {
    /// Token hash submitted on chain.
    pub commitment: String,
    pub salt: String,
    pub passport_number: String,
    pub nickname: String,
    pub duration_minutes: u32,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub tx_hash: Option<String>,
    pub request_id: Option<String>,
    pub qr_payload: String,
    pub vc: Option<serde_json::Value>,
    #[serde(skip)]
    pub wasm: Vec<u8>,
    #[serde(skip)]
    pub zkey: Vec<u8>,
}

impl ZkpCredential {
    pub fn build(
        user: &UserData,
        commitment: UserCommitment,
        receipt: IssuanceReceipt,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let expires_at = issued_at + Duration::minutes(i64::from(user.duration_minutes));
        let qr_payload = receipt
            .qr_payload
            .unwrap_or_else(|| default_qr_payload(&commitment.commitment, expires_at));

        Self {
            wasm: mock_wasm(&commitment.commitment),
            zkey: mock_zkey(&commitment.commitment),
            commitment: commitment.commitment,
            salt: commitment.salt,
            passport_number: user.passport_number.clone(),
            nickname: user.nickname.clone(),
            duration_minutes: user.duration_minutes,
            issued_at,
            expires_at,
            tx_hash: receipt.tx_hash,
            request_id: receipt.request_id,
            qr_payload,
            vc: receipt.vc,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// QR payload used when the issuing path does not supply one.
pub fn default_qr_payload(commitment: &str, expires_at: DateTime<Utc>) -> String {
    serde_json::json!({
        "type": "zkp-visa",
        "commitment": commitment,
        "expiresAt": expires_at.timestamp(),
    })
    .to_string()
}

fn artifact_stream(domain: &str, commitment: &str, len: usize) -> Vec<u8> {
    let seed = keccak256(format!("{domain}:{commitment}").as_bytes());
    let mut rng = ChaCha20Rng::from_seed(seed.0);
    let mut body = vec![0u8; len];
    rng.fill_bytes(&mut body);
    body
}

/// Mock circuit WebAssembly module: `\0asm`, version 1, pseudo-random body.
pub fn mock_wasm(commitment: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + MOCK_WASM_BODY_LEN);
    out.extend_from_slice(b"\0asm");
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend(artifact_stream("wasm", commitment, MOCK_WASM_BODY_LEN));
    out
}

/// Mock proving key: `zkey`, version 1, pseudo-random body.
pub fn mock_zkey(commitment: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + MOCK_ZKEY_BODY_LEN);
    out.extend_from_slice(b"zkey");
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend(artifact_stream("zkey", commitment, MOCK_ZKEY_BODY_LEN));
    out
}

/// Contents of `credential_metadata.json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialMetadata<'a> {
    commitment: &'a str,
    merkle_leaf: &'a str,
    salt: &'a str,
    passport_number: &'a str,
    nickname: &'a str,
    duration_minutes: u32,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    tx_hash: Option<&'a str>,
    request_id: Option<&'a str>,
    qr_code: &'a str,
}

#[derive(Debug, Clone)]
pub struct CredentialFile {
    pub name: &'static str,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// The four files a holder downloads after issuance.
#[derive(Debug, Clone)]
pub struct CredentialPackage {
    pub folder: String,
    pub files: Vec<CredentialFile>,
}

impl CredentialPackage {
    pub fn build(credential: &ZkpCredential, now: DateTime<Utc>) -> Result<Self, serde_json::Error> {
        let metadata = CredentialMetadata {
            commitment: &credential.commitment,
            merkle_leaf: merkle_leaf(&credential.commitment),
            salt: &credential.salt,
            passport_number: &credential.passport_number,
            nickname: &credential.nickname,
            duration_minutes: credential.duration_minutes,
            issued_at: credential.issued_at,
            expires_at: credential.expires_at,
            tx_hash: credential.tx_hash.as_deref(),
            request_id: credential.request_id.as_deref(),
            qr_code: &credential.qr_payload,
        };

        Ok(Self {
            folder: package_folder_name(&credential.passport_number, now),
            files: vec![
                CredentialFile {
                    name: METADATA_FILE,
                    content_type: "application/json",
                    bytes: serde_json::to_vec_pretty(&metadata)?,
                },
                CredentialFile {
                    name: COMMITMENT_FILE,
                    content_type: "text/plain",
                    bytes: credential.commitment.clone().into_bytes(),
                },
                CredentialFile {
                    name: WASM_FILE,
                    content_type: "application/wasm",
                    bytes: credential.wasm.clone(),
                },
                CredentialFile {
                    name: ZKEY_FILE,
                    content_type: "application/octet-stream",
                    bytes: credential.zkey.clone(),
                },
            ],
        })
    }

    pub fn file(&self, name: &str) -> Option<&CredentialFile> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Path of a file inside the package folder.
    pub fn path_of(&self, file: &CredentialFile) -> String {
        format!("{}/{}", self.folder, file.name)
    }
}

/// `zkp-visa-{passport}-{timestamp}` with `:` and `.` of the timestamp replaced by `-`.
pub fn package_folder_name(passport_number: &str, at: DateTime<Utc>) -> String {
    let ts = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("zkp-visa-{passport_number}-{ts}")
}
