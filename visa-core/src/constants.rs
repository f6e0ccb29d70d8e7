//! Crate-wide constants shared by the wizard and the backend.

/// Default base URL of the external issuance API.
pub const DEFAULT_ISSUANCE_BASE_URL: &str = "https://zkp-backend.onrender.com";

/// Step A: create an issuance request and obtain a QR payload.
pub const CREATE_ISSUANCE_REQUEST_PATH: &str = "/apis/creation/issue";

/// Step B: fetch the full credential for a request id.
pub fn credential_path(request_id: &str) -> String {
    format!("/apis/creation/credential/{request_id}")
}

/// Number of wizard screens (home, fill info, upload documents, payment, complete).
pub const TOTAL_STEPS: u8 = 5;

/// A document slot the applicant has to fill before verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentSlot {
    pub id: &'static str,
    pub name: &'static str,
    /// Accepted media types, in `<input accept>` syntax.
    pub accept: &'static str,
    /// File name used by one-tap upload.
    pub sample_file_name: &'static str,
}

pub const REQUIRED_DOCUMENTS: [DocumentSlot; 2] = [
    DocumentSlot {
        id: "id",
        name: "Government ID",
        accept: "image/*,.pdf",
        sample_file_name: "government_id.pdf",
    },
    DocumentSlot {
        id: "selfie",
        name: "Selfie Photo",
        accept: "image/*",
        sample_file_name: "selfie_photo.pdf",
    },
];

pub fn document_slot(id: &str) -> Option<&'static DocumentSlot> {
    REQUIRED_DOCUMENTS.iter().find(|slot| slot.id == id)
}

/// Probability that simulated document verification passes.
pub const VERIFICATION_SUCCESS_RATE: f64 = 0.8;
pub const VERIFICATION_DELAY_MS: u64 = 2000;

pub const PAYMENT_DELAY_MS: u64 = 2000;
pub const BACKEND_CALL_DELAY_MS: u64 = 1000;

/// Size range (bytes, half-open) of mock files produced by one-tap upload: a uniform draw
/// below one million, offset by 50 000.
pub const SAMPLE_FILE_SIZE_MIN: u64 = 50_000;
pub const SAMPLE_FILE_SIZE_MAX: u64 = 1_050_000;

// Order summary shown on the payment screen.
pub const CREDENTIAL_PRICE_AED: u32 = 1_900;
pub const PROCESSING_FEE_AED: u32 = 100;
pub const TOTAL_PRICE_AED: u32 = CREDENTIAL_PRICE_AED + PROCESSING_FEE_AED;

/// Suffix mixed into the deterministic commitment salt.
pub const SALT_DOMAIN_SUFFIX: &str = "zkp_visa_salt";

// Credential package file names.
pub const METADATA_FILE: &str = "credential_metadata.json";
pub const COMMITMENT_FILE: &str = "commitment.txt";
pub const WASM_FILE: &str = "passport_member.wasm";
pub const ZKEY_FILE: &str = "passport_member.zkey";

/// Length of the pseudo-random body appended to mock circuit artifacts.
pub const MOCK_WASM_BODY_LEN: usize = 1024;
pub const MOCK_ZKEY_BODY_LEN: usize = 2048;
