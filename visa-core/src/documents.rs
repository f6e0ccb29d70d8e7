//! Document slots and the mock verifier.

use crate::constants::{
    document_slot, REQUIRED_DOCUMENTS, SAMPLE_FILE_SIZE_MAX, SAMPLE_FILE_SIZE_MIN,
};
use crate::types::{DocumentFile, VerificationStatus};
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("unknown document slot: {0}")]
    UnknownSlot(String),

    #[error("file name must not be empty")]
    EmptyName,
}

/// Uploaded files, at most one per required slot, in upload order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSet {
    files: Vec<DocumentFile>,
}

impl DocumentSet {
    /// Put `file` into its slot, replacing whatever was there.
    pub fn upload(&mut self, mut file: DocumentFile) -> Result<(), DocumentError> {
        if document_slot(&file.id).is_none() {
            return Err(DocumentError::UnknownSlot(file.id));
        }
        if file.name.trim().is_empty() {
            return Err(DocumentError::EmptyName);
        }
        file.uploaded = true;
        self.files.retain(|d| d.id != file.id);
        self.files.push(file);
        Ok(())
    }

    /// Replace the whole set with mock PDFs for every required slot.
    pub fn fill_with_samples(&mut self, rng: &mut impl Rng) {
        self.files = REQUIRED_DOCUMENTS
            .iter()
            .map(|slot| DocumentFile {
                id: slot.id.to_string(),
                name: slot.sample_file_name.to_string(),
                media_type: "application/pdf".to_string(),
                size: rng.gen_range(SAMPLE_FILE_SIZE_MIN..SAMPLE_FILE_SIZE_MAX),
                uploaded: true,
            })
            .collect();
    }

    pub fn get(&self, slot_id: &str) -> Option<&DocumentFile> {
        self.files.iter().find(|d| d.id == slot_id)
    }

    pub fn files(&self) -> &[DocumentFile] {
        &self.files
    }

    pub fn all_uploaded(&self) -> bool {
        REQUIRED_DOCUMENTS.iter().all(|slot| self.get(slot.id).is_some())
    }

    pub fn missing_slots(&self) -> Vec<&'static str> {
        REQUIRED_DOCUMENTS
            .iter()
            .filter(|slot| self.get(slot.id).is_none())
            .map(|slot| slot.id)
            .collect()
    }
}

/// Simulated verifier: passes with a fixed probability. Nothing is inspected.
#[derive(Debug, Clone, Copy)]
pub struct DocumentVerifier {
    success_rate: f64,
}

impl DocumentVerifier {
    /// `success_rate` is clamped to `[0, 1]`.
    pub fn new(success_rate: f64) -> Self {
        let success_rate = if success_rate.is_nan() { 0.0 } else { success_rate.clamp(0.0, 1.0) };
        Self { success_rate }
    }

    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }

    pub fn verify(&self, rng: &mut impl Rng) -> VerificationStatus {
        if rng.gen_bool(self.success_rate) {
            VerificationStatus::Success
        } else {
            VerificationStatus::Failed
        }
    }
}

impl Default for DocumentVerifier {
    fn default() -> Self {
        Self::new(crate::constants::VERIFICATION_SUCCESS_RATE)
    }
}
