//! Five-screen issuance wizard.
//!
//! ```text
//! home -> fillInfo -> uploadDocuments -> payment -> complete
//! ```
//!
//! Every forward transition checks the data the current screen is responsible for. Timed work
//! (document verification, payment) is split into a `begin_*` and a finishing call so the caller
//! can run the timer without holding the session. `begin_*` hands out a [`StepToken`]; the
//! finishing calls only accept the token of the step that is still current, so a step resumed
//! after a back, a restart or a newer step of the same kind is rejected.

use crate::credential::ZkpCredential;
use crate::documents::{DocumentError, DocumentSet};
use crate::types::{DocumentFile, PaymentData, PaymentStatus, UserData, ValidationError, VerificationStatus};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Screen {
    #[default]
    Home,
    FillInfo,
    UploadDocuments,
    Payment,
    Complete,
}

impl Screen {
    /// 1-based progress step.
    pub fn step(self) -> u8 {
        match self {
            Screen::Home => 1,
            Screen::FillInfo => 2,
            Screen::UploadDocuments => 3,
            Screen::Payment => 4,
            Screen::Complete => 5,
        }
    }

    fn previous(self) -> Option<Screen> {
        match self {
            Screen::FillInfo => Some(Screen::Home),
            Screen::UploadDocuments => Some(Screen::FillInfo),
            Screen::Payment => Some(Screen::UploadDocuments),
            Screen::Home | Screen::Complete => None,
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Screen::Home => "home",
            Screen::FillInfo => "fillInfo",
            Screen::UploadDocuments => "uploadDocuments",
            Screen::Payment => "payment",
            Screen::Complete => "complete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error("cannot {action} on the {screen} screen")]
    WrongScreen { action: &'static str, screen: Screen },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("missing documents: {}", .0.join(", "))]
    DocumentsMissing(Vec<&'static str>),

    #[error("documents have not been verified")]
    DocumentsNotVerified,

    #[error("document verification is already running")]
    VerificationInProgress,

    #[error("no document verification is running")]
    NoVerificationRunning,

    #[error("payment is being processed")]
    PaymentInProgress,

    #[error("payment has not been confirmed")]
    PaymentNotConfirmed,

    #[error("the session changed while this step was running")]
    StaleStep,
}

/// Identifies one run of a timed step. Only the token of the latest step is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepToken(u64);

/// Everything the issuer needs once payment is confirmed.
#[derive(Debug, Clone)]
pub struct IssuanceTicket {
    pub user: UserData,
    pub documents_verified: bool,
    pub payment_confirmed: bool,
}

/// In-memory state of one applicant going through the wizard.
#[derive(Debug, Clone, Default)]
pub struct WizardSession {
    screen: Screen,
    user: Option<UserData>,
    documents: DocumentSet,
    verification: VerificationStatus,
    payment: Option<PaymentData>,
    payment_status: PaymentStatus,
    payment_error: Option<String>,
    credential: Option<ZkpCredential>,
    /// Bumped by every begin_*, back and restart. Survives restart.
    epoch: u64,
}

impl WizardSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn user(&self) -> Option<&UserData> {
        self.user.as_ref()
    }

    pub fn documents(&self) -> &DocumentSet {
        &self.documents
    }

    pub fn verification(&self) -> VerificationStatus {
        self.verification
    }

    pub fn payment(&self) -> Option<&PaymentData> {
        self.payment.as_ref()
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_error(&self) -> Option<&str> {
        self.payment_error.as_deref()
    }

    pub fn credential(&self) -> Option<&ZkpCredential> {
        self.credential.as_ref()
    }

    fn expect_screen(&self, screen: Screen, action: &'static str) -> Result<(), WizardError> {
        if self.screen != screen {
            return Err(WizardError::WrongScreen { action, screen: self.screen });
        }
        Ok(())
    }

    fn next_step(&mut self) -> StepToken {
        self.epoch += 1;
        StepToken(self.epoch)
    }

    fn expect_step(&self, step: StepToken) -> Result<(), WizardError> {
        if step.0 != self.epoch {
            return Err(WizardError::StaleStep);
        }
        Ok(())
    }

    pub fn start(&mut self) -> Result<Screen, WizardError> {
        self.expect_screen(Screen::Home, "start")?;
        self.screen = Screen::FillInfo;
        Ok(self.screen)
    }

    pub fn submit_info(&mut self, user: UserData) -> Result<Screen, WizardError> {
        self.expect_screen(Screen::FillInfo, "submit personal information")?;
        user.validate()?;
        self.user = Some(user);
        self.screen = Screen::UploadDocuments;
        Ok(self.screen)
    }

    /// Any change to the documents invalidates a previous verification result.
    pub fn upload_document(&mut self, file: DocumentFile) -> Result<(), WizardError> {
        self.expect_screen(Screen::UploadDocuments, "upload documents")?;
        self.documents.upload(file)?;
        self.verification = VerificationStatus::Pending;
        Ok(())
    }

    pub fn one_tap_upload(&mut self, rng: &mut impl Rng) -> Result<(), WizardError> {
        self.expect_screen(Screen::UploadDocuments, "upload documents")?;
        self.documents.fill_with_samples(rng);
        self.verification = VerificationStatus::Pending;
        Ok(())
    }

    pub fn begin_verification(&mut self) -> Result<StepToken, WizardError> {
        self.expect_screen(Screen::UploadDocuments, "verify documents")?;
        if !self.documents.all_uploaded() {
            return Err(WizardError::DocumentsMissing(self.documents.missing_slots()));
        }
        if self.verification == VerificationStatus::Verifying {
            return Err(WizardError::VerificationInProgress);
        }
        self.verification = VerificationStatus::Verifying;
        Ok(self.next_step())
    }

    pub fn finish_verification(&mut self, step: StepToken, passed: bool) -> Result<VerificationStatus, WizardError> {
        self.expect_step(step)?;
        self.expect_screen(Screen::UploadDocuments, "finish verification")?;
        if self.verification != VerificationStatus::Verifying {
            return Err(WizardError::NoVerificationRunning);
        }
        self.verification = if passed {
            VerificationStatus::Success
        } else {
            VerificationStatus::Failed
        };
        Ok(self.verification)
    }

    pub fn proceed_to_payment(&mut self) -> Result<Screen, WizardError> {
        self.expect_screen(Screen::UploadDocuments, "continue to payment")?;
        if !self.documents.all_uploaded() {
            return Err(WizardError::DocumentsMissing(self.documents.missing_slots()));
        }
        if self.verification != VerificationStatus::Success {
            return Err(WizardError::DocumentsNotVerified);
        }
        self.screen = Screen::Payment;
        Ok(self.screen)
    }

    /// Validate the card form and mark the payment as processing.
    pub fn begin_payment(&mut self, payment: PaymentData) -> Result<StepToken, WizardError> {
        self.expect_screen(Screen::Payment, "pay")?;
        if matches!(self.payment_status, PaymentStatus::Processing | PaymentStatus::Confirmed) {
            return Err(WizardError::PaymentInProgress);
        }
        payment.validate()?;
        self.payment = Some(payment);
        self.payment_status = PaymentStatus::Processing;
        self.payment_error = None;
        Ok(self.next_step())
    }

    pub fn confirm_payment(&mut self, step: StepToken) -> Result<IssuanceTicket, WizardError> {
        self.expect_step(step)?;
        self.expect_screen(Screen::Payment, "confirm payment")?;
        if self.payment_status != PaymentStatus::Processing {
            return Err(WizardError::PaymentNotConfirmed);
        }
        // Unreachable in practice: submit_info is the only way past fillInfo.
        let user = self.user.clone().ok_or(ValidationError::Required("userData"))?;
        self.payment_status = PaymentStatus::Confirmed;
        Ok(IssuanceTicket {
            user,
            documents_verified: self.verification == VerificationStatus::Success,
            payment_confirmed: true,
        })
    }

    pub fn fail_payment(&mut self, step: StepToken, message: impl Into<String>) -> Result<(), WizardError> {
        self.expect_step(step)?;
        self.expect_screen(Screen::Payment, "record a payment failure")?;
        self.payment_status = PaymentStatus::Failed;
        self.payment_error = Some(message.into());
        Ok(())
    }

    pub fn complete(&mut self, step: StepToken, credential: ZkpCredential) -> Result<Screen, WizardError> {
        self.expect_step(step)?;
        self.expect_screen(Screen::Payment, "complete")?;
        if self.payment_status != PaymentStatus::Confirmed {
            return Err(WizardError::PaymentNotConfirmed);
        }
        self.credential = Some(credential);
        self.screen = Screen::Complete;
        Ok(self.screen)
    }

    /// Step back one screen. A no-op on home and complete.
    pub fn back(&mut self) -> Result<Screen, WizardError> {
        if self.screen == Screen::Payment
            && matches!(self.payment_status, PaymentStatus::Processing | PaymentStatus::Confirmed)
        {
            return Err(WizardError::PaymentInProgress);
        }
        let Some(previous) = self.screen.previous() else {
            return Ok(self.screen);
        };
        if self.screen == Screen::UploadDocuments && self.verification == VerificationStatus::Verifying {
            self.verification = VerificationStatus::Pending;
        }
        self.next_step();
        self.screen = previous;
        Ok(self.screen)
    }

    /// Drop every piece of collected data and return to home.
    pub fn restart(&mut self) {
        let epoch = self.epoch + 1;
        *self = Self { epoch, ..Self::default() };
    }
}
