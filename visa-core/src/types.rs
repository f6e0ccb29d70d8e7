//! Data collected and produced by the wizard.

use alloy_primitives::Address;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(())
}

/// Identity form filled on the second screen.
///
/// Names, nationality and date of birth feed the external issuance API; passport number,
/// nickname and duration feed the commitment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub first_name: String,
    pub last_name: String,
    pub passport_number: String,
    /// Country code, e.g. `SGP`.
    pub nationality: String,
    /// `YYYY-MM-DD`.
    pub date_of_birth: String,
    pub nickname: String,
    /// Validity window of the visa in minutes.
    pub duration_minutes: u32,
}

impl UserData {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("firstName", &self.first_name)?;
        require("lastName", &self.last_name)?;
        require("passportNumber", &self.passport_number)?;
        require("nationality", &self.nationality)?;
        require("dateOfBirth", &self.date_of_birth)?;
        require("nickname", &self.nickname)?;

        NaiveDate::parse_from_str(self.date_of_birth.trim(), "%Y-%m-%d").map_err(|_| {
            ValidationError::Invalid {
                field: "dateOfBirth",
                reason: "expected YYYY-MM-DD".to_string(),
            }
        })?;

        if self.duration_minutes == 0 {
            return Err(ValidationError::Invalid {
                field: "durationMinutes",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

/// Card-like payment form. Never persisted and never sent to a processor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentData {
    pub card_number: String,
    pub cardholder_name: String,
    /// `MM/YY`.
    pub expiry_date: String,
    pub cvv: String,
    pub billing_address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

impl PaymentData {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("cardNumber", &self.card_number)?;
        require("cardholderName", &self.cardholder_name)?;
        require("expiryDate", &self.expiry_date)?;
        require("cvv", &self.cvv)?;
        require("billingAddress", &self.billing_address)?;
        require("city", &self.city)?;
        require("state", &self.state)?;
        require("zipCode", &self.zip_code)?;
        Ok(())
    }

    /// Test card used by one-tap fill.
    pub fn sample() -> Self {
        Self {
            card_number: "4111 1111 1111 1111".to_string(),
            cardholder_name: "John Doe".to_string(),
            expiry_date: "12/25".to_string(),
            cvv: "123".to_string(),
            billing_address: "123 Main Street".to_string(),
            city: "New York".to_string(),
            state: "NY".to_string(),
            zip_code: "10001".to_string(),
        }
    }
}

/// A selected (or mock-generated) file occupying one document slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFile {
    /// Document slot id, e.g. `id` or `selfie`.
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub size: u64,
    pub uploaded: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Verifying,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Confirmed,
    Failed,
}

/// One row of the contract's verifier list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verifier {
    pub address: Address,
    pub nickname: String,
    pub authorized: bool,
    /// Unix seconds.
    pub added_at: u64,
}

/// Input of the "add verifier" form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifierForm {
    pub address: String,
    pub nickname: String,
}

impl VerifierForm {
    /// Validate the form and return the parsed address.
    pub fn validate(&self) -> Result<Address, ValidationError> {
        if self.address.trim().is_empty() {
            return Err(ValidationError::Invalid {
                field: "address",
                reason: "Wallet address is required".to_string(),
            });
        }
        let address = parse_address(&self.address).ok_or_else(|| ValidationError::Invalid {
            field: "address",
            reason: "Please enter a valid Ethereum address (0x...)".to_string(),
        })?;

        if self.nickname.trim().is_empty() {
            return Err(ValidationError::Invalid {
                field: "nickname",
                reason: "Nickname is required".to_string(),
            });
        }

        Ok(address)
    }
}

/// Parse a `0x`-prefixed, 40-hex-digit address. Checksums are not enforced.
pub fn parse_address(s: &str) -> Option<Address> {
    let digits = s.strip_prefix("0x")?;
    if digits.len() != 40 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Address::from_str(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::alice;

    #[test]
    fn complete_user_data_is_valid() {
        assert_eq!(alice().validate(), Ok(()));
        assert_eq!(alice().full_name(), "Alice Tan");
    }

    #[test]
    fn blank_fields_are_required() {
        let mut user = alice();
        user.passport_number = "   ".into();
        assert_eq!(user.validate(), Err(ValidationError::Required("passportNumber")));

        let mut user = alice();
        user.nickname.clear();
        assert_eq!(user.validate(), Err(ValidationError::Required("nickname")));
    }

    #[test]
    fn malformed_birth_date_and_zero_duration_are_rejected() {
        let mut user = alice();
        user.date_of_birth = "12/05/1999".into();
        assert!(matches!(user.validate(), Err(ValidationError::Invalid { field: "dateOfBirth", .. })));

        let mut user = alice();
        user.duration_minutes = 0;
        assert!(matches!(user.validate(), Err(ValidationError::Invalid { field: "durationMinutes", .. })));
    }

    #[test]
    fn payment_requires_every_field() {
        assert_eq!(PaymentData::sample().validate(), Ok(()));

        let payment = PaymentData { zip_code: "".into(), ..PaymentData::sample() };
        assert_eq!(payment.validate(), Err(ValidationError::Required("zipCode")));
    }

    #[test]
    fn verifier_form_checks_address_shape() {
        let ok = VerifierForm {
            address: "0x52908400098527886E0F7030069857D2E4169EE7".into(),
            nickname: "border control".into(),
        };
        assert!(ok.validate().is_ok());

        for bad in ["", "52908400098527886E0F7030069857D2E4169EE7", "0x1234", "0xZZ908400098527886E0F7030069857D2E4169EE7"] {
            let form = VerifierForm { address: bad.into(), nickname: "n".into() };
            assert!(matches!(form.validate(), Err(ValidationError::Invalid { field: "address", .. })), "{bad}");
        }

        let no_nick = VerifierForm { nickname: " ".into(), ..ok };
        assert!(matches!(no_nick.validate(), Err(ValidationError::Invalid { field: "nickname", .. })));
    }

    #[test]
    fn document_file_uses_type_on_the_wire() {
        let doc = DocumentFile {
            id: "id".into(),
            name: "passport.pdf".into(),
            media_type: "application/pdf".into(),
            size: 1024,
            uploaded: true,
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["type"], "application/pdf");
    }
}
