//! Turns a confirmed payment into a credential.

use crate::config::IssuerMode;
use crate::errors::ApiError;
use crate::issuance::{IssuanceClient, IssuanceRequest};
use crate::registry::VisaRegistry;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use std::sync::Arc;
use zkp_visa_core::commitment::{commitment_bytes, create_user_commitment, to_hex};
use zkp_visa_core::credential::{IssuanceReceipt, ZkpCredential};
use zkp_visa_core::wizard::IssuanceTicket;

#[derive(Clone)]
pub enum Issuer {
    /// Build the credential in-process.
    Local,
    /// Go through the external issuance API.
    Http(IssuanceClient),
    /// Record the commitment on the registry contract.
    Contract(Arc<dyn VisaRegistry>),
}

impl Issuer {
    pub fn mode(&self) -> IssuerMode {
        match self {
            Issuer::Local => IssuerMode::Local,
            Issuer::Http(_) => IssuerMode::Http,
            Issuer::Contract(_) => IssuerMode::Contract,
        }
    }

    pub async fn issue(&self, ticket: &IssuanceTicket, now: DateTime<Utc>) -> Result<ZkpCredential, ApiError> {
        let user = &ticket.user;
        let commitment = create_user_commitment(
            &mut OsRng,
            &user.passport_number,
            &user.nickname,
            user.duration_minutes,
        );

        let receipt = match self {
            Issuer::Local => IssuanceReceipt::default(),

            Issuer::Http(client) => {
                let created = client.create_issuance_request(&IssuanceRequest::from(user)).await?;
                tracing::info!(request_id = %created.request_id, "issuance request created");
                let credential = client.get_credential(&created.request_id).await?;
                IssuanceReceipt {
                    tx_hash: None,
                    request_id: Some(created.request_id),
                    qr_payload: Some(created.qr_payload),
                    vc: Some(credential.vc),
                }
            }

            Issuer::Contract(registry) => {
                let bytes = commitment_bytes(&commitment.commitment).ok_or(ApiError::Internal)?;
                let tx = registry
                    .issue_zkp_visa(bytes, ticket.documents_verified, ticket.payment_confirmed)
                    .await?;
                tracing::info!(tx_hash = %tx, commitment = %commitment.commitment, "credential issued on chain");
                IssuanceReceipt {
                    tx_hash: Some(to_hex(&tx)),
                    ..IssuanceReceipt::default()
                }
            }
        };

        Ok(ZkpCredential::build(user, commitment, receipt, now))
    }
}
