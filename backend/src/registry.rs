//! The visa registry contract seam.
//!
//! [`VisaRegistry`] is what the rest of the service talks to. [`crate::contract::ContractRegistry`]
//! forwards to a deployed contract; [`LocalRegistry`] reproduces the contract's rules in memory so
//! the service runs without a chain.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio::sync::Mutex;
use zkp_visa_core::types::Verifier;

pub use alloy::primitives::{Address, B256};
use alloy::primitives::keccak256;

/// The write a revert happened in. Friendly messages depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryOp {
    AddVerifier,
    RevokeVerifier,
    IssueCredential,
}

/// Custom errors the registry contract reverts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertReason {
    NotOwner,
    ZeroAddress,
    VerifierAlreadyExists,
    VerifierNotFound,
    DocumentNotVerified,
    PaymentNotConfirmed,
    CredentialNotFound,
    CredentialAlreadyIssued,
    Other(String),
}

impl RevertReason {
    /// Map a raw reason string (error name or `require` message) to a known reason.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "NotOwner" => RevertReason::NotOwner,
            "ZeroAddress" => RevertReason::ZeroAddress,
            "VerifierAlreadyExists" => RevertReason::VerifierAlreadyExists,
            "VerifierNotFound" => RevertReason::VerifierNotFound,
            "DocumentNotVerified" => RevertReason::DocumentNotVerified,
            "PaymentNotConfirmed" => RevertReason::PaymentNotConfirmed,
            "CredentialNotFound" => RevertReason::CredentialNotFound,
            "CredentialAlreadyIssued" => RevertReason::CredentialAlreadyIssued,
            other => RevertReason::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RevertReason::NotOwner => "NotOwner",
            RevertReason::ZeroAddress => "ZeroAddress",
            RevertReason::VerifierAlreadyExists => "VerifierAlreadyExists",
            RevertReason::VerifierNotFound => "VerifierNotFound",
            RevertReason::DocumentNotVerified => "DocumentNotVerified",
            RevertReason::PaymentNotConfirmed => "PaymentNotConfirmed",
            RevertReason::CredentialNotFound => "CredentialNotFound",
            RevertReason::CredentialAlreadyIssued => "CredentialAlreadyIssued",
            RevertReason::Other(reason) => reason,
        }
    }

    /// User-facing text for a revert during `op`. Unmapped reasons are shown as-is.
    pub fn friendly(&self, op: RegistryOp) -> String {
        use RegistryOp::*;
        use RevertReason::*;

        let text = match (op, self) {
            (AddVerifier, VerifierAlreadyExists) => "This verifier address is already registered",
            (AddVerifier, ZeroAddress) => "Invalid address: cannot be zero address",
            (AddVerifier, NotOwner) => "Only the contract owner can add verifiers",
            (RevokeVerifier, VerifierNotFound) => "Verifier not found or already revoked",
            (RevokeVerifier, NotOwner) => "Only the contract owner can revoke verifiers",
            (IssueCredential, DocumentNotVerified) => {
                "Documents must be verified before issuing credential"
            }
            (IssueCredential, PaymentNotConfirmed) => {
                "Payment must be confirmed before issuing credential"
            }
            (IssueCredential, CredentialNotFound | CredentialAlreadyIssued) => {
                "This credential has already been issued"
            }
            (IssueCredential, NotOwner) => "Only the contract owner can issue credentials",
            (_, reason) => reason.name(),
        };
        text.to_string()
    }
}

impl fmt::Display for RevertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The contract rejected the call. `message` is already user-facing.
    #[error("{message}")]
    Reverted { reason: RevertReason, message: String },

    #[error("registry unavailable: {0}")]
    Rpc(String),
}

impl RegistryError {
    pub fn reverted(op: RegistryOp, reason: RevertReason) -> Self {
        let message = reason.friendly(op);
        RegistryError::Reverted { reason, message }
    }

    pub fn revert_reason(&self) -> Option<&RevertReason> {
        match self {
            RegistryError::Reverted { reason, .. } => Some(reason),
            RegistryError::Rpc(_) => None,
        }
    }
}

/// Read/write surface of the visa registry contract. Writes return the transaction hash once
/// the transaction is mined.
#[async_trait]
pub trait VisaRegistry: Send + Sync {
    async fn owner(&self) -> Result<Address, RegistryError>;

    /// Address the service signs transactions with.
    fn signer_address(&self) -> Address;

    async fn get_all_verifiers(&self) -> Result<Vec<Verifier>, RegistryError>;

    async fn get_verifier_count(&self) -> Result<u64, RegistryError>;

    async fn add_verifier(&self, address: Address, nickname: &str) -> Result<B256, RegistryError>;

    async fn revoke_verifier(&self, address: Address) -> Result<B256, RegistryError>;

    async fn issue_zkp_visa(
        &self,
        commitment: B256,
        document_verified: bool,
        payment_confirmed: bool,
    ) -> Result<B256, RegistryError>;

    async fn current_merkle_root(&self) -> Result<B256, RegistryError>;
}

/// Pairwise Keccak-256 Merkle root. An odd node at the end of a level is carried up unchanged;
/// an empty tree has the zero root.
pub fn merkle_root(leaves: &[B256]) -> B256 {
    if leaves.is_empty() {
        return B256::ZERO;
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => {
                    let mut buf = [0u8; 64];
                    buf[..32].copy_from_slice(left.as_slice());
                    buf[32..].copy_from_slice(right.as_slice());
                    keccak256(buf)
                }
                _ => pair[0],
            })
            .collect();
    }
    level[0]
}

#[derive(Debug, Default)]
struct LocalLedger {
    verifiers: Vec<Verifier>,
    credentials: Vec<B256>,
    nonce: u64,
}

impl LocalLedger {
    /// Fake transaction hash: hash of a running nonce.
    fn next_tx(&mut self) -> B256 {
        self.nonce += 1;
        keccak256(format!("local-tx-{}", self.nonce).as_bytes())
    }
}

/// In-memory registry with the contract's owner checks and reverts.
#[derive(Debug)]
pub struct LocalRegistry {
    owner: Address,
    signer: Address,
    ledger: Mutex<LocalLedger>,
}

impl LocalRegistry {
    /// Registry owned by `owner`, with writes sent from `signer`.
    pub fn new(owner: Address, signer: Address) -> Self {
        Self {
            owner,
            signer,
            ledger: Mutex::new(LocalLedger::default()),
        }
    }

    /// The signer owns the registry, as after deploying it from the service wallet.
    pub fn owned_by(signer: Address) -> Self {
        Self::new(signer, signer)
    }

    fn ensure_owner(&self, op: RegistryOp) -> Result<(), RegistryError> {
        if self.signer != self.owner {
            return Err(RegistryError::reverted(op, RevertReason::NotOwner));
        }
        Ok(())
    }
}

#[async_trait]
impl VisaRegistry for LocalRegistry {
    async fn owner(&self) -> Result<Address, RegistryError> {
        Ok(self.owner)
    }

    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn get_all_verifiers(&self) -> Result<Vec<Verifier>, RegistryError> {
        Ok(self.ledger.lock().await.verifiers.clone())
    }

    async fn get_verifier_count(&self) -> Result<u64, RegistryError> {
        Ok(self.ledger.lock().await.verifiers.len() as u64)
    }

    async fn add_verifier(&self, address: Address, nickname: &str) -> Result<B256, RegistryError> {
        let op = RegistryOp::AddVerifier;
        self.ensure_owner(op)?;
        if address == Address::ZERO {
            return Err(RegistryError::reverted(op, RevertReason::ZeroAddress));
        }

        let mut ledger = self.ledger.lock().await;
        if ledger.verifiers.iter().any(|v| v.address == address) {
            return Err(RegistryError::reverted(op, RevertReason::VerifierAlreadyExists));
        }
        let added_at = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
        ledger.verifiers.push(Verifier {
            address,
            nickname: nickname.to_string(),
            authorized: true,
            added_at,
        });
        Ok(ledger.next_tx())
    }

    async fn revoke_verifier(&self, address: Address) -> Result<B256, RegistryError> {
        let op = RegistryOp::RevokeVerifier;
        self.ensure_owner(op)?;

        let mut ledger = self.ledger.lock().await;
        let verifier = ledger
            .verifiers
            .iter_mut()
            .find(|v| v.address == address && v.authorized)
            .ok_or_else(|| RegistryError::reverted(op, RevertReason::VerifierNotFound))?;
        verifier.authorized = false;
        Ok(ledger.next_tx())
    }

    async fn issue_zkp_visa(
        &self,
        commitment: B256,
        document_verified: bool,
        payment_confirmed: bool,
    ) -> Result<B256, RegistryError> {
        let op = RegistryOp::IssueCredential;
        self.ensure_owner(op)?;
        if !document_verified {
            return Err(RegistryError::reverted(op, RevertReason::DocumentNotVerified));
        }
        if !payment_confirmed {
            return Err(RegistryError::reverted(op, RevertReason::PaymentNotConfirmed));
        }

        let mut ledger = self.ledger.lock().await;
        if ledger.credentials.contains(&commitment) {
            return Err(RegistryError::reverted(op, RevertReason::CredentialAlreadyIssued));
        }
        ledger.credentials.push(commitment);
        Ok(ledger.next_tx())
    }

    async fn current_merkle_root(&self) -> Result<B256, RegistryError> {
        Ok(merkle_root(&self.ledger.lock().await.credentials))
    }
}
