//! Verifier whitelist management. Only the registry owner may use it.

use crate::errors::ApiError;
use crate::registry::{Address, VisaRegistry};
use zkp_visa_core::commitment::to_hex;
use zkp_visa_core::types::{Verifier, VerifierForm};

pub const NOT_AUTHORIZED: &str =
    "You are not authorized to manage verifiers. Only the contract owner can access this page.";

/// Whether the service signer is the registry owner.
pub async fn is_owner(registry: &dyn VisaRegistry) -> Result<bool, ApiError> {
    let owner = registry.owner().await?;
    // Address equality is byte equality, so checksum casing does not matter.
    Ok(owner == registry.signer_address())
}

pub async fn ensure_owner(registry: &dyn VisaRegistry) -> Result<(), ApiError> {
    if !is_owner(registry).await? {
        tracing::warn!(signer = %registry.signer_address(), "verifier admin refused: signer is not the owner");
        return Err(ApiError::Forbidden(NOT_AUTHORIZED.to_string()));
    }
    Ok(())
}

pub async fn list_verifiers(registry: &dyn VisaRegistry) -> Result<Vec<Verifier>, ApiError> {
    ensure_owner(registry).await?;
    Ok(registry.get_all_verifiers().await?)
}

/// Add a verifier, then return the transaction hash and the re-read list.
pub async fn add_verifier(
    registry: &dyn VisaRegistry,
    form: &VerifierForm,
) -> Result<(String, Vec<Verifier>), ApiError> {
    ensure_owner(registry).await?;
    let address = form.validate()?;

    let tx = registry.add_verifier(address, form.nickname.trim()).await?;
    tracing::info!(%address, nickname = %form.nickname.trim(), tx_hash = %tx, "verifier added");

    Ok((to_hex(&tx), registry.get_all_verifiers().await?))
}

/// Revoke a verifier, then return the transaction hash and the re-read list.
pub async fn revoke_verifier(
    registry: &dyn VisaRegistry,
    address: Address,
) -> Result<(String, Vec<Verifier>), ApiError> {
    ensure_owner(registry).await?;

    let tx = registry.revoke_verifier(address).await?;
    tracing::info!(%address, tx_hash = %tx, "verifier revoked");

    Ok((to_hex(&tx), registry.get_all_verifiers().await?))
}
