//! [`VisaRegistry`] backed by the deployed registry contract.

use crate::registry::{Address, B256, RegistryError, RegistryOp, RevertReason, VisaRegistry};
use alloy::contract::SolCallBuilder;
use alloy::primitives::U256;
use alloy::network::{EthereumWallet, ReceiptResponse};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::{Revert, SolCall, SolError};
use async_trait::async_trait;
use url::Url;
use zkp_visa_core::types::Verifier;

sol! {
    #[sol(rpc)]
    interface ZkpVisaRegistry {
        error NotOwner();
        error ZeroAddress();
        error VerifierAlreadyExists();
        error VerifierNotFound();
        error DocumentNotVerified();
        error PaymentNotConfirmed();
        error CredentialNotFound();
        error CredentialAlreadyIssued();

        function owner() external view returns (address);
        function getAllVerifiers()
            external
            view
            returns (
                address[] memory addresses,
                string[] memory nicknames,
                bool[] memory authorized,
                uint256[] memory addedAt
            );
        function getVerifierCount() external view returns (uint256);
        function addVerifier(address verifier, string calldata nickname) external;
        function revokeVerifier(address verifier) external;
        function issueZKPVisa(bytes32 commitment, bool documentVerified, bool paymentConfirmed) external;
        function getCurrentMerkleRoot() external view returns (bytes32);
    }
}

type Instance = ZkpVisaRegistry::ZkpVisaRegistryInstance<DynProvider>;

pub struct ContractRegistry {
    contract: Instance,
    signer: Address,
}

impl ContractRegistry {
    /// Connect to `registry` over HTTP JSON-RPC, signing with `private_key`.
    pub fn connect(rpc_url: Url, registry: Address, private_key: &str) -> Result<Self, RegistryError> {
        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .map_err(|e| RegistryError::Rpc(format!("invalid signer key: {e}")))?;
        let signer_address = signer.address();

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(rpc_url)
            .erased();

        Ok(Self {
            contract: ZkpVisaRegistry::new(registry, provider),
            signer: signer_address,
        })
    }

    pub fn address(&self) -> Address {
        *self.contract.address()
    }

    async fn send_and_wait<C: SolCall>(
        &self,
        op: RegistryOp,
        call: SolCallBuilder<&DynProvider, C>,
    ) -> Result<B256, RegistryError> {
        let pending = call.send().await.map_err(|e| revert_error(op, e))?;
        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| RegistryError::Rpc(e.to_string()))?;
        if !receipt.status() {
            return Err(RegistryError::reverted(
                op,
                RevertReason::Other("transaction reverted".to_string()),
            ));
        }
        Ok(receipt.transaction_hash)
    }
}

/// Zip the parallel columns of `getAllVerifiers` into rows. Columns of different lengths mean
/// a malformed answer.
fn verifier_rows(
    addresses: Vec<Address>,
    nicknames: Vec<String>,
    authorized: Vec<bool>,
    added_at: Vec<U256>,
) -> Result<Vec<Verifier>, RegistryError> {
    let n = addresses.len();
    if nicknames.len() != n || authorized.len() != n || added_at.len() != n {
        return Err(RegistryError::Rpc(format!(
            "getAllVerifiers returned columns of different lengths ({n} addresses, {} nicknames, {} flags, {} timestamps)",
            nicknames.len(),
            authorized.len(),
            added_at.len()
        )));
    }

    Ok(addresses
        .into_iter()
        .zip(nicknames)
        .zip(authorized)
        .zip(added_at)
        .map(|(((address, nickname), authorized), added_at)| Verifier {
            address,
            nickname,
            authorized,
            added_at: added_at.saturating_to::<u64>(),
        })
        .collect())
}

fn rpc(e: alloy::contract::Error) -> RegistryError {
    RegistryError::Rpc(e.to_string())
}

/// Decode a failed write into the contract's custom error or its revert string.
fn revert_error(op: RegistryOp, err: alloy::contract::Error) -> RegistryError {
    use ZkpVisaRegistry::ZkpVisaRegistryErrors as E;

    if let Some(decoded) = err.as_decoded_interface_error::<E>() {
        let reason = match decoded {
            E::NotOwner(_) => RevertReason::NotOwner,
            E::ZeroAddress(_) => RevertReason::ZeroAddress,
            E::VerifierAlreadyExists(_) => RevertReason::VerifierAlreadyExists,
            E::VerifierNotFound(_) => RevertReason::VerifierNotFound,
            E::DocumentNotVerified(_) => RevertReason::DocumentNotVerified,
            E::PaymentNotConfirmed(_) => RevertReason::PaymentNotConfirmed,
            E::CredentialNotFound(_) => RevertReason::CredentialNotFound,
            E::CredentialAlreadyIssued(_) => RevertReason::CredentialAlreadyIssued,
        };
        return RegistryError::reverted(op, reason);
    }

    if let Some(data) = err.as_revert_data() {
        if let Ok(revert) = Revert::abi_decode(&data) {
            return RegistryError::reverted(op, RevertReason::from_name(&revert.reason));
        }
    }

    RegistryError::Rpc(err.to_string())
}

#[async_trait]
impl VisaRegistry for ContractRegistry {
    async fn owner(&self) -> Result<Address, RegistryError> {
        self.contract.owner().call().await.map_err(rpc)
    }

    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn get_all_verifiers(&self) -> Result<Vec<Verifier>, RegistryError> {
        let list = self.contract.getAllVerifiers().call().await.map_err(rpc)?;
        verifier_rows(list.addresses, list.nicknames, list.authorized, list.addedAt)
    }

    async fn get_verifier_count(&self) -> Result<u64, RegistryError> {
        let count = self.contract.getVerifierCount().call().await.map_err(rpc)?;
        Ok(count.saturating_to::<u64>())
    }

    async fn add_verifier(&self, address: Address, nickname: &str) -> Result<B256, RegistryError> {
        let call = self.contract.addVerifier(address, nickname.to_string());
        self.send_and_wait(RegistryOp::AddVerifier, call).await
    }

    async fn revoke_verifier(&self, address: Address) -> Result<B256, RegistryError> {
        let call = self.contract.revokeVerifier(address);
        self.send_and_wait(RegistryOp::RevokeVerifier, call).await
    }

    async fn issue_zkp_visa(
        &self,
        commitment: B256,
        document_verified: bool,
        payment_confirmed: bool,
    ) -> Result<B256, RegistryError> {
        let call = self
            .contract
            .issueZKPVisa(commitment, document_verified, payment_confirmed);
        self.send_and_wait(RegistryOp::IssueCredential, call).await
    }

    async fn current_merkle_root(&self) -> Result<B256, RegistryError> {
        self.contract.getCurrentMerkleRoot().call().await.map_err(rpc)
    }
}
