use crate::config::{Config, ConfigError, IssuerMode, Simulation};
use crate::contract::ContractRegistry;
use crate::db::Db;
use crate::issuance::IssuanceClient;
use crate::issuer::Issuer;
use crate::registry::{LocalRegistry, VisaRegistry};
use crate::sessions::SessionStore;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::sync::Arc;
use zkp_visa_core::types::parse_address;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub sessions: SessionStore,
    pub issuer: Issuer,
    pub registry: Arc<dyn VisaRegistry>,
    pub simulation: Simulation,
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(
        db: Db,
        issuer: Issuer,
        registry: Arc<dyn VisaRegistry>,
        simulation: Simulation,
        api_key: &str,
    ) -> Self {
        Self {
            db,
            sessions: SessionStore::default(),
            issuer,
            registry,
            simulation,
            api_key: Arc::from(api_key),
        }
    }

    /// Wire registry and issuer from configuration.
    pub fn from_config(db: Db, config: &Config) -> Result<Self, ConfigError> {
        let registry: Arc<dyn VisaRegistry> = match (&config.rpc_url, &config.registry_address) {
            (Some(rpc_url), Some(address)) => {
                let address = parse_address(address).ok_or_else(|| ConfigError::Invalid {
                    key: "REGISTRY_ADDRESS",
                    reason: format!("'{address}' is not an address"),
                })?;
                let registry = ContractRegistry::connect(rpc_url.clone(), address, &config.signer_private_key)
                    .map_err(|e| ConfigError::Invalid { key: "SIGNER_PRIVATE_KEY", reason: e.to_string() })?;
                tracing::info!(%rpc_url, registry = %address, signer = %registry.signer_address(), "using registry contract");
                Arc::new(registry)
            }
            _ => {
                let signer = signer_address(&config.signer_private_key)?;
                tracing::info!(%signer, "no RPC_URL configured, using in-process registry");
                Arc::new(LocalRegistry::owned_by(signer))
            }
        };

        let issuer = match config.issuer_mode {
            IssuerMode::Local => Issuer::Local,
            IssuerMode::Http => Issuer::Http(
                IssuanceClient::new(config.issuance_base_url.clone(), config.request_timeout)
                    .map_err(|e| ConfigError::Invalid { key: "ISSUANCE_API_BASE_URL", reason: e.to_string() })?,
            ),
            IssuerMode::Contract => Issuer::Contract(registry.clone()),
        };

        Ok(Self {
            sessions: SessionStore::new(config.sessions),
            ..Self::new(db, issuer, registry, config.simulation, &config.api_key)
        })
    }
}

fn signer_address(private_key: &str) -> Result<Address, ConfigError> {
    let signer: PrivateKeySigner = private_key.trim().parse().map_err(|_| ConfigError::Invalid {
        key: "SIGNER_PRIVATE_KEY",
        reason: "not a valid secp256k1 private key".to_string(),
    })?;
    Ok(signer.address())
}
