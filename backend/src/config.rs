//! Service configuration, read once from the environment at startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;
use zkp_visa_core::constants::{
    BACKEND_CALL_DELAY_MS, DEFAULT_ISSUANCE_BASE_URL, PAYMENT_DELAY_MS, VERIFICATION_DELAY_MS,
    VERIFICATION_SUCCESS_RATE,
};

/// Well-known development key (first anvil account). Only used when no signer is configured.
pub const DEV_SIGNER_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("{0} is required when RPC_URL is set")]
    Missing(&'static str),
}

/// How a confirmed payment is turned into a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssuerMode {
    Local,
    Http,
    Contract,
}

impl FromStr for IssuerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(IssuerMode::Local),
            "http" => Ok(IssuerMode::Http),
            "contract" => Ok(IssuerMode::Contract),
            other => Err(format!("unknown issuer mode '{other}' (expected local, http or contract)")),
        }
    }
}

impl IssuerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            IssuerMode::Local => "local",
            IssuerMode::Http => "http",
            IssuerMode::Contract => "contract",
        }
    }
}

/// Timers of the simulated steps.
#[derive(Debug, Clone, Copy)]
pub struct Simulation {
    pub verification_delay: Duration,
    pub verification_success_rate: f64,
    pub payment_delay: Duration,
    pub backend_call_delay: Duration,
}

impl Simulation {
    /// No delays; verification always passes.
    pub fn instant() -> Self {
        Self {
            verification_delay: Duration::ZERO,
            verification_success_rate: 1.0,
            payment_delay: Duration::ZERO,
            backend_call_delay: Duration::ZERO,
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            verification_delay: Duration::from_millis(VERIFICATION_DELAY_MS),
            verification_success_rate: VERIFICATION_SUCCESS_RATE,
            payment_delay: Duration::from_millis(PAYMENT_DELAY_MS),
            backend_call_delay: Duration::from_millis(BACKEND_CALL_DELAY_MS),
        }
    }
}

/// Bounds on the in-memory wizard sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Sessions untouched for this long are dropped.
    pub idle_ttl: Duration,
    pub max_sessions: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(30 * 60),
            max_sessions: 10_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: String,
    pub data_dir: PathBuf,
    pub api_key: String,
    pub issuer_mode: IssuerMode,
    pub issuance_base_url: Url,
    /// JSON-RPC endpoint. When absent the in-process registry is used.
    pub rpc_url: Option<Url>,
    pub registry_address: Option<String>,
    pub signer_private_key: String,
    pub simulation: Simulation,
    pub sessions: SessionLimits,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let issuer_mode = match get("ISSUER_MODE") {
            Some(v) => v
                .parse()
                .map_err(|reason| ConfigError::Invalid { key: "ISSUER_MODE", reason })?,
            None => IssuerMode::Local,
        };

        let issuance_base_url = parse_url(
            "ISSUANCE_API_BASE_URL",
            &get("ISSUANCE_API_BASE_URL").unwrap_or_else(|| DEFAULT_ISSUANCE_BASE_URL.to_string()),
        )?;
        let rpc_url = get("RPC_URL").map(|v| parse_url("RPC_URL", &v)).transpose()?;

        let registry_address = get("REGISTRY_ADDRESS");
        if rpc_url.is_some() && registry_address.is_none() {
            return Err(ConfigError::Missing("REGISTRY_ADDRESS"));
        }

        let defaults = Simulation::default();
        let simulation = Simulation {
            verification_delay: millis(&get, "VERIFICATION_DELAY_MS", defaults.verification_delay)?,
            verification_success_rate: match get("VERIFICATION_SUCCESS_RATE") {
                Some(v) => parse_rate(&v)?,
                None => defaults.verification_success_rate,
            },
            payment_delay: millis(&get, "PAYMENT_DELAY_MS", defaults.payment_delay)?,
            backend_call_delay: millis(&get, "BACKEND_CALL_DELAY_MS", defaults.backend_call_delay)?,
        };

        let session_defaults = SessionLimits::default();
        let sessions = SessionLimits {
            idle_ttl: match get("SESSION_TTL_SECS") {
                Some(v) => Duration::from_secs(parse_number("SESSION_TTL_SECS", &v)?),
                None => session_defaults.idle_ttl,
            },
            max_sessions: match get("MAX_SESSIONS") {
                Some(v) => parse_number("MAX_SESSIONS", &v)? as usize,
                None => session_defaults.max_sessions,
            },
        };
        if sessions.max_sessions == 0 {
            return Err(ConfigError::Invalid { key: "MAX_SESSIONS", reason: "must be at least 1".to_string() });
        }

        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_number("REQUEST_TIMEOUT_SECS", &v)?),
            None => Duration::from_secs(30),
        };

        Ok(Self {
            addr: get("BACKEND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            data_dir: PathBuf::from(get("DATA_DIR").unwrap_or_else(|| "data".to_string())),
            api_key: get("API_KEY").unwrap_or_else(|| "dev-secret-key".to_string()),
            issuer_mode,
            issuance_base_url,
            rpc_url,
            registry_address,
            signer_private_key: get("SIGNER_PRIVATE_KEY")
                .unwrap_or_else(|| DEV_SIGNER_PRIVATE_KEY.to_string()),
            simulation,
            sessions,
            request_timeout,
        })
    }

    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.data_dir.join("issuances.sqlite").to_string_lossy())
    }
}

fn parse_url(key: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|e| ConfigError::Invalid { key, reason: e.to_string() })
}

fn parse_number(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, reason: format!("'{value}' is not a whole number") })
}

fn parse_rate(value: &str) -> Result<f64, ConfigError> {
    let key = "VERIFICATION_SUCCESS_RATE";
    let rate: f64 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, reason: format!("'{value}' is not a number") })?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::Invalid { key, reason: "must be between 0 and 1".to_string() });
    }
    Ok(rate)
}

fn millis(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match get(key) {
        Some(v) => Ok(Duration::from_millis(parse_number(key, &v)?)),
        None => Ok(default),
    }
}
