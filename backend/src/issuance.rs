//! Client for the external credential issuance API.
//!
//! Issuance is two calls: create a request (which returns a request id and a QR payload), then
//! fetch the verifiable credential for that request id. A reachability check on the base URL
//! runs before every create.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;
use zkp_visa_core::constants::{credential_path, CREATE_ISSUANCE_REQUEST_PATH};
use zkp_visa_core::types::UserData;

pub const BACKEND_UNREACHABLE: &str =
    "Backend is not accessible. Please check the URL and try again.";

#[derive(Debug, Error)]
pub enum IssuanceApiError {
    #[error("Backend is not accessible. Please check the URL and try again.")]
    Unreachable,

    /// Non-2xx answer. `message` follows the API's error body when there is one.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("http error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceRequest {
    pub name: String,
    pub passport_number: String,
    pub nationality: String,
    pub dob: String,
}

impl From<&UserData> for IssuanceRequest {
    fn from(user: &UserData) -> Self {
        Self {
            name: user.full_name(),
            passport_number: user.passport_number.trim().to_string(),
            nationality: user.nationality.trim().to_string(),
            dob: user.date_of_birth.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceResponse {
    pub request_id: String,
    pub qr_payload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialResponse {
    pub vc: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

fn status_fallback(status: u16) -> String {
    format!("HTTP error! status: {status}")
}

fn detail(body: &str) -> Result<Option<String>, serde_json::Error> {
    serde_json::from_str::<ErrorBody>(body).map(|parsed| parsed.detail.filter(|d| !d.is_empty()))
}

/// Message for a failed create: the `detail` field of a JSON body, otherwise the raw body
/// text, otherwise `HTTP error! status: N`.
pub fn error_message(status: u16, body: &str) -> String {
    if body.trim().is_empty() {
        return status_fallback(status);
    }
    match detail(body) {
        Ok(detail) => detail.unwrap_or_else(|| status_fallback(status)),
        Err(_) => body.to_string(),
    }
}

/// Message for a failed credential fetch. Only a JSON `detail` is surfaced; anything else
/// becomes `HTTP error! status: N`.
pub fn credential_error_message(status: u16, body: &str) -> String {
    detail(body).ok().flatten().unwrap_or_else(|| status_fallback(status))
}

#[derive(Debug, Clone)]
pub struct IssuanceClient {
    http: reqwest::Client,
    base_url: Url,
}

impl IssuanceClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, IssuanceApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IssuanceApiError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// `true` when the base URL answers with a 2xx status.
    pub async fn health_check(&self) -> bool {
        let result = self
            .http
            .get(self.base_url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::warn!(status = resp.status().as_u16(), url = %self.base_url, "issuance api health check failed");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %self.base_url, "issuance api unreachable");
                false
            }
        }
    }

    /// Step A: create an issuance request.
    pub async fn create_issuance_request(
        &self,
        request: &IssuanceRequest,
    ) -> Result<IssuanceResponse, IssuanceApiError> {
        if !self.health_check().await {
            return Err(IssuanceApiError::Unreachable);
        }

        let endpoint = self.endpoint(CREATE_ISSUANCE_REQUEST_PATH);
        tracing::info!(%endpoint, "creating issuance request");
        let resp = self
            .http
            .post(&endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| IssuanceApiError::Http { endpoint: endpoint.clone(), source: e })?;

        decode(endpoint, resp, error_message).await
    }

    /// Step B: fetch the verifiable credential of a request.
    pub async fn get_credential(&self, request_id: &str) -> Result<CredentialResponse, IssuanceApiError> {
        let endpoint = self.endpoint(&credential_path(request_id));
        let resp = self
            .http
            .get(&endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| IssuanceApiError::Http { endpoint: endpoint.clone(), source: e })?;

        decode(endpoint, resp, credential_error_message).await
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    endpoint: String,
    resp: reqwest::Response,
    message_for: fn(u16, &str) -> String,
) -> Result<T, IssuanceApiError> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| IssuanceApiError::Http { endpoint: endpoint.clone(), source: e })?;

    if !status.is_success() {
        let message = message_for(status.as_u16(), &body);
        tracing::warn!(%endpoint, status = status.as_u16(), %message, "issuance api error");
        return Err(IssuanceApiError::Status { status: status.as_u16(), message });
    }

    serde_json::from_str(&body).map_err(|e| IssuanceApiError::Decode { endpoint, reason: e.to_string() })
}
