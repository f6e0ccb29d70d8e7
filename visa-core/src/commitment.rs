//! Commitment hashing.
//!
//! A commitment stands in for the applicant's passport data on chain. It is a Keccak-256 hash
//! (the same function Solidity exposes as `keccak256`) over a `|`-separated string:
//!
//! ```text
//! passportNumber|nickname|durationSeconds|salt
//! ```
//!
//! The salt is either random (the default when issuing) or derived deterministically from the
//! passport number and nickname.

use crate::constants::SALT_DOMAIN_SUFFIX;
use alloy_primitives::{keccak256, B256};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Inputs of [`generate_commitment`].
#[derive(Debug, Clone, Copy)]
pub struct CommitmentData<'a> {
    pub passport_number: &'a str,
    pub nickname: &'a str,
    pub duration_minutes: u32,
    /// When `None`, [`deterministic_salt`] is used.
    pub salt: Option<&'a str>,
}

/// A commitment together with the salt needed to reopen it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCommitment {
    pub commitment: String,
    pub salt: String,
}

/// Render 32 bytes as lowercase `0x`-prefixed hex.
pub fn to_hex(bytes: &B256) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn keccak_hex(data: impl AsRef<[u8]>) -> String {
    to_hex(&keccak256(data))
}

pub fn generate_commitment(data: &CommitmentData<'_>) -> String {
    let duration_seconds = u64::from(data.duration_minutes) * 60;

    let salt = match data.salt {
        Some(salt) => salt.to_string(),
        None => deterministic_salt(data.passport_number, data.nickname),
    };

    let combined = format!(
        "{}|{}|{}|{}",
        data.passport_number, data.nickname, duration_seconds, salt
    );
    keccak_hex(combined.as_bytes())
}

/// Salt derived from the passport number and nickname, so identical inputs always commit to
/// the same value.
pub fn deterministic_salt(passport_number: &str, nickname: &str) -> String {
    keccak_hex(format!("{passport_number}_{nickname}_{SALT_DOMAIN_SUFFIX}").as_bytes())
}

pub fn generate_random_salt(rng: &mut impl RngCore) -> String {
    let mut bytes = [0u8; 32];
    rng.fill_bytes(&mut bytes);
    keccak_hex(bytes)
}

/// Commitment with a fresh random salt. This is what gets submitted when issuing.
pub fn create_user_commitment(
    rng: &mut impl RngCore,
    passport_number: &str,
    nickname: &str,
    duration_minutes: u32,
) -> UserCommitment {
    let salt = generate_random_salt(rng);
    let commitment = generate_commitment(&CommitmentData {
        passport_number,
        nickname,
        duration_minutes,
        salt: Some(&salt),
    });
    UserCommitment { commitment, salt }
}

/// `0x` followed by exactly 64 hex digits.
pub fn is_valid_commitment(commitment: &str) -> bool {
    match commitment.strip_prefix("0x") {
        Some(digits) => digits.len() == 64 && digits.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// Parse a commitment into the `bytes32` the contract expects.
pub fn commitment_bytes(commitment: &str) -> Option<B256> {
    if !is_valid_commitment(commitment) {
        return None;
    }
    B256::from_str(commitment).ok()
}

/// Merkle leaf for a commitment. Leaves are the commitments themselves.
pub fn merkle_leaf(commitment: &str) -> &str {
    commitment
}

/// Random 32-byte token hash.
pub fn generate_token_hash(rng: &mut impl RngCore) -> String {
    generate_random_salt(rng)
}
