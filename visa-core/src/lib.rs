//! Core logic for the ZKP visa issuance wizard.
//!
//! This crate contains:
//! - The data model collected by the wizard (identity form, payment form, document slots).
//! - The five-screen wizard state machine.
//! - Commitment hashing (Keccak-256, Solidity-compatible).
//! - Mock document verification and payment simulation.
//! - Credential bundle construction and the downloadable credential package.
//!
//! Nothing here performs I/O; timers, HTTP and contract calls live in the backend.

pub mod commitment;
pub mod constants;
pub mod credential;
pub mod documents;
pub mod payment;
pub mod types;
pub mod wizard;
