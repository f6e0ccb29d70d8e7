//! HTTP service driving the ZKP visa issuance wizard and the verifier whitelist.

pub mod admin;
pub mod api;
pub mod config;
pub mod contract;
pub mod db;
pub mod errors;
pub mod issuance;
pub mod issuer;
pub mod models;
pub mod registry;
pub mod sessions;
pub mod state;
