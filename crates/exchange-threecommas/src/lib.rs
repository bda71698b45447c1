//! 3Commas integration for DCA deal clustering.
//!
//! This crate provides:
//! - REST client with rate limiting for the 3Commas bot API
//! - HMAC-SHA256 request signing
//! - A [`deal_cluster_core::BotService`] implementation used by the orchestrator
//!
//! # API Endpoints
//!
//! - `GET /public/api/ver1/bots/{bot_id}/show` - Bot with active deals and pairs
//! - `PATCH /public/api/ver1/bots/{bot_id}/update` - Replace the bot's pair list

pub mod auth;
pub mod client;
pub mod error;
pub mod types;

pub use auth::{SignedHeaders, ThreeCommasAuth, API_KEY_HEADER, SIGNATURE_HEADER};
pub use client::{ThreeCommasClient, ThreeCommasClientConfig, API_PREFIX, THREECOMMAS_API_URL};
pub use error::{Result, ThreeCommasError};
pub use types::{update_payload, UPDATE_ECHO_FIELDS};
