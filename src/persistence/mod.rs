//! Backend persistence
//!
//! - `wire`: backend JSON shapes and their translation to game types
//! - `client`: non-blocking request/response client with a pending queue
//! - `error`: error classification
//! - `cache`: TTL cache for catalog fetches
//! - `local`: LocalStorage snapshot of the profile

pub mod cache;
pub mod client;
pub mod error;
pub mod local;
pub mod wire;

pub use client::{
    ApiCall, ApiConfig, ApiReply, ApiResponse, EhttpTransport, PersistenceClient, Transport,
};
pub use error::ApiError;
