//! Reading-session engine for a manga / image-folder reader.
//!
//! - `state`: panel sequence, pagination and the reading session aggregate
//! - `services`: the [`services::ReaderEngine`], read-state persistence,
//!   staleness reconciliation, folder browsing and directory watching
//! - `store` / `scanner`: storage and filesystem collaborators

pub mod config;
pub mod error;
pub mod file_utils;
pub mod listing_cache;
pub mod model;
pub mod scanner;
pub mod services;
pub mod sort;
pub mod state;
pub mod store;

pub use error::{EngineError, Result};
