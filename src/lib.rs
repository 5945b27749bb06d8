//! pkgrisk - Package Health Scoring and Risk Classification
//!
//! Turns raw per-package metrics into a weighted composite health score,
//! classifies each package into risk tier, update urgency and confidence
//! levels, and publishes whole ecosystems as FNV-1a sharded chunk files
//! that clients resolve with a single fetch per lookup.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod explain;
pub mod metrics;
pub mod models;
pub mod policy;
pub mod publish;
pub mod resolve;
pub mod risk;
pub mod scoring;
pub mod storage;

pub use error::{PkgriskError, Result};
