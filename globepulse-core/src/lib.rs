//! Core library for GlobePulse: a live roster of connected visitors with
//! real-time fan-out of roster deltas and a durable per-region visit
//! counter.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod service;

pub use config::{load_config, Config};
pub use error::{Error, Result};
