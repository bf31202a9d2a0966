//! vring Common Library
//!
//! This crate provides shared constants and configuration loading utilities
//! for all vring workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Ring limits, liveness thresholds and segment naming
//! - [`config`] - Configuration loading traits and the ring configuration
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! vring = { package = "vring_common", path = "../vring_common" }
//! ```
//!
//! Then import:
//! ```rust
//! use vring_common::consts::*;
//! use vring_common::config::{ConfigLoader, RingConfig};
//! ```

pub mod config;
pub mod consts;
pub mod prelude;
