//! # Utility Modules
//!
//! Supporting utilities for cryptography, logging, metrics and timing.
//!
//! ## Components
//! - **Crypto**: AES-128-CBC with the fixed protocol IV and the additive checksum
//! - **Logging**: `tracing-subscriber` setup from [`crate::config::LoggingConfig`]
//! - **Metrics**: thread-safe request counters shared across sessions
//! - **Timeout**: async timeout wrappers
//!
//! ## Security
//! - Session keys are zeroized when replaced or dropped

pub mod crypto;
pub mod logging;
pub mod metrics;
pub mod timeout;
