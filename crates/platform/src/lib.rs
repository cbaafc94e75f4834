//! # bridgeftpd platform
//!
//! Core platform types and traits shared by the bridgeftpd crates.
//!
//! This crate provides:
//! - Unified error types (`BridgeError`, `BridgeResult`)
//! - Host boundary traits (`PreferenceStore`, `ServerModule`)
//!
//! # Examples
//!
//! ```
//! use bridgeftpd_platform::{BridgeError, BridgeResult};
//!
//! fn parse_port(raw: &str) -> BridgeResult<u16> {
//!     raw.parse()
//!         .map_err(|_| BridgeError::Config(format!("not a port: {}", raw)))
//! }
//!
//! # fn main() -> BridgeResult<()> {
//! assert_eq!(parse_port("12345")?, 12345);
//! assert!(parse_port("ftp").is_err());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod error;
pub mod traits;

pub use error::{BridgeError, BridgeResult};
pub use traits::{PreferenceStore, PreferenceValue, ServerModule};

/// Platform version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
