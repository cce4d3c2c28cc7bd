//! # Krait Platform
//!
//! Core platform types and utilities for the Krait security tooling.
//!
//! This crate provides:
//! - Unified error types (`KraitError`, `KraitResult`)
//!
//! # Examples
//!
//! ```
//! use krait_platform::{KraitError, KraitResult};
//!
//! fn example_function() -> KraitResult<String> {
//!     Ok("Hello, Krait!".to_string())
//! }
//!
//! # fn main() -> KraitResult<()> {
//! let result = example_function()?;
//! assert_eq!(result, "Hello, Krait!");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod error;

pub use error::{KraitError, KraitResult};

/// Platform version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
