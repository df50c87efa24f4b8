//! # sizzle-core
//!
//! Core types and error handling for the Sizzle audio engine.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
