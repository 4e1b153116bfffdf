//! Servlite Shared - Code shared by the host library and the operator console
//!
//! This crate contains the error taxonomy and the constants that both the
//! embedding library (servlite) and the console (servlite-cli) agree on.

pub mod constants;
pub mod errors;

pub use errors::{ServliteError, ServliteResult};
