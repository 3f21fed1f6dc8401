//! Common utilities module
//!
//! This module contains shared utilities used across the image pipeline:
//! the error type, filesystem access checks, cancellation and the blocking
//! external-process runner every codec adapter goes through.

pub mod access;
pub mod cancel;
pub mod error;
pub mod process;

pub use cancel::CancellationToken;
pub use error::{ProcessingError, Result};
pub use process::ExternalCommand;
