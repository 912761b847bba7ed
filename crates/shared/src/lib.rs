//! # timetable-shared
//!
//! Shared error and redaction types for the timetable backend workspace.
//!
//! - Error envelope with stable, namespaced error codes
//! - Secret detection and redaction for values that end up in errors or logs
//!
//! This crate only depends on external crates.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod errors;
pub mod redaction;

pub use errors::{
    ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind, ErrorMetadata, UnexpectedError,
    normalize_unexpected_error,
};
pub use redaction::{REDACTED, SecretString, is_secret_key, redact_if_secret};
