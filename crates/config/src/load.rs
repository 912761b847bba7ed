//! Settings loading (source -> coercion -> derivation).
//!
//! The loader surfaces user-facing errors as typed `LoadError`s that convert
//! into the shared `ErrorEnvelope`.

use crate::env::{FieldErrors, SettingsEnv};
use crate::settings::Settings;
use crate::source::SettingsSource;
use std::collections::BTreeMap;
use std::path::PathBuf;
use timetable_shared::{ErrorCode, ErrorEnvelope, UnexpectedError, normalize_unexpected_error};

/// Dotfile read when no path is given.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Why a load failed.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// One or more fields are missing, malformed, or underivable.
    #[error(transparent)]
    Invalid(#[from] FieldErrors),
    /// The dotfile exists but cannot be read or parsed.
    #[error("failed to read dotfile {}: {source}", .path.display())]
    Dotfile {
        /// Dotfile path.
        path: PathBuf,
        /// Underlying reader error.
        #[source]
        source: dotenvy::Error,
    },
}

impl LoadError {
    /// The field failures, when this is a validation error.
    #[must_use]
    pub const fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Invalid(errors) => Some(errors),
            Self::Dotfile { .. } => None,
        }
    }
}

impl From<LoadError> for ErrorEnvelope {
    fn from(error: LoadError) -> Self {
        match error {
            LoadError::Invalid(errors) => errors.into(),
            LoadError::Dotfile { path, source } => {
                let envelope = match source {
                    dotenvy::Error::Io(io_error) => {
                        normalize_unexpected_error(UnexpectedError::error(io_error))
                    },
                    other => Self::expected(
                        ErrorCode::new("config", "invalid_dotfile"),
                        format!("failed to parse dotfile: {other}"),
                    ),
                };
                envelope.with_metadata("path", path.display().to_string())
            },
        }
    }
}

/// Read `source` and validate it into [`Settings`].
pub fn load<S: SettingsSource + ?Sized>(source: &S) -> Result<Settings, LoadError> {
    let key = source.key();
    let values = source.read()?;
    match load_from_map(&values) {
        Ok(settings) => {
            tracing::info!(source = %key, fields = values.len(), "settings loaded");
            Ok(settings)
        },
        Err(errors) => {
            tracing::warn!(
                source = %key,
                count = errors.len(),
                fields = %errors.vars().join(","),
                "settings validation failed"
            );
            Err(errors.into())
        },
    }
}

/// Validate an already merged key/value map into [`Settings`].
///
/// Keys must be uppercase. Coercion failures are reported before
/// derivation runs, so a bad port never also shows up as a bad URI.
pub fn load_from_map(values: &BTreeMap<String, String>) -> Result<Settings, FieldErrors> {
    let env = SettingsEnv::from_map(values)?;
    Settings::from_env(env)
}

/// Serialize redacted settings as pretty JSON (with trailing newline).
pub fn to_pretty_json(settings: &Settings) -> Result<String, serde_json::Error> {
    let mut output = serde_json::to_string_pretty(settings)?;
    output.push('\n');
    Ok(output)
}
