//! Environment variable parsing into typed primitive settings.
//!
//! This module keeps env parsing:
//! - strict (invalid values fail, nothing is defaulted silently)
//! - exhaustive (every offending variable is reported, not just the first)
//! - safe (secret values are redacted in error metadata)

use crate::dsn::{Dsn, DsnScheme, redact_url_credentials};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use timetable_shared::{ErrorCode, ErrorEnvelope, SecretString, redact_if_secret};
use url::Url;

/// Env var: debug mode.
pub const ENV_DEBUG: &str = "DEBUG";

/// Env var: backend title.
pub const ENV_BACKEND_TITLE: &str = "BACKEND_TITLE";
/// Env var: backend description.
pub const ENV_BACKEND_DESCRIPTION: &str = "BACKEND_DESCRIPTION";
/// Env var: backend route prefix.
pub const ENV_BACKEND_PREFIX: &str = "BACKEND_PREFIX";
/// Env var: backend bind host.
pub const ENV_BACKEND_HOST: &str = "BACKEND_HOST";
/// Env var: backend bind port.
pub const ENV_BACKEND_PORT: &str = "BACKEND_PORT";
/// Env var: backend auto-reload.
pub const ENV_BACKEND_RELOAD: &str = "BACKEND_RELOAD";

/// Env var: Postgres user.
pub const ENV_POSTGRES_USER: &str = "POSTGRES_USER";
/// Env var: Postgres password (secret).
// gitleaks:allow
pub const ENV_POSTGRES_PASSWORD: &str = "POSTGRES_PASSWORD";
/// Env var: Postgres host inside the container network.
pub const ENV_POSTGRES_SERVER: &str = "POSTGRES_SERVER";
/// Env var: Postgres port inside the container network.
pub const ENV_POSTGRES_PORT: &str = "POSTGRES_PORT";
/// Env var: Postgres database name.
pub const ENV_POSTGRES_DB: &str = "POSTGRES_DB";
/// Env var: Postgres host for local tooling.
pub const ENV_LOCAL_POSTGRES_SERVER: &str = "LOCAL_POSTGRES_SERVER";
/// Env var: Postgres port for local tooling.
pub const ENV_LOCAL_POSTGRES_PORT: &str = "LOCAL_POSTGRES_PORT";
/// Env var: explicit container database URI.
pub const ENV_DB_URI: &str = "DB_URI";
/// Env var: explicit local database URI (migrations).
pub const ENV_LOCAL_DB_URI: &str = "LOCAL_DB_URI";

/// Env var: timetable page URL.
pub const ENV_MEPHI_SCHEDULE_URL: &str = "MEPHI_SCHEDULE_URL";
/// Env var: personal cabinet home URL.
pub const ENV_HOME_MEPHI_URL: &str = "HOME_MEPHI_URL";
/// Env var: rooms page URL.
pub const ENV_MEPHI_ROOM_URL: &str = "MEPHI_ROOM_URL";
/// Env var: teachers page URL.
pub const ENV_MEPHI_TEACHERS_URL: &str = "MEPHI_TEACHERS_URL";
/// Env var: SSO login URL.
pub const ENV_MEPHI_AUTH_URL: &str = "MEPHI_AUTH_URL";
/// Env var: SSO service URL.
pub const ENV_MEPHI_AUTH_SERVICE_URL: &str = "MEPHI_AUTH_SERVICE_URL";
/// Env var: upstream login.
pub const ENV_MEPHI_LOGIN: &str = "MEPHI_LOGIN";
/// Env var: upstream password (secret).
// gitleaks:allow
pub const ENV_MEPHI_PASSWORD: &str = "MEPHI_PASSWORD";

/// Env var: language pairs for translation.
pub const ENV_FOREIGN_LANGS: &str = "FOREIGN_LANGS";
/// Env var: translation IAM token (secret, optional).
// gitleaks:allow
pub const ENV_IAM_TOKEN: &str = "IAM_TOKEN";
/// Env var: translation folder id (optional).
pub const ENV_FOLDER_ID: &str = "FOLDER_ID";

/// Env var: news listing URL.
pub const ENV_MEPHI_NEWS_PAGE_URL: &str = "MEPHI_NEWS_PAGE_URL";
/// Env var: university site root URL.
pub const ENV_MEPHI_URL: &str = "MEPHI_URL";

/// Env var: task-queue worker process name.
pub const ENV_WORKER_CELERY_NAME: &str = "WORKER_CELERY_NAME";
/// Env var: task-queue beat process name.
pub const ENV_BEAT_CELERY_NAME: &str = "BEAT_CELERY_NAME";

/// Env var: Redis host.
pub const ENV_REDIS_HOST: &str = "REDIS_HOST";
/// Env var: Redis port.
pub const ENV_REDIS_PORT: &str = "REDIS_PORT";
/// Env var: Redis password (secret, may be empty).
// gitleaks:allow
pub const ENV_REDIS_PASSWORD: &str = "REDIS_PASSWORD";
/// Env var: Redis port for local tooling.
pub const ENV_LOCAL_REDIS_PORT: &str = "LOCAL_REDIS_PORT";
/// Env var: Redis logical database index.
pub const ENV_REDIS_DB: &str = "REDIS_DB";
/// Env var: explicit container Redis URI.
pub const ENV_REDIS_URI: &str = "REDIS_URI";
/// Env var: explicit local Redis URI.
pub const ENV_LOCAL_REDIS_URI: &str = "LOCAL_REDIS_URI";

/// Env var: `RabbitMQ` host.
pub const ENV_RABBITMQ_HOST: &str = "RABBITMQ_HOST";
/// Env var: `RabbitMQ` port.
pub const ENV_RABBITMQ_PORT: &str = "RABBITMQ_PORT";
/// Env var: `RabbitMQ` user.
pub const ENV_RABBITMQ_USER: &str = "RABBITMQ_USER";
/// Env var: `RabbitMQ` password (secret).
// gitleaks:allow
pub const ENV_RABBITMQ_PASS: &str = "RABBITMQ_PASS";
/// Env var: explicit container broker URI.
pub const ENV_RABBITMQ_URI: &str = "RABBITMQ_URI";
/// Env var: explicit local broker URI.
pub const ENV_LOCAL_RABBITMQ_URI: &str = "LOCAL_RABBITMQ_URI";

/// How a raw string value is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// `true|t|1|yes|y|on` / `false|f|0|no|n|off`.
    Bool,
    /// Non-empty trimmed string.
    String,
    /// String that never appears in logs or output.
    Secret,
    /// TCP port in `1..=65535`.
    Port,
    /// Unsigned 32-bit integer.
    Integer,
    /// Absolute `http`/`https` URL.
    HttpUrl,
    /// JSON array of strings or comma-separated list.
    StringList,
    /// Connection URI of the given family.
    Dsn(DsnScheme),
}

/// One entry of the settings catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    /// Env var name.
    pub name: &'static str,
    /// Coercion applied to the raw value.
    pub kind: FieldKind,
    /// Whether the variable must be present.
    pub required: bool,
    /// Human-readable description.
    pub description: &'static str,
}

const fn required(name: &'static str, kind: FieldKind, description: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: true,
        description,
    }
}

const fn optional(name: &'static str, kind: FieldKind, description: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: false,
        description,
    }
}

/// Every variable the loader reads, in report order.
pub const FIELDS: &[FieldSpec] = &[
    required(ENV_DEBUG, FieldKind::Bool, "Debug mode"),
    required(ENV_BACKEND_TITLE, FieldKind::String, "Backend title"),
    required(ENV_BACKEND_DESCRIPTION, FieldKind::String, "Backend description"),
    required(ENV_BACKEND_PREFIX, FieldKind::String, "Backend route prefix"),
    required(ENV_BACKEND_HOST, FieldKind::String, "Backend bind host"),
    required(ENV_BACKEND_PORT, FieldKind::Port, "Backend bind port"),
    required(ENV_BACKEND_RELOAD, FieldKind::Bool, "Backend auto-reload"),
    required(ENV_POSTGRES_USER, FieldKind::String, "Postgres user"),
    required(ENV_POSTGRES_PASSWORD, FieldKind::Secret, "Postgres password"),
    required(ENV_POSTGRES_SERVER, FieldKind::String, "Postgres host (containers)"),
    required(ENV_POSTGRES_PORT, FieldKind::Port, "Postgres port (containers)"),
    required(ENV_POSTGRES_DB, FieldKind::String, "Postgres database"),
    required(ENV_LOCAL_POSTGRES_SERVER, FieldKind::String, "Postgres host (local)"),
    required(ENV_LOCAL_POSTGRES_PORT, FieldKind::Port, "Postgres port (local)"),
    optional(ENV_DB_URI, FieldKind::Dsn(DsnScheme::Postgres), "Postgres URI (containers)"),
    optional(ENV_LOCAL_DB_URI, FieldKind::Dsn(DsnScheme::Postgres), "Postgres URI (migrations)"),
    required(ENV_MEPHI_SCHEDULE_URL, FieldKind::HttpUrl, "Timetable page URL"),
    required(ENV_HOME_MEPHI_URL, FieldKind::HttpUrl, "Personal cabinet URL"),
    required(ENV_MEPHI_ROOM_URL, FieldKind::HttpUrl, "Rooms page URL"),
    required(ENV_MEPHI_TEACHERS_URL, FieldKind::HttpUrl, "Teachers page URL"),
    required(ENV_MEPHI_AUTH_URL, FieldKind::HttpUrl, "SSO login URL"),
    required(ENV_MEPHI_AUTH_SERVICE_URL, FieldKind::HttpUrl, "SSO service URL"),
    required(ENV_MEPHI_LOGIN, FieldKind::String, "Upstream login"),
    required(ENV_MEPHI_PASSWORD, FieldKind::Secret, "Upstream password"),
    required(ENV_FOREIGN_LANGS, FieldKind::StringList, "Language pairs for translation"),
    optional(ENV_IAM_TOKEN, FieldKind::Secret, "Translation IAM token"),
    optional(ENV_FOLDER_ID, FieldKind::String, "Translation folder id"),
    required(ENV_MEPHI_NEWS_PAGE_URL, FieldKind::HttpUrl, "News listing URL"),
    required(ENV_MEPHI_URL, FieldKind::HttpUrl, "University site URL"),
    required(ENV_WORKER_CELERY_NAME, FieldKind::String, "Worker process name"),
    required(ENV_BEAT_CELERY_NAME, FieldKind::String, "Beat process name"),
    required(ENV_REDIS_HOST, FieldKind::String, "Redis host"),
    required(ENV_REDIS_PORT, FieldKind::Port, "Redis port"),
    required(ENV_REDIS_PASSWORD, FieldKind::Secret, "Redis password (may be empty)"),
    required(ENV_LOCAL_REDIS_PORT, FieldKind::Port, "Redis port (local)"),
    required(ENV_REDIS_DB, FieldKind::Integer, "Redis logical database index"),
    optional(ENV_REDIS_URI, FieldKind::Dsn(DsnScheme::Redis), "Redis URI"),
    optional(ENV_LOCAL_REDIS_URI, FieldKind::Dsn(DsnScheme::Redis), "Redis URI (local)"),
    required(ENV_RABBITMQ_HOST, FieldKind::String, "RabbitMQ host"),
    required(ENV_RABBITMQ_PORT, FieldKind::Port, "RabbitMQ port"),
    required(ENV_RABBITMQ_USER, FieldKind::String, "RabbitMQ user"),
    required(ENV_RABBITMQ_PASS, FieldKind::Secret, "RabbitMQ password"),
    optional(ENV_RABBITMQ_URI, FieldKind::Dsn(DsnScheme::Amqp), "RabbitMQ URI"),
    optional(ENV_LOCAL_RABBITMQ_URI, FieldKind::Dsn(DsnScheme::Amqp), "RabbitMQ URI (local)"),
];

/// Returns the catalog entry for an env var name (case-insensitive).
pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    FIELDS
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(name))
}

/// Typed primitive settings, before any URI derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsEnv {
    /// `DEBUG`.
    pub debug: bool,

    /// `BACKEND_TITLE`.
    pub backend_title: Box<str>,
    /// `BACKEND_DESCRIPTION`.
    pub backend_description: Box<str>,
    /// `BACKEND_PREFIX`.
    pub backend_prefix: Box<str>,
    /// `BACKEND_HOST`.
    pub backend_host: Box<str>,
    /// `BACKEND_PORT`.
    pub backend_port: u16,
    /// `BACKEND_RELOAD`.
    pub backend_reload: bool,

    /// `POSTGRES_USER`.
    pub postgres_user: Box<str>,
    /// `POSTGRES_PASSWORD`.
    pub postgres_password: SecretString,
    /// `POSTGRES_SERVER`.
    pub postgres_server: Box<str>,
    /// `POSTGRES_PORT`.
    pub postgres_port: u16,
    /// `POSTGRES_DB`.
    pub postgres_db: Box<str>,
    /// `LOCAL_POSTGRES_SERVER`.
    pub local_postgres_server: Box<str>,
    /// `LOCAL_POSTGRES_PORT`.
    pub local_postgres_port: u16,
    /// `DB_URI` when supplied.
    pub db_uri: Option<Dsn>,
    /// `LOCAL_DB_URI` when supplied.
    pub local_db_uri: Option<Dsn>,

    /// `MEPHI_SCHEDULE_URL`.
    pub mephi_schedule_url: Box<str>,
    /// `HOME_MEPHI_URL`.
    pub home_mephi_url: Box<str>,
    /// `MEPHI_ROOM_URL`.
    pub mephi_room_url: Box<str>,
    /// `MEPHI_TEACHERS_URL`.
    pub mephi_teachers_url: Box<str>,
    /// `MEPHI_AUTH_URL`.
    pub mephi_auth_url: Box<str>,
    /// `MEPHI_AUTH_SERVICE_URL`.
    pub mephi_auth_service_url: Box<str>,
    /// `MEPHI_LOGIN`.
    pub mephi_login: Box<str>,
    /// `MEPHI_PASSWORD`.
    pub mephi_password: SecretString,

    /// `FOREIGN_LANGS`.
    pub foreign_langs: Vec<Box<str>>,
    /// `IAM_TOKEN`.
    pub iam_token: Option<SecretString>,
    /// `FOLDER_ID`.
    pub folder_id: Option<Box<str>>,

    /// `MEPHI_NEWS_PAGE_URL`.
    pub mephi_news_page_url: Box<str>,
    /// `MEPHI_URL`.
    pub mephi_url: Box<str>,

    /// `WORKER_CELERY_NAME`.
    pub worker_celery_name: Box<str>,
    /// `BEAT_CELERY_NAME`.
    pub beat_celery_name: Box<str>,

    /// `REDIS_HOST`.
    pub redis_host: Box<str>,
    /// `REDIS_PORT`.
    pub redis_port: u16,
    /// `REDIS_PASSWORD`.
    pub redis_password: SecretString,
    /// `LOCAL_REDIS_PORT`.
    pub local_redis_port: u16,
    /// `REDIS_DB`.
    pub redis_db: u32,
    /// `REDIS_URI` when supplied.
    pub redis_uri: Option<Dsn>,
    /// `LOCAL_REDIS_URI` when supplied.
    pub local_redis_uri: Option<Dsn>,

    /// `RABBITMQ_HOST`.
    pub rabbitmq_host: Box<str>,
    /// `RABBITMQ_PORT`.
    pub rabbitmq_port: u16,
    /// `RABBITMQ_USER`.
    pub rabbitmq_user: Box<str>,
    /// `RABBITMQ_PASS`.
    pub rabbitmq_pass: SecretString,
    /// `RABBITMQ_URI` when supplied.
    pub rabbitmq_uri: Option<Dsn>,
    /// `LOCAL_RABBITMQ_URI` when supplied.
    pub local_rabbitmq_uri: Option<Dsn>,
}

impl SettingsEnv {
    /// Parse and coerce every catalog field from a key/value map.
    ///
    /// Keys must already be uppercase (sources normalize them). All failures
    /// are collected before returning.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, FieldErrors> {
        let mut reader = FieldReader::new(map);

        let env = Self {
            debug: reader.required(ENV_DEBUG, parse_bool),

            backend_title: reader.required(ENV_BACKEND_TITLE, parse_string),
            backend_description: reader.required(ENV_BACKEND_DESCRIPTION, parse_string),
            backend_prefix: reader.required(ENV_BACKEND_PREFIX, parse_string),
            backend_host: reader.required(ENV_BACKEND_HOST, parse_string),
            backend_port: reader.required(ENV_BACKEND_PORT, parse_port),
            backend_reload: reader.required(ENV_BACKEND_RELOAD, parse_bool),

            postgres_user: reader.required(ENV_POSTGRES_USER, parse_string),
            postgres_password: reader.required(ENV_POSTGRES_PASSWORD, parse_secret),
            postgres_server: reader.required(ENV_POSTGRES_SERVER, parse_string),
            postgres_port: reader.required(ENV_POSTGRES_PORT, parse_port),
            postgres_db: reader.required(ENV_POSTGRES_DB, parse_string),
            local_postgres_server: reader.required(ENV_LOCAL_POSTGRES_SERVER, parse_string),
            local_postgres_port: reader.required(ENV_LOCAL_POSTGRES_PORT, parse_port),
            db_uri: reader.optional(ENV_DB_URI, parse_postgres_dsn),
            local_db_uri: reader.optional(ENV_LOCAL_DB_URI, parse_postgres_dsn),

            mephi_schedule_url: reader.required(ENV_MEPHI_SCHEDULE_URL, parse_http_url),
            home_mephi_url: reader.required(ENV_HOME_MEPHI_URL, parse_http_url),
            mephi_room_url: reader.required(ENV_MEPHI_ROOM_URL, parse_http_url),
            mephi_teachers_url: reader.required(ENV_MEPHI_TEACHERS_URL, parse_http_url),
            mephi_auth_url: reader.required(ENV_MEPHI_AUTH_URL, parse_http_url),
            mephi_auth_service_url: reader.required(ENV_MEPHI_AUTH_SERVICE_URL, parse_http_url),
            mephi_login: reader.required(ENV_MEPHI_LOGIN, parse_string),
            mephi_password: reader.required(ENV_MEPHI_PASSWORD, parse_secret),

            foreign_langs: reader.required(ENV_FOREIGN_LANGS, parse_string_list),
            iam_token: reader.optional(ENV_IAM_TOKEN, parse_secret),
            folder_id: reader.optional(ENV_FOLDER_ID, parse_string),

            mephi_news_page_url: reader.required(ENV_MEPHI_NEWS_PAGE_URL, parse_http_url),
            mephi_url: reader.required(ENV_MEPHI_URL, parse_http_url),

            worker_celery_name: reader.required(ENV_WORKER_CELERY_NAME, parse_string),
            beat_celery_name: reader.required(ENV_BEAT_CELERY_NAME, parse_string),

            redis_host: reader.required(ENV_REDIS_HOST, parse_string),
            redis_port: reader.required(ENV_REDIS_PORT, parse_port),
            redis_password: reader.required_allow_blank(ENV_REDIS_PASSWORD),
            local_redis_port: reader.required(ENV_LOCAL_REDIS_PORT, parse_port),
            redis_db: reader.required(ENV_REDIS_DB, parse_u32),
            redis_uri: reader.optional(ENV_REDIS_URI, parse_redis_dsn),
            local_redis_uri: reader.optional(ENV_LOCAL_REDIS_URI, parse_redis_dsn),

            rabbitmq_host: reader.required(ENV_RABBITMQ_HOST, parse_string),
            rabbitmq_port: reader.required(ENV_RABBITMQ_PORT, parse_port),
            rabbitmq_user: reader.required(ENV_RABBITMQ_USER, parse_string),
            rabbitmq_pass: reader.required(ENV_RABBITMQ_PASS, parse_secret),
            rabbitmq_uri: reader.optional(ENV_RABBITMQ_URI, parse_amqp_dsn),
            local_rabbitmq_uri: reader.optional(ENV_LOCAL_RABBITMQ_URI, parse_amqp_dsn),
        };

        reader.finish()?;
        Ok(env)
    }
}

/// Walks the map, records every failure and hands back placeholder values
/// for failed fields. The placeholders never escape: `finish` rejects the
/// whole record when anything was recorded.
struct FieldReader<'a> {
    map: &'a BTreeMap<String, String>,
    errors: Vec<EnvParseError>,
}

impl<'a> FieldReader<'a> {
    const fn new(map: &'a BTreeMap<String, String>) -> Self {
        Self {
            map,
            errors: Vec::new(),
        }
    }

    fn required<T: Default>(
        &mut self,
        var: &'static str,
        parse: fn(&'static str, &str) -> Result<T, EnvParseError>,
    ) -> T {
        let Some(raw) = self.map.get(var) else {
            self.errors.push(EnvParseError::Missing { var });
            return T::default();
        };
        if raw.trim().is_empty() {
            self.errors.push(EnvParseError::EmptyValue { var });
            return T::default();
        }
        parse(var, raw).unwrap_or_else(|error| {
            self.errors.push(error);
            T::default()
        })
    }

    fn required_allow_blank(&mut self, var: &'static str) -> SecretString {
        match self.map.get(var) {
            Some(raw) => SecretString::new(raw.trim()),
            None => {
                self.errors.push(EnvParseError::Missing { var });
                SecretString::default()
            },
        }
    }

    fn optional<T>(
        &mut self,
        var: &'static str,
        parse: fn(&'static str, &str) -> Result<T, EnvParseError>,
    ) -> Option<T> {
        let raw = self.map.get(var).filter(|raw| !raw.trim().is_empty())?;
        match parse(var, raw) {
            Ok(value) => Some(value),
            Err(error) => {
                self.errors.push(error);
                None
            },
        }
    }

    fn finish(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(FieldErrors::new(self.errors))
        }
    }
}

/// Which of the three failure classes an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// No usable value from any source.
    MissingField,
    /// A value is present but cannot be coerced to the declared type.
    TypeCoercion,
    /// A derivation ran without one of its component fields.
    DependencyUnavailable,
}

/// Validation failures for a single env var.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// A required env var is absent.
    Missing {
        /// Env var name.
        var: &'static str,
    },
    /// A required env var was present but empty after trimming.
    EmptyValue {
        /// Env var name.
        var: &'static str,
    },
    /// Boolean env var had an invalid value.
    InvalidBool {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Integer env var had an invalid value.
    InvalidInt {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Port env var was not an integer in `1..=65535`.
    InvalidPort {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// URL env var had an invalid value.
    InvalidUrl {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// List env var could not be read as JSON or CSV.
    InvalidList {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Explicit connection URI was rejected.
    InvalidDsn {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A derived connection URI could not be assembled from its components.
    InvalidDerivedDsn {
        /// Derived env var name.
        var: &'static str,
        /// Component env var that caused the failure.
        dependency: &'static str,
        /// Why assembly failed.
        reason: String,
    },
    /// A derived connection URI is missing a component.
    DependencyUnavailable {
        /// Derived env var name.
        var: &'static str,
        /// Component env var that is unavailable.
        dependency: &'static str,
    },
    /// A dotfile value holds an unescaped `$`, which the dotfile reader
    /// would replace with another variable's value.
    VariableReference {
        /// Env var name.
        var: &'static str,
    },
    /// A process environment value is not valid UTF-8.
    InvalidEncoding {
        /// Env var name.
        var: &'static str,
    },
}

impl EnvParseError {
    /// The env var the error is about.
    #[must_use]
    pub const fn var(&self) -> &'static str {
        match self {
            Self::Missing { var }
            | Self::EmptyValue { var }
            | Self::InvalidBool { var, .. }
            | Self::InvalidInt { var, .. }
            | Self::InvalidPort { var, .. }
            | Self::InvalidUrl { var, .. }
            | Self::InvalidList { var, .. }
            | Self::InvalidDsn { var, .. }
            | Self::InvalidDerivedDsn { var, .. }
            | Self::DependencyUnavailable { var, .. }
            | Self::VariableReference { var }
            | Self::InvalidEncoding { var } => var,
        }
    }

    /// Failure class.
    #[must_use]
    pub const fn class(&self) -> FailureClass {
        match self {
            Self::Missing { .. } | Self::EmptyValue { .. } => FailureClass::MissingField,
            Self::DependencyUnavailable { .. } => FailureClass::DependencyUnavailable,
            _ => FailureClass::TypeCoercion,
        }
    }

    /// Stable error code in the `config` namespace.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::Missing { .. } => "missing_env_var",
            Self::EmptyValue { .. } => "empty_env_var",
            Self::InvalidBool { .. } => "invalid_env_bool",
            Self::InvalidInt { .. } => "invalid_env_int",
            Self::InvalidPort { .. } => "invalid_env_port",
            Self::InvalidUrl { .. } => "invalid_env_url",
            Self::InvalidList { .. } => "invalid_env_list",
            Self::InvalidDsn { .. } | Self::InvalidDerivedDsn { .. } => "invalid_env_dsn",
            Self::DependencyUnavailable { .. } => "dependency_unavailable",
            Self::VariableReference { .. } => "invalid_env_reference",
            Self::InvalidEncoding { .. } => "invalid_env_encoding",
        };
        ErrorCode::new("config", code)
    }
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { var } => write!(formatter, "{var} is required"),
            Self::EmptyValue { var } => write!(formatter, "{var} must be non-empty"),
            Self::InvalidBool { var, .. } => write!(formatter, "{var} must be a boolean"),
            Self::InvalidInt { var, .. } => {
                write!(formatter, "{var} must be a non-negative integer")
            },
            Self::InvalidPort { var, .. } => {
                write!(formatter, "{var} must be a port number (1-65535)")
            },
            Self::InvalidUrl { var, .. } => {
                write!(formatter, "{var} must be an absolute http(s) URL")
            },
            Self::InvalidList { var, .. } => {
                write!(formatter, "{var} must be a JSON array of strings or a comma-separated list")
            },
            Self::InvalidDsn { var, reason, .. } => {
                write!(formatter, "{var} is not a valid connection URI: {reason}")
            },
            Self::InvalidDerivedDsn {
                var,
                dependency,
                reason,
            } => write!(formatter, "{var} cannot be built from {dependency}: {reason}"),
            Self::DependencyUnavailable { var, dependency } => {
                write!(formatter, "{var} cannot be derived: {dependency} is unavailable")
            },
            Self::VariableReference { var } => write!(
                formatter,
                "{var} contains an unescaped `$` in the dotfile; write `\\$` or single-quote the value"
            ),
            Self::InvalidEncoding { var } => write!(formatter, "{var} must be valid UTF-8"),
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = if error.class() == FailureClass::DependencyUnavailable {
            Self::invariant(code, message)
        } else {
            Self::expected(code, message)
        };
        let envelope = envelope.with_metadata("env_var", error.var());

        match error {
            EnvParseError::Missing { .. }
            | EnvParseError::EmptyValue { .. }
            | EnvParseError::VariableReference { .. }
            | EnvParseError::InvalidEncoding { .. } => envelope,
            EnvParseError::InvalidBool { var, value }
            | EnvParseError::InvalidInt { var, value }
            | EnvParseError::InvalidPort { var, value }
            | EnvParseError::InvalidList { var, value } => {
                envelope.with_metadata("value", redact_if_secret(var, &value))
            },
            EnvParseError::InvalidUrl { value, .. } | EnvParseError::InvalidDsn { value, .. } => {
                envelope.with_metadata("value", redact_url_credentials(&value))
            },
            EnvParseError::InvalidDerivedDsn { dependency, .. }
            | EnvParseError::DependencyUnavailable { dependency, .. } => {
                envelope.with_metadata("dependency", dependency)
            },
        }
    }
}

/// Every field failure from one load, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldErrors(Vec<EnvParseError>);

impl FieldErrors {
    pub(crate) const fn new(errors: Vec<EnvParseError>) -> Self {
        Self(errors)
    }

    /// Iterate the individual failures.
    pub fn iter(&self) -> std::slice::Iter<'_, EnvParseError> {
        self.0.iter()
    }

    /// Number of failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for errors produced by the loader.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The offending env var names.
    pub fn vars(&self) -> Vec<&'static str> {
        self.0.iter().map(EnvParseError::var).collect()
    }

    /// The failure recorded for `var`, if any.
    #[must_use]
    pub fn get(&self, var: &str) -> Option<&EnvParseError> {
        self.0.iter().find(|error| error.var() == var)
    }
}

impl IntoIterator for FieldErrors {
    type Item = EnvParseError;
    type IntoIter = std::vec::IntoIter<EnvParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "invalid settings ({} field(s))", self.0.len())?;
        for error in &self.0 {
            write!(formatter, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

impl From<FieldErrors> for ErrorEnvelope {
    fn from(errors: FieldErrors) -> Self {
        let code = ErrorCode::new("config", "invalid_settings");
        let message = errors.to_string();
        let only_invariants = errors
            .iter()
            .all(|error| error.class() == FailureClass::DependencyUnavailable);
        let envelope = if only_invariants {
            Self::invariant(code, message)
        } else {
            Self::expected(code, message)
        };
        envelope
            .with_metadata("count", errors.len().to_string())
            .with_metadata("env_vars", errors.vars().join(","))
    }
}

fn parse_string(_var: &'static str, raw: &str) -> Result<Box<str>, EnvParseError> {
    Ok(raw.trim().into())
}

fn parse_secret(_var: &'static str, raw: &str) -> Result<SecretString, EnvParseError> {
    Ok(SecretString::new(raw.trim()))
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, EnvParseError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" | "on" => Ok(true),
        "false" | "f" | "0" | "no" | "n" | "off" => Ok(false),
        _ => Err(EnvParseError::InvalidBool {
            var,
            value: raw.to_owned(),
        }),
    }
}

fn parse_port(var: &'static str, raw: &str) -> Result<u16, EnvParseError> {
    raw.trim()
        .parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| EnvParseError::InvalidPort {
            var,
            value: raw.to_owned(),
        })
}

fn parse_u32(var: &'static str, raw: &str) -> Result<u32, EnvParseError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: raw.to_owned(),
        })
}

fn parse_http_url(var: &'static str, raw: &str) -> Result<Box<str>, EnvParseError> {
    let invalid = || EnvParseError::InvalidUrl {
        var,
        value: raw.to_owned(),
    };
    let parsed = Url::parse(raw.trim()).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(invalid());
    }

    Ok(parsed.to_string().into_boxed_str())
}

fn parse_string_list(var: &'static str, raw: &str) -> Result<Vec<Box<str>>, EnvParseError> {
    let trimmed = raw.trim();
    let items: Vec<String> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|_| EnvParseError::InvalidList {
            var,
            value: raw.to_owned(),
        })?
    } else {
        trimmed.split(',').map(ToOwned::to_owned).collect()
    };

    Ok(items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(Into::into)
        .collect())
}

fn parse_dsn(var: &'static str, raw: &str, scheme: DsnScheme) -> Result<Dsn, EnvParseError> {
    Dsn::parse(scheme, raw.trim()).map_err(|error| EnvParseError::InvalidDsn {
        var,
        value: raw.to_owned(),
        reason: error.to_string(),
    })
}

fn parse_postgres_dsn(var: &'static str, raw: &str) -> Result<Dsn, EnvParseError> {
    parse_dsn(var, raw, DsnScheme::Postgres)
}

fn parse_redis_dsn(var: &'static str, raw: &str) -> Result<Dsn, EnvParseError> {
    parse_dsn(var, raw, DsnScheme::Redis)
}

fn parse_amqp_dsn(var: &'static str, raw: &str) -> Result<Dsn, EnvParseError> {
    parse_dsn(var, raw, DsnScheme::Amqp)
}
