//! # timetable-config
//!
//! Process settings for the timetable backend: environment plus an optional
//! dotfile, strict typed validation, and derived connection URIs.
//! This crate depends on `shared` only.

/// Memoized settings access.
pub mod cache;
/// Connection URI validation and assembly.
pub mod dsn;
/// Environment variable catalog and coercion.
pub mod env;
/// Settings loading (source + validation + derivation).
pub mod load;
/// The validated settings record.
pub mod settings;
/// Raw value sources (env, dotfile, fixed maps).
pub mod source;

pub use cache::{SettingsCache, get_config, get_default_config, global_cache};
pub use dsn::{Dsn, DsnError, DsnParts, DsnScheme, build_dsn};
pub use env::{EnvParseError, FIELDS, FailureClass, FieldErrors, FieldKind, FieldSpec, SettingsEnv};
pub use load::{DEFAULT_ENV_FILE, LoadError, load, load_from_map, to_pretty_json};
pub use settings::{
    BackendSettings, NewsSettings, PostgresSettings, RabbitMqSettings, RedisSettings,
    ScheduleSourceSettings, Settings, TaskQueueSettings, TranslationSettings,
};
pub use source::{DotenvSource, MapSource, SettingsSource, find_dotfile};
