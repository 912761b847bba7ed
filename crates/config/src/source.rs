//! Where raw key/value pairs come from.
//!
//! A source produces one flat map per load. Keys are uppercased and only
//! catalog keys are kept, so unrelated variables never reach the parser.

use crate::env::{EnvParseError, FIELDS, FieldErrors, field_spec};
use crate::load::LoadError;
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// A provider of raw setting values.
pub trait SettingsSource {
    /// Identity used by the settings cache.
    fn key(&self) -> String;

    /// Read every known key, already merged by precedence.
    fn read(&self) -> Result<BTreeMap<String, String>, LoadError>;
}

/// Process environment layered over an optional `.env`-style dotfile.
///
/// Precedence (highest wins):
/// - process environment
/// - dotfile
///
/// Dotfile values are taken literally. An unescaped `$` outside single
/// quotes is rejected instead of being expanded from other variables.
#[derive(Debug, Clone)]
pub struct DotenvSource {
    path: PathBuf,
    environment: Environment,
}

#[derive(Debug, Clone)]
enum Environment {
    Process,
    Fixed(BTreeMap<String, String>),
}

impl DotenvSource {
    /// Read `path` and the process environment.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            environment: Environment::Process,
        }
    }

    /// Use `values` in place of the process environment.
    #[must_use]
    pub fn with_environment<K, V>(mut self, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.environment = Environment::Fixed(owned_keys(normalize(
            values
                .into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        )));
        self
    }

    /// Read the dotfile only.
    #[must_use]
    pub fn without_environment(self) -> Self {
        self.with_environment(std::iter::empty::<(String, String)>())
    }

    /// The dotfile path as given.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn environment(&self) -> Result<BTreeMap<String, String>, FieldErrors> {
        match &self.environment {
            Environment::Fixed(values) => Ok(values.clone()),
            Environment::Process => environment_from_os(std::env::vars_os()),
        }
    }
}

impl SettingsSource for DotenvSource {
    fn key(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> Result<BTreeMap<String, String>, LoadError> {
        let environment = self.environment()?;
        let mut merged = match find_dotfile(&self.path) {
            Some(found) => {
                tracing::debug!(path = %found.display(), "reading dotfile");
                read_dotfile(&found, &environment)?
            },
            None => {
                tracing::debug!(path = %self.path.display(), "dotfile not found, using environment only");
                BTreeMap::new()
            },
        };

        merged.extend(environment);
        Ok(merged)
    }
}

/// A fixed map, for callers that already hold their values.
#[derive(Debug, Clone)]
pub struct MapSource {
    key: String,
    values: BTreeMap<String, String>,
}

impl MapSource {
    /// Wrap `values` under the cache identity `key`.
    pub fn new<K, V>(key: impl Into<String>, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            key: key.into(),
            values: owned_keys(normalize(
                values
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into())),
            )),
        }
    }
}

impl SettingsSource for MapSource {
    fn key(&self) -> String {
        self.key.clone()
    }

    fn read(&self) -> Result<BTreeMap<String, String>, LoadError> {
        Ok(self.values.clone())
    }
}

/// Locate a dotfile.
///
/// An existing `path` is used as-is. A relative `path` that does not exist
/// is searched for in the working directory's ancestors.
pub fn find_dotfile(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    if path.is_absolute() {
        return None;
    }

    let cwd = std::env::current_dir().ok()?;
    cwd.ancestors()
        .map(|dir| dir.join(path))
        .find(|candidate| candidate.is_file())
}

/// Catalog keys from OS environment pairs. Keys that are not UTF-8 cannot
/// name a setting; a setting whose value is not UTF-8 is an error.
fn environment_from_os(
    vars: impl IntoIterator<Item = (OsString, OsString)>,
) -> Result<BTreeMap<String, String>, FieldErrors> {
    let raw = normalize(
        vars.into_iter()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()))),
    );

    let mut values = BTreeMap::new();
    let mut errors = Vec::new();
    for (var, value) in raw {
        match value {
            Some(value) => {
                values.insert(var.to_owned(), value);
            },
            None => errors.push(EnvParseError::InvalidEncoding { var }),
        }
    }

    if errors.is_empty() {
        Ok(values)
    } else {
        Err(in_catalog_order(errors))
    }
}

/// `environment` masks dotfile keys it overrides, so a `$` there is moot.
fn read_dotfile(
    path: &Path,
    environment: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, LoadError> {
    let dotfile_error = |source: dotenvy::Error| LoadError::Dotfile {
        path: path.to_path_buf(),
        source,
    };

    let contents =
        std::fs::read_to_string(path).map_err(|error| dotfile_error(dotenvy::Error::Io(error)))?;

    let errors: Vec<_> = variable_references(&contents)
        .into_iter()
        .filter(|var| !environment.contains_key(*var))
        .map(|var| EnvParseError::VariableReference { var })
        .collect();
    if !errors.is_empty() {
        return Err(in_catalog_order(errors).into());
    }

    let mut pairs = Vec::new();
    for item in dotenvy::from_read_iter(contents.as_bytes()) {
        pairs.push(item.map_err(dotfile_error)?);
    }
    Ok(owned_keys(normalize(pairs)))
}

/// Catalog keys whose dotfile value has a `$` the reader would expand.
fn variable_references(contents: &str) -> BTreeSet<&'static str> {
    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim_start();
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let spec = field_spec(key.trim())?;
            has_unescaped_dollar(value.trim_start()).then_some(spec.name)
        })
        .collect()
}

/// Single quotes are literal; elsewhere a backslash escapes the next
/// character and an unquoted `#` after whitespace starts a comment.
fn has_unescaped_dollar(value: &str) -> bool {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut after_space = true;

    for ch in value.chars() {
        if escaped {
            escaped = false;
            after_space = false;
            continue;
        }
        match (quote, ch) {
            (Some('\''), '\'') | (Some('"'), '"') => quote = None,
            (Some('\''), _) => {},
            (_, '\\') => escaped = true,
            (None, '\'' | '"') => quote = Some(ch),
            (_, '$') => return true,
            (None, '#') if after_space => return false,
            _ => {},
        }
        after_space = ch.is_whitespace();
    }
    false
}

/// Map every key to its catalog name and drop anything outside the catalog.
///
/// When several spellings of one key are present, the exact uppercase name
/// wins, then the lexicographically smallest spelling; a repeated spelling
/// keeps its last value.
fn normalize<V>(pairs: impl IntoIterator<Item = (String, V)>) -> BTreeMap<&'static str, V> {
    let mut chosen: BTreeMap<&'static str, (String, V)> = BTreeMap::new();
    for (key, value) in pairs {
        let Some(spec) = field_spec(&key) else {
            continue;
        };
        let replace = chosen
            .get(spec.name)
            .is_none_or(|(current, _)| outranks(&key, current, spec.name));
        if replace {
            chosen.insert(spec.name, (key, value));
        }
    }

    chosen
        .into_iter()
        .map(|(name, (_, value))| (name, value))
        .collect()
}

fn outranks(candidate: &str, current: &str, name: &str) -> bool {
    match (candidate == name, current == name) {
        (true, false) => true,
        (false, true) => false,
        _ => candidate <= current,
    }
}

fn owned_keys(map: BTreeMap<&'static str, String>) -> BTreeMap<String, String> {
    map.into_iter()
        .map(|(name, value)| (name.to_owned(), value))
        .collect()
}

fn in_catalog_order(mut errors: Vec<EnvParseError>) -> FieldErrors {
    errors.sort_by_key(|error| FIELDS.iter().position(|spec| spec.name == error.var()));
    FieldErrors::new(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io::Write;

    fn dotfile(lines: &[&str]) -> Result<tempfile::NamedTempFile, Box<dyn Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        for line in lines {
            writeln!(file, "{line}")?;
        }
        Ok(file)
    }

    #[test]
    fn environment_overrides_dotfile() -> Result<(), Box<dyn Error>> {
        let file = dotfile(&["POSTGRES_PORT=5432", "POSTGRES_USER=from_file"])?;

        let source = DotenvSource::new(file.path()).with_environment([("POSTGRES_PORT", "6543")]);
        let values = source.read()?;
        assert_eq!(values.get("POSTGRES_PORT").map(String::as_str), Some("6543"));
        assert_eq!(values.get("POSTGRES_USER").map(String::as_str), Some("from_file"));
        Ok(())
    }

    #[test]
    fn keys_are_case_insensitive_and_unknown_keys_dropped() -> Result<(), Box<dyn Error>> {
        let file = dotfile(&["redis_host=cache", "COMPOSE_PROJECT_NAME=timetable"])?;

        let values = DotenvSource::new(file.path()).without_environment().read()?;
        assert_eq!(values.get("REDIS_HOST").map(String::as_str), Some("cache"));
        assert!(!values.contains_key("COMPOSE_PROJECT_NAME"));
        Ok(())
    }

    #[test]
    fn dollar_in_dotfile_value_is_rejected_not_expanded() -> Result<(), Box<dyn Error>> {
        let file = dotfile(&[
            "POSTGRES_PASSWORD=pa$word",
            "RABBITMQ_PASS=x$HOME",
            "MEPHI_PASSWORD=\"${HOME}\"",
            "X=x$HOME",
        ])?;

        let error = DotenvSource::new(file.path())
            .without_environment()
            .read()
            .err()
            .ok_or("`$` values should be rejected")?;
        let errors = error.field_errors().ok_or("expected field errors")?;
        assert_eq!(
            errors.vars(),
            vec!["POSTGRES_PASSWORD", "MEPHI_PASSWORD", "RABBITMQ_PASS"]
        );
        assert!(
            errors
                .iter()
                .all(|error| error.class() == crate::FailureClass::TypeCoercion)
        );
        Ok(())
    }

    #[test]
    fn single_quoted_dollar_is_kept_literally() -> Result<(), Box<dyn Error>> {
        let file = dotfile(&["POSTGRES_PASSWORD='pa$word'", "RABBITMQ_PASS='x$HOME'"])?;

        let values = DotenvSource::new(file.path()).without_environment().read()?;
        assert_eq!(values.get("POSTGRES_PASSWORD").map(String::as_str), Some("pa$word"));
        assert_eq!(values.get("RABBITMQ_PASS").map(String::as_str), Some("x$HOME"));
        Ok(())
    }

    #[test]
    fn environment_override_masks_a_dollar_in_the_dotfile() -> Result<(), Box<dyn Error>> {
        let file = dotfile(&["POSTGRES_PASSWORD=pa$word"])?;

        let values = DotenvSource::new(file.path())
            .with_environment([("POSTGRES_PASSWORD", "pa$word")])
            .read()?;
        assert_eq!(values.get("POSTGRES_PASSWORD").map(String::as_str), Some("pa$word"));
        Ok(())
    }

    #[test]
    fn dollar_detection_follows_quoting_rules() {
        assert!(has_unescaped_dollar("pa$word"));
        assert!(has_unescaped_dollar("\"a$b\""));
        assert!(has_unescaped_dollar("'a'$b"));
        assert!(!has_unescaped_dollar("'a$b'"));
        assert!(!has_unescaped_dollar("pa\\$word"));
        assert!(!has_unescaped_dollar("\"pa\\$word\""));
        assert!(!has_unescaped_dollar("plain # cost $5"));
        assert!(!has_unescaped_dollar("no-dollar"));
    }

    #[test]
    fn missing_dotfile_is_not_an_error() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let source = DotenvSource::new(dir.path().join("absent.env"))
            .with_environment([("DEBUG", "true")]);
        let values = source.read()?;
        assert_eq!(values.len(), 1);
        Ok(())
    }

    #[test]
    fn malformed_dotfile_is_reported_with_its_path() -> Result<(), Box<dyn Error>> {
        let file = dotfile(&["DEBUG='unterminated"])?;

        let error = DotenvSource::new(file.path())
            .without_environment()
            .read()
            .err()
            .ok_or("malformed dotfile should fail")?;
        assert!(matches!(error, LoadError::Dotfile { ref path, .. } if path == file.path()));
        Ok(())
    }

    #[test]
    fn map_source_normalizes_keys() -> Result<(), Box<dyn Error>> {
        let source = MapSource::new("fixed", [("debug", "1"), ("HOME", "/root")]);
        assert_eq!(source.key(), "fixed");
        let values = source.read()?;
        assert_eq!(values.keys().collect::<Vec<_>>(), vec!["DEBUG"]);
        Ok(())
    }

    #[test]
    fn exact_uppercase_key_wins_regardless_of_order() -> Result<(), Box<dyn Error>> {
        for pairs in [
            [("debug", "lower"), ("DEBUG", "upper"), ("Debug", "mixed")],
            [("DEBUG", "upper"), ("Debug", "mixed"), ("debug", "lower")],
        ] {
            let values = MapSource::new("fixed", pairs).read()?;
            assert_eq!(values.get("DEBUG").map(String::as_str), Some("upper"));
        }

        for pairs in [[("debug", "lower"), ("Debug", "mixed")], [("Debug", "mixed"), ("debug", "lower")]] {
            let values = MapSource::new("fixed", pairs).read()?;
            assert_eq!(values.get("DEBUG").map(String::as_str), Some("mixed"));
        }
        Ok(())
    }

    #[test]
    fn repeated_dotfile_key_keeps_the_last_value() -> Result<(), Box<dyn Error>> {
        let file = dotfile(&["REDIS_DB=1", "REDIS_DB=3"])?;
        let values = DotenvSource::new(file.path()).without_environment().read()?;
        assert_eq!(values.get("REDIS_DB").map(String::as_str), Some("3"));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_environment_value_is_reported() -> Result<(), Box<dyn Error>> {
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![
            (OsString::from("REDIS_HOST"), OsString::from("cache")),
            (OsString::from("POSTGRES_PASSWORD"), OsString::from_vec(vec![0x70, 0xff, 0x77])),
            (OsString::from_vec(vec![0xff]), OsString::from("ignored")),
        ];
        let errors = environment_from_os(vars)
            .err()
            .ok_or("non-UTF-8 value should fail")?;
        assert_eq!(
            errors.get("POSTGRES_PASSWORD"),
            Some(&EnvParseError::InvalidEncoding {
                var: "POSTGRES_PASSWORD"
            })
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.get("POSTGRES_PASSWORD").map(EnvParseError::class),
            Some(crate::FailureClass::TypeCoercion)
        );
        Ok(())
    }
}
