//! Memoized settings, one entry per source identity.
//!
//! The first successful load for a key is shared by every later caller.
//! Failed loads are not cached, so fixing the environment and retrying works.

use crate::load::{DEFAULT_ENV_FILE, LoadError, load};
use crate::settings::Settings;
use crate::source::{DotenvSource, SettingsSource};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// A cache of loaded settings keyed by [`SettingsSource::key`].
#[derive(Debug, Default)]
pub struct SettingsCache {
    entries: Mutex<HashMap<String, Arc<Settings>>>,
}

impl SettingsCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached settings for `source`, loading them on first use.
    ///
    /// The lock is held across the load, so concurrent first calls for the
    /// same key read the source once.
    pub fn get_or_load<S: SettingsSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<Arc<Settings>, LoadError> {
        let key = source.key();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(settings) = entries.get(&key) {
            tracing::debug!(source = %key, "settings cache hit");
            return Ok(Arc::clone(settings));
        }

        let settings = Arc::new(load(source)?);
        entries.insert(key, Arc::clone(&settings));
        Ok(settings)
    }

    /// The cached settings for `key`, without loading.
    pub fn get(&self, key: &str) -> Option<Arc<Settings>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true when nothing has been loaded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static GLOBAL: OnceLock<SettingsCache> = OnceLock::new();

/// The process-wide cache behind [`get_config`].
pub fn global_cache() -> &'static SettingsCache {
    GLOBAL.get_or_init(SettingsCache::new)
}

/// Process-wide settings for `env_file` layered under the environment.
///
/// Repeated calls with the same path return the same `Arc`.
pub fn get_config(env_file: impl AsRef<Path>) -> Result<Arc<Settings>, LoadError> {
    global_cache().get_or_load(&DotenvSource::new(env_file.as_ref()))
}

/// [`get_config`] for [`DEFAULT_ENV_FILE`].
pub fn get_default_config() -> Result<Arc<Settings>, LoadError> {
    get_config(DEFAULT_ENV_FILE)
}
