//! Integration tests for relative dotfile lookup.
//!
//! These change the working directory, so they run serially.

mod common;

use common::fixture;
use serial_test::serial;
use std::error::Error;
use std::path::{Path, PathBuf};
use timetable_config::{DotenvSource, find_dotfile, load};

/// Restores the working directory on drop.
struct CwdGuard(PathBuf);

impl CwdGuard {
    fn enter(dir: &Path) -> Result<Self, Box<dyn Error>> {
        let previous = std::env::current_dir()?;
        std::env::set_current_dir(dir)?;
        Ok(Self(previous))
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.0);
    }
}

#[test]
#[serial]
fn relative_dotfile_is_found_in_an_ancestor() -> Result<(), Box<dyn Error>> {
    let root = tempfile::tempdir()?;
    std::fs::copy(fixture("valid.env"), root.path().join(".env"))?;
    let nested = root.path().join("services").join("worker");
    std::fs::create_dir_all(&nested)?;

    let _guard = CwdGuard::enter(&nested)?;
    let found = find_dotfile(Path::new(".env")).ok_or("ancestor .env not found")?;
    assert_eq!(found.canonicalize()?, root.path().join(".env").canonicalize()?);

    let settings = load(&DotenvSource::new(".env").without_environment())?;
    assert_eq!(settings.backend.port, 8000);
    Ok(())
}

#[test]
#[serial]
fn nearest_dotfile_wins() -> Result<(), Box<dyn Error>> {
    let root = tempfile::tempdir()?;
    let nested = root.path().join("app");
    std::fs::create_dir_all(&nested)?;
    std::fs::write(root.path().join(".env"), "DEBUG=false\n")?;
    std::fs::write(nested.join(".env"), "DEBUG=true\n")?;

    let _guard = CwdGuard::enter(&nested)?;
    let values = timetable_config::SettingsSource::read(
        &DotenvSource::new(".env").without_environment(),
    )?;
    assert_eq!(values.get("DEBUG").map(String::as_str), Some("true"));
    Ok(())
}

#[test]
#[serial]
fn absent_absolute_path_is_not_searched() -> Result<(), Box<dyn Error>> {
    let root = tempfile::tempdir()?;
    std::fs::write(root.path().join(".env"), "DEBUG=true\n")?;
    let nested = root.path().join("app");
    std::fs::create_dir_all(&nested)?;

    let _guard = CwdGuard::enter(&nested)?;
    assert_eq!(find_dotfile(&nested.join(".env")), None);
    Ok(())
}
