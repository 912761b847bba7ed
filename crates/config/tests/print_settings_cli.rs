//! Integration tests for the `print-settings` binary.

mod common;

use common::fixture;
use std::error::Error;
use std::path::Path;
use std::process::{Command, Output};

fn print_settings(env_file: &Path, extra: &[&str]) -> Result<Output, Box<dyn Error>> {
    let output = Command::new(env!("CARGO_BIN_EXE_print-settings"))
        .env_clear()
        .arg("--env-file")
        .arg(env_file)
        .args(extra)
        .output()?;
    Ok(output)
}

#[test]
fn prints_redacted_settings_for_a_valid_dotfile() -> Result<(), Box<dyn Error>> {
    let output = print_settings(&fixture("valid.env"), &[])?;
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout)?;
    let json: serde_json::Value = serde_json::from_str(&stdout)?;
    assert_eq!(json["backend"]["port"], 8000);
    assert_eq!(json["postgres"]["password"], "[REDACTED]");
    assert_eq!(
        json["redis"]["local_uri"],
        "redis://:REDACTED@localhost:6380/2"
    );
    assert!(!stdout.contains("hunter2"));
    assert!(!stdout.contains("secret@"));
    Ok(())
}

#[test]
fn invalid_dotfile_exits_with_code_two_and_lists_fields() -> Result<(), Box<dyn Error>> {
    let output = print_settings(&fixture("invalid.env"), &[])?;
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());

    let stderr = String::from_utf8(output.stderr)?;
    for var in ["DEBUG", "POSTGRES_PORT", "HOME_MEPHI_URL", "REDIS_DB", "RABBITMQ_USER"] {
        assert!(stderr.contains(var), "{var} missing from: {stderr}");
    }
    assert!(!stderr.contains("hunter2"));
    Ok(())
}

#[test]
fn list_fields_prints_the_catalog() -> Result<(), Box<dyn Error>> {
    let output = print_settings(Path::new("unused.env"), &["--list-fields"])?;
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let names: Vec<&str> = json
        .as_array()
        .ok_or("catalog should be an array")?
        .iter()
        .filter_map(|field| field["name"].as_str())
        .collect();
    assert_eq!(names.len(), timetable_config::FIELDS.len());
    assert!(names.contains(&"LOCAL_RABBITMQ_URI"));
    Ok(())
}
