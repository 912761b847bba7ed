//! Load the settings (dotfile + env) and print them as redacted JSON.
//!
//! Exit codes: `0` ok, `2` invalid settings or dotfile, `1` anything else.

use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use timetable_config::{DEFAULT_ENV_FILE, FIELDS, LoadError, get_config, to_pretty_json};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Parser)]
#[command(
    name = "print-settings",
    version,
    about = "Validate timetable backend settings and print them with secrets redacted",
    long_about = None
)]
struct Args {
    /// Dotfile layered under the process environment.
    #[arg(long, default_value = DEFAULT_ENV_FILE)]
    env_file: PathBuf,

    /// Print the variable catalog instead of loading.
    #[arg(long)]
    list_fields: bool,

    /// Emit logs as JSON lines on stderr.
    #[arg(long)]
    json_logs: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.json_logs);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(RunError::Load(error)) => {
            eprintln!("error: {error}");
            ExitCode::from(2)
        },
        Err(RunError::Other(error)) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        },
    }
}

enum RunError {
    Load(LoadError),
    Other(Box<dyn std::error::Error>),
}

impl<E: std::error::Error + 'static> From<E> for RunError {
    fn from(error: E) -> Self {
        Self::Other(Box::new(error))
    }
}

fn run(args: &Args) -> Result<(), RunError> {
    let output = if args.list_fields {
        let mut output = serde_json::to_string_pretty(FIELDS)?;
        output.push('\n');
        output
    } else {
        let settings = get_config(&args.env_file).map_err(RunError::Load)?;
        to_pretty_json(&settings)?
    };

    let mut stdout = io::stdout();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    // A subscriber may already be installed when embedded; keep that one.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
