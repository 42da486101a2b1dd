// In: src/logging.rs

//! Logger installation for applications and test harnesses.
//!
//! The crate itself only talks to the `log` facade. These helpers install an
//! `env_logger` backend once per process with a compact `[LEVEL] message` line.

use colored::Colorize;
use log::{Level, LevelFilter};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Once;

use crate::error::ExchangeError;

static INIT_LOGGER: Once = Once::new();

fn colored_level(level: Level) -> String {
    let tag = level.to_string();
    match level {
        Level::Error => tag.red().bold().to_string(),
        Level::Warn => tag.yellow().to_string(),
        Level::Info => tag.green().to_string(),
        Level::Debug => tag.blue().to_string(),
        Level::Trace => tag.dimmed().to_string(),
    }
}

/// Installs the process-wide logger.
///
/// With `log_file`, records are appended to that file without color codes.
/// Later calls are no-ops, as is a call made after another logger was installed.
pub fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<(), ExchangeError> {
    // Open the file up front so a bad path is reported instead of panicking in `Once`.
    let file = match log_file {
        Some(path) => Some(OpenOptions::new().append(true).create(true).open(path)?),
        None => None,
    };

    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.is_test(false);
        builder.filter_level(level);

        match file {
            Some(file) => {
                builder.format(|buf, record| {
                    use std::io::Write;
                    writeln!(buf, "[{}] {}", record.level(), record.args())?;
                    buf.flush()?;
                    Ok(())
                });
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            None => {
                builder.format(|buf, record| {
                    use std::io::Write;
                    writeln!(buf, "[{}] {}", colored_level(record.level()), record.args())
                });
            }
        }

        let _ = builder.try_init();
    });
    Ok(())
}

/// Test-harness logger: captured by libtest, level from `RUST_LOG`.
pub fn init_test_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}
