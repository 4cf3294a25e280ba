//! Tracing subscriber setup.

use std::fs::{File, OpenOptions};
use std::sync::Mutex;

use crate::config::LoggingConfig;

/// Filter applied when neither `RUST_LOG` nor the config names one.
const DEFAULT_FILTER: &str = "panoframe=info,warn";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. When [`LoggingConfig::file`]
/// is set, output is appended there; if the file cannot be opened, logging
/// falls back to the console rather than failing startup.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if config.level.is_empty() {
            EnvFilter::new(DEFAULT_FILTER)
        } else {
            EnvFilter::new(&config.level)
        }
    });

    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true);

    match (open_log_file(config), config.json) {
        (Some(file), true) => {
            let subscriber = builder.json().with_writer(Mutex::new(file)).finish();
            tracing::subscriber::set_global_default(subscriber).ok();
        }
        (Some(file), false) => {
            let subscriber = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber).ok();
        }
        (None, true) => {
            tracing::subscriber::set_global_default(builder.json().finish()).ok();
        }
        (None, false) => {
            tracing::subscriber::set_global_default(builder.finish()).ok();
        }
    }
}

/// Initialize logging with defaults (useful for tests and quick scripts).
pub fn init_default_logging() {
    init_logging(&LoggingConfig::default());
}

fn open_log_file(config: &LoggingConfig) -> Option<File> {
    let path = config.file.as_ref()?;
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("cannot open log file {path:?}: {e}; logging to console");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panoframe.log");
        let config = LoggingConfig {
            level: "debug".to_string(),
            json: false,
            file: Some(path.clone()),
        };
        assert!(open_log_file(&config).is_some());
        assert!(path.exists());
    }

    #[test]
    fn test_unwritable_log_file_falls_back() {
        let config = LoggingConfig {
            level: String::new(),
            json: false,
            file: Some("/nonexistent/dir/panoframe.log".into()),
        };
        assert!(open_log_file(&config).is_none());
    }

    #[test]
    fn test_no_file_configured() {
        assert!(open_log_file(&LoggingConfig::default()).is_none());
    }
}
