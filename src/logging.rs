//! Logging setup
//!
//! Installs a `tracing` subscriber with a stderr layer and, optionally, a
//! daily-rolling file layer. `RUST_LOG` overrides the configured level.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn default_level() -> String {
    "info".to_string()
}

fn default_prefix() -> String {
    "wiseagent".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset (e.g. "info", "wiseagent=debug")
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    #[serde(default)]
    pub json: bool,
    /// Also write daily-rotated log files into this directory
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_prefix")]
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            directory: None,
            file_prefix: default_prefix(),
        }
    }
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Write log files into `directory` in addition to stderr
    pub fn with_file_logging(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

fn stderr_layer(config: &LogConfig) -> BoxedLayer {
    let layer = fmt::layer().with_writer(std::io::stderr);
    if config.json {
        layer.json().with_filter(config.filter()).boxed()
    } else {
        layer.with_filter(config.filter()).boxed()
    }
}

fn file_layer(config: &LogConfig, directory: &Path) -> Result<(BoxedLayer, WorkerGuard)> {
    std::fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create log directory {}", directory.display()))?;
    let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer().with_writer(writer).with_ansi(false);
    let layer = if config.json {
        layer.json().with_filter(config.filter()).boxed()
    } else {
        layer.with_filter(config.filter()).boxed()
    };
    Ok((layer, guard))
}

/// Build the layers described by `config`
///
/// The returned guard (present with file logging) must be kept alive for
/// buffered lines to reach the file.
pub fn build_layers(config: &LogConfig) -> Result<(Vec<BoxedLayer>, Option<WorkerGuard>)> {
    let mut layers = vec![stderr_layer(config)];
    let mut guard = None;
    if let Some(directory) = &config.directory {
        let (layer, file_guard) = file_layer(config, directory)?;
        layers.push(layer);
        guard = Some(file_guard);
    }
    Ok((layers, guard))
}

/// Install the global subscriber
///
/// Fails if a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let (layers, guard) = build_layers(config)?;
    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builder() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.directory.is_none());

        let config = LogConfig::new("debug")
            .with_json(true)
            .with_file_logging("/tmp/logs")
            .with_file_prefix("agents");
        assert!(config.json);
        assert_eq!(config.directory, Some(PathBuf::from("/tmp/logs")));
        assert_eq!(config.file_prefix, "agents");
    }

    #[test]
    fn test_file_layer_writes_logs() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let config = LogConfig::new("info").with_file_logging(&logs);

        let (layers, guard) = build_layers(&config).unwrap();
        assert_eq!(layers.len(), 2);
        let subscriber = tracing_subscriber::registry().with(layers);
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("[Router] file logging works");
        });
        drop(guard);

        let written: String = std::fs::read_dir(&logs)
            .unwrap()
            .filter_map(|entry| std::fs::read_to_string(entry.unwrap().path()).ok())
            .collect();
        assert!(written.contains("file logging works"));
    }
}
