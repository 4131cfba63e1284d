//! `serve` configuration (§4.14): layered defaults → optional YAML file →
//! environment variables, mirroring the teacher's `ServeConfig`/`ServeSpec`
//! resource loading in `aofctl::commands::serve`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use loom_sources::SourceDescriptor;
use serde::{Deserialize, Serialize};

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4490
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_workers() -> usize {
    loom_core::DEFAULT_WORKER_COUNT
}

fn default_max_attempts() -> u32 {
    loom_core::DEFAULT_MAX_ATTEMPTS
}

fn default_flush_batch_size() -> usize {
    loom_core::DEFAULT_FLUSH_BATCH_SIZE
}

fn default_max_entries() -> usize {
    10_000
}

fn default_max_bytes() -> usize {
    64 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { max_entries: default_max_entries(), max_bytes: default_max_bytes() }
    }
}

/// Top-level `serve` resource, loaded from an optional YAML file and
/// layered with `LOOM_*` environment overrides (§4.14).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_flush_batch_size")]
    pub flush_batch_size: usize,
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            data_dir: default_data_dir(),
            buffer: BufferConfig::default(),
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            flush_batch_size: default_flush_batch_size(),
            sources: Vec::new(),
        }
    }
}

impl ServeConfig {
    /// Loads defaults, then merges `path` if given, then applies
    /// `LOOM_*` environment variables on top (host/port/data-dir only —
    /// everything else is config-file territory since it has no single
    /// scalar CLI-friendly override).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };

        if let Ok(host) = std::env::var("LOOM_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("LOOM_PORT") {
            config.server.port = port.parse().context("LOOM_PORT must be a valid port number")?;
        }
        if let Ok(data_dir) = std::env::var("LOOM_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        Ok(config)
    }

    fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        let deserializer = serde_yaml::Deserializer::from_str(&content);
        serde_path_to_error::deserialize(deserializer).map_err(|error| {
            let path_str = error.path().to_string();
            anyhow::anyhow!(
                "failed to parse {}: {} (at {})",
                path.display(),
                error.inner(),
                if path_str.is_empty() { "<root>".to_string() } else { path_str }
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ServeConfig::default();
        assert_eq!(config.server.port, 4490);
        assert_eq!(config.workers, 1);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serve.yaml");
        std::fs::write(&path, "server:\n  port: 9000\ndata_dir: /tmp/loom\nworkers: 4\n").unwrap();
        let config = ServeConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/loom"));
        assert_eq!(config.workers, 4);
    }

    #[test]
    fn malformed_yaml_reports_field_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serve.yaml");
        std::fs::write(&path, "workers: not-a-number\n").unwrap();

        let error = ServeConfig::from_yaml_file(&path).unwrap_err();
        assert!(error.to_string().contains("workers"));
    }
}
