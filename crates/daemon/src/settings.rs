//! Daemon settings
//!
//! Layered: built-in defaults, then `ingest.toml` (or the file named by
//! `INGEST_CONFIG`), then `INGEST_*` environment variables.

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use ingest_api_rpc::server::{DEFAULT_RPC_HOST, DEFAULT_RPC_PORT};
use ingest_core::application::worker::constants::DEFAULT_WORKER_ID;
use ingest_core::application::ChunkConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "ingest.toml";
const CONFIG_PATH_ENV: &str = "INGEST_CONFIG";
const ENV_PREFIX: &str = "INGEST";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub storage_root: String,
    pub worker_id: String,
    pub worker_concurrency: usize,
    pub poll_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub lease_timeout_secs: u64,
    pub recovery_interval_secs: u64,
    pub retry_base_secs: u64,
    pub retry_max_secs: u64,
    pub default_max_attempts: i32,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub rpc_enabled: bool,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub log_format: LogFormat,
    #[serde(default)]
    pub log_dir: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Settings {
    /// Load from the default file location and the process environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(|p| PathBuf::from(shellexpand::tilde(&p).into_owned()))
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::from_sources(Some(&path), true)
    }

    pub(crate) fn from_sources(file: Option<&Path>, with_env: bool) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("database_url", "~/.ingest/ingest.db")?
            .set_default("storage_root", "./.storage")?
            .set_default("worker_id", DEFAULT_WORKER_ID)?
            .set_default("worker_concurrency", 1)?
            .set_default("poll_interval_ms", 2_000)?
            .set_default("heartbeat_interval_ms", 10_000)?
            .set_default("lease_timeout_secs", 300)?
            .set_default("recovery_interval_secs", 60)?
            .set_default("retry_base_secs", 15)?
            .set_default("retry_max_secs", 1_800)?
            .set_default("default_max_attempts", 5)?
            .set_default("chunk_size", 900)?
            .set_default("chunk_overlap", 120)?
            .set_default("rpc_enabled", true)?
            .set_default("rpc_host", DEFAULT_RPC_HOST)?
            .set_default("rpc_port", i64::from(DEFAULT_RPC_PORT))?
            .set_default("log_format", "pretty")?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }
        if with_env {
            builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));
        }

        let settings: Settings = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.default_max_attempts < 1 {
            bail!(
                "default_max_attempts must be at least 1 (got {})",
                self.default_max_attempts
            );
        }
        if self.lease_timeout_ms() <= self.heartbeat_interval_ms as i64 {
            bail!(
                "lease_timeout_secs ({}s) must exceed heartbeat_interval_ms ({}ms)",
                self.lease_timeout_secs,
                self.heartbeat_interval_ms
            );
        }
        if self.poll_interval_ms == 0
            || self.heartbeat_interval_ms == 0
            || self.recovery_interval_secs == 0
        {
            bail!(
                "poll_interval_ms, heartbeat_interval_ms and recovery_interval_secs must be positive"
            );
        }
        if self.retry_base_secs > self.retry_max_secs {
            bail!(
                "retry_base_secs ({}) exceeds retry_max_secs ({})",
                self.retry_base_secs,
                self.retry_max_secs
            );
        }
        self.chunk_config()?;
        Ok(())
    }

    pub fn chunk_config(&self) -> Result<ChunkConfig> {
        ChunkConfig::new(self.chunk_size, self.chunk_overlap).context("Invalid chunking settings")
    }

    pub fn lease_timeout_ms(&self) -> i64 {
        (self.lease_timeout_secs as i64).saturating_mul(1_000)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn recovery_interval(&self) -> Duration {
        Duration::from_secs(self.recovery_interval_secs)
    }

    /// Database URL with `~` expanded; bare paths get the `sqlite://` scheme.
    pub fn database_url(&self) -> String {
        let expanded = shellexpand::tilde(&self.database_url).into_owned();
        if expanded.starts_with("sqlite:") {
            expanded
        } else {
            format!("sqlite://{}", expanded)
        }
    }

    /// Filesystem path of the database, if it lives in a file
    pub fn database_path(&self) -> Option<PathBuf> {
        let url = self.database_url();
        let path = url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        let path = path.split('?').next().unwrap_or_default();
        if path.is_empty() || path.contains(":memory:") {
            None
        } else {
            Some(PathBuf::from(path))
        }
    }

    pub fn storage_root(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.storage_root).into_owned())
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log_dir
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(|d| PathBuf::from(shellexpand::tilde(d).into_owned()))
    }

    /// Worker ids: the configured id alone, or suffixed `-1..-N` for a pool.
    pub fn worker_ids(&self) -> Vec<String> {
        match self.worker_concurrency {
            0 => Vec::new(),
            1 => vec![self.worker_id.clone()],
            n => (1..=n).map(|i| format!("{}-{}", self.worker_id, i)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio_test::{assert_err, assert_ok};

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_sources(None, false).unwrap();

        assert_eq!(settings.worker_id, "ingest-worker-1");
        assert_eq!(settings.worker_concurrency, 1);
        assert_eq!(settings.poll_interval(), Duration::from_secs(2));
        assert_eq!(settings.heartbeat_interval(), Duration::from_secs(10));
        assert_eq!(settings.lease_timeout_ms(), 300_000);
        assert_eq!(settings.default_max_attempts, 5);
        assert_eq!(settings.rpc_host, "127.0.0.1");
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert!(settings.log_dir().is_none());
        assert!(settings.database_url().starts_with("sqlite://"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = write_config(
            "worker_id = \"box-a\"\nworker_concurrency = 3\nlog_format = \"json\"\nchunk_size = 50\nchunk_overlap = 10\n",
        );
        let settings = Settings::from_sources(Some(file.path()), false).unwrap();

        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.chunk_config().unwrap().chunk_size(), 50);
        assert_eq!(settings.worker_ids(), vec!["box-a-1", "box-a-2", "box-a-3"]);
    }

    #[test]
    fn test_missing_file_is_ignored() {
        let settings =
            Settings::from_sources(Some(Path::new("/nonexistent/ingest.toml")), false).unwrap();
        assert_eq!(settings.chunk_size, 900);
    }

    #[test]
    fn test_invalid_combinations_fail() {
        for contents in [
            "chunk_size = 100\nchunk_overlap = 100\n",
            "lease_timeout_secs = 5\nheartbeat_interval_ms = 10000\n",
            "default_max_attempts = 0\n",
            "heartbeat_interval_ms = 0\n",
            "poll_interval_ms = 0\n",
            "recovery_interval_secs = 0\n",
        ] {
            let file = write_config(contents);
            assert_err!(Settings::from_sources(Some(file.path()), false));
        }
    }

    #[test]
    fn test_zero_concurrency_disables_workers() {
        let file = write_config("worker_concurrency = 0\n");
        let settings = assert_ok!(Settings::from_sources(Some(file.path()), false));
        assert!(settings.worker_ids().is_empty());
    }

    #[test]
    fn test_database_path() {
        let file = write_config("database_url = \"sqlite::memory:\"\n");
        let settings = Settings::from_sources(Some(file.path()), false).unwrap();
        assert!(settings.database_path().is_none());

        let file = write_config("database_url = \"/tmp/q/ingest.db\"\n");
        let settings = Settings::from_sources(Some(file.path()), false).unwrap();
        assert_eq!(settings.database_url(), "sqlite:///tmp/q/ingest.db");
        assert_eq!(
            settings.database_path(),
            Some(PathBuf::from("/tmp/q/ingest.db"))
        );
    }
}
