use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::transfer::{TransferOptions, DEFAULT_CHUNK_SIZE, MAX_TIMEOUT_SECS};

/// Defaults loaded from `~/.config/bulkfetch/config.toml`.
/// Command-line flags override every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Number of worker threads (concurrent connections).
    pub parallelism: usize,
    /// Seconds to wait for a connection and for the server to start sending data.
    pub timeout_secs: u64,
    /// Where downloaded files are stored.
    pub download_dir: PathBuf,
    /// Skip TLS certificate and hostname verification.
    pub insecure: bool,
    /// libcurl receive buffer size in bytes.
    pub chunk_size_bytes: usize,
    /// Append logs to this file instead of stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            parallelism: 5,
            timeout_secs: 5,
            download_dir: PathBuf::from("."),
            insecure: false,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            log_file: None,
        }
    }
}

impl FetchConfig {
    /// Rejects values the command line would also reject.
    pub fn validate(&self) -> Result<()> {
        if self.parallelism < 1 {
            anyhow::bail!("parallelism needs to be greater or equal 1");
        }
        if !(1..=MAX_TIMEOUT_SECS).contains(&self.timeout_secs) {
            anyhow::bail!(
                "timeout_secs needs to be between 1 and {}",
                MAX_TIMEOUT_SECS
            );
        }
        if self.chunk_size_bytes < 1 {
            anyhow::bail!("chunk_size_bytes needs to be greater or equal 1");
        }
        Ok(())
    }

    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            verify_tls: !self.insecure,
            chunk_size: self.chunk_size_bytes,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("bulkfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load and validate configuration from an explicit path. The file must exist.
pub fn load_from_path(path: &Path) -> Result<FetchConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("cannot read config file: {}", path.display()))?;
    let cfg: FetchConfig = toml::from_str(&data)
        .with_context(|| format!("invalid config file: {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config file: {}", path.display()))?;
    Ok(cfg)
}
