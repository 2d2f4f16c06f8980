//! The batch run: resolve settings, set up, fan out, summarize.

use anyhow::{Context, Result};
use bulkfetch_core::batch::{download_all, BatchSummary};
use bulkfetch_core::config::FetchConfig;
use bulkfetch_core::dispatch::dispatch;
use bulkfetch_core::storage;
use bulkfetch_core::transfer::{CurlTransfer, TransferOptions};
use bulkfetch_core::url_model::read_urls;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::Cli;

/// Effective settings after layering flags over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub download_dir: PathBuf,
    pub parallelism: usize,
    pub transfer: TransferOptions,
}

impl RunSettings {
    pub fn resolve(cli: &Cli, cfg: &FetchConfig) -> Self {
        let mut transfer = cfg.transfer_options();
        if let Some(secs) = cli.timeout {
            transfer.timeout = Duration::from_secs(secs);
        }
        if cli.insecure {
            transfer.verify_tls = false;
        }
        Self {
            download_dir: cli
                .download_dir
                .clone()
                .unwrap_or_else(|| cfg.download_dir.clone()),
            parallelism: cli.parallelism.map(usize::from).unwrap_or(cfg.parallelism),
            transfer,
        }
    }
}

/// Downloads every valid URL listed in `urls_path`.
///
/// Fails only on setup: download directory, URL list, worker threads.
/// Individual URL failures are logged and counted in the summary.
pub fn run_batch(urls_path: &Path, settings: &RunSettings) -> Result<BatchSummary> {
    if !settings.transfer.verify_tls {
        tracing::warn!(
            "TLS certificate verification is disabled (--insecure); server identity is not checked"
        );
    }
    storage::ensure_download_dir(&settings.download_dir)?;
    let file = File::open(urls_path)
        .with_context(|| format!("cannot open URL list: {}", urls_path.display()))?;
    let urls = read_urls(BufReader::new(file));

    let transfer = CurlTransfer::new(settings.transfer);
    let download_dir = settings.download_dir.as_path();
    tracing::debug!(
        workers = settings.parallelism,
        dir = %download_dir.display(),
        "starting batch"
    );

    let per_worker = dispatch(
        urls,
        |jobs| match download_all(jobs, download_dir, &transfer) {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!("worker stopped: {:#}", e);
                BatchSummary::default()
            }
        },
        settings.parallelism,
    )?;

    let mut summary = BatchSummary::default();
    for s in &per_worker {
        summary.merge(s);
    }
    tracing::info!(
        "done: {} downloaded, {} already present, {} failed",
        summary.downloaded,
        summary.already_present,
        summary.failed
    );
    Ok(summary)
}
