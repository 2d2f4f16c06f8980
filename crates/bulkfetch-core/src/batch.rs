//! Per-URL download protocol: claim the destination, transfer, commit or clean up.
//!
//! One URL's failure never stops the batch. The only error `download_all`
//! returns is failing to create the download directory.

use anyhow::Result;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use crate::storage::{self, Claim};
use crate::transfer::{Transfer, TransferError};

/// Outcome counts for a sequence of URLs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub downloaded: u64,
    pub already_present: u64,
    pub failed: u64,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Downloaded(_) => self.downloaded += 1,
            Outcome::AlreadyPresent => self.already_present += 1,
            Outcome::Failed => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: &BatchSummary) {
        self.downloaded += other.downloaded;
        self.already_present += other.already_present;
        self.failed += other.failed;
    }

    pub fn total(&self) -> u64 {
        self.downloaded + self.already_present + self.failed
    }
}

/// What happened to one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Transfer succeeded; the file at this path is complete.
    Downloaded(PathBuf),
    /// Destination already existed (downloaded before, or in flight in another worker).
    AlreadyPresent,
    /// Nothing was kept for this URL.
    Failed,
}

/// Downloads every URL in `urls` into `download_dir`, one after another.
///
/// Creates `download_dir` first. Each URL is stored at
/// `<download_dir>/<hex md5(url)>`; a URL whose destination already exists is
/// skipped. A failed transfer removes whatever it wrote.
pub fn download_all<I, T>(urls: I, download_dir: &Path, transfer: &T) -> Result<BatchSummary>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
    T: Transfer + ?Sized,
{
    storage::ensure_download_dir(download_dir)?;
    let mut summary = BatchSummary::default();
    for url in urls {
        let outcome = download_one(url.as_ref(), download_dir, transfer);
        summary.record(&outcome);
    }
    Ok(summary)
}

/// Runs the claim/transfer/commit protocol for a single URL. Never fails;
/// every problem is logged and reported as [`Outcome::Failed`].
pub fn download_one<T>(url: &str, download_dir: &Path, transfer: &T) -> Outcome
where
    T: Transfer + ?Sized,
{
    let dst = storage::destination_path(download_dir, url);
    let mut file = match storage::claim(&dst) {
        Ok(Claim::Claimed(file)) => file,
        Ok(Claim::AlreadyExists) => {
            tracing::info!(url = %url, "'{}' already (being) downloaded", url);
            return Outcome::AlreadyPresent;
        }
        Err(e) => {
            tracing::error!(
                url = %url,
                path = %dst.display(),
                "error downloading '{}': cannot create destination: {}",
                url,
                e
            );
            return Outcome::Failed;
        }
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        transfer.transfer(url, file.file_mut())
    }));

    match result {
        Ok(Ok(())) => {
            let path = file.commit();
            tracing::info!(url = %url, "downloaded '{}' to '{}'", url, path.display());
            Outcome::Downloaded(path)
        }
        Ok(Err(e)) if is_transfer_failure(&e) => {
            tracing::error!(url = %url, "error downloading '{}': {:#}", url, e);
            file.discard();
            Outcome::Failed
        }
        Ok(Err(e)) => {
            tracing::error!(url = %url, "unexpected error downloading '{}': {:?}", url, e);
            file.discard();
            Outcome::Failed
        }
        Err(payload) => {
            tracing::error!(
                url = %url,
                "transfer panicked while downloading '{}': {}",
                url,
                panic_message(payload.as_ref())
            );
            file.discard();
            Outcome::Failed
        }
    }
}

/// HTTP, transport, timeout and local I/O failures are expected; anything else is a bug.
fn is_transfer_failure(e: &anyhow::Error) -> bool {
    e.downcast_ref::<TransferError>().is_some() || e.downcast_ref::<std::io::Error>().is_some()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
