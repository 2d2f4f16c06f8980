//! Destination files: path derivation and the exclusive-create claim.
//!
//! The download directory is the only shared state between workers. A worker
//! claims a URL by creating its destination file with `create_new`; whoever
//! loses that race sees `AlreadyExists` and moves on. No in-memory set is
//! kept, so the claim also holds against other processes using the same
//! directory.

mod claim;

pub use claim::{claim, Claim, ClaimedFile};

use anyhow::{Context, Result};
use md5::{Digest, Md5};
use std::fs;
use std::path::{Path, PathBuf};

/// File name for `url`: lowercase hex MD5 of its UTF-8 bytes.
pub fn destination_name(url: &str) -> String {
    hex::encode(Md5::digest(url.as_bytes()))
}

/// `<download_dir>/<hex md5(url)>`.
pub fn destination_path(download_dir: &Path, url: &str) -> PathBuf {
    download_dir.join(destination_name(url))
}

/// Create the download directory and its parents if missing. Idempotent.
pub fn ensure_download_dir(download_dir: &Path) -> Result<()> {
    fs::create_dir_all(download_dir).with_context(|| {
        format!(
            "failed to create download directory: {}",
            download_dir.display()
        )
    })
}
