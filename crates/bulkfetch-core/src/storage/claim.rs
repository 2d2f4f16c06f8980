//! Exclusive create of a destination file, with removal unless committed.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Outcome of trying to claim a destination path.
#[derive(Debug)]
pub enum Claim {
    /// This caller created the file and owns it until commit or discard.
    Claimed(ClaimedFile),
    /// The file already exists: downloaded earlier or in flight elsewhere.
    AlreadyExists,
}

/// Creates `path` for writing, failing if it exists (`O_CREAT | O_EXCL`).
///
/// `AlreadyExists` is not an error. Any other I/O failure is returned.
pub fn claim(path: &Path) -> io::Result<Claim> {
    match File::options().write(true).create_new(true).open(path) {
        Ok(file) => Ok(Claim::Claimed(ClaimedFile {
            file,
            guard: RemoveOnDrop {
                path: path.to_path_buf(),
                armed: true,
            },
        })),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(Claim::AlreadyExists),
        Err(e) => Err(e),
    }
}

/// A freshly created destination file.
///
/// Dropping it without [`ClaimedFile::commit`] closes and removes the file, so
/// a failed or panicking transfer never leaves a truncated artifact behind.
#[derive(Debug)]
pub struct ClaimedFile {
    // Field order matters: the handle is closed before the guard unlinks.
    file: File,
    guard: RemoveOnDrop,
}

impl ClaimedFile {
    pub fn path(&self) -> &Path {
        &self.guard.path
    }

    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    /// Keep the file. Closes the handle and returns the final path.
    pub fn commit(self) -> PathBuf {
        let ClaimedFile { file, mut guard } = self;
        drop(file);
        guard.armed = false;
        std::mem::take(&mut guard.path)
    }

    /// Close and remove the file.
    pub fn discard(self) {
        drop(self);
    }
}

/// Removes `path` when dropped while armed.
#[derive(Debug)]
struct RemoveOnDrop {
    path: PathBuf,
    armed: bool,
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let path = &self.path;
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed partial file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %path.display(),
                "could not remove partial file: {}",
                e
            ),
        }
    }
}
