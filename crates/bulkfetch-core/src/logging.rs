//! Logging init: stderr by default, or appended to a log file.
//!
//! `RUST_LOG` always wins. Otherwise the level is `info`, or `debug` when
//! verbose; verbose output also carries target, file and line.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::Path;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Writer that is either a file or stderr (used when file clone fails).
enum FileOrStderr {
    File(std::fs::File),
    Stderr,
}

impl io::Write for FileOrStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileOrStderr::File(f) => f.write(buf),
            FileOrStderr::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileOrStderr::File(f) => f.flush(),
            FileOrStderr::Stderr => io::stderr().lock().flush(),
        }
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

fn install(writer: BoxMakeWriter, verbose: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(writer)
        .with_ansi(false)
        .with_target(verbose)
        .with_file(verbose)
        .with_line_number(verbose)
        .with_thread_names(verbose)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))
}

/// Log to stderr.
pub fn init_logging(verbose: bool) -> Result<()> {
    install(BoxMakeWriter::new(io::stderr), verbose)
}

/// Append logs to `path`, creating it and its parent directory if needed.
/// On failure the caller can fall back to [`init_logging`].
pub fn init_logging_to_file(path: &Path, verbose: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create log directory: {}", parent.display()))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file: {}", path.display()))?;

    struct FileMakeWriter(std::fs::File);

    impl<'a> MakeWriter<'a> for FileMakeWriter {
        type Writer = FileOrStderr;

        fn make_writer(&'a self) -> Self::Writer {
            self.0
                .try_clone()
                .map(FileOrStderr::File)
                .unwrap_or(FileOrStderr::Stderr)
        }
    }

    install(BoxMakeWriter::new(FileMakeWriter(file)), verbose)?;
    tracing::debug!("logging to {}", path.display());
    Ok(())
}
