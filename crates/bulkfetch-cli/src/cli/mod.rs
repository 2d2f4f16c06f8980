//! CLI for bulkfetch.

mod run;

use anyhow::Result;
use bulkfetch_core::config::{self, FetchConfig};
use bulkfetch_core::logging;
use bulkfetch_core::transfer::MAX_TIMEOUT_SECS;
use clap::Parser;
use std::path::PathBuf;

use run::{run_batch, RunSettings};

/// Bulk download URLs into a directory, one file per URL named by the MD5 of the URL.
#[derive(Debug, Parser)]
#[command(name = "bulkfetch")]
#[command(about = "Bulk download URLs", long_about = None)]
pub struct Cli {
    /// Path to the file containing the URLs, one per line.
    pub urls: PathBuf,

    /// Path to the download directory. Defaults to the current working directory.
    #[arg(long, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// Skip server TLS certificate and hostname verification.
    #[arg(long)]
    pub insecure: bool,

    /// Number of concurrent connections (default 5).
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub parallelism: Option<u16>,

    /// Seconds to wait for a connection and for the server to start sending data
    /// (not the overall download time; default 5).
    #[arg(
        long,
        value_name = "SECS",
        value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS)
    )]
    pub timeout: Option<u64>,

    /// Increase verbosity of output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Config file to use instead of ~/.config/bulkfetch/config.toml.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = match &cli.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        init_logging(&cfg, cli.verbose);
        tracing::debug!("loaded config: {:?}", cfg);

        let settings = RunSettings::resolve(&cli, &cfg);
        run_batch(&cli.urls, &settings)?;
        Ok(())
    }
}

fn init_logging(cfg: &FetchConfig, verbose: bool) {
    if let Some(path) = &cfg.log_file {
        match logging::init_logging_to_file(path, verbose) {
            Ok(()) => return,
            Err(e) => eprintln!("bulkfetch: {:#}; logging to stderr", e),
        }
    }
    if let Err(e) = logging::init_logging(verbose) {
        eprintln!("bulkfetch: {:#}", e);
    }
}
