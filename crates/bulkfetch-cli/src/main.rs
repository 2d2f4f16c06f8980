mod cli;

use crate::cli::Cli;

fn main() {
    // Parse CLI, set up logging and run the batch.
    if let Err(err) = Cli::run_from_args() {
        eprintln!("bulkfetch error: {:#}", err);
        std::process::exit(1);
    }
}
