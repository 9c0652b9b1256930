use clap::Parser;
use parser::Cli;

use std::process;

#[macro_use]
extern crate log;

/// Parse command line arguments and dispatch to `tsinfer_rs::run()`.
fn main() {
    // ----------------------------- Run CLI Parser
    let cli = Cli::parse();

    // ----------------------------- Init logger.
    let verbosity = if cli.quiet { 0 } else { cli.verbose + 1 };
    logger::Logger::init(verbosity);

    // ----------------------------- Serialize command line arguments
    if let Err(e) = cli.serialize() {
        warn!("failed to serialize command line arguments: {e}");
    }

    // ----------------------------- Run.
    match tsinfer_rs::run(cli) {
        Ok(()) => (),
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    }
}
