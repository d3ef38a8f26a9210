use std::process::ExitCode;

use clap::Parser;
use digitpad::{cli, logger};
use log::LevelFilter;

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();

    // Session log (overwrites previous session log)
    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    logger::init(level, args.verbose);
    if let Some(path) = logger::log_path() {
        log::debug!("session log at {}", path.display());
    }
    log::info!("command: {:?}", args.command);

    cli::run(args)
}
