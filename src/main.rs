//! psramtest - serial PSRAM bring-up and diagnostics
//!
//! Drives an external pseudo-static RAM over a chip-select-gated serial bus
//! and repeats a fixed diagnostic routine:
//!
//! - **identify**: READ_ID and the manufacturer/known-good-die signature
//! - **read-write**: a 4-byte write/read-back followed by a bulk round trip
//!   with byte-exact comparison and throughput figures
//!
//! The bus, chip-select and timing pulse come from a backend opened by name
//! (see `psramtest list-backends`), so the same loop runs against spidev,
//! bit-banged GPIO or the in-memory emulator.

mod cli;
mod commands;
mod config;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Run(args) => {
            let settings = config::load(&args)?;
            log::debug!("Run settings: {:?}", settings);

            let summary = commands::run(&settings, &mut commands::Console::stdout())?;
            if summary.failed > 0 {
                return Err(format!(
                    "{} of {} iterations failed",
                    summary.failed, summary.iterations
                )
                .into());
            }
            Ok(())
        }
        Commands::ListBackends => {
            commands::list_backends();
            Ok(())
        }
    }
}
