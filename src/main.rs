//! sdflash - NOR flash emulation on SD cards
//!
//! Presents an SD card, block device node or disk image as a byte-addressable
//! NOR flash: reads and programs at any byte offset, erases in erase units
//! that restore bytes to 0xFF.
//!
//! # Architecture
//!
//! Every backend implements `SectorDevice` (whole-sector transfers). The
//! `FlashEmulator` from sdflash-core wraps the selected backend and provides
//! the `FlashDevice` interface that all commands are written against, so
//! read, program, erase and verify behave identically on every backend.

mod backends;
mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use sdflash_core::EmulatorConfig;

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

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load emulator configuration: {}", e);
            std::process::exit(1);
        }
    };

    log::debug!(
        "Emulator configuration: erase_unit={} polarity={}",
        config.erase_unit,
        config.program_polarity.as_str()
    );

    match cli.command {
        #[cfg(feature = "image")]
        Commands::Create {
            output,
            size,
            sector,
            fill,
        } => commands::unified::run_create(&output, size, sector, fill),
        Commands::Info { backend } => {
            let flash = backends::open_flash(&backend.backend, config)?;
            commands::unified::run_info(
                &flash,
                flash.sector_size(),
                config.program_polarity.as_str(),
            )
        }
        Commands::Read {
            backend,
            output,
            start,
            length,
        } => {
            let flash = backends::open_flash(&backend.backend, config)?;
            commands::unified::run_read(&flash, &output, start, length)
        }
        Commands::Program {
            backend,
            input,
            start,
            erase,
            verify,
        } => {
            let flash = backends::open_flash(&backend.backend, config)?;
            let result = commands::unified::run_program(&flash, &input, start, erase, verify);
            sync_backend(&flash);
            result
        }
        Commands::Erase {
            backend,
            start,
            length,
        } => {
            let flash = backends::open_flash(&backend.backend, config)?;
            let result = commands::unified::run_erase(&flash, start, length);
            sync_backend(&flash);
            result
        }
        Commands::Verify {
            backend,
            input,
            start,
        } => {
            let flash = backends::open_flash(&backend.backend, config)?;
            commands::unified::run_verify(&flash, &input, start)
        }
        Commands::ListBackends => {
            commands::list_backends();
            Ok(())
        }
    }
}

/// Build the emulator configuration from the config file and command-line overrides
fn load_config(cli: &Cli) -> Result<EmulatorConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            log::info!("Loading emulator configuration from {}", path.display());
            EmulatorConfig::load(path)?
        }
        None => EmulatorConfig::default(),
    };

    if let Some(erase_unit) = cli.erase_unit {
        config = config.with_erase_unit(erase_unit);
    }
    if let Some(polarity) = cli.polarity {
        config = config.with_polarity(polarity);
    }

    Ok(config)
}

/// Flush backend writes, even after a failed operation
fn sync_backend(flash: &backends::Flash) {
    if let Err(e) = flash.with_device(|backend| backend.sync()) {
        log::warn!("Failed to sync backend: {}", e);
    }
}
