//! CLI argument parsing

use crate::backends;
use clap::{Parser, Subcommand};
use sdflash_core::config::parse_size;
use sdflash_core::ProgramPolarity;
use std::path::PathBuf;

/// Parse a size or address as hex, decimal or with a unit suffix ("4 KiB")
fn parse_size_u64(s: &str) -> Result<u64, String> {
    parse_size(s)
}

/// Parse a size that must fit in 32 bits
fn parse_size_u32(s: &str) -> Result<u32, String> {
    let n = parse_size(s)?;
    u32::try_from(n).map_err(|_| format!("Value too large: {}", s))
}

/// Parse a byte as hex or decimal
pub fn parse_byte(s: &str) -> Result<u8, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex byte: {}", e))
    } else {
        s.parse::<u8>().map_err(|e| format!("Invalid byte: {}", e))
    }
}

/// Generate dynamic help text for the backend argument
fn backend_help() -> String {
    format!(
        "Sector device to use [available: {}]",
        backends::backend_names_short()
    )
}

#[derive(Parser)]
#[command(name = "sdflash")]
#[command(author, version, about = "Flash emulation on SD cards and disk images", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emulator configuration file (TOML format)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Erase unit, overrides the configuration file (e.g. 4096, 0x10000, "64 KiB")
    #[arg(long, global = true, value_parser = parse_size_u32)]
    pub erase_unit: Option<u32>,

    /// Program polarity, overrides the configuration file (clear-only or overwrite)
    #[arg(long, global = true)]
    pub polarity: Option<ProgramPolarity>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Backend selection shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct BackendArgs {
    /// Backend specification, e.g. "image:path=sd.img" or "ram:size=1MiB"
    #[arg(short, long, help = backend_help())]
    pub backend: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a disk image
    #[cfg(feature = "image")]
    Create {
        /// Output image path
        #[arg(short, long)]
        output: PathBuf,

        /// Image size (e.g. 8MiB, 0x800000)
        #[arg(long, value_parser = parse_size_u64)]
        size: u64,

        /// Sector size in bytes
        #[arg(long, default_value_t = sdflash_image::DEFAULT_SECTOR_SIZE)]
        sector: u32,

        /// Initial value of every byte
        #[arg(long, value_parser = parse_byte, default_value = "0xFF")]
        fill: u8,
    },

    /// Show emulated flash geometry
    Info {
        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Read emulated flash contents to a file
    Read {
        #[command(flatten)]
        backend: BackendArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Start address (hex, e.g., 0x10000)
        #[arg(long, value_parser = parse_size_u64, default_value = "0")]
        start: u64,

        /// Number of bytes to read (default: to the end of the device)
        #[arg(long, value_parser = parse_size_u64)]
        length: Option<u64>,
    },

    /// Program a file into emulated flash
    Program {
        #[command(flatten)]
        backend: BackendArgs,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Start address (hex, e.g., 0x10000)
        #[arg(long, value_parser = parse_size_u64, default_value = "0")]
        start: u64,

        /// Erase the covering erase units before programming
        #[arg(long)]
        erase: bool,

        /// Verify after programming
        #[arg(long)]
        verify: bool,
    },

    /// Erase emulated flash
    Erase {
        #[command(flatten)]
        backend: BackendArgs,

        /// Start address for partial erase (hex, e.g., 0x10000)
        #[arg(long, value_parser = parse_size_u64, default_value = "0")]
        start: u64,

        /// Length of region to erase (default: to the end of the device)
        #[arg(long, value_parser = parse_size_u64)]
        length: Option<u64>,
    },

    /// Verify emulated flash contents against a file
    Verify {
        #[command(flatten)]
        backend: BackendArgs,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Start address (hex, e.g., 0x10000)
        #[arg(long, value_parser = parse_size_u64, default_value = "0")]
        start: u64,
    },

    /// List available backends
    ListBackends,
}
