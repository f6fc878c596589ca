//! sdflash-core - Flash emulation on top of sector devices
//!
//! This crate lets software written for NOR/NAND flash (erase-before-program,
//! bits only cleared by program, coarse erase units) run against media that
//! only supports whole-sector reads and writes, such as an SD card.
//!
//! It is designed to be `no_std` compatible for use in embedded environments.
//! The emulator never allocates: all sector I/O goes through a single staging
//! buffer owned by the emulator.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`, TOML config loading)
//! - `alloc` - Enable helpers that return owned buffers
//!
//! # Example
//!
//! ```ignore
//! use sdflash_core::{EmulatorConfig, FlashDevice, FlashEmulator};
//!
//! fn format_region<D: sdflash_core::SectorDevice>(sd: D) {
//!     let flash: FlashEmulator<D> = FlashEmulator::new(sd, EmulatorConfig::default()).unwrap();
//!
//!     flash.erase(0, 4096).unwrap();
//!     flash.program(&[0x00; 16], 0).unwrap();
//!
//!     let mut buf = [0u8; 32];
//!     flash.read(&mut buf, 0).unwrap();
//!     assert_eq!(&buf[16..], &[0xFF; 16]);
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod config;
pub mod device;
pub mod emulator;
pub mod error;
pub mod sector;

pub use config::{EmulatorConfig, ProgramPolarity, DEFAULT_ERASE_UNIT};
#[cfg(feature = "alloc")]
pub use device::FlashDeviceExt;
pub use device::FlashDevice;
pub use emulator::{FlashEmulator, DEFAULT_STAGING_SIZE, DEVICE_TYPE};
pub use error::{ConfigError, Error, Result};
pub use sector::{SectorDevice, SectorWindow};
