//! sdflash-image - Disk image and block device support
//!
//! This crate provides a [`SectorDevice`](sdflash_core::SectorDevice) backed
//! by a regular file or a block device node. Disk images let flash software
//! be exercised on a host; pointing the same backend at `/dev/mmcblkN` or
//! `/dev/sdX` drives a real SD card through the kernel block layer.
//!
//! # Example
//!
//! ```ignore
//! use sdflash_core::{FlashDevice, FlashEmulator};
//! use sdflash_image::{ImageConfig, ImageDevice};
//!
//! // 8 MiB erased image
//! let sd = ImageDevice::create("sd.img", 8 * 1024 * 1024, 512, 0xFF)?;
//! let flash: FlashEmulator<_, 4096> = FlashEmulator::with_defaults(sd)?;
//!
//! flash.program(b"boot", 0)?;
//! ```
//!
//! # Usage with sdflash CLI
//!
//! ```bash
//! # Create an image and inspect it
//! sdflash create -o sd.img --size 8MiB
//! sdflash info -b image:path=sd.img
//!
//! # Program a file at 0x10000
//! sdflash program -b image:path=sd.img -i payload.bin --start 0x10000
//! ```

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, ImageConfig, ImageDevice, DEFAULT_SECTOR_SIZE};
pub use error::{ImageError, Result};

/// Open a disk image from backend options
///
/// This is a convenience function for use in the CLI backend dispatch.
///
/// # Example Options
///
/// - `path=sd.img` - Required: image file or block device node
/// - `sector=512` - Optional: sector size
pub fn open_image(options: &[(&str, &str)]) -> Result<ImageDevice> {
    let config = parse_options(options)?;
    ImageDevice::open(&config)
}
