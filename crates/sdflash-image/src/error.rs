//! Error types for disk image operations

use std::io;
use thiserror::Error;

/// Disk image errors
#[derive(Debug, Error)]
pub enum ImageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Image file could not be opened or created
    #[error("Failed to open image '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Image size is zero or not a whole number of sectors
    #[error("Image size {size} is not a non-zero multiple of the {sector_size}-byte sector size")]
    InvalidSize { size: u64, sector_size: u32 },

    /// Sector size is zero
    #[error("Invalid sector size: {0}")]
    InvalidSectorSize(u32),

    /// Access is not sector aligned
    #[error("Access at offset {offset:#x} (+{len:#x}) is not aligned to {sector_size}-byte sectors")]
    Misaligned {
        offset: u64,
        len: usize,
        sector_size: u32,
    },

    /// Access extends beyond the end of the image
    #[error("Access at offset {offset:#x} (+{len:#x}) is beyond image size {size:#x}")]
    OutOfRange { offset: u64, len: usize, size: u64 },

    /// Image was opened read-only
    #[error("Image is not writable")]
    NotWritable,

    /// Seek error
    #[error("Seek to offset {offset:#x} failed: {source}")]
    SeekFailed {
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// Read error
    #[error("Read of {len} bytes at offset {offset:#x} failed: {source}")]
    ReadFailed {
        offset: u64,
        len: usize,
        #[source]
        source: io::Error,
    },

    /// Write error
    #[error("Write of {len} bytes at offset {offset:#x} failed: {source}")]
    WriteFailed {
        offset: u64,
        len: usize,
        #[source]
        source: io::Error,
    },

    /// Missing required parameter
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Invalid parameter value
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },
}

/// Result type for disk image operations
pub type Result<T> = std::result::Result<T, ImageError>;
