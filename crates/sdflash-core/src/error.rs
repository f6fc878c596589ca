//! Error types for sdflash-core
//!
//! This module provides no_std compatible error types. Runtime failures are
//! generic over the sector device's own error so that device errors reach the
//! caller unchanged.

use core::fmt;

/// Errors returned by emulated flash operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error<E> {
    /// The underlying sector device failed a read or write
    ///
    /// Windows completed before the failure are not rolled back, so the
    /// target range must be treated as indeterminate.
    Device(E),
    /// The requested byte range extends beyond the device capacity
    AddressOutOfBounds {
        /// Start of the requested range
        addr: u64,
        /// Length of the requested range
        len: u64,
        /// Device capacity in bytes
        size: u64,
    },
}

impl<E> Error<E> {
    /// Returns the device error, if this is a device failure
    pub fn device_error(&self) -> Option<&E> {
        match self {
            Self::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Self::Device(e)
    }
}

impl<E: fmt::Display> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(e) => write!(f, "sector device error: {}", e),
            Self::AddressOutOfBounds { addr, len, size } => write!(
                f,
                "range 0x{:08X}+0x{:X} is beyond device size 0x{:X}",
                addr, len, size
            ),
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug + fmt::Display> std::error::Error for Error<E> {}

/// Result type alias for emulated flash operations
pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Configuration rejected at construction time
#[derive(Debug)]
pub enum ConfigError {
    /// The sector device reported a sector size of zero
    ZeroSectorSize,
    /// The erase unit is zero
    ZeroEraseUnit,
    /// The erase unit is not a multiple of the sector size
    EraseUnitMisaligned {
        /// Configured erase unit
        erase_unit: u32,
        /// Sector size of the device
        sector_size: u32,
    },
    /// The staging buffer is empty or not a multiple of the sector size
    StagingMisaligned {
        /// Staging buffer capacity
        staging: usize,
        /// Sector size of the device
        sector_size: u32,
    },
    /// The device capacity is not a whole number of sectors
    CapacityMisaligned {
        /// Device capacity in bytes
        capacity: u64,
        /// Sector size of the device
        sector_size: u32,
    },
    /// A configuration file could not be parsed
    #[cfg(feature = "std")]
    Parse(std::string::String),
    /// A configuration file could not be read
    #[cfg(feature = "std")]
    Io(std::io::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroSectorSize => write!(f, "sector size must not be zero"),
            Self::ZeroEraseUnit => write!(f, "erase unit must not be zero"),
            Self::EraseUnitMisaligned {
                erase_unit,
                sector_size,
            } => write!(
                f,
                "erase unit {} is not a multiple of the sector size {}",
                erase_unit, sector_size
            ),
            Self::StagingMisaligned {
                staging,
                sector_size,
            } => write!(
                f,
                "staging buffer of {} bytes is not a non-zero multiple of the sector size {}",
                staging, sector_size
            ),
            Self::CapacityMisaligned {
                capacity,
                sector_size,
            } => write!(
                f,
                "device capacity {} is not a multiple of the sector size {}",
                capacity, sector_size
            ),
            #[cfg(feature = "std")]
            Self::Parse(msg) => write!(f, "invalid configuration: {}", msg),
            #[cfg(feature = "std")]
            Self::Io(e) => write!(f, "failed to read configuration: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
