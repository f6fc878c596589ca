//! Flash emulation over a sector device
//!
//! [`FlashEmulator`] turns byte-granular read/program/erase requests into
//! sector-aligned transfers. Each request is split into windows no larger
//! than the staging buffer; every window reads the covering sectors, copies
//! or merges the requested bytes, and (for program) writes the covering
//! sectors back. Bytes outside the request but inside a covered sector are
//! written back unchanged.
//!
//! All I/O goes through a single staging buffer owned by the emulator and
//! protected by a lock, so at most one operation is in flight at a time.
//! The lock guard is released on every return path, including errors.

use crate::config::EmulatorConfig;
use crate::device::FlashDevice;
use crate::error::{ConfigError, Error, Result};
use crate::sector::{SectorDevice, Windows};
use spin::Mutex;

/// Default staging buffer capacity (one 512-byte sector)
pub const DEFAULT_STAGING_SIZE: usize = 512;

/// Identifier reported by [`FlashDevice::device_type`]
pub const DEVICE_TYPE: &str = "SDFLASH_SIM";

/// Value of an erased byte
const ERASED: u8 = 0xFF;

/// Device and staging buffer, only touched with the lock held
struct State<D, const STAGING: usize> {
    device: D,
    staging: [u8; STAGING],
}

/// Flash emulator on top of a [`SectorDevice`]
///
/// `STAGING` is the staging buffer capacity in bytes; it must be a non-zero
/// multiple of the device sector size. Larger buffers mean fewer, larger
/// sector transfers per request.
///
/// The emulated device is byte-granular for read and program. Erase always
/// resets whole erase units to `0xFF`. With
/// [`ProgramPolarity::ClearOnly`](crate::ProgramPolarity::ClearOnly), program
/// ANDs new data into the stored bytes, so bits only go from 1 to 0.
///
/// # Example
///
/// ```ignore
/// use sdflash_core::{EmulatorConfig, FlashDevice, FlashEmulator};
///
/// let flash: FlashEmulator<_, 4096> = FlashEmulator::new(sd_card, EmulatorConfig::default())?;
/// flash.erase(0, 4096)?;
/// flash.program(b"hello", 10)?;
/// ```
pub struct FlashEmulator<D, const STAGING: usize = DEFAULT_STAGING_SIZE> {
    state: Mutex<State<D, STAGING>>,
    config: EmulatorConfig,
    sector_size: u32,
    size: u64,
}

impl<D: SectorDevice, const STAGING: usize> FlashEmulator<D, STAGING> {
    /// Create an emulator driving `device` with the given policy
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the erase unit, the staging capacity or
    /// the device capacity is not a non-zero multiple of the device sector size.
    pub fn new(device: D, config: EmulatorConfig) -> core::result::Result<Self, ConfigError> {
        let sector_size = device.sector_size();
        config.validate(sector_size, STAGING)?;

        let size = device.capacity();
        if size % sector_size as u64 != 0 {
            return Err(ConfigError::CapacityMisaligned {
                capacity: size,
                sector_size,
            });
        }
        if size % config.erase_unit as u64 != 0 {
            log::warn!(
                "Device size {} is not a multiple of the erase unit {}, the last erase unit is partial",
                size,
                config.erase_unit
            );
        }

        log::debug!(
            "Flash emulator: size={}, sector_size={}, erase_unit={}, staging={}, polarity={}",
            size,
            sector_size,
            config.erase_unit,
            STAGING,
            config.program_polarity.as_str()
        );

        Ok(Self {
            state: Mutex::new(State {
                device,
                staging: [ERASED; STAGING],
            }),
            config,
            sector_size,
            size,
        })
    }

    /// Create an emulator with the default erase unit and polarity
    pub fn with_defaults(device: D) -> core::result::Result<Self, ConfigError> {
        Self::new(device, EmulatorConfig::default())
    }

    /// Get the emulation policy
    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// Get the sector size of the underlying device
    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    /// Get the staging buffer capacity
    pub const fn staging_size(&self) -> usize {
        STAGING
    }

    /// Run `f` with exclusive access to the underlying device
    ///
    /// Blocks while another operation is in flight.
    pub fn with_device<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut state.device)
    }

    /// Consume the emulator and return the underlying device
    pub fn into_inner(self) -> D {
        self.state.into_inner().device
    }

    fn check_range(&self, addr: u64, len: u64) -> Result<(), D::Error> {
        if !self.is_valid_range(addr, len) {
            return Err(Error::AddressOutOfBounds {
                addr,
                len,
                size: self.size,
            });
        }
        Ok(())
    }

    /// Erase-unit aligned range covering `[addr, addr + len)`, clipped to the device
    fn erase_bounds(&self, addr: u64, len: u64) -> (u64, u64) {
        let unit = self.config.erase_unit as u64;
        let start = addr / unit * unit;
        let end = (addr + len).div_ceil(unit) * unit;
        (start, end.min(self.size))
    }
}

impl<D: SectorDevice, const STAGING: usize> FlashDevice for FlashEmulator<D, STAGING> {
    type Error = Error<D::Error>;

    fn size(&self) -> u64 {
        self.size
    }

    fn read_size(&self) -> u64 {
        1
    }

    fn program_size(&self) -> u64 {
        1
    }

    fn erase_size(&self) -> u64 {
        self.config.erase_unit as u64
    }

    fn device_type(&self) -> &'static str {
        DEVICE_TYPE
    }

    fn read(&self, buf: &mut [u8], addr: u64) -> Result<(), D::Error> {
        let len = buf.len() as u64;
        self.check_range(addr, len)?;
        if buf.is_empty() {
            return Ok(());
        }
        log::debug!("read 0x{:08X}+0x{:X}", addr, len);

        let mut state = self.state.lock();
        let State { device, staging } = &mut *state;
        let mut pos = 0;

        for window in Windows::new(addr, len, self.sector_size, STAGING) {
            log::trace!(
                "read window 0x{:08X}+0x{:X} via sectors 0x{:08X}+0x{:X}",
                window.addr,
                window.len,
                window.sector_addr,
                window.sector_len
            );
            let sectors = &mut staging[..window.sector_len];
            device
                .read_sectors(window.sector_addr, sectors)
                .map_err(Error::Device)?;
            buf[pos..pos + window.len].copy_from_slice(&sectors[window.staged()]);
            pos += window.len;
        }

        Ok(())
    }

    fn program(&self, data: &[u8], addr: u64) -> Result<(), D::Error> {
        let len = data.len() as u64;
        self.check_range(addr, len)?;
        if data.is_empty() {
            return Ok(());
        }
        log::debug!("program 0x{:08X}+0x{:X}", addr, len);

        let polarity = self.config.program_polarity;
        let mut state = self.state.lock();
        let State { device, staging } = &mut *state;
        let mut pos = 0;

        for window in Windows::new(addr, len, self.sector_size, STAGING) {
            log::trace!(
                "program window 0x{:08X}+0x{:X} via sectors 0x{:08X}+0x{:X}",
                window.addr,
                window.len,
                window.sector_addr,
                window.sector_len
            );
            let sectors = &mut staging[..window.sector_len];
            device
                .read_sectors(window.sector_addr, sectors)
                .map_err(Error::Device)?;
            polarity.merge(&mut sectors[window.staged()], &data[pos..pos + window.len]);
            device
                .write_sectors(window.sector_addr, sectors)
                .map_err(Error::Device)?;
            pos += window.len;
        }

        Ok(())
    }

    fn erase(&self, addr: u64, len: u64) -> Result<(), D::Error> {
        self.check_range(addr, len)?;
        if len == 0 {
            return Ok(());
        }

        let (start, end) = self.erase_bounds(addr, len);
        log::debug!(
            "erase 0x{:08X}+0x{:X} -> 0x{:08X}..0x{:08X}",
            addr,
            len,
            start,
            end
        );

        let sector_size = self.sector_size as usize;
        let mut state = self.state.lock();
        let State { device, staging } = &mut *state;
        let pattern = &mut staging[..sector_size];
        pattern.fill(ERASED);

        // Raw pattern straight to the device: no read-back, no merge
        let mut sector = start;
        while sector < end {
            device
                .write_sectors(sector, pattern)
                .map_err(Error::Device)?;
            sector += sector_size as u64;
        }

        Ok(())
    }
}
