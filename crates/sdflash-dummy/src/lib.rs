//! sdflash-dummy - In-memory sector device for testing
//!
//! This crate provides a RAM-backed [`SectorDevice`] that behaves like a
//! strict SD card: it only accepts whole, aligned sectors, records every
//! transfer, and can be told to fail a specific read or write. It's useful
//! for testing flash emulation without real hardware.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use core::fmt;
use sdflash_core::SectorDevice;

/// Kind of sector transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Sector read
    Read,
    /// Sector write
    Write,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Read => write!(f, "read"),
            Op::Write => write!(f, "write"),
        }
    }
}

/// A completed sector transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// Transfer direction
    pub op: Op,
    /// Byte address of the first sector
    pub addr: u64,
    /// Length in bytes
    pub len: usize,
}

/// Errors reported by the dummy sector device
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DummyError {
    /// Address or length is not a multiple of the sector size
    #[error("{op} at 0x{addr:08X}+0x{len:X} is not aligned to {sector_size}-byte sectors")]
    Misaligned {
        op: Op,
        addr: u64,
        len: usize,
        sector_size: u32,
    },

    /// Transfer extends beyond the end of the device
    #[error("{op} at 0x{addr:08X}+0x{len:X} is beyond device size 0x{size:X}")]
    OutOfRange {
        op: Op,
        addr: u64,
        len: usize,
        size: u64,
    },

    /// Failure requested through fault injection
    #[error("injected {op} failure at 0x{addr:08X}")]
    Injected { op: Op, addr: u64 },
}

/// Configuration for the dummy sector device
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Device size in bytes
    pub size: usize,
    /// Sector size in bytes
    pub sector_size: u32,
    /// Initial content of every byte
    pub fill: u8,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            size: 1024 * 1024,
            sector_size: 512,
            fill: 0x00,
        }
    }
}

impl DummyConfig {
    /// Configuration for a device of `size` bytes with 512-byte sectors
    pub fn with_size(size: usize) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }
}

/// RAM-backed sector device
///
/// Starts filled with [`DummyConfig::fill`] (zeroes by default, like a fresh
/// SD card).
#[cfg(feature = "alloc")]
pub struct DummySectorDevice {
    config: DummyConfig,
    data: Vec<u8>,
    transfers: Vec<Transfer>,
    read_fault: Option<usize>,
    write_fault: Option<usize>,
}

#[cfg(feature = "alloc")]
impl DummySectorDevice {
    /// Create a new dummy device with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        if config.sector_size == 0 || config.size % config.sector_size as usize != 0 {
            log::warn!(
                "Dummy device size {} is not a multiple of the sector size {}",
                config.size,
                config.sector_size
            );
        }
        let data = vec![config.fill; config.size];
        Self {
            config,
            data,
            transfers: Vec::new(),
            read_fault: None,
            write_fault: None,
        }
    }

    /// Create a new dummy device with default configuration (1 MiB, 512-byte sectors)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy device with pre-filled data
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut dev = Self::new(config);
        let len = core::cmp::min(initial_data.len(), dev.data.len());
        dev.data[..len].copy_from_slice(&initial_data[..len]);
        dev
    }

    /// Get a reference to the device data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the device data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// All successful transfers since creation or the last clear
    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    /// Forget recorded transfers
    pub fn clear_transfers(&mut self) {
        self.transfers.clear();
    }

    /// Number of recorded transfers of the given kind
    pub fn count(&self, op: Op) -> usize {
        self.transfers.iter().filter(|t| t.op == op).count()
    }

    /// Fail the read that follows `skip` successful reads
    ///
    /// The fault fires once and is then cleared.
    pub fn fail_read_after(&mut self, skip: usize) {
        self.read_fault = Some(skip);
    }

    /// Fail the write that follows `skip` successful writes
    ///
    /// The fault fires once and is then cleared.
    pub fn fail_write_after(&mut self, skip: usize) {
        self.write_fault = Some(skip);
    }

    fn check(&self, op: Op, addr: u64, len: usize) -> Result<(), DummyError> {
        let sector = self.config.sector_size as u64;
        if addr % sector != 0 || len as u64 % sector != 0 {
            return Err(DummyError::Misaligned {
                op,
                addr,
                len,
                sector_size: self.config.sector_size,
            });
        }
        if addr.saturating_add(len as u64) > self.data.len() as u64 {
            return Err(DummyError::OutOfRange {
                op,
                addr,
                len,
                size: self.data.len() as u64,
            });
        }
        Ok(())
    }

    fn fault(slot: &mut Option<usize>, op: Op, addr: u64) -> Result<(), DummyError> {
        match slot {
            Some(0) => {
                *slot = None;
                log::debug!("dummy: injecting {} failure at 0x{:08X}", op, addr);
                Err(DummyError::Injected { op, addr })
            }
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[cfg(feature = "alloc")]
impl SectorDevice for DummySectorDevice {
    type Error = DummyError;

    fn sector_size(&self) -> u32 {
        self.config.sector_size
    }

    fn capacity(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_sectors(&mut self, addr: u64, buf: &mut [u8]) -> Result<(), DummyError> {
        self.check(Op::Read, addr, buf.len())?;
        Self::fault(&mut self.read_fault, Op::Read, addr)?;

        let start = addr as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        self.transfers.push(Transfer {
            op: Op::Read,
            addr,
            len: buf.len(),
        });
        Ok(())
    }

    fn write_sectors(&mut self, addr: u64, data: &[u8]) -> Result<(), DummyError> {
        self.check(Op::Write, addr, data.len())?;
        Self::fault(&mut self.write_fault, Op::Write, addr)?;

        let start = addr as usize;
        self.data[start..start + data.len()].copy_from_slice(data);
        self.transfers.push(Transfer {
            op: Op::Write,
            addr,
            len: data.len(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sdflash_core::{EmulatorConfig, Error, FlashDevice, FlashDeviceExt, FlashEmulator, ProgramPolarity};

    const SIZE: usize = 32 * 1024;

    fn emulator<const N: usize>(
        polarity: ProgramPolarity,
        initial: &[u8],
    ) -> FlashEmulator<DummySectorDevice, N> {
        let dev = DummySectorDevice::with_data(DummyConfig::with_size(SIZE), initial);
        let config = EmulatorConfig::default().with_polarity(polarity);
        FlashEmulator::new(dev, config).unwrap()
    }

    /// Deterministic non-trivial background so edge corruption shows up
    fn background() -> Vec<u8> {
        (0..SIZE).map(|i| (i as u8).wrapping_mul(31) ^ 0x5A).collect()
    }

    #[test]
    fn test_rejects_misaligned_access() {
        let mut dev = DummySectorDevice::new_default();
        let mut buf = [0u8; 512];
        assert!(matches!(
            dev.read_sectors(100, &mut buf),
            Err(DummyError::Misaligned { op: Op::Read, .. })
        ));
        assert!(matches!(
            dev.write_sectors(0, &buf[..100]),
            Err(DummyError::Misaligned { op: Op::Write, .. })
        ));
        assert!(matches!(
            dev.read_sectors(1024 * 1024, &mut buf),
            Err(DummyError::OutOfRange { .. })
        ));
        assert!(dev.transfers().is_empty());
    }

    #[test]
    fn test_fault_fires_once() {
        let mut dev = DummySectorDevice::new_default();
        let buf = [0xAB; 512];
        dev.fail_write_after(1);
        dev.write_sectors(0, &buf).unwrap();
        assert_eq!(
            dev.write_sectors(512, &buf),
            Err(DummyError::Injected {
                op: Op::Write,
                addr: 512
            })
        );
        dev.write_sectors(512, &buf).unwrap();
        assert_eq!(dev.count(Op::Write), 2);
        assert!(dev.data()[..1024].iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_error_display() {
        let e = DummyError::Injected {
            op: Op::Read,
            addr: 0x200,
        };
        assert_eq!(e.to_string(), "injected read failure at 0x00000200");
    }

    #[test]
    fn test_fresh_card_reads_zero_until_erased() {
        let flash = emulator::<512>(ProgramPolarity::ClearOnly, &[]);
        let mut buf = [0xAAu8; 64];
        flash.read(&mut buf, 1000).unwrap();
        assert_eq!(buf, [0u8; 64]);

        flash.erase_all().unwrap();
        let all = flash.read_all().unwrap();
        assert_eq!(all.len(), SIZE);
        assert!(all.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_erase_unit_boundaries() {
        let bg = background();
        let flash = emulator::<512>(ProgramPolarity::ClearOnly, &bg);

        // Middle of the second erase unit only
        flash.erase(4096 + 1000, 10).unwrap();

        flash.with_device(|dev| {
            assert_eq!(&dev.data()[..4096], &bg[..4096]);
            assert!(dev.data()[4096..8192].iter().all(|&b| b == 0xFF));
            assert_eq!(&dev.data()[8192..], &bg[8192..]);
            assert_eq!(dev.count(Op::Read), 0);
            assert_eq!(dev.count(Op::Write), 8);
        });
    }

    #[test]
    fn test_custom_erase_unit() {
        let dev = DummySectorDevice::new(DummyConfig::with_size(SIZE));
        let config = EmulatorConfig::new(16 * 1024, ProgramPolarity::ClearOnly);
        let flash: FlashEmulator<_> = FlashEmulator::new(dev, config).unwrap();
        assert_eq!(flash.erase_size(), 16 * 1024);

        flash.erase(20000, 1).unwrap();
        flash.with_device(|dev| {
            assert!(dev.data()[..16384].iter().all(|&b| b == 0x00));
            assert!(dev.data()[16384..].iter().all(|&b| b == 0xFF));
        });
    }

    #[test]
    fn test_boxed_device_sees_direct_edits() {
        let mut dev = Box::new(DummySectorDevice::new(DummyConfig::with_size(SIZE)));
        assert_eq!(dev.config().sector_size, 512);
        dev.data_mut()[4096..4100].copy_from_slice(b"card");

        let flash: FlashEmulator<Box<DummySectorDevice>> =
            FlashEmulator::with_defaults(dev).unwrap();
        let mut buf = [0u8; 4];
        flash.read(&mut buf, 4096).unwrap();
        assert_eq!(&buf, b"card");
    }

    #[test]
    fn test_emulator_rejects_partial_trailing_sector() {
        let dev = DummySectorDevice::new(DummyConfig::with_size(8192 + 100));
        assert!(matches!(
            FlashEmulator::<_>::with_defaults(dev),
            Err(sdflash_core::ConfigError::CapacityMisaligned { capacity: 8292, .. })
        ));
    }

    #[test]
    fn test_program_error_surfaces_device_error() {
        let flash = emulator::<1024>(ProgramPolarity::Overwrite, &[]);
        flash.with_device(|dev| dev.fail_read_after(2));

        let result = flash.program(&[0x42; 4000], 0);
        assert_eq!(
            result,
            Err(Error::Device(DummyError::Injected {
                op: Op::Read,
                addr: 2048
            }))
        );

        // The first two windows landed, nothing after
        flash.with_device(|dev| {
            assert!(dev.data()[..2048].iter().all(|&b| b == 0x42));
            assert!(dev.data()[2048..].iter().all(|&b| b == 0x00));
        });

        // Lock was released: the retry goes through
        flash.program(&[0x42; 4000], 0).unwrap();
        let mut buf = vec![0u8; 4000];
        flash.read(&mut buf, 0).unwrap();
        assert!(buf.iter().all(|&b| b == 0x42));
    }

    #[test]
    fn test_erase_error_surfaces_device_error() {
        let flash = emulator::<512>(ProgramPolarity::ClearOnly, &[]);
        flash.with_device(|dev| dev.fail_write_after(0));

        assert!(matches!(
            flash.erase(0, 4096),
            Err(Error::Device(DummyError::Injected { op: Op::Write, addr: 0 }))
        ));
        flash.erase(0, 4096).unwrap();
    }

    #[test]
    fn test_single_byte_program_touches_one_sector() {
        let flash = emulator::<4096>(ProgramPolarity::ClearOnly, &[]);
        flash.with_device(|dev| dev.clear_transfers());

        flash.program(&[0x00], 7000).unwrap();
        flash.with_device(|dev| {
            assert_eq!(
                dev.transfers(),
                &[
                    Transfer {
                        op: Op::Read,
                        addr: 6656,
                        len: 512
                    },
                    Transfer {
                        op: Op::Write,
                        addr: 6656,
                        len: 512
                    },
                ]
            );
        });
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_overwrite_round_trip_preserves_edges(
            addr in 0usize..SIZE,
            data in proptest::collection::vec(any::<u8>(), 0..3000),
        ) {
            let len = data.len().min(SIZE - addr);
            let data = &data[..len];
            let bg = background();
            let flash = emulator::<1024>(ProgramPolarity::Overwrite, &bg);

            flash.program(data, addr as u64).unwrap();

            let mut out = vec![0u8; len];
            flash.read(&mut out, addr as u64).unwrap();
            prop_assert_eq!(&out[..], data);

            let all = flash.read_all().unwrap();
            prop_assert_eq!(&all[..addr], &bg[..addr]);
            prop_assert_eq!(&all[addr + len..], &bg[addr + len..]);
        }

        #[test]
        fn prop_clear_only_ands(
            addr in 0usize..SIZE - 2048,
            a in proptest::collection::vec(any::<u8>(), 1..2048),
            b in proptest::collection::vec(any::<u8>(), 1..2048),
        ) {
            let len = a.len().min(b.len());
            let bg = background();
            let flash = emulator::<512>(ProgramPolarity::ClearOnly, &bg);
            flash.erase(addr as u64, len as u64).unwrap();
            let before = flash.read_all().unwrap();

            flash.program(&a[..len], addr as u64).unwrap();
            flash.program(&b[..len], addr as u64).unwrap();

            let after = flash.read_all().unwrap();
            for i in 0..len {
                prop_assert_eq!(after[addr + i], a[i] & b[i]);
            }
            // No bit ever goes from 0 to 1
            for (old, new) in before.iter().zip(after.iter()) {
                prop_assert_eq!(new & !old, 0);
            }
        }

        #[test]
        fn prop_erase_covers_whole_units(
            addr in 0usize..SIZE,
            len in 1usize..10000,
        ) {
            let len = len.min(SIZE - addr);
            let bg = background();
            let flash = emulator::<512>(ProgramPolarity::ClearOnly, &bg);
            flash.erase(addr as u64, len as u64).unwrap();

            let start = addr / 4096 * 4096;
            let end = (addr + len).div_ceil(4096) * 4096;
            let all = flash.read_all().unwrap();
            prop_assert!(all[start..end].iter().all(|&x| x == 0xFF));
            prop_assert_eq!(&all[..start], &bg[..start]);
            prop_assert_eq!(&all[end..], &bg[end..]);
        }
    }
}
