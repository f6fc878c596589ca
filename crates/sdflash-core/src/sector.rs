//! Sector device abstraction
//!
//! A sector device only understands whole, aligned sectors. Everything
//! byte-granular is built on top of it by the emulator.

/// Block device with uniform, sector-granular read and write
///
/// Implementations include SD cards, eMMC, disk images and RAM disks.
/// Every address and buffer length passed in is a multiple of
/// [`sector_size`](Self::sector_size); implementations may reject anything
/// else.
pub trait SectorDevice {
    /// Device specific error, passed through the emulator unchanged
    type Error;

    /// Sector size in bytes (e.g. 512 for SD cards)
    ///
    /// Must not change over the device lifetime.
    fn sector_size(&self) -> u32;

    /// Total device size in bytes
    fn capacity(&self) -> u64;

    /// Read whole sectors starting at byte address `addr` into `buf`
    fn read_sectors(&mut self, addr: u64, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write whole sectors from `data` starting at byte address `addr`
    fn write_sectors(&mut self, addr: u64, data: &[u8]) -> Result<(), Self::Error>;
}

impl<D: SectorDevice + ?Sized> SectorDevice for &mut D {
    type Error = D::Error;

    fn sector_size(&self) -> u32 {
        (**self).sector_size()
    }

    fn capacity(&self) -> u64 {
        (**self).capacity()
    }

    fn read_sectors(&mut self, addr: u64, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read_sectors(addr, buf)
    }

    fn write_sectors(&mut self, addr: u64, data: &[u8]) -> Result<(), Self::Error> {
        (**self).write_sectors(addr, data)
    }
}

#[cfg(feature = "alloc")]
impl<D: SectorDevice + ?Sized> SectorDevice for alloc::boxed::Box<D> {
    type Error = D::Error;

    fn sector_size(&self) -> u32 {
        (**self).sector_size()
    }

    fn capacity(&self) -> u64 {
        (**self).capacity()
    }

    fn read_sectors(&mut self, addr: u64, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read_sectors(addr, buf)
    }

    fn write_sectors(&mut self, addr: u64, data: &[u8]) -> Result<(), Self::Error> {
        (**self).write_sectors(addr, data)
    }
}

/// One staging-buffer-sized piece of a byte-granular request
///
/// The covering sector range `[sector_addr, sector_addr + sector_len)` always
/// fits in the staging buffer, and the requested bytes sit at `offset` inside
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorWindow {
    /// Byte address of the first requested byte
    pub addr: u64,
    /// Number of requested bytes in this window
    pub len: usize,
    /// Offset of `addr` within its sector (and within the staging buffer)
    pub offset: usize,
    /// Byte address of the first covering sector
    pub sector_addr: u64,
    /// Length of the covering sector range in bytes
    pub sector_len: usize,
}

impl SectorWindow {
    /// Compute the next window for `remaining` bytes starting at `addr`
    ///
    /// `remaining` must be non-zero and `staging` a non-zero multiple of
    /// `sector_size`.
    pub fn next(addr: u64, remaining: u64, sector_size: u32, staging: usize) -> Self {
        let sector_size = sector_size as u64;
        let offset = addr % sector_size;
        let len = remaining.min(staging as u64 - offset);
        let begin_sector = addr / sector_size;
        let end_sector = (addr + len).div_ceil(sector_size);
        Self {
            addr,
            len: len as usize,
            offset: offset as usize,
            sector_addr: begin_sector * sector_size,
            sector_len: ((end_sector - begin_sector) * sector_size) as usize,
        }
    }

    /// Byte range of the requested data inside the staging buffer
    pub fn staged(&self) -> core::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Iterator splitting a byte range into [`SectorWindow`]s
#[derive(Debug, Clone)]
pub struct Windows {
    addr: u64,
    remaining: u64,
    sector_size: u32,
    staging: usize,
}

impl Windows {
    /// Split `[addr, addr + len)` into windows for the given geometry
    pub fn new(addr: u64, len: u64, sector_size: u32, staging: usize) -> Self {
        Self {
            addr,
            remaining: len,
            sector_size,
            staging,
        }
    }
}

impl Iterator for Windows {
    type Item = SectorWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let window = SectorWindow::next(self.addr, self.remaining, self.sector_size, self.staging);
        self.addr += window.len as u64;
        self.remaining -= window.len as u64;
        Some(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[test]
    fn test_window_aligned() {
        let w = SectorWindow::next(0, 512, 512, 512);
        assert_eq!(w.offset, 0);
        assert_eq!(w.len, 512);
        assert_eq!(w.sector_addr, 0);
        assert_eq!(w.sector_len, 512);
    }

    #[test]
    fn test_window_unaligned_start_is_truncated_to_staging() {
        // 100 bytes into sector 1, staging holds one sector
        let w = SectorWindow::next(612, 1000, 512, 512);
        assert_eq!(w.offset, 100);
        assert_eq!(w.len, 412);
        assert_eq!(w.sector_addr, 512);
        assert_eq!(w.sector_len, 512);
        assert_eq!(w.staged(), 100..512);
    }

    #[test]
    fn test_window_small_inside_sector() {
        let w = SectorWindow::next(5, 2, 512, 2048);
        assert_eq!(w.offset, 5);
        assert_eq!(w.len, 2);
        assert_eq!(w.sector_addr, 0);
        assert_eq!(w.sector_len, 512);
    }

    #[test]
    fn test_window_spans_sectors_within_staging() {
        let w = SectorWindow::next(500, 100, 512, 2048);
        assert_eq!(w.len, 100);
        assert_eq!(w.sector_addr, 0);
        assert_eq!(w.sector_len, 1024);
    }

    #[test]
    fn test_windows_cover_range_exactly() {
        let windows: Vec<_> = Windows::new(300, 3000, 512, 1024).collect();
        let total: usize = windows.iter().map(|w| w.len).sum();
        assert_eq!(total, 3000);

        let mut expected = 300u64;
        for w in &windows {
            assert_eq!(w.addr, expected);
            assert!(w.sector_len <= 1024);
            assert_eq!(w.sector_len % 512, 0);
            assert!(w.sector_addr <= w.addr);
            assert!(w.addr + w.len as u64 <= w.sector_addr + w.sector_len as u64);
            expected += w.len as u64;
        }

        // First window: 300..1024, then whole 1024-byte windows
        assert_eq!(windows[0].len, 724);
        assert_eq!(windows[1].addr, 1024);
        assert_eq!(windows[1].len, 1024);
    }

    #[test]
    fn test_windows_empty_range() {
        assert_eq!(Windows::new(1234, 0, 512, 512).count(), 0);
    }
}
