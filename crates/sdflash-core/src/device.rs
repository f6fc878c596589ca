//! Byte-addressable flash device trait
//!
//! This is the interface flash-oriented software (translation layers,
//! log-structured filesystems) programs against. [`FlashEmulator`] provides
//! it on top of a sector device; other implementations can be swapped in
//! without changing callers.
//!
//! Operations take `&self`: implementations serialise concurrent callers
//! internally.
//!
//! [`FlashEmulator`]: crate::FlashEmulator

/// Flash-like device with read, program and erase
///
/// # Example
///
/// ```ignore
/// use sdflash_core::FlashDevice;
///
/// fn rewrite_block<F: FlashDevice>(flash: &F, addr: u64, data: &[u8]) -> Result<(), F::Error> {
///     flash.erase(addr, flash.erase_size_at(addr))?;
///     flash.program(data, addr)
/// }
/// ```
pub trait FlashDevice {
    /// Error returned by I/O operations
    type Error;

    /// Total size in bytes
    fn size(&self) -> u64;

    /// Minimum read unit in bytes
    fn read_size(&self) -> u64;

    /// Minimum program unit in bytes
    fn program_size(&self) -> u64;

    /// Erase unit in bytes
    fn erase_size(&self) -> u64;

    /// Erase unit of the region containing `addr`
    ///
    /// Devices with non-uniform erase regions override this; the default is
    /// the uniform [`erase_size`](Self::erase_size).
    fn erase_size_at(&self, _addr: u64) -> u64 {
        self.erase_size()
    }

    /// Identifier for callers that branch on device family
    fn device_type(&self) -> &'static str;

    /// Read `buf.len()` bytes starting at `addr`
    fn read(&self, buf: &mut [u8], addr: u64) -> Result<(), Self::Error>;

    /// Program `data` starting at `addr`
    ///
    /// With flash semantics the target should be erased first; programming
    /// only clears bits.
    fn program(&self, data: &[u8], addr: u64) -> Result<(), Self::Error>;

    /// Erase the erase units covering `[addr, addr + len)` to `0xFF`
    fn erase(&self, addr: u64, len: u64) -> Result<(), Self::Error>;

    /// Check if a range is valid for this device
    fn is_valid_range(&self, addr: u64, len: u64) -> bool {
        match addr.checked_add(len) {
            Some(end) => end <= self.size(),
            None => false,
        }
    }
}

/// Extension trait for FlashDevice that provides additional capabilities
///
/// This is separate from the main trait to keep the core trait minimal and
/// easier to implement, while still providing useful derived functionality.
#[cfg(feature = "alloc")]
pub trait FlashDeviceExt: FlashDevice {
    /// Read the entire device contents
    fn read_all(&self) -> Result<alloc::vec::Vec<u8>, Self::Error> {
        let mut buf = alloc::vec![0u8; self.size() as usize];
        self.read(&mut buf, 0)?;
        Ok(buf)
    }

    /// Erase the entire device
    fn erase_all(&self) -> Result<(), Self::Error> {
        self.erase(0, self.size())
    }
}

#[cfg(feature = "alloc")]
impl<F: FlashDevice + ?Sized> FlashDeviceExt for F {}

impl<F: FlashDevice + ?Sized> FlashDevice for &F {
    type Error = F::Error;

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn read_size(&self) -> u64 {
        (**self).read_size()
    }

    fn program_size(&self) -> u64 {
        (**self).program_size()
    }

    fn erase_size(&self) -> u64 {
        (**self).erase_size()
    }

    fn erase_size_at(&self, addr: u64) -> u64 {
        (**self).erase_size_at(addr)
    }

    fn device_type(&self) -> &'static str {
        (**self).device_type()
    }

    fn read(&self, buf: &mut [u8], addr: u64) -> Result<(), Self::Error> {
        (**self).read(buf, addr)
    }

    fn program(&self, data: &[u8], addr: u64) -> Result<(), Self::Error> {
        (**self).program(data, addr)
    }

    fn erase(&self, addr: u64, len: u64) -> Result<(), Self::Error> {
        (**self).erase(addr, len)
    }
}
