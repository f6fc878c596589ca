//! Disk image sector device implementation

use crate::error::{ImageError, Result};
use log::{debug, info, warn};
use sdflash_core::SectorDevice;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Default sector size (SD/MMC block length)
pub const DEFAULT_SECTOR_SIZE: u32 = 512;

/// Chunk size used when filling a new image
const FILL_CHUNK: usize = 64 * 1024;

/// Configuration for opening a disk image
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Path to the image file or block device node
    pub path: PathBuf,
    /// Sector size in bytes
    pub sector_size: u32,
}

impl ImageConfig {
    /// Create a new configuration for `path` with 512-byte sectors
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sector_size: DEFAULT_SECTOR_SIZE,
        }
    }

    /// Set the sector size
    pub fn with_sector_size(mut self, sector_size: u32) -> Self {
        self.sector_size = sector_size;
        self
    }
}

/// Sector device backed by a disk image or a block device node
///
/// # Example
///
/// ```ignore
/// use sdflash_image::{ImageConfig, ImageDevice};
///
/// let sd = ImageDevice::open(&ImageConfig::new("/dev/mmcblk0"))?;
/// println!("{} bytes", sd.size());
/// ```
pub struct ImageDevice {
    /// Image file handle
    file: File,
    /// Path the image was opened from
    path: PathBuf,
    /// Image size in bytes
    size: u64,
    /// Sector size in bytes
    sector_size: u32,
    /// Whether the image was opened for writing
    writable: bool,
}

impl ImageDevice {
    /// Open an existing image
    ///
    /// Falls back to read-only access if the image cannot be opened for
    /// writing.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The image cannot be opened
    /// - The sector size is zero
    /// - The image size is zero or not a multiple of the sector size
    pub fn open(config: &ImageConfig) -> Result<Self> {
        if config.sector_size == 0 {
            return Err(ImageError::InvalidSectorSize(config.sector_size));
        }

        let path = config.path.clone();
        let (mut file, writable) = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => (file, true),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                warn!("{} is not writable, opening read-only", path.display());
                let file = File::open(&path).map_err(|source| ImageError::Open {
                    path: path.display().to_string(),
                    source,
                })?;
                (file, false)
            }
            Err(source) => {
                return Err(ImageError::Open {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        // Seeking to the end works for block device nodes, whose metadata length is 0
        let size = file.seek(SeekFrom::End(0))?;
        if size == 0 || size % config.sector_size as u64 != 0 {
            return Err(ImageError::InvalidSize {
                size,
                sector_size: config.sector_size,
            });
        }

        info!(
            "Opened {} (size={} bytes, sector_size={} bytes{})",
            path.display(),
            size,
            config.sector_size,
            if writable { "" } else { ", read-only" }
        );

        Ok(Self {
            file,
            path,
            size,
            sector_size: config.sector_size,
            writable,
        })
    }

    /// Create a new image of `size` bytes filled with `fill`, replacing any existing file
    pub fn create(path: impl AsRef<Path>, size: u64, sector_size: u32, fill: u8) -> Result<Self> {
        let path = path.as_ref();
        if sector_size == 0 {
            return Err(ImageError::InvalidSectorSize(sector_size));
        }
        if size == 0 || size % sector_size as u64 != 0 {
            return Err(ImageError::InvalidSize { size, sector_size });
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| ImageError::Open {
                path: path.display().to_string(),
                source,
            })?;

        let chunk = vec![fill; FILL_CHUNK];
        let mut remaining = size;
        while remaining > 0 {
            let step = remaining.min(FILL_CHUNK as u64) as usize;
            file.write_all(&chunk[..step])?;
            remaining -= step as u64;
        }
        file.sync_all()?;

        info!(
            "Created {} ({} bytes, filled with 0x{:02X})",
            path.display(),
            size,
            fill
        );

        Ok(Self {
            file,
            path: path.to_path_buf(),
            size,
            sector_size,
            writable: true,
        })
    }

    /// Get the image path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the image size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether sector writes are allowed
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Flush written data to the storage medium
    pub fn sync(&mut self) -> Result<()> {
        if self.writable {
            self.file.sync_data()?;
        }
        Ok(())
    }

    fn check(&self, offset: u64, len: usize) -> Result<()> {
        let sector = self.sector_size as u64;
        if offset % sector != 0 || len as u64 % sector != 0 {
            return Err(ImageError::Misaligned {
                offset,
                len,
                sector_size: self.sector_size,
            });
        }
        if offset.saturating_add(len as u64) > self.size {
            return Err(ImageError::OutOfRange {
                offset,
                len,
                size: self.size,
            });
        }
        Ok(())
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|source| ImageError::SeekFailed { offset, source })?;
        Ok(())
    }
}

impl SectorDevice for ImageDevice {
    type Error = ImageError;

    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn capacity(&self) -> u64 {
        self.size
    }

    fn read_sectors(&mut self, addr: u64, buf: &mut [u8]) -> Result<()> {
        self.check(addr, buf.len())?;
        self.seek(addr)?;
        self.file
            .read_exact(buf)
            .map_err(|source| ImageError::ReadFailed {
                offset: addr,
                len: buf.len(),
                source,
            })
    }

    fn write_sectors(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(ImageError::NotWritable);
        }
        self.check(addr, data.len())?;
        self.seek(addr)?;
        self.file
            .write_all(data)
            .map_err(|source| ImageError::WriteFailed {
                offset: addr,
                len: data.len(),
                source,
            })
    }
}

impl Drop for ImageDevice {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            debug!("Failed to sync {}: {}", self.path.display(), e);
        }
    }
}

/// Parse backend options from key-value pairs
///
/// # Supported options
/// - `path=FILE` - Image file or block device node (required)
/// - `sector=N` - Sector size in bytes (default 512)
///
/// # Example
/// ```ignore
/// let options = &[("path", "sd.img"), ("sector", "512")];
/// let config = parse_options(options)?;
/// ```
pub fn parse_options(options: &[(&str, &str)]) -> Result<ImageConfig> {
    let mut path: Option<PathBuf> = None;
    let mut sector_size = DEFAULT_SECTOR_SIZE;

    for (key, value) in options {
        match *key {
            "path" | "file" => path = Some(PathBuf::from(value)),
            "sector" | "sector_size" => {
                sector_size = value.parse().map_err(|_| ImageError::InvalidParameter {
                    name: "sector",
                    message: format!("'{}' is not a valid sector size", value),
                })?;
            }
            _ => {
                warn!("Unknown image option: {}={}", key, value);
            }
        }
    }

    let path = path.ok_or(ImageError::MissingParameter("path"))?;

    Ok(ImageConfig::new(path).with_sector_size(sector_size))
}
