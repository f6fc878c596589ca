//! Backend registration and dispatch
//!
//! This module provides a centralized registry for all sector device
//! backends, with support for feature-gated inclusion and dynamic help text
//! generation. Backends are selected with a string of the form
//! `name` or `name:key1=value1,key2=value2`.

use sdflash_core::{EmulatorConfig, FlashEmulator, SectorDevice};
use thiserror::Error;

#[cfg(feature = "ram")]
use sdflash_dummy::{DummyConfig, DummyError, DummySectorDevice};
#[cfg(feature = "image")]
use sdflash_image::{ImageDevice, ImageError};

/// Staging buffer capacity used by the CLI (32 sectors of 512 bytes)
pub const CLI_STAGING_SIZE: usize = 16 * 1024;

/// Emulated flash as used by all commands
pub type Flash = FlashEmulator<Backend, CLI_STAGING_SIZE>;

/// Information about a backend
pub struct BackendInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<BackendInfo> {
    let mut backends = Vec::new();

    #[cfg(feature = "image")]
    backends.push(BackendInfo {
        name: "image",
        aliases: &["file", "blockdev"],
        description: "Disk image or block device node (path=<file>,sector=<bytes>)",
    });

    #[cfg(feature = "ram")]
    backends.push(BackendInfo {
        name: "ram",
        aliases: &["dummy"],
        description: "Volatile in-memory SD card for testing (size=<bytes>,sector=<bytes>,fill=<byte>)",
    });

    backends
}

/// Generate help text listing all available backends
pub fn backend_help() -> String {
    let backends = available_backends();

    if backends.is_empty() {
        return "No backends available (recompile with backend features enabled)".to_string();
    }

    let mut help = String::from("Available backends:\n");
    for b in &backends {
        help.push_str(&format!("  {:8} - {}\n", b.name, b.description));
        if !b.aliases.is_empty() {
            help.push_str(&format!("  {:8}   aliases: {}\n", "", b.aliases.join(", ")));
        }
    }

    help
}

/// Generate a short list of backend names for CLI help
pub fn backend_names_short() -> String {
    let backends = available_backends();
    let names: Vec<&str> = backends.iter().map(|b| b.name).collect();
    names.join(", ")
}

/// Resolve a backend name or alias to its primary name
pub fn find_backend(name: &str) -> Option<&'static str> {
    available_backends()
        .into_iter()
        .find(|b| b.name == name || b.aliases.contains(&name))
        .map(|b| b.name)
}

/// Parsed backend parameters
#[derive(Debug)]
pub struct BackendParams {
    /// Backend name as given
    pub name: String,
    /// Key-value parameters in the order given
    pub params: Vec<(String, String)>,
}

impl BackendParams {
    /// Borrow the parameters as (&str, &str) pairs
    pub fn options(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Parse a backend string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2"
///
/// # Example
/// ```ignore
/// let params = parse_backend_params("image:path=sd.img")?;
/// assert_eq!(params.name, "image");
/// ```
pub fn parse_backend_params(s: &str) -> Result<BackendParams, Box<dyn std::error::Error>> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    let mut params = Vec::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.push((key.trim().to_string(), value.trim().to_string()));
            } else {
                return Err(
                    format!("Invalid parameter format: '{}' (expected key=value)", opt).into(),
                );
            }
        }
    }

    Ok(BackendParams {
        name: name.to_string(),
        params,
    })
}

/// Errors from any backend, so the emulator has a single device error type
#[derive(Debug, Error)]
pub enum BackendError {
    /// In-memory device error
    #[cfg(feature = "ram")]
    #[error("ram: {0}")]
    Ram(#[from] DummyError),

    /// Disk image error
    #[cfg(feature = "image")]
    #[error("image: {0}")]
    Image(#[from] ImageError),
}

/// A sector device selected at runtime
pub enum Backend {
    /// In-memory device
    #[cfg(feature = "ram")]
    Ram(DummySectorDevice),
    /// Disk image or block device node
    #[cfg(feature = "image")]
    Image(ImageDevice),
}

impl Backend {
    /// Flush pending writes to the medium (no-op for volatile backends)
    pub fn sync(&mut self) -> Result<(), BackendError> {
        match self {
            #[cfg(feature = "ram")]
            Backend::Ram(_) => Ok(()),
            #[cfg(feature = "image")]
            Backend::Image(dev) => Ok(dev.sync()?),
        }
    }
}

impl SectorDevice for Backend {
    type Error = BackendError;

    fn sector_size(&self) -> u32 {
        match self {
            #[cfg(feature = "ram")]
            Backend::Ram(dev) => dev.sector_size(),
            #[cfg(feature = "image")]
            Backend::Image(dev) => dev.sector_size(),
        }
    }

    fn capacity(&self) -> u64 {
        match self {
            #[cfg(feature = "ram")]
            Backend::Ram(dev) => dev.capacity(),
            #[cfg(feature = "image")]
            Backend::Image(dev) => dev.capacity(),
        }
    }

    fn read_sectors(&mut self, addr: u64, buf: &mut [u8]) -> Result<(), BackendError> {
        match self {
            #[cfg(feature = "ram")]
            Backend::Ram(dev) => Ok(dev.read_sectors(addr, buf)?),
            #[cfg(feature = "image")]
            Backend::Image(dev) => Ok(dev.read_sectors(addr, buf)?),
        }
    }

    fn write_sectors(&mut self, addr: u64, data: &[u8]) -> Result<(), BackendError> {
        match self {
            #[cfg(feature = "ram")]
            Backend::Ram(dev) => Ok(dev.write_sectors(addr, data)?),
            #[cfg(feature = "image")]
            Backend::Image(dev) => Ok(dev.write_sectors(addr, data)?),
        }
    }
}

/// Parse ram backend options
#[cfg(feature = "ram")]
fn parse_ram_options(options: &[(&str, &str)]) -> Result<DummyConfig, Box<dyn std::error::Error>> {
    use sdflash_core::config::parse_size;

    let mut config = DummyConfig::default();
    for (key, value) in options {
        match *key {
            "size" => config.size = usize::try_from(parse_size(value)?)?,
            "sector" | "sector_size" => config.sector_size = value.parse()?,
            "fill" => config.fill = crate::cli::parse_byte(value)?,
            _ => log::warn!("Unknown ram option: {}={}", key, value),
        }
    }
    Ok(config)
}

/// Open a backend by specification string
pub fn open_backend(spec: &str) -> Result<Backend, Box<dyn std::error::Error>> {
    let params = parse_backend_params(spec)?;
    let options = params.options();

    let name = find_backend(&params.name).ok_or_else(|| {
        format!(
            "Unknown backend: '{}'\n\n{}",
            params.name,
            backend_help()
        )
    })?;

    match name {
        #[cfg(feature = "image")]
        "image" => Ok(Backend::Image(sdflash_image::open_image(&options)?)),
        #[cfg(feature = "ram")]
        "ram" => {
            let config = parse_ram_options(&options)?;
            log::info!(
                "Using volatile ram backend ({} bytes, sector_size={})",
                config.size,
                config.sector_size
            );
            Ok(Backend::Ram(DummySectorDevice::new(config)))
        }
        _ => Err(format!("Backend '{}' is not supported in this build", name).into()),
    }
}

/// Open a backend and wrap it in the flash emulator
pub fn open_flash(
    spec: &str,
    config: EmulatorConfig,
) -> Result<Flash, Box<dyn std::error::Error>> {
    let backend = open_backend(spec)?;
    Ok(FlashEmulator::new(backend, config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdflash_core::FlashDevice;

    #[test]
    fn test_parse_backend_params() {
        let params = parse_backend_params("image:path=sd.img,sector=512").unwrap();
        assert_eq!(params.name, "image");
        assert_eq!(
            params.options(),
            vec![("path", "sd.img"), ("sector", "512")]
        );

        let params = parse_backend_params("ram").unwrap();
        assert_eq!(params.name, "ram");
        assert!(params.params.is_empty());

        assert!(parse_backend_params("ram:size").is_err());
    }

    #[test]
    fn test_find_backend_aliases() {
        assert_eq!(find_backend("dummy"), Some("ram"));
        assert_eq!(find_backend("file"), Some("image"));
        assert_eq!(find_backend("spi"), None);
    }

    #[test]
    fn test_open_unknown_backend() {
        assert!(open_backend("floppy").is_err());
    }

    #[test]
    fn test_open_ram_flash() {
        let flash = open_flash("ram:size=64KiB,fill=0x00", EmulatorConfig::default()).unwrap();
        assert_eq!(flash.size(), 64 * 1024);
        assert_eq!(flash.erase_size(), 4096);

        flash.erase(0, 1).unwrap();
        let mut buf = [0u8; 2];
        flash.read(&mut buf, 4095).unwrap();
        assert_eq!(buf, [0xFF, 0x00]);
    }

    #[test]
    fn test_ram_fill_is_decimal_or_hex() {
        assert_eq!(parse_ram_options(&[("fill", "10")]).unwrap().fill, 10);
        assert_eq!(parse_ram_options(&[("fill", "255")]).unwrap().fill, 255);
        assert_eq!(parse_ram_options(&[("fill", "0xFF")]).unwrap().fill, 0xFF);
        assert_eq!(parse_ram_options(&[("fill", "0x10")]).unwrap().fill, 0x10);
        assert!(parse_ram_options(&[("fill", "256")]).is_err());
    }

    #[test]
    fn test_ram_size_option() {
        let config = parse_ram_options(&[("size", "8MiB"), ("sector", "4096")]).unwrap();
        assert_eq!(config.size, 8 * 1024 * 1024);
        assert_eq!(config.sector_size, 4096);
    }

    #[test]
    fn test_open_rejects_partial_trailing_sector() {
        assert!(open_flash("ram:size=1000", EmulatorConfig::default()).is_err());
    }

    #[test]
    fn test_open_rejects_bad_erase_unit() {
        let config = EmulatorConfig::default().with_erase_unit(1000);
        assert!(open_flash("ram:size=64KiB", config).is_err());
    }
}
