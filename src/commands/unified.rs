//! Command implementations that work with any FlashDevice
//!
//! These commands work the same way regardless of which sector device backs
//! the emulated flash. Long transfers are split into chunks so progress can
//! be reported; the emulator splits each chunk further into sector windows.

use super::list::format_size;
use indicatif::{ProgressBar, ProgressStyle};
use sdflash_core::FlashDevice;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Bytes per read/program call
const CHUNK_SIZE: usize = 64 * 1024;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// =============================================================================
// Helper functions
// =============================================================================

/// Print flash size information
fn print_flash_size(flash_size: u64) {
    println!(
        "Flash size: {} bytes ({} KiB)",
        flash_size,
        flash_size / 1024
    );
}

/// Read file contents into a Vec
fn read_file(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    println!("Read {} bytes from {:?}", data.len(), path);
    Ok(data)
}

/// Create a progress bar with custom phase message
fn create_progress_bar_with_phase(
    total: u64,
    phase: &str,
) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Resolve `[start, start + length)` against the device, defaulting to the end
fn resolve_range<D: FlashDevice + ?Sized>(
    device: &D,
    start: u64,
    length: Option<u64>,
) -> Result<u64, Box<dyn std::error::Error>> {
    let size = device.size();
    let length = length.unwrap_or_else(|| size.saturating_sub(start));
    if !device.is_valid_range(start, length) {
        return Err(format!(
            "Range 0x{:08X}+0x{:X} exceeds flash size ({} bytes)",
            start, length, size
        )
        .into());
    }
    Ok(length)
}

/// Compare a chunk against expected data, reporting the first mismatch
fn verify_chunk(actual: &[u8], expected: &[u8], base: u64) -> CmdResult {
    if let Some(i) = actual.iter().zip(expected).position(|(a, e)| a != e) {
        return Err(format!(
            "Verification failed at 0x{:08X}: expected 0x{:02X}, found 0x{:02X}",
            base + i as u64,
            expected[i],
            actual[i]
        )
        .into());
    }
    Ok(())
}

// =============================================================================
// Commands
// =============================================================================

/// Show emulated flash geometry
pub fn run_info<D>(device: &D, sector_size: u32, polarity: &str) -> CmdResult
where
    D: FlashDevice + ?Sized,
{
    println!("Type:         {}", device.device_type());
    println!(
        "Size:         {} bytes ({})",
        device.size(),
        format_size(device.size())
    );
    println!("Sector size:  {} bytes", sector_size);
    println!("Read size:    {} bytes", device.read_size());
    println!("Program size: {} bytes", device.program_size());
    println!(
        "Erase size:   {} bytes ({})",
        device.erase_size(),
        format_size(device.erase_size())
    );
    println!("Polarity:     {}", polarity);
    Ok(())
}

/// Read a range of emulated flash to a file
pub fn run_read<D>(device: &D, output: &Path, start: u64, length: Option<u64>) -> CmdResult
where
    D: FlashDevice + ?Sized,
    D::Error: std::error::Error + 'static,
{
    print_flash_size(device.size());
    let length = resolve_range(device, start, length)?;

    let mut data = vec![0u8; length as usize];
    let pb = create_progress_bar_with_phase(length, "Reading")?;

    for (i, chunk) in data.chunks_mut(CHUNK_SIZE).enumerate() {
        let offset = start + (i * CHUNK_SIZE) as u64;
        if let Err(e) = device.read(chunk, offset) {
            pb.abandon_with_message("Read failed!");
            return Err(e.into());
        }
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("Read complete");

    let mut file = File::create(output)?;
    file.write_all(&data)?;

    println!("Wrote {} bytes to {:?}", data.len(), output);
    Ok(())
}

/// Program a file into emulated flash
pub fn run_program<D>(device: &D, input: &Path, start: u64, erase: bool, verify: bool) -> CmdResult
where
    D: FlashDevice + ?Sized,
    D::Error: std::error::Error + 'static,
{
    print_flash_size(device.size());
    let data = read_file(input)?;
    resolve_range(device, start, Some(data.len() as u64))?;

    if erase && !data.is_empty() {
        log::info!(
            "Erasing 0x{:08X}+0x{:X} (rounded to {}-byte erase units)",
            start,
            data.len(),
            device.erase_size()
        );
        device.erase(start, data.len() as u64)?;
    }

    let pb = create_progress_bar_with_phase(data.len() as u64, "Programming")?;
    for (i, chunk) in data.chunks(CHUNK_SIZE).enumerate() {
        let offset = start + (i * CHUNK_SIZE) as u64;
        if let Err(e) = device.program(chunk, offset) {
            pb.abandon_with_message("Program failed! Range contents are indeterminate");
            return Err(e.into());
        }
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("Program complete");

    if verify {
        verify_range(device, &data, start)?;
        println!("Verification passed!");
    }

    println!("Programmed {} bytes at 0x{:08X}", data.len(), start);
    Ok(())
}

/// Erase a range of emulated flash
pub fn run_erase<D>(device: &D, start: u64, length: Option<u64>) -> CmdResult
where
    D: FlashDevice + ?Sized,
    D::Error: std::error::Error + 'static,
{
    print_flash_size(device.size());
    let length = resolve_range(device, start, length)?;
    if length == 0 {
        println!("Nothing to erase");
        return Ok(());
    }

    let unit = device.erase_size();
    let first = start / unit * unit;
    let end = (start + length).div_ceil(unit) * unit;
    println!(
        "Erasing 0x{:08X} - 0x{:08X} ({} erase units)",
        first,
        end.min(device.size()),
        (end - first) / unit
    );

    let pb = create_progress_bar_with_phase(end - first, "Erasing")?;
    let mut offset = first;
    while offset < end {
        let step = unit.min(end - offset);
        let request_start = offset.max(start);
        let request_end = (offset + step).min(start + length);
        if let Err(e) = device.erase(request_start, request_end - request_start) {
            pb.abandon_with_message("Erase failed! Range contents are indeterminate");
            return Err(e.into());
        }
        pb.inc(step);
        offset += step;
    }
    pb.finish_with_message("Erase complete");

    Ok(())
}

/// Verify emulated flash contents against a file
pub fn run_verify<D>(device: &D, input: &Path, start: u64) -> CmdResult
where
    D: FlashDevice + ?Sized,
    D::Error: std::error::Error + 'static,
{
    print_flash_size(device.size());
    let expected = read_file(input)?;
    resolve_range(device, start, Some(expected.len() as u64))?;

    verify_range(device, &expected, start)?;
    println!("Verification passed!");
    Ok(())
}

/// Read back `[start, start + expected.len())` and compare
fn verify_range<D>(device: &D, expected: &[u8], start: u64) -> CmdResult
where
    D: FlashDevice + ?Sized,
    D::Error: std::error::Error + 'static,
{
    let pb = create_progress_bar_with_phase(expected.len() as u64, "Verifying")?;
    let mut buf = vec![0u8; CHUNK_SIZE];

    for (i, expected_chunk) in expected.chunks(CHUNK_SIZE).enumerate() {
        let offset = start + (i * CHUNK_SIZE) as u64;
        let chunk = &mut buf[..expected_chunk.len()];
        device.read(chunk, offset)?;

        if let Err(e) = verify_chunk(chunk, expected_chunk, offset) {
            pb.abandon_with_message("Verification failed!");
            return Err(e);
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(())
}

/// Create a new disk image
#[cfg(feature = "image")]
pub fn run_create(output: &Path, size: u64, sector_size: u32, fill: u8) -> CmdResult {
    let image = sdflash_image::ImageDevice::create(output, size, sector_size, fill)?;
    println!(
        "Created {:?}: {} bytes ({}), {}-byte sectors, filled with 0x{:02X}",
        image.path(),
        image.size(),
        format_size(image.size()),
        sector_size,
        fill
    );
    Ok(())
}
