//! List commands implementation

use crate::backends;

/// List all backends compiled into this build
pub fn list_backends() {
    print!("{}", backends::backend_help());
    println!();
    println!("Backend options are given as name:key=value,...");
    println!("  e.g. image:path=/dev/mmcblk0  or  ram:size=8MiB,fill=0xFF");
}

/// Format a byte count, using the largest unit that divides it evenly
pub fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(4096), "4 KiB");
        assert_eq!(format_size(8 * 1024 * 1024), "8 MiB");
        assert_eq!(format_size(1000), "1000 B");
        assert_eq!(format_size(1536), "1536 B");
    }
}
