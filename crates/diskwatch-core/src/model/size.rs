//! Size formatting utilities: human-readable byte counts.
//!
//! All sizes are `u64` bytes. Floating point is only used at the
//! display-formatting boundary.

/// Label used when the media size was not reported.
pub const UNKNOWN_SIZE: &str = "Unknown";

/// Format a byte count into a human-readable string with appropriate unit.
///
/// Uses binary units (KiB = 1024) but labels them with the short forms
/// (KB, MB, GB) that Finder and Disk Utility users expect. Anything from one
/// gibibyte upwards stays in GB.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.2} KB", b / KB)
    } else if b < GB {
        format!("{:.2} MB", b / MB)
    } else {
        format!("{:.2} GB", b / GB)
    }
}

/// Format a size that may be unknown.
pub fn format_optional_size(bytes: Option<u64>) -> String {
    bytes.map_or_else(|| UNKNOWN_SIZE.to_owned(), format_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_bytes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1023), "1023 B");
    }

    #[test]
    fn test_format_size_kb() {
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
    }

    #[test]
    fn test_format_size_mb() {
        assert_eq!(format_size(1_048_576), "1.00 MB");
        assert_eq!(format_size(1_572_864), "1.50 MB");
    }

    #[test]
    fn test_format_size_gb() {
        assert_eq!(format_size(1_073_741_824), "1.00 GB");
        assert_eq!(format_size(1_610_612_736), "1.50 GB");
        // No TB step: large media stays in GB.
        assert_eq!(format_size(1_099_511_627_776), "1024.00 GB");
    }

    #[test]
    fn test_format_optional_size() {
        assert_eq!(format_optional_size(None), "Unknown");
        assert_eq!(format_optional_size(Some(512)), "512 B");
    }
}
