const UNITS: [&str; 8] = ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi"];

/// Convert bytes to a human-readable format using binary prefixes,
/// e.g. `1536` becomes `1.5KiB`.
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{value:3.1}{unit}B");
        }
        value /= 1024.0;
    }
    format!("{value:.1}YiB")
}
