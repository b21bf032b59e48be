//! Human-readable byte sizes.

use super::ConfigError;

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Parse a size like `512MB`, `2 GB`, `64kb` or a bare byte count.
pub fn parse_size(input: &str) -> Result<usize, ConfigError> {
    let s = input.trim().to_ascii_uppercase();
    let split = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| ConfigError::InvalidSize(input.to_string()))?;
    let multiplier = match unit.trim() {
        "" | "B" => 1,
        "K" | "KB" => KB,
        "M" | "MB" => MB,
        "G" | "GB" => GB,
        _ => return Err(ConfigError::InvalidSize(input.to_string())),
    };
    Ok((value * multiplier as f64) as usize)
}

/// Format a byte count with the largest unit that keeps it above one.
pub fn format_size(bytes: usize) -> String {
    let b = bytes as u64;
    if b >= GB {
        format!("{:.1} GB", b as f64 / GB as f64)
    } else if b >= MB {
        format!("{:.1} MB", b as f64 / MB as f64)
    } else if b >= KB {
        format!("{:.1} KB", b as f64 / KB as f64)
    } else {
        format!("{} B", b)
    }
}
