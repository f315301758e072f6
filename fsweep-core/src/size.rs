use crate::error::{Result, ScanError};

/// Format bytes into human-readable string
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.1} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Parse a human size string ("512", "1KB", "1.5MB", "inf") into bytes.
///
/// Units are 1024-based. Suffixes are matched longest-first so "1KB" is
/// not read as "1K" + "B". "inf" means no limit (u64::MAX).
pub fn parse_size(s: &str) -> Result<u64> {
    let trimmed = s.trim();
    if trimmed.eq_ignore_ascii_case("inf") {
        return Ok(u64::MAX);
    }

    const UNITS: [(&str, u64); 5] = [
        ("TB", 1 << 40),
        ("GB", 1 << 30),
        ("MB", 1 << 20),
        ("KB", 1 << 10),
        ("B", 1),
    ];

    let upper = trimmed.to_ascii_uppercase();
    for (suffix, multiplier) in UNITS {
        if let Some(num_str) = upper.strip_suffix(suffix) {
            let num: f64 = num_str
                .trim()
                .parse()
                .map_err(|_| ScanError::InvalidSizeUnit(s.to_string()))?;
            if num < 0.0 || !num.is_finite() {
                return Err(ScanError::InvalidSizeUnit(s.to_string()));
            }
            return Ok((num * multiplier as f64) as u64);
        }
    }

    // No unit suffix, plain byte count
    trimmed
        .parse::<u64>()
        .map_err(|_| ScanError::InvalidSizeUnit(s.to_string()))
}

/// Format a number with thousand separators (e.g., 1,234,567)
pub fn format_count(n: u64) -> String {
    if n < 1000 {
        return n.to_string();
    }

    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);

    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result
}
