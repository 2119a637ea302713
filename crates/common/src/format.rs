//! Human-readable formatting for sizes and durations.

/// Format a byte count as mebibytes with two decimals, or `N/A`.
pub fn fmt_bytes(bytes: Option<u64>) -> String {
    match bytes {
        Some(n) if n > 0 => format!("{:.2} MB", n as f64 / (1024.0 * 1024.0)),
        _ => "N/A".to_string(),
    }
}

/// Format seconds as `m:ss` or `h:mm:ss`, or `N/A` when unknown.
pub fn fmt_hms(seconds: Option<f64>) -> String {
    let secs = match seconds {
        Some(s) if s > 0.0 => s,
        _ => return "N/A".to_string(),
    };
    let total = secs.round() as u64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}
