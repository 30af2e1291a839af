// Human readable byte and duration formatting

const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Format a byte count with a 1024 base, e.g. `1.5 KB`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let value = bytes as f64;
    let exponent = ((value.ln() / 1024f64.ln()).floor() as usize).min(UNITS.len() - 1);
    let scaled = value / 1024f64.powi(exponent as i32);

    format!("{} {}", trim_decimals(scaled, 2), UNITS[exponent])
}

/// Format milliseconds as `850ms`, `2.3s` or `1m 5s`.
pub fn format_duration_ms(ms: f64) -> String {
    if ms < 1000.0 {
        format!("{}ms", ms.round() as u64)
    } else if ms < 60_000.0 {
        format!("{:.1}s", ms / 1000.0)
    } else {
        let minutes = (ms / 60_000.0).floor() as u64;
        let seconds = ((ms % 60_000.0) / 1000.0).round() as u64;
        format!("{}m {}s", minutes, seconds)
    }
}

/// Fixed decimals with trailing zeros (and a dangling point) removed.
fn trim_decimals(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value);
    if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        fixed
    }
}
