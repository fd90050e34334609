// Child progress protocol: `PROGRESS <percent> <message>` on stdout

const PREFIX: &str = "PROGRESS";

/// Parse one stdout line.
///
/// `percent` is an integer 0-100, or a fraction 0.0-1.0 which is scaled by
/// 100. Returns None for any other line.
pub fn parse_progress_line(line: &str) -> Option<(i64, String)> {
    let rest = line.trim().strip_prefix(PREFIX)?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let (value, message) = match rest.split_once(char::is_whitespace) {
        Some((value, message)) => (value, message.trim()),
        None => (rest, ""),
    };

    let percent = if value.contains('.') {
        let fraction: f64 = value.parse().ok()?;
        if !fraction.is_finite() {
            return None;
        }
        if fraction <= 1.0 {
            (fraction * 100.0).round() as i64
        } else {
            fraction.round() as i64
        }
    } else {
        value.parse().ok()?
    };
    Some((percent, message.to_string()))
}
