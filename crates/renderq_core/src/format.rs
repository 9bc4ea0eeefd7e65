//! Human-readable formatting helpers shared by notices and front ends.

/// Format a duration in whole seconds as `1h 2m 3s`, `2m 3s` or `3s`.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Format a remaining-time estimate for display.
pub fn format_eta(seconds: Option<u64>) -> String {
    match seconds {
        Some(s) if s > 0 => format!("~{} remaining", format_duration(s)),
        _ => "Calculating...".to_string(),
    }
}
