use chrono::Duration;

/// Formats a duration as e.g. "2d 3h 15m 40s", omitting zero components.
///
/// Sub-second durations collapse to "0s"; negative durations keep a leading
/// minus sign.
pub fn format(duration: Duration) -> String {
    let total_seconds = duration.num_seconds().abs();
    if total_seconds == 0 {
        return "0s".to_string();
    }

    let days = total_seconds / 86_400;
    let hours = total_seconds % 86_400 / 3_600;
    let minutes = total_seconds % 3_600 / 60;
    let seconds = total_seconds % 60;

    let mut parts = Vec::new();
    if days != 0 {
        parts.push(format!("{days}d"));
    }
    if hours != 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes != 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds != 0 {
        parts.push(format!("{seconds}s"));
    }

    let formatted = parts.join(" ");
    if duration < Duration::zero() {
        format!("-{formatted}")
    } else {
        formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_duration() {
        assert_eq!(format(Duration::zero()), "0s");
    }

    #[test]
    fn test_sub_second_duration_collapses_to_zero() {
        assert_eq!(format(Duration::milliseconds(999)), "0s");
    }

    #[test]
    fn test_all_components() {
        assert_eq!(format(Duration::milliseconds(90_061_000)), "1d 1h 1m 1s");
    }

    #[test]
    fn test_zero_components_are_omitted() {
        assert_eq!(format(Duration::seconds(86_400 + 40)), "1d 40s");
        assert_eq!(format(Duration::seconds(3 * 3_600)), "3h");
        assert_eq!(format(Duration::seconds(2 * 86_400 + 3 * 3_600 + 15 * 60 + 40)), "2d 3h 15m 40s");
    }

    #[test]
    fn test_negative_duration() {
        assert_eq!(format(Duration::seconds(-90)), "-1m 30s");
    }
}
