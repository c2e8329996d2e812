/// Formatting and parsing helpers shared by the renderers and the CLI

use chrono::{DateTime, Local};

use crate::core::snapshot::MetricValue;
use crate::utils::{MetricKind, Thresholds};

/// Severity tier of a metric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Normal,
    Warning,
    Danger,
}

/// Parse the leading decimal number of a string ("12.5 tx" -> 12.5)
pub fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;

    if end < bytes.len() && (bytes[end] == b'-' || bytes[end] == b'+') {
        end += 1;
    }

    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if seen_digit && !seen_exp => {
                // Only take the exponent if digits follow it
                let mut exp_end = end + 1;
                if exp_end < bytes.len() && (bytes[exp_end] == b'-' || bytes[exp_end] == b'+') {
                    exp_end += 1;
                }
                if exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
                    seen_exp = true;
                    end = exp_end;
                    continue;
                }
                break;
            }
            _ => break,
        }
        end += 1;
    }

    if !seen_digit {
        return None;
    }
    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse the leading integer of a string ("2048MB" -> 2048)
pub fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'-' || bytes[end] == b'+') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }

    if end == digits_start {
        return None;
    }
    s[..end].parse::<i64>().ok()
}

/// Round to `digits` decimals with ties going away from zero
///
/// `format!("{:.2}")` rounds ties to even, which turns 1.125 into "1.12".
pub fn round_half_away(value: f64, digits: usize) -> f64 {
    let scale = 10f64.powi(digits as i32);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / scale
}

/// Thousands-grouped number with at most `max_fraction` decimals, trailing zeros dropped
pub fn format_grouped(value: f64, max_fraction: usize) -> String {
    let formatted = format!("{:.*}", max_fraction, round_half_away(value, max_fraction).abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, f.trim_end_matches('0')),
        None => (formatted.as_str(), ""),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let is_zero = int_part.chars().all(|c| c == '0') && frac_part.is_empty();
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };

    if frac_part.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, frac_part)
    }
}

/// Display text for a metric value
pub fn format_metric_value(value: Option<&MetricValue>, kind: MetricKind) -> String {
    let value = match value {
        Some(v) if !v.is_null() => v,
        _ => return "-".to_string(),
    };

    match kind {
        MetricKind::Memory => value
            .as_i64()
            .map(|bytes| {
                let gb = bytes as f64 / (1u64 << 30) as f64;
                format!("{:.2} GB", round_half_away(gb, 2))
            })
            .unwrap_or_else(|| "-".to_string()),
        MetricKind::Number => value
            .as_f64()
            .map(|n| format_grouped(n, 3))
            .unwrap_or_else(|| "-".to_string()),
        MetricKind::Size | MetricKind::Raw | MetricKind::Text | MetricKind::Flag => value
            .display()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "-".to_string()),
    }
}

/// Tier a value against its thresholds; danger wins over warning
pub fn classify(value: Option<&MetricValue>, thresholds: &Thresholds) -> Severity {
    let number = match value {
        Some(v) if v.is_truthy() => match v.as_f64() {
            Some(n) => n,
            None => return Severity::Normal,
        },
        _ => return Severity::Normal,
    };

    let reached = |limit: Option<f64>| matches!(limit, Some(l) if l != 0.0 && number >= l);

    if reached(thresholds.danger) {
        Severity::Danger
    } else if reached(thresholds.warning) {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

/// Read a true/false indicator; anything else is `None`
pub fn flag_state(value: Option<&MetricValue>) -> Option<bool> {
    match value? {
        MetricValue::Bool(b) => Some(*b),
        MetricValue::Text(s) if s.eq_ignore_ascii_case("true") || s == "ON" => Some(true),
        MetricValue::Text(s) if s.eq_ignore_ascii_case("false") || s == "OFF" => Some(false),
        _ => None,
    }
}

/// Format duration to human-readable string
pub fn format_duration(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Local wall-clock time of a sample timestamp (ms since epoch)
pub fn format_clock_millis(timestamp_ms: i64) -> String {
    match DateTime::from_timestamp_millis(timestamp_ms) {
        Some(dt) => {
            let local: DateTime<Local> = dt.into();
            local.format("%H:%M:%S").to_string()
        }
        None => "--:--:--".to_string(),
    }
}

/// Truncate string with ellipsis
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> MetricValue {
        MetricValue::from(s)
    }

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float_prefix("12.5"), Some(12.5));
        assert_eq!(parse_float_prefix("  7 tx"), Some(7.0));
        assert_eq!(parse_float_prefix("-3.25e2x"), Some(-325.0));
        assert_eq!(parse_float_prefix("1e"), Some(1.0));
        assert_eq!(parse_float_prefix(".5"), Some(0.5));
        assert_eq!(parse_float_prefix("-"), None);
        assert_eq!(parse_float_prefix("abc"), None);
        assert_eq!(parse_float_prefix(""), None);
    }

    #[test]
    fn test_parse_int_prefix() {
        assert_eq!(parse_int_prefix("2048MB"), Some(2048));
        assert_eq!(parse_int_prefix("1.9"), Some(1));
        assert_eq!(parse_int_prefix("-4"), Some(-4));
        assert_eq!(parse_int_prefix("M"), None);
    }

    #[test]
    fn test_format_grouped() {
        assert_eq!(format_grouped(0.0, 3), "0");
        assert_eq!(format_grouped(1234567.0, 3), "1,234,567");
        assert_eq!(format_grouped(1234.5, 3), "1,234.5");
        assert_eq!(format_grouped(0.123456, 3), "0.123");
        assert_eq!(format_grouped(999.9996, 3), "1,000");
        assert_eq!(format_grouped(-12345.25, 3), "-12,345.25");
        assert_eq!(format_grouped(-0.0001, 3), "0");
    }

    #[test]
    fn test_ties_round_away_from_zero() {
        assert_eq!(round_half_away(1.125, 2), 1.13);
        assert_eq!(round_half_away(-1.125, 2), -1.13);
        assert_eq!(format_grouped(1.0625, 3), "1.063");
        assert_eq!(format_grouped(-1.0625, 3), "-1.063");
        assert_eq!(format_grouped(2.5, 0), "3");
        assert_eq!(format_grouped(f64::MAX, 3), format_grouped(f64::MAX, 0));

        let tie = MetricValue::from(1207959552.0);
        assert_eq!(format_metric_value(Some(&tie), MetricKind::Memory), "1.13 GB");
    }

    #[test]
    fn test_format_memory() {
        let two_gb = MetricValue::from(2147483648.0);
        assert_eq!(format_metric_value(Some(&two_gb), MetricKind::Memory), "2.00 GB");
        assert_eq!(
            format_metric_value(Some(&text("1610612736")), MetricKind::Memory),
            "1.50 GB"
        );
        assert_eq!(format_metric_value(Some(&text("n/a")), MetricKind::Memory), "-");
    }

    #[test]
    fn test_format_number_and_missing() {
        assert_eq!(format_metric_value(Some(&text("48213")), MetricKind::Number), "48,213");
        assert_eq!(format_metric_value(Some(&text("12.34567")), MetricKind::Number), "12.346");
        assert_eq!(format_metric_value(Some(&text("-")), MetricKind::Number), "-");
        assert_eq!(format_metric_value(None, MetricKind::Number), "-");
        assert_eq!(format_metric_value(Some(&MetricValue::Null), MetricKind::Text), "-");
    }

    #[test]
    fn test_format_verbatim_kinds() {
        assert_eq!(format_metric_value(Some(&text("128M")), MetricKind::Size), "128M");
        assert_eq!(
            format_metric_value(Some(&text("0.0012345678")), MetricKind::Raw),
            "0.0012345678"
        );
        assert_eq!(format_metric_value(Some(&text("Synced")), MetricKind::Text), "Synced");
        assert_eq!(format_metric_value(Some(&text("")), MetricKind::Text), "-");
    }

    #[test]
    fn test_classify_boundaries() {
        let t = Thresholds {
            warning: Some(10.0),
            danger: Some(50.0),
        };
        assert_eq!(classify(Some(&text("9")), &t), Severity::Normal);
        assert_eq!(classify(Some(&text("10")), &t), Severity::Warning);
        assert_eq!(classify(Some(&text("49.9")), &t), Severity::Warning);
        assert_eq!(classify(Some(&text("50")), &t), Severity::Danger);
        assert_eq!(classify(Some(&MetricValue::from(80.0)), &t), Severity::Danger);
    }

    #[test]
    fn test_classify_ignores_unusable_input() {
        let t = Thresholds::warning(10.0);
        assert_eq!(classify(None, &t), Severity::Normal);
        assert_eq!(classify(Some(&text("")), &t), Severity::Normal);
        assert_eq!(classify(Some(&text("Synced")), &t), Severity::Normal);
        // A zero threshold never fires
        let zero = Thresholds {
            warning: Some(0.0),
            danger: None,
        };
        assert_eq!(classify(Some(&text("5")), &zero), Severity::Normal);
    }

    #[test]
    fn test_flag_state() {
        assert_eq!(flag_state(Some(&text("true"))), Some(true));
        assert_eq!(flag_state(Some(&text("false"))), Some(false));
        assert_eq!(flag_state(Some(&MetricValue::Bool(true))), Some(true));
        assert_eq!(flag_state(Some(&text("-"))), None);
        assert_eq!(flag_state(None), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30), "30s");
        assert_eq!(format_duration(90), "1m 30s");
        assert_eq!(format_duration(3661), "1h 1m");
        assert_eq!(format_duration(86400), "1d 0h");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("db1", 10), "db1");
        assert_eq!(truncate_string("galera-node-01.example", 10), "galera-...");
    }
}
