//! Go-style duration strings.
//!
//! Quick-action links and silence requests carry durations in the upstream
//! wire format (`"1h"`, `"30m"`, `"24h"`, `"87600h"`, compounds like
//! `"1h30m"`). This module parses that format and renders the Chinese
//! display form used in idempotency errors and confirmation cards.

/// Parse a Go-style duration string into whole seconds.
///
/// Supported units: `s`, `m`, `h` (compound, e.g. `"1h30m"`); fractional
/// values (`"1.5h"`) are accepted. Sub-second units are rejected because the
/// silence engine works in seconds.
pub fn parse_go_duration(input: &str) -> Result<i64, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err(format!("无效的静默时长: {input}"));
    }

    let mut total = 0f64;
    let mut num = String::new();
    let mut saw_unit = false;

    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() || c == '.' {
            num.push(c);
            continue;
        }
        let value: f64 = num
            .parse()
            .map_err(|_| format!("无效的静默时长: {input}"))?;
        num.clear();
        let multiplier = match c {
            's' => 1.0,
            'm' => {
                // reject "ms" explicitly rather than parsing it as minutes
                if chars.peek() == Some(&'s') {
                    return Err(format!("无效的静默时长: {input}"));
                }
                60.0
            }
            'h' => 3600.0,
            _ => return Err(format!("无效的静默时长: {input}")),
        };
        total += value * multiplier;
        saw_unit = true;
    }

    if !num.is_empty() || !saw_unit {
        return Err(format!("无效的静默时长: {input}"));
    }

    Ok(total.round() as i64)
}

/// Render a duration string as a Chinese-friendly form:
/// `"1h"` → `"1小时"`, `"90m"` → `"1小时30分钟"`, `"25h"` → `"1天1小时"`.
/// Unparseable input is returned verbatim.
pub fn format_duration_chinese(duration: &str) -> String {
    match parse_go_duration(duration) {
        Ok(secs) => format_seconds_chinese(secs),
        Err(_) => duration.to_string(),
    }
}

/// Chinese rendering of a second count, largest unit first.
pub fn format_seconds_chinese(total_seconds: i64) -> String {
    let days = total_seconds / 86400;
    let hours = (total_seconds % 86400) / 3600;
    let minutes = (total_seconds % 3600) / 60;

    if days > 0 {
        let mut out = format!("{days}天");
        if hours > 0 {
            out.push_str(&format!("{hours}小时"));
        }
        out
    } else if hours > 0 {
        let mut out = format!("{hours}小时");
        if minutes > 0 {
            out.push_str(&format!("{minutes}分钟"));
        }
        out
    } else if minutes > 0 {
        format!("{minutes}分钟")
    } else {
        format!("{total_seconds}秒")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_units() {
        assert_eq!(parse_go_duration("1h").unwrap(), 3600);
        assert_eq!(parse_go_duration("30m").unwrap(), 1800);
        assert_eq!(parse_go_duration("45s").unwrap(), 45);
        assert_eq!(parse_go_duration("87600h").unwrap(), 87600 * 3600);
    }

    #[test]
    fn parses_compound_and_fractional() {
        assert_eq!(parse_go_duration("1h30m").unwrap(), 5400);
        assert_eq!(parse_go_duration("1.5h").unwrap(), 5400);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_go_duration("").is_err());
        assert!(parse_go_duration("abc").is_err());
        assert!(parse_go_duration("10").is_err());
        assert!(parse_go_duration("100ms").is_err());
        assert!(parse_go_duration("1d").is_err());
    }

    #[test]
    fn chinese_formatting() {
        assert_eq!(format_duration_chinese("1h"), "1小时");
        assert_eq!(format_duration_chinese("90m"), "1小时30分钟");
        assert_eq!(format_duration_chinese("25h"), "1天1小时");
        assert_eq!(format_duration_chinese("30s"), "30秒");
        // unparseable input comes back untouched
        assert_eq!(format_duration_chinese("soon"), "soon");
    }
}
