// Coercion and formatting helpers.
//
// Everything that turns a raw CSV string into a number or a date lives here,
// so the loader can stay a straight mapping of columns to fields. None of
// these functions fail: bad input becomes a sentinel.
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Parse a float, returning `f64::NAN` for missing or unparsable input.
///
/// Accepts an optional leading `+`, scientific notation and surrounding
/// whitespace. Trailing garbage (`"12abc"`) is rejected rather than
/// truncated.
pub fn parse_f64_or_nan(s: Option<&str>) -> f64 {
    let Some(s) = s.map(str::trim) else {
        return f64::NAN;
    };
    if s.is_empty() {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

pub fn parse_i32_safe(s: Option<&str>) -> Option<i32> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    // Sheets exports sometimes write whole numbers as `2021.0`.
    match s.parse::<i32>() {
        Ok(v) => Some(v),
        Err(_) => {
            let f = s.parse::<f64>().ok()?;
            if f.fract() == 0.0 && f.abs() <= i32::MAX as f64 {
                Some(f as i32)
            } else {
                None
            }
        }
    }
}

/// Quarter number, only when it lands in `1..=4`.
pub fn parse_quarter_safe(s: Option<&str>) -> Option<u8> {
    match parse_i32_safe(s)? {
        q @ 1..=4 => Some(q as u8),
        _ => None,
    }
}

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.fZ",
];

/// Parse an ISO-like date (`YYYY-MM-DD`, `YYYY/MM/DD`, or an ISO datetime whose
/// time part is dropped). Anything else is `None`.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Round to two decimals with halves going up, so `-0.125` becomes `-0.12`.
pub fn round2(v: f64) -> f64 {
    (v * 100.0 + 0.5).floor() / 100.0
}

pub fn format_number(n: f64, decimals: usize) -> String {
    if !n.is_finite() {
        return "n/a".to_string();
    }
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    // `-0.00` reads badly in a table; only keep the sign when something
    // non-zero survived rounding.
    if n.is_sign_negative() && s.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", res)
    } else {
        res
    }
}

/// Percentage with one decimal, e.g. `12.5%`.
pub fn format_percent_change(v: f64) -> String {
    format!("{}%", format_number(v, 1))
}

/// A fraction rendered as a percentage with one decimal, e.g. `0.054` -> `5.4%`.
pub fn format_share(v: f64) -> String {
    if !v.is_finite() {
        return "n/a".to_string();
    }
    format!("{}%", format_number(v * 100.0, 1))
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_numbers_become_nan() {
        assert!(parse_f64_or_nan(None).is_nan());
        assert!(parse_f64_or_nan(Some("  ")).is_nan());
        assert!(parse_f64_or_nan(Some("n/a")).is_nan());
        assert!(parse_f64_or_nan(Some("12abc")).is_nan());
        assert_eq!(parse_f64_or_nan(Some(" 1.5e3 ")), 1500.0);
    }

    #[test]
    fn integers_accept_whole_floats() {
        assert_eq!(parse_i32_safe(Some("2021")), Some(2021));
        assert_eq!(parse_i32_safe(Some("2021.0")), Some(2021));
        assert_eq!(parse_i32_safe(Some("2021.5")), None);
        assert_eq!(parse_i32_safe(Some("")), None);
    }

    #[test]
    fn quarter_must_be_one_to_four() {
        assert_eq!(parse_quarter_safe(Some("3")), Some(3));
        assert_eq!(parse_quarter_safe(Some("0")), None);
        assert_eq!(parse_quarter_safe(Some("5")), None);
    }

    #[test]
    fn iso_like_dates() {
        let expected = NaiveDate::from_ymd_opt(2021, 3, 31);
        assert_eq!(parse_date_safe(Some("2021-03-31")), expected);
        assert_eq!(parse_date_safe(Some("2021/03/31")), expected);
        assert_eq!(parse_date_safe(Some("2021-03-31T00:00:00")), expected);
        assert_eq!(parse_date_safe(Some("2021-03-31T00:00:00Z")), expected);
        assert_eq!(parse_date_safe(Some("2021-02-30")), None);
        assert_eq!(parse_date_safe(Some("March 2021")), None);
        assert_eq!(parse_date_safe(None), None);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-0.001, 2), "0.00");
        assert_eq!(format_number(-12.5, 1), "-12.5");
        assert_eq!(format_number(f64::NAN, 2), "n/a");
        assert_eq!(format_int(9855), "9,855");
        assert_eq!(format_share(0.0537), "5.4%");
        assert_eq!(format_share(f64::NAN), "n/a");
        assert_eq!(format_percent_change(-12.34), "-12.3%");
        assert_eq!(round2(0.456), 0.46);
        assert_eq!(round2(-0.454), -0.45);
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(-0.125), -0.12);
    }
}
