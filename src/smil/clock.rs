//! SMIL clock values.
//!
//! Accepted forms: full clock `HH:MM:SS(.f)`, partial clock `MM:SS(.f)`,
//! and timecount `N(.f)` with an optional `h`, `min`, `s`, or `ms` metric.
//! DAISY 2.02 values may carry an `npt=` prefix.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid clock value {0:?}")]
pub struct ClockError(pub String);

/// Convert a clock value to seconds.
pub fn parse_clock_value(value: &str) -> Result<f64, ClockError> {
    let invalid = || ClockError(value.to_string());
    let trimmed = value.trim();
    let trimmed = trimmed.strip_prefix("npt=").unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let seconds = if trimmed.contains(':') {
        let parts: Vec<&str> = trimmed.split(':').collect();
        let (hours, minutes, seconds) = match parts.as_slice() {
            [h, m, s] => (integer(h), integer(m), decimal(s)),
            [m, s] => (Some(0), integer(m), decimal(s)),
            _ => return Err(invalid()),
        };
        let (Some(hours), Some(minutes), Some(seconds)) = (hours, minutes, seconds) else {
            return Err(invalid());
        };
        if seconds >= 60.0 || minutes >= 60 {
            return Err(invalid());
        }
        hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds
    } else {
        let (number, scale) = if let Some(n) = trimmed.strip_suffix("ms") {
            (n, 0.001)
        } else if let Some(n) = trimmed.strip_suffix("min") {
            (n, 60.0)
        } else if let Some(n) = trimmed.strip_suffix('h') {
            (n, 3600.0)
        } else if let Some(n) = trimmed.strip_suffix('s') {
            (n, 1.0)
        } else {
            (trimmed, 1.0)
        };
        decimal(number).ok_or_else(invalid)? * scale
    };

    if seconds.is_finite() {
        Ok(seconds)
    } else {
        Err(invalid())
    }
}

fn integer(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Digits with at most one decimal point and at least one digit before it.
fn decimal(s: &str) -> Option<f64> {
    let (whole, fraction) = match s.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (s, None),
    };
    integer(whole)?;
    if let Some(fraction) = fraction
        && (fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_full_clock() {
        assert_eq!(parse_clock_value("00:00:05.000").unwrap(), 5.0);
        assert_eq!(parse_clock_value("0:00:01.500").unwrap(), 1.5);
        assert_eq!(parse_clock_value("1:02:03").unwrap(), 3723.0);
        assert_eq!(parse_clock_value("124:00:00").unwrap(), 446_400.0);
    }

    #[test]
    fn test_partial_clock() {
        assert_eq!(parse_clock_value("02:30.25").unwrap(), 150.25);
        assert!(parse_clock_value("75:00").is_err());
    }

    #[test]
    fn test_timecount() {
        assert_eq!(parse_clock_value("12.5").unwrap(), 12.5);
        assert_eq!(parse_clock_value("12.5s").unwrap(), 12.5);
        assert_eq!(parse_clock_value("250ms").unwrap(), 0.25);
        assert_eq!(parse_clock_value("2min").unwrap(), 120.0);
        assert_eq!(parse_clock_value("1.5h").unwrap(), 5400.0);
        assert_eq!(parse_clock_value("npt=3.2s").unwrap(), 3.2);
        assert_eq!(parse_clock_value(" 0 ").unwrap(), 0.0);
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            "", "abc", "1:2:3:4", "00:61:00", "00:00:60", "1e3", "-1", "1.", ".5", "inf",
            "NaN", "5sec", "00:aa:00", "1..2", "npt=",
        ] {
            assert!(parse_clock_value(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    proptest! {
        #[test]
        fn prop_full_clock_matches_components(h in 0u64..100, m in 0u64..60, s in 0u64..60, ms in 0u64..1000) {
            let value = format!("{h:02}:{m:02}:{s:02}.{ms:03}");
            let expected = (h * 3600 + m * 60 + s) as f64 + ms as f64 / 1000.0;
            let parsed = parse_clock_value(&value).unwrap();
            prop_assert!((parsed - expected).abs() < 1e-6);
        }
    }
}
