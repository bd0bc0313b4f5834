// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Syntactic validation for scheduler expressions: `cron(…)` with six
//! fields, `rate(value unit)`, and `at(yyyy-mm-ddThh:mm:ss)` — the three
//! forms the external scheduler service accepts.

use chrono::NaiveDateTime;
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

/// Check an expression; the error names what was wrong.
pub fn validate_expression(expression: &str) -> Result<(), String> {
    if let Some(body) = strip_call(expression, "cron") {
        return validate_cron(body);
    }
    if let Some(body) = strip_call(expression, "rate") {
        return validate_rate(body);
    }
    if let Some(body) = strip_call(expression, "at") {
        return NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S")
            .map(|_| ())
            .map_err(|_| format!("at() expects yyyy-mm-ddThh:mm:ss, got {body:?}"));
    }
    Err(format!(
        "expression {expression:?} must be cron(…), rate(…), or at(…)"
    ))
}

/// Validate an IANA timezone name (e.g. `America/New_York`).
pub fn validate_timezone(name: &str) -> Result<(), String> {
    chrono_tz::Tz::from_str(name)
        .map(|_| ())
        .map_err(|_| format!("{name:?} is not an IANA timezone"))
}

fn strip_call<'a>(expression: &'a str, keyword: &str) -> Option<&'a str> {
    expression
        .strip_prefix(keyword)?
        .strip_prefix('(')?
        .strip_suffix(')')
}

/// Six whitespace-separated fields: minute, hour, day-of-month, month,
/// day-of-week, year.  Field contents are checked against the scheduler
/// service's character set, not fully evaluated.
fn validate_cron(body: &str) -> Result<(), String> {
    let fields: Vec<&str> = body.split_whitespace().collect();
    if fields.len() != 6 {
        return Err(format!(
            "cron() expects 6 fields (minute hour dom month dow year), got {}",
            fields.len()
        ));
    }
    static FIELD: OnceLock<Regex> = OnceLock::new();
    let ok = FIELD.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9*?\-,/#LW]+$").expect("cron field regex")
    });
    for field in &fields {
        if !ok.is_match(field) {
            return Err(format!("cron field {field:?} contains invalid characters"));
        }
    }
    Ok(())
}

fn validate_rate(body: &str) -> Result<(), String> {
    static RATE: OnceLock<Regex> = OnceLock::new();
    let re = RATE.get_or_init(|| {
        Regex::new(r"^(\d+) (minute|minutes|hour|hours|day|days)$").expect("rate regex")
    });
    let Some(captures) = re.captures(body) else {
        return Err(format!("rate() expects \"<value> <unit>\", got {body:?}"));
    };
    let value: u64 = captures[1].parse().map_err(|_| "rate value overflow".to_string())?;
    if value == 0 {
        return Err("rate value must be positive".into());
    }
    let unit = &captures[2];
    let plural = unit.ends_with('s');
    if (value == 1) == plural {
        return Err(format!(
            "rate unit {unit:?} does not agree with value {value}"
        ));
    }
    Ok(())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_field_cron_accepted() {
        assert!(validate_expression("cron(0 12 * * ? *)").is_ok());
        assert!(validate_expression("cron(15 10 ? * MON-FRI *)").is_ok());
    }

    #[test]
    fn five_field_cron_rejected() {
        let err = validate_expression("cron(0 12 * * ?)").unwrap_err();
        assert!(err.contains("6 fields"));
    }

    #[test]
    fn cron_with_shell_injection_rejected() {
        assert!(validate_expression("cron(0 12 * * ? $(reboot))").is_err());
    }

    #[test]
    fn rate_forms_accepted() {
        for good in ["rate(1 minute)", "rate(5 minutes)", "rate(1 hour)", "rate(2 days)"] {
            assert!(validate_expression(good).is_ok(), "{good}");
        }
    }

    #[test]
    fn rate_plurality_must_agree() {
        assert!(validate_expression("rate(1 minutes)").is_err());
        assert!(validate_expression("rate(5 minute)").is_err());
    }

    #[test]
    fn rate_zero_rejected() {
        assert!(validate_expression("rate(0 minutes)").is_err());
    }

    #[test]
    fn at_form_accepted() {
        assert!(validate_expression("at(2026-06-12T09:00:00)").is_ok());
    }

    #[test]
    fn at_with_bad_datetime_rejected() {
        assert!(validate_expression("at(June 12th)").is_err());
        assert!(validate_expression("at(2026-13-40T09:00:00)").is_err());
    }

    #[test]
    fn bare_cron_string_rejected() {
        assert!(validate_expression("0 12 * * ? *").is_err());
    }

    #[test]
    fn iana_timezones_accepted() {
        for tz in ["America/New_York", "UTC", "Europe/Stockholm"] {
            assert!(validate_timezone(tz).is_ok(), "{tz}");
        }
    }

    #[test]
    fn non_iana_timezones_rejected() {
        for tz in ["EST5EDT4", "Eastern", "GMT-5:00x"] {
            assert!(validate_timezone(tz).is_err(), "{tz}");
        }
    }
}
