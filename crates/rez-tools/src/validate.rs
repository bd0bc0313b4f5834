// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The JSON-Schema subset the tool contracts use: `type`, `properties`,
//! `required`, `enum`, `format` (date, email, url), and numeric bounds.
//! Anything outside the subset in a schema is ignored rather than rejected,
//! so schemas may carry descriptions and examples freely.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Validate `args` against `schema`.  The error string is model-facing, so
/// it names the offending field and what was expected.
pub fn validate_input(schema: &Value, args: &Value) -> Result<(), String> {
    let object = args
        .as_object()
        .ok_or_else(|| "arguments must be a JSON object".to_string())?;

    if let Some(required) = schema["required"].as_array() {
        for field in required {
            let name = field.as_str().unwrap_or_default();
            if !object.contains_key(name) {
                return Err(format!("missing required field {name:?}"));
            }
        }
    }

    let Some(properties) = schema["properties"].as_object() else {
        return Ok(());
    };

    for (name, spec) in properties {
        let Some(value) = object.get(name) else {
            continue;
        };
        check_type(name, spec, value)?;
        check_enum(name, spec, value)?;
        check_format(name, spec, value)?;
        check_bounds(name, spec, value)?;
    }
    Ok(())
}

fn check_type(name: &str, spec: &Value, value: &Value) -> Result<(), String> {
    let Some(expected) = spec["type"].as_str() else {
        return Ok(());
    };
    let ok = match expected {
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "number" => value.is_number(),
        // A whole-valued JSON number satisfies integer.
        "integer" => {
            value.as_i64().is_some()
                || value.as_u64().is_some()
                || value.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(format!("field {name:?} must be of type {expected}"))
    }
}

fn check_enum(name: &str, spec: &Value, value: &Value) -> Result<(), String> {
    let Some(allowed) = spec["enum"].as_array() else {
        return Ok(());
    };
    if allowed.contains(value) {
        Ok(())
    } else {
        Err(format!("field {name:?} must be one of {allowed:?}"))
    }
}

fn check_format(name: &str, spec: &Value, value: &Value) -> Result<(), String> {
    let Some(format) = spec["format"].as_str() else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        // Non-string values fail the type check instead.
        return Ok(());
    };
    let ok = match format {
        "date" => date_regex().is_match(text),
        "email" => email_regex().is_match(text),
        "url" => text.starts_with("https://") || text.starts_with("http://"),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(format!("field {name:?} does not match format {format:?}"))
    }
}

fn check_bounds(name: &str, spec: &Value, value: &Value) -> Result<(), String> {
    let Some(number) = value.as_f64() else {
        return Ok(());
    };
    if let Some(min) = spec["minimum"].as_f64() {
        if number < min {
            return Err(format!("field {name:?} must be >= {min}"));
        }
    }
    if let Some(max) = spec["maximum"].as_f64() {
        if number > max {
            return Err(format!("field {name:?} must be <= {max}"));
        }
    }
    Ok(())
}

/// Accepts both ISO dates and the booking convention `Day Mon DD YYYY`
/// (e.g. `Fri Jun 12 2026`).
fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(\d{4}-\d{2}-\d{2}|(Mon|Tue|Wed|Thu|Fri|Sat|Sun) (Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) \d{1,2} \d{4})$",
        )
        .expect("date regex")
    })
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "course_name": { "type": "string" },
                "date": { "type": "string", "format": "date" },
                "num_players": { "type": "integer", "minimum": 1, "maximum": 4 },
                "priority": { "type": "string", "enum": ["low", "default", "high"] },
                "email": { "type": "string", "format": "email" },
                "location_url": { "type": "string", "format": "url" },
                "auto_book": { "type": "boolean" }
            },
            "required": ["course_name", "num_players"]
        })
    }

    #[test]
    fn valid_input_passes() {
        let args = json!({
            "course_name": "Birdsfoot",
            "date": "Fri Jun 12 2026",
            "num_players": 2,
            "priority": "high",
            "auto_book": true
        });
        assert!(validate_input(&schema(), &args).is_ok());
    }

    #[test]
    fn missing_required_field_fails() {
        let args = json!({ "course_name": "Birdsfoot" });
        let err = validate_input(&schema(), &args).unwrap_err();
        assert!(err.contains("num_players"));
    }

    #[test]
    fn non_object_args_fail() {
        assert!(validate_input(&schema(), &json!([1, 2])).is_err());
        assert!(validate_input(&schema(), &json!("x")).is_err());
    }

    #[test]
    fn wrong_type_fails() {
        let args = json!({ "course_name": 7, "num_players": 2 });
        let err = validate_input(&schema(), &args).unwrap_err();
        assert!(err.contains("course_name"));
    }

    #[test]
    fn whole_valued_float_satisfies_integer() {
        let args = json!({ "course_name": "B", "num_players": 2.0 });
        assert!(validate_input(&schema(), &args).is_ok());
    }

    #[test]
    fn fractional_float_fails_integer() {
        let args = json!({ "course_name": "B", "num_players": 2.5 });
        assert!(validate_input(&schema(), &args).is_err());
    }

    #[test]
    fn enum_membership_enforced() {
        let args = json!({ "course_name": "B", "num_players": 1, "priority": "urgent" });
        let err = validate_input(&schema(), &args).unwrap_err();
        assert!(err.contains("priority"));
    }

    #[test]
    fn numeric_bounds_enforced() {
        for players in [0, 5] {
            let args = json!({ "course_name": "B", "num_players": players });
            assert!(validate_input(&schema(), &args).is_err(), "{players}");
        }
        for players in [1, 4] {
            let args = json!({ "course_name": "B", "num_players": players });
            assert!(validate_input(&schema(), &args).is_ok(), "{players}");
        }
    }

    #[test]
    fn booking_date_convention_accepted() {
        for date in ["Fri Jun 12 2026", "Mon Jan 5 2026", "2026-06-12"] {
            let args = json!({ "course_name": "B", "num_players": 1, "date": date });
            assert!(validate_input(&schema(), &args).is_ok(), "{date}");
        }
    }

    #[test]
    fn bad_date_rejected() {
        for date in ["June 12th", "12/06/2026", "Friday Jun 12 2026"] {
            let args = json!({ "course_name": "B", "num_players": 1, "date": date });
            assert!(validate_input(&schema(), &args).is_err(), "{date}");
        }
    }

    #[test]
    fn email_format_enforced() {
        let good = json!({ "course_name": "B", "num_players": 1, "email": "u@example.com" });
        assert!(validate_input(&schema(), &good).is_ok());
        let bad = json!({ "course_name": "B", "num_players": 1, "email": "not-an-email" });
        assert!(validate_input(&schema(), &bad).is_err());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let args = json!({ "course_name": "B", "num_players": 1, "extra": "whatever" });
        assert!(validate_input(&schema(), &args).is_ok());
    }

    #[test]
    fn schema_without_properties_only_checks_required() {
        let schema = json!({ "type": "object", "required": ["x"] });
        assert!(validate_input(&schema, &json!({ "x": 1 })).is_ok());
        assert!(validate_input(&schema, &json!({})).is_err());
    }
}
