//! Schema validation for untyped request input.
//!
//! Query strings and JSON bodies are turned into typed, immutable values here
//! before they reach the repository. Failures are reported per field.

use std::collections::HashMap;

use chrono::Datelike;
use serde_json::{Map, Value};

use crate::error::FieldErrors;
use crate::types::{VehicleFilters, VehicleInput, DEFAULT_PAGE, DEFAULT_PER_PAGE, MAX_PER_PAGE};

pub const MIN_YEAR: i64 = 1900;

fn push(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(message.into());
}

/// Reads an optional integer query parameter. Empty means absent.
fn query_int(params: &HashMap<String, String>, key: &str, errors: &mut FieldErrors) -> Option<i64> {
    let raw = params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())?;
    match raw.parse::<i64>() {
        Ok(v) => Some(v),
        Err(_) => {
            push(errors, key, format!("Expected an integer, received \"{}\"", raw));
            None
        }
    }
}

fn query_text(params: &HashMap<String, String>, key: &str) -> Option<String> {
    params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Validates catalog filters from query parameters. Unknown keys are ignored.
pub fn parse_filters(params: &HashMap<String, String>) -> Result<VehicleFilters, FieldErrors> {
    let mut errors = FieldErrors::new();

    let year_min = query_int(params, "yearMin", &mut errors);
    let year_max = query_int(params, "yearMax", &mut errors);
    let price_min = query_int(params, "priceMin", &mut errors);
    let price_max = query_int(params, "priceMax", &mut errors);

    let page = query_int(params, "page", &mut errors).unwrap_or(DEFAULT_PAGE);
    if page < 1 {
        push(&mut errors, "page", "Must be greater than or equal to 1");
    }
    let per_page = query_int(params, "perPage", &mut errors).unwrap_or(DEFAULT_PER_PAGE);
    if !(1..=MAX_PER_PAGE).contains(&per_page) {
        push(&mut errors, "perPage", format!("Must be between 1 and {}", MAX_PER_PAGE));
    }
    // The row offset of the requested page must fit in an i64
    if page >= 1 && (1..=MAX_PER_PAGE).contains(&per_page) && (page - 1).checked_mul(per_page).is_none() {
        push(&mut errors, "page", "Page number is too large");
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(VehicleFilters {
        q: query_text(params, "q"),
        brand: query_text(params, "brand"),
        year_min,
        year_max,
        price_min,
        price_max,
        page,
        per_page,
    })
}

/// Like [`parse_filters`], but a malformed filter set means "no filters".
pub fn parse_filters_or_default(params: &HashMap<String, String>) -> VehicleFilters {
    parse_filters(params).unwrap_or_else(|errors| {
        tracing::debug!(?errors, "Ignoring invalid catalog filters");
        VehicleFilters::default()
    })
}

enum Num {
    Absent,
    Value(i64),
    Invalid,
}

/// Integer coercion: JSON integers, integral floats and numeric strings.
/// `null` and `""` count as absent.
fn coerce_int(value: Option<&Value>) -> Num {
    match value {
        None | Some(Value::Null) => Num::Absent,
        Some(Value::Number(n)) => match n.as_i64() {
            Some(v) => Num::Value(v),
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Num::Value(f as i64),
                _ => Num::Invalid,
            },
        },
        Some(Value::String(s)) if s.trim().is_empty() => Num::Absent,
        Some(Value::String(s)) => s.trim().parse::<i64>().map(Num::Value).unwrap_or(Num::Invalid),
        Some(_) => Num::Invalid,
    }
}

fn required_text(body: &Map<String, Value>, key: &str, min_chars: usize, errors: &mut FieldErrors) -> String {
    match body.get(key) {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.chars().count() < min_chars {
                push(errors, key, format!("Must contain at least {} character(s)", min_chars));
            }
            trimmed.to_string()
        }
        None | Some(Value::Null) => {
            push(errors, key, "Required");
            String::new()
        }
        Some(_) => {
            push(errors, key, "Expected string");
            String::new()
        }
    }
}

fn optional_text(body: &Map<String, Value>, key: &str, errors: &mut FieldErrors) -> Option<String> {
    match body.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.trim()).filter(|s| !s.is_empty()).map(str::to_string),
        Some(_) => {
            push(errors, key, "Expected string");
            None
        }
    }
}

fn coerce_bool(value: Option<&Value>) -> Option<Option<bool>> {
    match value {
        None | Some(Value::Null) => Some(None),
        Some(Value::Bool(b)) => Some(Some(*b)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => Some(Some(false)),
            Some(1) => Some(Some(true)),
            _ => None,
        },
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Some(None),
            "true" | "1" | "on" | "yes" => Some(Some(true)),
            "false" | "0" | "off" | "no" => Some(Some(false)),
            _ => None,
        },
        Some(_) => None,
    }
}

fn is_web_url(raw: &str) -> bool {
    url::Url::parse(raw).map(|u| matches!(u.scheme(), "http" | "https") && u.has_host()).unwrap_or(false)
}

/// Validates a vehicle create/update body against the current calendar year.
pub fn validate_vehicle_input(body: &Value) -> Result<VehicleInput, FieldErrors> {
    validate_vehicle_input_at(body, i64::from(chrono::Utc::now().year()))
}

/// Validates a vehicle body; `year` must lie in `[1900, current_year + 1]`.
pub fn validate_vehicle_input_at(body: &Value, current_year: i64) -> Result<VehicleInput, FieldErrors> {
    let mut errors = FieldErrors::new();
    let Some(body) = body.as_object() else {
        push(&mut errors, "body", "Expected a JSON object");
        return Err(errors);
    };

    let title = required_text(body, "title", 2, &mut errors);
    let brand = required_text(body, "brand", 1, &mut errors);
    let model = required_text(body, "model", 1, &mut errors);
    let seller_id = required_text(body, "sellerId", 1, &mut errors);

    let max_year = current_year + 1;
    let year = match coerce_int(body.get("year")) {
        Num::Value(y) if (MIN_YEAR..=max_year).contains(&y) => y as i32,
        Num::Value(_) => {
            push(&mut errors, "year", format!("Must be between {} and {}", MIN_YEAR, max_year));
            0
        }
        Num::Absent => {
            push(&mut errors, "year", "Required");
            0
        }
        Num::Invalid => {
            push(&mut errors, "year", "Expected an integer");
            0
        }
    };

    let price_ars = match coerce_int(body.get("priceARS")) {
        Num::Absent => None,
        Num::Value(p) if p > 0 => Some(p),
        Num::Value(_) => {
            push(&mut errors, "priceARS", "Must be a positive integer");
            None
        }
        Num::Invalid => {
            push(&mut errors, "priceARS", "Expected an integer");
            None
        }
    };

    let km = match coerce_int(body.get("km")) {
        Num::Absent => None,
        Num::Value(k) if k >= 0 => Some(k),
        Num::Value(_) => {
            push(&mut errors, "km", "Must be a non-negative integer");
            None
        }
        Num::Invalid => {
            push(&mut errors, "km", "Expected an integer");
            None
        }
    };

    let fuel = optional_text(body, "fuel", &mut errors);
    let gearbox = optional_text(body, "gearbox", &mut errors);
    let location = optional_text(body, "location", &mut errors);
    let description = optional_text(body, "description", &mut errors);

    let images = match body.get("images") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let mut urls = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str().map(str::trim) {
                    Some(url) if is_web_url(url) => urls.push(url.to_string()),
                    _ => push(&mut errors, "images", "Invalid url"),
                }
            }
            urls
        }
        Some(_) => {
            push(&mut errors, "images", "Expected array");
            Vec::new()
        }
    };

    let published = match coerce_bool(body.get("published")) {
        Some(value) => value.unwrap_or(true),
        None => {
            push(&mut errors, "published", "Expected boolean");
            true
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(VehicleInput {
        title,
        brand,
        model,
        year,
        price_ars,
        km,
        fuel,
        gearbox,
        location,
        description,
        images,
        seller_id,
        published,
    })
}
