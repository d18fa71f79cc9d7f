//! Field type resolution: definition checks at form creation and value
//! coercion at entry submission.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use super::amount::is_amount_label;
use crate::{
    error::{AppError, AppResult},
    models::{ExpenseField, FieldRole, FieldType, NewField},
};

/// Largest decimal exponent, either way, a stored number may carry.
const MAX_NUMBER_SCALE: i64 = 64;

/// Checks one field definition and normalizes it in place
/// (trimmed label, empty `options` cleared off non-select fields).
pub fn check_definition(position: usize, field: &mut NewField) -> AppResult<()> {
    let key = format!("fields[{}]", position);

    field.label = field.label.trim().to_string();
    if field.label.is_empty() {
        return Err(AppError::field(key, "field label is required"));
    }

    let has_options = field.options.as_ref().is_some_and(|o| !o.is_empty());
    match field.field_type {
        FieldType::Select if !has_options => {
            return Err(AppError::field(
                key,
                format!("select field '{}' needs at least one option", field.label),
            ));
        }
        FieldType::Select => {}
        _ if has_options => {
            return Err(AppError::field(
                key,
                format!(
                    "field '{}' of type {} cannot declare options",
                    field.label,
                    field.field_type.as_str()
                ),
            ));
        }
        _ => field.options = None,
    }

    if field.role == Some(FieldRole::Amount) && field.field_type != FieldType::Number {
        return Err(AppError::field(
            key,
            format!("amount field '{}' must be of type number", field.label),
        ));
    }

    Ok(())
}

/// Human-readable text of a stored value. `None` for null.
pub fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Fields the ledger may read an amount from.
fn carries_amount(field: &ExpenseField) -> bool {
    field.role == Some(FieldRole::Amount) || is_amount_label(&field.label)
}

fn is_blank(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

/// Parses a calendar date given as `YYYY-MM-DD` or as an RFC 3339 timestamp.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.date_naive()))
}

/// Validates a submitted value against its field and returns the normalized
/// value to store. `Ok(None)` means the optional field was left empty.
pub fn coerce(field: &ExpenseField, raw: Option<&Value>) -> AppResult<Option<Value>> {
    let key = field.id.to_string();

    if is_blank(raw) {
        if field.required {
            return Err(AppError::field(
                key,
                format!("'{}' is required", field.label),
            ));
        }
        return Ok(None);
    }
    let Some(raw) = raw else { return Ok(None) };

    let text = match raw {
        Value::String(_) | Value::Number(_) => value_text(raw).unwrap_or_default(),
        Value::Bool(_) if field.field_type == FieldType::Text => {
            value_text(raw).unwrap_or_default()
        }
        _ => {
            return Err(AppError::field(
                key,
                format!("'{}' expects a {} value", field.label, field.field_type.as_str()),
            ))
        }
    };

    let value = match field.field_type {
        FieldType::Text => text,
        FieldType::Number => {
            let n = BigDecimal::from_str(text.trim())
                .ok()
                .map(|n| n.normalized())
                .filter(|n| n.as_bigint_and_exponent().1.abs() <= MAX_NUMBER_SCALE)
                .ok_or_else(|| {
                    AppError::field(
                        key.clone(),
                        format!("'{}' must be a number, got '{}'", field.label, text),
                    )
                })?;
            if carries_amount(field) && n < BigDecimal::from(0) {
                return Err(AppError::field(
                    key,
                    format!("'{}' is an amount and cannot be negative", field.label),
                ));
            }
            n.to_plain_string()
        }
        FieldType::Date => parse_date(&text)
            .ok_or_else(|| {
                AppError::field(
                    key.clone(),
                    format!("'{}' must be a date (YYYY-MM-DD), got '{}'", field.label, text),
                )
            })?
            .format("%Y-%m-%d")
            .to_string(),
        FieldType::Select => {
            if !field.options.iter().any(|o| *o == text) {
                return Err(AppError::field(
                    key,
                    format!("'{}' is not an option of '{}'", text, field.label),
                ));
            }
            text
        }
    };

    Ok(Some(Value::String(value)))
}
