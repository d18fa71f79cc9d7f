//! Locates the monetary value of a dynamic entry.
//!
//! A field tagged with the `amount` role wins. Forms created before roles
//! existed fall back to label sniffing: the first field whose label is one of
//! [`AMOUNT_LABELS`] and that holds a value gives the amount. Text values are
//! read up to the end of their leading number (`"1500 HTG"` is 1500), and a
//! value with no leading number counts as 0 so one malformed entry cannot
//! break the ledger.

use serde_json::Value;

use crate::models::{EntryData, ExpenseField, ExpenseForm, FieldRole};

pub const AMOUNT_LABELS: [&str; 4] = ["montant", "amount", "prix", "total"];

pub fn is_amount_label(label: &str) -> bool {
    let label = label.trim().to_lowercase();
    AMOUNT_LABELS.contains(&label.as_str())
}

/// Longest decimal literal at the start of `s`: optional sign, digits with an
/// optional fraction, optional exponent.
fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let b = s.as_bytes();
    let digits = |from: usize| b[from..].iter().take_while(|c| c.is_ascii_digit()).count();

    let mut end = usize::from(matches!(b.first(), Some(b'+' | b'-')));
    let int = digits(end);
    end += int;

    let mut frac = 0;
    if b.get(end) == Some(&b'.') {
        frac = digits(end + 1);
        if frac > 0 {
            end += 1 + frac;
        }
    }
    if int == 0 && frac == 0 {
        return None;
    }

    if matches!(b.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(b.get(end + 1), Some(b'+' | b'-')));
        let exp = digits(end + 1 + sign);
        if exp > 0 {
            end += 1 + sign + exp;
        }
    }

    s[..end].parse().ok()
}

fn lenient_number(v: &Value) -> f64 {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => leading_number(s),
        _ => None,
    };
    n.filter(|n| n.is_finite()).unwrap_or(0.0)
}

fn present<'a>(field: &ExpenseField, data: &'a EntryData) -> Option<&'a Value> {
    data.get(&field.id.to_string()).filter(|v| !v.is_null())
}

pub fn extract_amount(form: &ExpenseForm, data: &EntryData) -> f64 {
    let tagged = form
        .fields
        .iter()
        .filter(|f| f.role == Some(FieldRole::Amount))
        .find_map(|f| present(f, data));
    if let Some(v) = tagged {
        return lenient_number(v);
    }

    form.fields
        .iter()
        .filter(|f| is_amount_label(&f.label))
        .find_map(|f| present(f, data))
        .map(lenient_number)
        .unwrap_or(0.0)
}
