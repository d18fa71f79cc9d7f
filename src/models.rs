use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Date used for transactions whose source carries no usable date.
pub const SENTINEL_DATE: &str = "1970-01-01";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Select,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Select => "select",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(FieldType::Text),
            "number" => Some(FieldType::Number),
            "date" => Some(FieldType::Date),
            "select" => Some(FieldType::Select),
            _ => None,
        }
    }
}

/// Semantic role a field can declare explicitly instead of relying on its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRole {
    Amount,
}

impl FieldRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldRole::Amount => "amount",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "amount" => Some(FieldRole::Amount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseField {
    pub id: i64,
    pub form_id: i64,
    pub label: String,
    pub field_type: FieldType,
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub role: Option<FieldRole>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseForm {
    pub id: i64,
    pub workspace_id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub fields: Vec<ExpenseField>,
}

/// Submitted values keyed by the string form of `ExpenseField::id`.
pub type EntryData = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseEntry {
    pub id: i64,
    pub form_id: i64,
    pub workspace_id: i64,
    pub creator_id: i64,
    pub data: EntryData,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewField {
    #[serde(default)]
    pub label: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub role: Option<FieldRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewForm {
    pub workspace_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<NewField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEntry {
    pub form_id: i64,
    pub workspace_id: i64,
    #[serde(default)]
    pub data: EntryData,
}

/// Fixed-schema expense record as kept by the expense store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub workspace_id: Option<i64>,
    pub category: Option<String>,
    pub amount: f64,
    pub comment: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// Fixed-schema income record as kept by the income store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Income {
    pub id: i64,
    pub workspace_id: Option<i64>,
    #[serde(rename = "type")]
    pub income_type: Option<String>,
    pub subtype: Option<String>,
    pub amount: f64,
    pub student_count: Option<i32>,
    pub comment: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Expense,
    Income,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Expense => "EXPENSE",
            TransactionType::Income => "INCOME",
        }
    }
}

/// Row of the unified ledger. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub date: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    pub amount: f64,
    pub comment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_count: Option<i32>,
}
