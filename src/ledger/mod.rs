//! Unified transaction ledger.
//!
//! Merges fixed-schema expenses and incomes with transactions synthesized
//! from dynamic form entries. Every source is fetched independently and a
//! failing source only costs its own rows: the failure is logged and the
//! ledger is built from whatever did load.

pub mod dashboard;
pub mod export;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::{
    forms::{amount::extract_amount, fields::value_text},
    models::{
        EntryData, Expense, ExpenseEntry, ExpenseForm, Income, Transaction, TransactionType,
        SENTINEL_DATE,
    },
    store::Stores,
};

fn date_of(d: Option<DateTime<Utc>>) -> String {
    d.map(|d| d.date_naive().format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| SENTINEL_DATE.to_string())
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

pub fn map_expense(e: &Expense) -> Transaction {
    Transaction {
        id: e.id.to_string(),
        date: date_of(e.date),
        kind: TransactionType::Expense,
        category: non_blank(e.category.as_deref()).unwrap_or("AUTRE").to_string(),
        sub_type: None,
        amount: e.amount,
        comment: e.comment.clone().unwrap_or_default(),
        student_count: None,
    }
}

pub fn map_income(i: &Income) -> Transaction {
    let students = i.student_count.unwrap_or(0);
    let comment = if students > 0 {
        format!("{} étudiants", students)
    } else {
        i.comment.clone().unwrap_or_default()
    };

    Transaction {
        id: i.id.to_string(),
        date: date_of(i.date),
        kind: TransactionType::Income,
        category: non_blank(i.income_type.as_deref())
            .unwrap_or("FORMATION")
            .to_string(),
        sub_type: Some(i.subtype.clone().unwrap_or_default()),
        amount: i.amount,
        comment,
        student_count: Some(students),
    }
}

/// `"label: value, ..."` over the form's fields in declaration order,
/// for the fields that have a value in `data`.
pub fn entry_comment(form: &ExpenseForm, data: &EntryData) -> String {
    form.fields
        .iter()
        .filter_map(|f| {
            let v = data.get(&f.id.to_string()).and_then(value_text)?;
            Some(format!("{}: {}", f.label, v))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn map_entry(form: &ExpenseForm, entry: &ExpenseEntry) -> Transaction {
    Transaction {
        id: format!("entry-{}", entry.id),
        date: date_of(Some(entry.created_at)),
        kind: TransactionType::Expense,
        category: form.name.clone(),
        sub_type: None,
        amount: extract_amount(form, &entry.data),
        comment: entry_comment(form, &entry.data),
        student_count: None,
    }
}

/// Sorts newest first by ISO date string. Ties keep source order.
pub fn sort_newest_first(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| b.date.cmp(&a.date));
}

async fn dynamic_transactions(stores: &Stores, workspace_id: i64) -> Vec<Transaction> {
    let forms = match stores.forms.list_forms(workspace_id).await {
        Ok(forms) => forms,
        Err(err) => {
            log::warn!("ledger: cannot load forms of workspace {}: {:#}", workspace_id, err);
            return Vec::new();
        }
    };

    let fetches = forms.iter().map(|f| stores.entries.list_entries(f.id));
    let settled = join_all(fetches).await;

    let mut out = Vec::new();
    for (form, result) in forms.iter().zip(settled) {
        match result {
            Ok(entries) => out.extend(entries.iter().map(|e| map_entry(form, e))),
            Err(err) => log::warn!(
                "ledger: cannot load entries of form {} '{}': {:#}",
                form.id,
                form.name,
                err
            ),
        }
    }
    out
}

/// Builds the ledger for one workspace, or across every workspace when
/// `workspace_id` is `None` (dynamic entries are only included for a
/// selected workspace).
pub async fn build_ledger(stores: &Stores, workspace_id: Option<i64>) -> Vec<Transaction> {
    let dynamic = async {
        match workspace_id {
            Some(ws) => dynamic_transactions(stores, ws).await,
            None => Vec::new(),
        }
    };

    let (expenses, incomes, dynamic) = futures::join!(
        stores.expenses.list_expenses(workspace_id),
        stores.incomes.list_incomes(workspace_id),
        dynamic
    );

    let expenses = expenses.unwrap_or_else(|err| {
        log::warn!("ledger: cannot load expenses: {:#}", err);
        Vec::new()
    });
    let incomes = incomes.unwrap_or_else(|err| {
        log::warn!("ledger: cannot load incomes: {:#}", err);
        Vec::new()
    });

    let mut ledger: Vec<Transaction> = expenses
        .iter()
        .map(map_expense)
        .chain(incomes.iter().map(map_income))
        .chain(dynamic)
        .collect();
    sort_newest_first(&mut ledger);

    log::debug!(
        "ledger for {:?}: {} transactions",
        workspace_id,
        ledger.len()
    );
    ledger
}

/// Optional narrowing of the ledger for search.
#[derive(Debug, Default, Clone)]
pub struct LedgerFilter {
    pub kind: Option<TransactionType>,
    pub q: Option<String>,
}

impl LedgerFilter {
    pub fn matches(&self, t: &Transaction) -> bool {
        if self.kind.is_some_and(|k| k != t.kind) {
            return false;
        }
        let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
            return true;
        };
        let q = q.to_lowercase();
        [
            Some(t.category.as_str()),
            t.sub_type.as_deref(),
            Some(t.comment.as_str()),
        ]
        .into_iter()
        .flatten()
        .any(|s| s.to_lowercase().contains(&q))
    }

    pub fn apply(&self, ledger: Vec<Transaction>) -> Vec<Transaction> {
        ledger.into_iter().filter(|t| self.matches(t)).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::{
        forms::{entries, schema},
        models::{ExpenseField, FieldType, NewEntry, NewField, NewForm},
        store::{memory::MemoryStore, EntryStore, ExpenseSource, IncomeSource},
    };

    pub(crate) fn at(date: &str) -> DateTime<Utc> {
        let d = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        Utc.from_utc_datetime(&d.and_hms_opt(12, 0, 0).unwrap())
    }

    pub(crate) fn expense(workspace_id: i64, date: &str, amount: f64) -> Expense {
        Expense {
            id: 0,
            workspace_id: Some(workspace_id),
            category: Some("Transport".to_string()),
            amount,
            comment: Some("taxi".to_string()),
            date: Some(at(date)),
        }
    }

    pub(crate) fn income(workspace_id: i64, date: &str, amount: f64) -> Income {
        Income {
            id: 0,
            workspace_id: Some(workspace_id),
            income_type: Some("Formation Caméra".to_string()),
            subtype: Some("Inscription".to_string()),
            amount,
            student_count: Some(0),
            comment: Some("session de janvier".to_string()),
            date: Some(at(date)),
        }
    }

    fn number(label: &str) -> NewField {
        NewField {
            label: label.to_string(),
            field_type: FieldType::Number,
            required: true,
            options: None,
            role: None,
        }
    }

    /// Workspace with a "Fuel" form holding one entry dated `entry_date`.
    pub(crate) async fn fuel_fixture(entry_date: &str) -> (Arc<MemoryStore>, Stores, i64, ExpenseForm) {
        let store = Arc::new(MemoryStore::new());
        let stores = Stores::from_backend(store.clone());
        let ws = stores
            .workspaces
            .insert_workspace("W1", "w1", 1)
            .await
            .unwrap();
        let form = schema::create_form(
            &stores,
            NewForm {
                workspace_id: ws.id,
                name: "Fuel".to_string(),
                description: None,
                fields: vec![number("Litres"), number("Montant")],
            },
        )
        .await
        .unwrap();

        let data = [
            (form.fields[0].id.to_string(), json!(20)),
            (form.fields[1].id.to_string(), json!(3000)),
        ]
        .into_iter()
        .collect();
        let entry = entries::create_entry(
            &stores,
            1,
            NewEntry {
                form_id: form.id,
                workspace_id: ws.id,
                data,
            },
        )
        .await
        .unwrap();
        store.set_entry_created_at(entry.id, at(entry_date)).unwrap();

        (store, stores, ws.id, form)
    }

    #[tokio::test]
    async fn fuel_scenario() {
        let (_, stores, ws, _) = fuel_fixture("2024-03-01").await;
        let ledger = build_ledger(&stores, Some(ws)).await;

        assert_eq!(ledger.len(), 1);
        let t = &ledger[0];
        assert_eq!(t.kind, TransactionType::Expense);
        assert_eq!(t.category, "Fuel");
        assert_eq!(t.amount, 3000.0);
        assert_eq!(t.comment, "Litres: 20, Montant: 3000");
        assert_eq!(t.date, "2024-03-01");
    }

    #[tokio::test]
    async fn merges_sources_newest_first() {
        let (store, stores, ws, _) = fuel_fixture("2024-01-07").await;
        store.add_expense(expense(ws, "2024-01-05", 200.0)).unwrap();
        store.add_income(income(ws, "2024-01-10", 5000.0)).unwrap();

        let dates: Vec<String> = build_ledger(&stores, Some(ws))
            .await
            .into_iter()
            .map(|t| t.date)
            .collect();
        assert_eq!(dates, vec!["2024-01-10", "2024-01-07", "2024-01-05"]);
    }

    #[tokio::test]
    async fn no_workspace_skips_dynamic_entries() {
        let (store, stores, ws, _) = fuel_fixture("2024-01-07").await;
        store.add_expense(expense(ws, "2024-01-05", 200.0)).unwrap();
        store.add_expense(expense(ws + 50, "2024-01-06", 80.0)).unwrap();

        let global = build_ledger(&stores, None).await;
        assert_eq!(global.len(), 2);
        assert!(global.iter().all(|t| !t.id.starts_with("entry-")));

        let scoped = build_ledger(&stores, Some(ws)).await;
        assert_eq!(scoped.len(), 2);
    }

    #[tokio::test]
    async fn entry_ids_are_namespaced() {
        let (store, stores, ws, _) = fuel_fixture("2024-01-07").await;
        store.add_expense(expense(ws, "2024-01-05", 200.0)).unwrap();

        let ledger = build_ledger(&stores, Some(ws)).await;
        let entry_ids: Vec<&str> = ledger
            .iter()
            .filter(|t| t.id.starts_with("entry-"))
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(entry_ids.len(), 1);
        let numeric = entry_ids[0].trim_start_matches("entry-");
        assert!(numeric.parse::<i64>().is_ok());
        assert!(ledger.iter().any(|t| t.id.parse::<i64>().is_ok()));
    }

    /// Serves a fixed list of expenses, ids included.
    struct FixedExpenses(Vec<Expense>);

    #[async_trait]
    impl ExpenseSource for FixedExpenses {
        async fn list_expenses(&self, _: Option<i64>) -> anyhow::Result<Vec<Expense>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn entry_and_expense_sharing_an_id_both_survive() {
        let (store, mut stores, ws, fuel) = fuel_fixture("2024-01-07").await;
        let entry = store.list_entries(fuel.id).await.unwrap().remove(0);
        stores.expenses = Arc::new(FixedExpenses(vec![Expense {
            id: entry.id,
            ..expense(ws, "2024-01-05", 200.0)
        }]));

        let ledger = build_ledger(&stores, Some(ws)).await;
        let ids: Vec<&str> = ledger.iter().map(|t| t.id.as_str()).collect();
        let plain = entry.id.to_string();
        let namespaced = format!("entry-{}", entry.id);
        assert_eq!(ids, vec![namespaced.as_str(), plain.as_str()]);
        assert_eq!(ledger[0].category, "Fuel");
        assert_eq!(ledger[1].category, "Transport");
    }

    struct Broken;

    #[async_trait]
    impl IncomeSource for Broken {
        async fn list_incomes(&self, _: Option<i64>) -> anyhow::Result<Vec<Income>> {
            Err(anyhow!("connection reset"))
        }
    }

    #[async_trait]
    impl ExpenseSource for Broken {
        async fn list_expenses(&self, _: Option<i64>) -> anyhow::Result<Vec<Expense>> {
            Err(anyhow!("connection reset"))
        }
    }

    /// Fails entry listing for one form only.
    struct FlakyEntries {
        inner: Arc<MemoryStore>,
        failing_form: i64,
    }

    #[async_trait]
    impl EntryStore for FlakyEntries {
        async fn insert_entry(
            &self,
            form_id: i64,
            workspace_id: i64,
            creator_id: i64,
            data: &EntryData,
        ) -> anyhow::Result<ExpenseEntry> {
            self.inner
                .insert_entry(form_id, workspace_id, creator_id, data)
                .await
        }

        async fn list_entries(&self, form_id: i64) -> anyhow::Result<Vec<ExpenseEntry>> {
            if form_id == self.failing_form {
                return Err(anyhow!("timeout"));
            }
            self.inner.list_entries(form_id).await
        }

        async fn delete_entry(&self, id: i64) -> anyhow::Result<bool> {
            self.inner.delete_entry(id).await
        }
    }

    #[tokio::test]
    async fn failing_income_source_keeps_the_rest() {
        let (store, mut stores, ws, _) = fuel_fixture("2024-01-07").await;
        store.add_expense(expense(ws, "2024-01-05", 200.0)).unwrap();
        store.add_income(income(ws, "2024-01-10", 5000.0)).unwrap();
        stores.incomes = Arc::new(Broken);

        let ledger = build_ledger(&stores, Some(ws)).await;
        assert_eq!(ledger.len(), 2);
        assert!(ledger.iter().all(|t| t.kind == TransactionType::Expense));
    }

    #[tokio::test]
    async fn every_fixed_source_failing_still_yields_entries() {
        let (_, mut stores, ws, _) = fuel_fixture("2024-01-07").await;
        stores.incomes = Arc::new(Broken);
        stores.expenses = Arc::new(Broken);

        let ledger = build_ledger(&stores, Some(ws)).await;
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].category, "Fuel");
    }

    #[tokio::test]
    async fn one_failing_form_does_not_sink_the_others() {
        let (store, mut stores, ws, fuel) = fuel_fixture("2024-01-07").await;
        let other = schema::create_form(
            &stores,
            NewForm {
                workspace_id: ws,
                name: "Repas".to_string(),
                description: None,
                fields: vec![number("Prix")],
            },
        )
        .await
        .unwrap();
        let data = [(other.fields[0].id.to_string(), json!("450"))]
            .into_iter()
            .collect();
        entries::create_entry(
            &stores,
            1,
            NewEntry {
                form_id: other.id,
                workspace_id: ws,
                data,
            },
        )
        .await
        .unwrap();

        stores.entries = Arc::new(FlakyEntries {
            inner: store,
            failing_form: fuel.id,
        });

        let ledger = build_ledger(&stores, Some(ws)).await;
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].category, "Repas");
        assert_eq!(ledger[0].amount, 450.0);
    }

    #[test]
    fn comment_follows_field_order() {
        let form = ExpenseForm {
            id: 1,
            workspace_id: 1,
            name: "Projets".to_string(),
            description: String::new(),
            created_at: Utc::now(),
            fields: vec![
                ExpenseField {
                    id: 1,
                    form_id: 1,
                    label: "Projet".to_string(),
                    field_type: FieldType::Text,
                    required: false,
                    options: vec![],
                    role: None,
                },
                ExpenseField {
                    id: 2,
                    form_id: 1,
                    label: "Prix".to_string(),
                    field_type: FieldType::Number,
                    required: false,
                    options: vec![],
                    role: None,
                },
            ],
        };
        let data: EntryData = [
            ("2".to_string(), json!("500")),
            ("1".to_string(), json!("Marketing")),
            ("77".to_string(), json!("stray")),
        ]
        .into_iter()
        .collect();

        assert_eq!(entry_comment(&form, &data), "Projet: Marketing, Prix: 500");
        assert_eq!(entry_comment(&form, &EntryData::new()), "");
    }

    #[test]
    fn fixed_schema_fallbacks() {
        let mut e = expense(1, "2024-01-05", 10.0);
        e.category = Some("  ".to_string());
        e.date = None;
        let t = map_expense(&e);
        assert_eq!(t.category, "AUTRE");
        assert_eq!(t.date, SENTINEL_DATE);

        let mut i = income(1, "2024-01-10", 30000.0);
        i.student_count = Some(3);
        i.income_type = None;
        let t = map_income(&i);
        assert_eq!(t.category, "FORMATION");
        assert_eq!(t.comment, "3 étudiants");
        assert_eq!(t.student_count, Some(3));
    }

    #[test]
    fn undated_rows_sort_oldest() {
        let mut undated = map_expense(&expense(1, "2024-01-05", 1.0));
        undated.date = SENTINEL_DATE.to_string();
        let dated = map_expense(&expense(1, "2023-12-31", 1.0));

        let mut v = vec![undated, dated];
        sort_newest_first(&mut v);
        assert_eq!(v[0].date, "2023-12-31");
        assert_eq!(v[1].date, SENTINEL_DATE);
    }

    #[test]
    fn filter_by_type_and_text() {
        let ledger = vec![
            map_expense(&expense(1, "2024-01-05", 10.0)),
            map_income(&income(1, "2024-01-10", 20.0)),
        ];

        let only_income = LedgerFilter {
            kind: Some(TransactionType::Income),
            q: None,
        };
        assert_eq!(only_income.apply(ledger.clone()).len(), 1);

        let taxi = LedgerFilter {
            kind: None,
            q: Some("TAXI".to_string()),
        };
        let found = taxi.apply(ledger.clone());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].category, "Transport");

        assert_eq!(LedgerFilter::default().apply(ledger).len(), 2);
    }
}
