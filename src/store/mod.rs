//! Storage seams.
//!
//! Each concern the core reads or writes sits behind its own trait so the
//! reconciliation engine can be driven by any mix of sources: the postgres
//! store in production, the in-memory store in tests and demos, or a failing
//! double when exercising partial-failure behaviour.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{EntryData, Expense, ExpenseEntry, ExpenseForm, Income, NewForm, Workspace};

#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    async fn insert_workspace(&self, name: &str, slug: &str, owner_id: i64) -> Result<Workspace>;
    async fn slug_exists(&self, slug: &str) -> Result<bool>;
    /// Ordered by id.
    async fn list_workspaces(&self) -> Result<Vec<Workspace>>;
    async fn get_workspace(&self, id: i64) -> Result<Option<Workspace>>;
    /// Removes the workspace with its forms, fields and entries.
    /// Returns false if no such workspace existed.
    async fn delete_workspace(&self, id: i64) -> Result<bool>;
}

#[async_trait]
pub trait FormStore: Send + Sync {
    /// Writes the form and all of its fields as one unit; fields keep their order.
    async fn insert_form(&self, form: &NewForm) -> Result<ExpenseForm>;
    async fn list_forms(&self, workspace_id: i64) -> Result<Vec<ExpenseForm>>;
    async fn get_form(&self, id: i64) -> Result<Option<ExpenseForm>>;
    /// Removes a form together with its entries in one unit. Without
    /// `cascade`, a form that still has entries is left untouched.
    async fn delete_form(&self, id: i64, cascade: bool) -> Result<FormRemoval>;
}

/// Outcome of [`FormStore::delete_form`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormRemoval {
    Missing,
    HasEntries(i64),
    Removed { entries: u64 },
}

#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn insert_entry(
        &self,
        form_id: i64,
        workspace_id: i64,
        creator_id: i64,
        data: &EntryData,
    ) -> Result<ExpenseEntry>;
    async fn list_entries(&self, form_id: i64) -> Result<Vec<ExpenseEntry>>;
    async fn delete_entry(&self, id: i64) -> Result<bool>;
}

/// Fixed-schema expenses. `None` scope means every workspace.
#[async_trait]
pub trait ExpenseSource: Send + Sync {
    async fn list_expenses(&self, workspace_id: Option<i64>) -> Result<Vec<Expense>>;
}

/// Fixed-schema incomes. `None` scope means every workspace.
#[async_trait]
pub trait IncomeSource: Send + Sync {
    async fn list_incomes(&self, workspace_id: Option<i64>) -> Result<Vec<Income>>;
}

#[derive(Clone)]
pub struct Stores {
    pub workspaces: Arc<dyn WorkspaceStore>,
    pub forms: Arc<dyn FormStore>,
    pub entries: Arc<dyn EntryStore>,
    pub expenses: Arc<dyn ExpenseSource>,
    pub incomes: Arc<dyn IncomeSource>,
}

impl Stores {
    /// Uses one backend for every concern.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: WorkspaceStore + FormStore + EntryStore + ExpenseSource + IncomeSource + 'static,
    {
        Self {
            workspaces: backend.clone(),
            forms: backend.clone(),
            entries: backend.clone(),
            expenses: backend.clone(),
            incomes: backend,
        }
    }
}
