use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use super::{EntryStore, ExpenseSource, FormRemoval, FormStore, IncomeSource, WorkspaceStore};
use crate::models::{
    EntryData, Expense, ExpenseEntry, ExpenseField, ExpenseForm, Income, NewForm, Workspace,
};

#[derive(Default)]
struct Inner {
    next_id: i64,
    workspaces: Vec<Workspace>,
    forms: Vec<ExpenseForm>,
    entries: Vec<ExpenseEntry>,
    expenses: Vec<Expense>,
    incomes: Vec<Income>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store. Ids come from one shared counter.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| anyhow!("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Adds a fixed-schema expense, assigning it an id.
    pub fn add_expense(&self, mut expense: Expense) -> Result<Expense> {
        let mut inner = self.write()?;
        expense.id = inner.next_id();
        inner.expenses.push(expense.clone());
        Ok(expense)
    }

    /// Adds a fixed-schema income, assigning it an id.
    pub fn add_income(&self, mut income: Income) -> Result<Income> {
        let mut inner = self.write()?;
        income.id = inner.next_id();
        inner.incomes.push(income.clone());
        Ok(income)
    }

    /// Overrides the creation time of a stored entry.
    pub fn set_entry_created_at(
        &self,
        entry_id: i64,
        created_at: chrono::DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.write()?;
        let entry = inner
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| anyhow!("entry {} does not exist", entry_id))?;
        entry.created_at = created_at;
        Ok(())
    }
}

#[async_trait]
impl WorkspaceStore for MemoryStore {
    async fn insert_workspace(&self, name: &str, slug: &str, owner_id: i64) -> Result<Workspace> {
        let mut inner = self.write()?;
        let ws = Workspace {
            id: inner.next_id(),
            name: name.to_string(),
            slug: slug.to_string(),
            owner_id,
            created_at: Utc::now(),
        };
        inner.workspaces.push(ws.clone());
        Ok(ws)
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        Ok(self.read()?.workspaces.iter().any(|w| w.slug == slug))
    }

    async fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        Ok(self.read()?.workspaces.clone())
    }

    async fn get_workspace(&self, id: i64) -> Result<Option<Workspace>> {
        Ok(self.read()?.workspaces.iter().find(|w| w.id == id).cloned())
    }

    async fn delete_workspace(&self, id: i64) -> Result<bool> {
        let mut inner = self.write()?;
        let before = inner.workspaces.len();
        inner.workspaces.retain(|w| w.id != id);
        if inner.workspaces.len() == before {
            return Ok(false);
        }
        inner.forms.retain(|f| f.workspace_id != id);
        inner.entries.retain(|e| e.workspace_id != id);
        Ok(true)
    }
}

#[async_trait]
impl FormStore for MemoryStore {
    async fn insert_form(&self, form: &NewForm) -> Result<ExpenseForm> {
        let mut inner = self.write()?;
        let form_id = inner.next_id();
        let mut fields = Vec::with_capacity(form.fields.len());
        for f in &form.fields {
            fields.push(ExpenseField {
                id: inner.next_id(),
                form_id,
                label: f.label.clone(),
                field_type: f.field_type,
                required: f.required,
                options: f.options.clone().unwrap_or_default(),
                role: f.role,
            });
        }

        let stored = ExpenseForm {
            id: form_id,
            workspace_id: form.workspace_id,
            name: form.name.clone(),
            description: form.description.clone().unwrap_or_default(),
            created_at: Utc::now(),
            fields,
        };
        inner.forms.push(stored.clone());
        Ok(stored)
    }

    async fn list_forms(&self, workspace_id: i64) -> Result<Vec<ExpenseForm>> {
        Ok(self
            .read()?
            .forms
            .iter()
            .filter(|f| f.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn get_form(&self, id: i64) -> Result<Option<ExpenseForm>> {
        Ok(self.read()?.forms.iter().find(|f| f.id == id).cloned())
    }

    async fn delete_form(&self, id: i64, cascade: bool) -> Result<FormRemoval> {
        let mut inner = self.write()?;
        if !inner.forms.iter().any(|f| f.id == id) {
            return Ok(FormRemoval::Missing);
        }

        let count = inner.entries.iter().filter(|e| e.form_id == id).count();
        if count > 0 && !cascade {
            return Ok(FormRemoval::HasEntries(count as i64));
        }

        inner.entries.retain(|e| e.form_id != id);
        inner.forms.retain(|f| f.id != id);
        Ok(FormRemoval::Removed {
            entries: count as u64,
        })
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn insert_entry(
        &self,
        form_id: i64,
        workspace_id: i64,
        creator_id: i64,
        data: &EntryData,
    ) -> Result<ExpenseEntry> {
        let mut inner = self.write()?;
        let entry = ExpenseEntry {
            id: inner.next_id(),
            form_id,
            workspace_id,
            creator_id,
            data: data.clone(),
            created_at: Utc::now(),
        };
        inner.entries.push(entry.clone());
        Ok(entry)
    }

    async fn list_entries(&self, form_id: i64) -> Result<Vec<ExpenseEntry>> {
        Ok(self
            .read()?
            .entries
            .iter()
            .filter(|e| e.form_id == form_id)
            .cloned()
            .collect())
    }

    async fn delete_entry(&self, id: i64) -> Result<bool> {
        let mut inner = self.write()?;
        let before = inner.entries.len();
        inner.entries.retain(|e| e.id != id);
        Ok(inner.entries.len() != before)
    }
}

#[async_trait]
impl ExpenseSource for MemoryStore {
    async fn list_expenses(&self, workspace_id: Option<i64>) -> Result<Vec<Expense>> {
        Ok(self
            .read()?
            .expenses
            .iter()
            .filter(|e| workspace_id.is_none() || e.workspace_id == workspace_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl IncomeSource for MemoryStore {
    async fn list_incomes(&self, workspace_id: Option<i64>) -> Result<Vec<Income>> {
        Ok(self
            .read()?
            .incomes
            .iter()
            .filter(|i| workspace_id.is_none() || i.workspace_id == workspace_id)
            .cloned()
            .collect())
    }
}
