use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Utc};
use sqlx::{prelude::*, types::Json, Pool, Postgres};

use super::{EntryStore, ExpenseSource, FormRemoval, FormStore, IncomeSource, WorkspaceStore};
use crate::models::{
    EntryData, Expense, ExpenseEntry, ExpenseField, ExpenseForm, FieldRole, FieldType, Income,
    NewForm, Workspace,
};

#[derive(Clone)]
pub struct PgStore {
    p: Pool<Postgres>,
}

impl PgStore {
    pub fn new(p: Pool<Postgres>) -> Self {
        Self { p }
    }

    async fn fields_for(&self, form_ids: &[i64]) -> Result<HashMap<i64, Vec<ExpenseField>>> {
        let rows = sqlx::query_as::<_, FieldRow>(
            r#"
            SELECT id, form_id, label, field_type, required, options, role
            FROM expense_fields
            WHERE form_id = ANY($1)
            ORDER BY form_id, position
            "#,
        )
        .bind(form_ids)
        .fetch_all(&self.p)
        .await
        .context("cannot load form fields")?;

        let mut by_form: HashMap<i64, Vec<ExpenseField>> = HashMap::new();
        for row in rows {
            let field = row.into_field()?;
            by_form.entry(field.form_id).or_default().push(field);
        }
        Ok(by_form)
    }

    async fn assemble(&self, rows: Vec<FormRow>) -> Result<Vec<ExpenseForm>> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut fields = self.fields_for(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|r| {
                let f = fields.remove(&r.id).unwrap_or_default();
                r.into_form(f)
            })
            .collect())
    }
}

#[derive(FromRow)]
struct WorkspaceRow {
    id: i64,
    name: String,
    slug: String,
    owner_id: i64,
    created_at: DateTime<Utc>,
}

impl From<WorkspaceRow> for Workspace {
    fn from(r: WorkspaceRow) -> Self {
        Workspace {
            id: r.id,
            name: r.name,
            slug: r.slug,
            owner_id: r.owner_id,
            created_at: r.created_at,
        }
    }
}

#[derive(FromRow)]
struct FormRow {
    id: i64,
    workspace_id: i64,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl FormRow {
    fn into_form(self, fields: Vec<ExpenseField>) -> ExpenseForm {
        ExpenseForm {
            id: self.id,
            workspace_id: self.workspace_id,
            name: self.name,
            description: self.description.unwrap_or_default(),
            created_at: self.created_at,
            fields,
        }
    }
}

#[derive(FromRow)]
struct FieldRow {
    id: i64,
    form_id: i64,
    label: String,
    field_type: String,
    required: bool,
    options: Vec<String>,
    role: Option<String>,
}

impl FieldRow {
    fn into_field(self) -> Result<ExpenseField> {
        let field_type = FieldType::parse(&self.field_type)
            .ok_or_else(|| anyhow!("field {} has unknown type '{}'", self.id, self.field_type))?;
        // an unrecognised role degrades to no role
        let role = self.role.as_deref().and_then(FieldRole::parse);
        Ok(ExpenseField {
            id: self.id,
            form_id: self.form_id,
            label: self.label,
            field_type,
            required: self.required,
            options: self.options,
            role,
        })
    }
}

#[derive(FromRow)]
struct EntryRow {
    id: i64,
    form_id: i64,
    workspace_id: i64,
    creator_id: i64,
    data: Json<EntryData>,
    created_at: DateTime<Utc>,
}

impl From<EntryRow> for ExpenseEntry {
    fn from(r: EntryRow) -> Self {
        ExpenseEntry {
            id: r.id,
            form_id: r.form_id,
            workspace_id: r.workspace_id,
            creator_id: r.creator_id,
            data: r.data.0,
            created_at: r.created_at,
        }
    }
}

fn to_f64(v: &BigDecimal) -> f64 {
    v.to_f64().unwrap_or(0.0)
}

#[async_trait]
impl WorkspaceStore for PgStore {
    async fn insert_workspace(&self, name: &str, slug: &str, owner_id: i64) -> Result<Workspace> {
        let row = sqlx::query_as::<_, WorkspaceRow>(
            r#"
            INSERT INTO workspaces (name, slug, owner_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, owner_id, created_at
            "#,
        )
        .bind(name)
        .bind(slug)
        .bind(owner_id)
        .fetch_one(&self.p)
        .await
        .context("cannot insert workspace")?;
        Ok(row.into())
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let exists: bool = sqlx::query("SELECT EXISTS(SELECT 1 FROM workspaces WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&self.p)
            .await?
            .try_get(0)?;
        Ok(exists)
    }

    async fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        let rows = sqlx::query_as::<_, WorkspaceRow>(
            "SELECT id, name, slug, owner_id, created_at FROM workspaces ORDER BY id",
        )
        .fetch_all(&self.p)
        .await
        .context("cannot list workspaces")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_workspace(&self, id: i64) -> Result<Option<Workspace>> {
        let row = sqlx::query_as::<_, WorkspaceRow>(
            "SELECT id, name, slug, owner_id, created_at FROM workspaces WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.p)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn delete_workspace(&self, id: i64) -> Result<bool> {
        let mut tx = self.p.begin().await?;
        sqlx::query("DELETE FROM expense_entries WHERE workspace_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        // fields go with their forms through ON DELETE CASCADE
        sqlx::query("DELETE FROM expense_forms WHERE workspace_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let res = sqlx::query("DELETE FROM workspaces WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl FormStore for PgStore {
    async fn insert_form(&self, form: &NewForm) -> Result<ExpenseForm> {
        let mut tx = self.p.begin().await?;

        let row = sqlx::query_as::<_, FormRow>(
            r#"
            INSERT INTO expense_forms (workspace_id, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, workspace_id, name, description, created_at
            "#,
        )
        .bind(form.workspace_id)
        .bind(&form.name)
        .bind(form.description.as_deref().unwrap_or_default())
        .fetch_one(&mut *tx)
        .await
        .context("cannot insert form")?;

        let mut fields = Vec::with_capacity(form.fields.len());
        for (position, f) in form.fields.iter().enumerate() {
            let field = sqlx::query_as::<_, FieldRow>(
                r#"
                INSERT INTO expense_fields (form_id, position, label, field_type, required, options, role)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, form_id, label, field_type, required, options, role
                "#,
            )
            .bind(row.id)
            .bind(position as i32)
            .bind(&f.label)
            .bind(f.field_type.as_str())
            .bind(f.required)
            .bind(f.options.clone().unwrap_or_default())
            .bind(f.role.map(|r| r.as_str()))
            .fetch_one(&mut *tx)
            .await
            .with_context(|| format!("cannot insert field '{}'", f.label))?;
            fields.push(field.into_field()?);
        }

        tx.commit().await?;
        Ok(row.into_form(fields))
    }

    async fn list_forms(&self, workspace_id: i64) -> Result<Vec<ExpenseForm>> {
        let rows = sqlx::query_as::<_, FormRow>(
            r#"
            SELECT id, workspace_id, name, description, created_at
            FROM expense_forms
            WHERE workspace_id = $1
            ORDER BY id
            "#,
        )
        .bind(workspace_id)
        .fetch_all(&self.p)
        .await
        .context("cannot list forms")?;
        self.assemble(rows).await
    }

    async fn get_form(&self, id: i64) -> Result<Option<ExpenseForm>> {
        let row = sqlx::query_as::<_, FormRow>(
            "SELECT id, workspace_id, name, description, created_at FROM expense_forms WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.p)
        .await?;

        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn delete_form(&self, id: i64, cascade: bool) -> Result<FormRemoval> {
        let mut tx = self.p.begin().await?;
        // row lock holds back concurrent entry inserts until commit
        let locked = sqlx::query("SELECT id FROM expense_forms WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(FormRemoval::Missing);
        }

        let count: i64 = sqlx::query("SELECT count(*) FROM expense_entries WHERE form_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?
            .try_get(0)?;
        if count > 0 && !cascade {
            return Ok(FormRemoval::HasEntries(count));
        }

        let entries = sqlx::query("DELETE FROM expense_entries WHERE form_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM expense_forms WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(FormRemoval::Removed { entries })
    }
}

#[async_trait]
impl EntryStore for PgStore {
    async fn insert_entry(
        &self,
        form_id: i64,
        workspace_id: i64,
        creator_id: i64,
        data: &EntryData,
    ) -> Result<ExpenseEntry> {
        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            INSERT INTO expense_entries (form_id, workspace_id, creator_id, data)
            VALUES ($1, $2, $3, $4)
            RETURNING id, form_id, workspace_id, creator_id, data, created_at
            "#,
        )
        .bind(form_id)
        .bind(workspace_id)
        .bind(creator_id)
        .bind(Json(data))
        .fetch_one(&self.p)
        .await
        .context("cannot insert entry")?;
        Ok(row.into())
    }

    async fn list_entries(&self, form_id: i64) -> Result<Vec<ExpenseEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT id, form_id, workspace_id, creator_id, data, created_at
            FROM expense_entries
            WHERE form_id = $1
            "#,
        )
        .bind(form_id)
        .fetch_all(&self.p)
        .await
        .with_context(|| format!("cannot list entries of form {}", form_id))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_entry(&self, id: i64) -> Result<bool> {
        let res = sqlx::query("DELETE FROM expense_entries WHERE id = $1")
            .bind(id)
            .execute(&self.p)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl ExpenseSource for PgStore {
    async fn list_expenses(&self, workspace_id: Option<i64>) -> Result<Vec<Expense>> {
        #[derive(FromRow)]
        struct Record {
            id: i64,
            workspace_id: Option<i64>,
            category: Option<String>,
            amount: Option<BigDecimal>,
            comment: Option<String>,
            date: Option<DateTime<Utc>>,
        }

        let records = sqlx::query_as::<_, Record>(
            r#"
            SELECT id, workspace_id, category, amount, comment, date
            FROM expenses
            WHERE $1::BIGINT IS NULL OR workspace_id = $1
            "#,
        )
        .bind(workspace_id)
        .fetch_all(&self.p)
        .await
        .context("cannot list expenses")?;

        Ok(records
            .into_iter()
            .map(|r| Expense {
                id: r.id,
                workspace_id: r.workspace_id,
                category: r.category,
                amount: r.amount.as_ref().map(to_f64).unwrap_or(0.0),
                comment: r.comment,
                date: r.date,
            })
            .collect())
    }
}

#[async_trait]
impl IncomeSource for PgStore {
    async fn list_incomes(&self, workspace_id: Option<i64>) -> Result<Vec<Income>> {
        #[derive(FromRow)]
        struct Record {
            id: i64,
            workspace_id: Option<i64>,
            income_type: Option<String>,
            subtype: Option<String>,
            amount: Option<BigDecimal>,
            student_count: Option<i32>,
            comment: Option<String>,
            date: Option<DateTime<Utc>>,
        }

        let records = sqlx::query_as::<_, Record>(
            r#"
            SELECT id, workspace_id, type AS income_type, subtype, amount, student_count, comment, date
            FROM incomes
            WHERE $1::BIGINT IS NULL OR workspace_id = $1
            "#,
        )
        .bind(workspace_id)
        .fetch_all(&self.p)
        .await
        .context("cannot list incomes")?;

        Ok(records
            .into_iter()
            .map(|r| Income {
                id: r.id,
                workspace_id: r.workspace_id,
                income_type: r.income_type,
                subtype: r.subtype,
                amount: r.amount.as_ref().map(to_f64).unwrap_or(0.0),
                student_count: r.student_count,
                comment: r.comment,
                date: r.date,
            })
            .collect())
    }
}
