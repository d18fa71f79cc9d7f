use crate::{
    error::{AppError, AppResult},
    forms::fields,
    models::{ExpenseForm, NewForm},
    store::{FormRemoval, Stores},
};

/// What happened to a form and its entries on delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct FormDeletion {
    pub form_id: i64,
    pub entries_deleted: u64,
}

pub async fn create_form(stores: &Stores, mut form: NewForm) -> AppResult<ExpenseForm> {
    form.name = form.name.trim().to_string();
    if form.name.is_empty() {
        return Err(AppError::field("name", "form name is required"));
    }
    form.description = form
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    for (position, field) in form.fields.iter_mut().enumerate() {
        fields::check_definition(position, field)?;
    }
    let tagged = form.fields.iter().filter(|f| f.role.is_some()).count();
    if tagged > 1 {
        return Err(AppError::field(
            "fields",
            "only one field can carry the amount role",
        ));
    }

    if stores
        .workspaces
        .get_workspace(form.workspace_id)
        .await?
        .is_none()
    {
        return Err(AppError::not_found(format!("workspace {}", form.workspace_id)));
    }

    let created = stores.forms.insert_form(&form).await?;
    log::info!(
        "created form {} '{}' with {} fields in workspace {}",
        created.id,
        created.name,
        created.fields.len(),
        created.workspace_id
    );
    Ok(created)
}

pub async fn list_forms(stores: &Stores, workspace_id: i64) -> AppResult<Vec<ExpenseForm>> {
    if stores.workspaces.get_workspace(workspace_id).await?.is_none() {
        return Err(AppError::not_found(format!("workspace {}", workspace_id)));
    }
    Ok(stores.forms.list_forms(workspace_id).await?)
}

/// Deletes a form. A form that still has entries is only deleted when
/// `cascade` is set, in which case its entries go first.
pub async fn delete_form(stores: &Stores, form_id: i64, cascade: bool) -> AppResult<FormDeletion> {
    let entries_deleted = match stores.forms.delete_form(form_id, cascade).await? {
        FormRemoval::Missing => return Err(AppError::not_found(format!("form {}", form_id))),
        FormRemoval::HasEntries(count) => {
            return Err(AppError::Conflict(format!(
                "form {} still has {} entries; delete with cascade=true to remove them too",
                form_id, count
            )))
        }
        FormRemoval::Removed { entries } => entries,
    };

    log::info!("deleted form {} and {} entries", form_id, entries_deleted);
    Ok(FormDeletion {
        form_id,
        entries_deleted,
    })
}
