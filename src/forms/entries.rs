use crate::{
    error::{AppError, AppResult},
    forms::fields,
    models::{EntryData, ExpenseEntry, ExpenseForm, NewEntry},
    store::Stores,
};

/// Runs every field of `form` through the resolver and returns the data to
/// store. Keys that name no field of the form are rejected.
pub fn validate_entry_data(form: &ExpenseForm, data: &EntryData) -> AppResult<EntryData> {
    if let Some(unknown) = data
        .keys()
        .find(|k| !form.fields.iter().any(|f| f.id.to_string() == **k))
    {
        return Err(AppError::field(
            unknown.clone(),
            format!("form '{}' has no field {}", form.name, unknown),
        ));
    }

    let mut clean = EntryData::new();
    for field in &form.fields {
        let key = field.id.to_string();
        if let Some(v) = fields::coerce(field, data.get(&key))? {
            clean.insert(key, v);
        }
    }
    Ok(clean)
}

pub async fn create_entry(
    stores: &Stores,
    creator_id: i64,
    entry: NewEntry,
) -> AppResult<ExpenseEntry> {
    let form = stores
        .forms
        .get_form(entry.form_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("form {}", entry.form_id)))?;

    if form.workspace_id != entry.workspace_id {
        return Err(AppError::field(
            "workspace_id",
            format!(
                "form {} does not belong to workspace {}",
                form.id, entry.workspace_id
            ),
        ));
    }

    let data = validate_entry_data(&form, &entry.data)?;
    let stored = stores
        .entries
        .insert_entry(form.id, form.workspace_id, creator_id, &data)
        .await?;

    log::info!(
        "user {} recorded entry {} on form {} '{}'",
        creator_id,
        stored.id,
        form.id,
        form.name
    );
    Ok(stored)
}

pub async fn list_entries(stores: &Stores, form_id: i64) -> AppResult<Vec<ExpenseEntry>> {
    if stores.forms.get_form(form_id).await?.is_none() {
        return Err(AppError::not_found(format!("form {}", form_id)));
    }
    Ok(stores.entries.list_entries(form_id).await?)
}

/// Deleting an id that does not exist (or no longer exists) is `NotFound`.
pub async fn delete_entry(stores: &Stores, entry_id: i64) -> AppResult<()> {
    if !stores.entries.delete_entry(entry_id).await? {
        return Err(AppError::not_found(format!("entry {}", entry_id)));
    }
    log::info!("deleted entry {}", entry_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use super::*;
    use crate::{
        forms::schema,
        models::{FieldType, NewField, NewForm},
        store::memory::MemoryStore,
    };

    async fn setup() -> (Stores, ExpenseForm) {
        let stores = Stores::from_backend(Arc::new(MemoryStore::new()));
        let ws = stores
            .workspaces
            .insert_workspace("Atelier", "atelier", 1)
            .await
            .unwrap();
        let form = schema::create_form(
            &stores,
            NewForm {
                workspace_id: ws.id,
                name: "Fuel".to_string(),
                description: None,
                fields: vec![
                    NewField {
                        label: "Litres".to_string(),
                        field_type: FieldType::Number,
                        required: true,
                        options: None,
                        role: None,
                    },
                    NewField {
                        label: "Station".to_string(),
                        field_type: FieldType::Select,
                        required: false,
                        options: Some(vec!["Total".to_string(), "Sol".to_string()]),
                        role: None,
                    },
                    NewField {
                        label: "Note".to_string(),
                        field_type: FieldType::Text,
                        required: false,
                        options: None,
                        role: None,
                    },
                ],
            },
        )
        .await
        .unwrap();
        (stores, form)
    }

    fn data(form: &ExpenseForm, values: &[(usize, Value)]) -> EntryData {
        values
            .iter()
            .map(|(i, v)| (form.fields[*i].id.to_string(), v.clone()))
            .collect()
    }

    fn new_entry(form: &ExpenseForm, data: EntryData) -> NewEntry {
        NewEntry {
            form_id: form.id,
            workspace_id: form.workspace_id,
            data,
        }
    }

    #[tokio::test]
    async fn stores_normalized_values() {
        let (stores, form) = setup().await;
        let entry = create_entry(
            &stores,
            42,
            new_entry(&form, data(&form, &[(0, json!(20)), (1, json!("Sol")), (2, json!(""))])),
        )
        .await
        .unwrap();

        assert_eq!(entry.creator_id, 42);
        assert_eq!(entry.data.len(), 2);
        assert_eq!(entry.data[&form.fields[0].id.to_string()], json!("20"));
        assert_eq!(list_entries(&stores, form.id).await.unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn missing_required_value_is_not_persisted() {
        let (stores, form) = setup().await;
        let res = create_entry(&stores, 1, new_entry(&form, data(&form, &[(1, json!("Sol"))]))).await;

        assert!(matches!(res, Err(AppError::Validation { field: Some(k), .. }) if k == form.fields[0].id.to_string()));
        assert!(list_entries(&stores, form.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_option_is_rejected() {
        let (stores, form) = setup().await;
        let res = create_entry(
            &stores,
            1,
            new_entry(&form, data(&form, &[(0, json!("5")), (1, json!("Shell"))])),
        )
        .await;
        assert!(matches!(res, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn unknown_keys_are_rejected() {
        let (stores, form) = setup().await;
        let mut d = data(&form, &[(0, json!("5"))]);
        d.insert("999".to_string(), json!("x"));
        let res = create_entry(&stores, 1, new_entry(&form, d)).await;
        assert!(matches!(res, Err(AppError::Validation { field: Some(k), .. }) if k == "999"));
    }

    #[tokio::test]
    async fn unknown_form_and_foreign_workspace() {
        let (stores, form) = setup().await;

        let mut e = new_entry(&form, EntryData::new());
        e.form_id = 12345;
        assert!(matches!(
            create_entry(&stores, 1, e).await,
            Err(AppError::NotFound(_))
        ));

        let mut e = new_entry(&form, data(&form, &[(0, json!("5"))]));
        e.workspace_id += 100;
        assert!(matches!(
            create_entry(&stores, 1, e).await,
            Err(AppError::Validation { .. })
        ));

        assert!(matches!(
            list_entries(&stores, 12345).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_twice_is_not_found() {
        let (stores, form) = setup().await;
        let entry = create_entry(&stores, 1, new_entry(&form, data(&form, &[(0, json!("5"))])))
            .await
            .unwrap();

        delete_entry(&stores, entry.id).await.unwrap();
        assert!(matches!(
            delete_entry(&stores, entry.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
