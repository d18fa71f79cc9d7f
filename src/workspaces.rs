use crate::{
    error::{AppError, AppResult},
    models::Workspace,
    store::Stores,
};

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'ö' | 'õ' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// URL-safe slug: lower-case ascii alphanumerics separated by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars().flat_map(char::to_lowercase).map(fold_accent) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

pub async fn create_workspace(stores: &Stores, name: &str, owner_id: i64) -> AppResult<Workspace> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::field("name", "workspace name is required"));
    }
    let base = slugify(name);
    if base.is_empty() {
        return Err(AppError::field(
            "name",
            "workspace name needs at least one letter or digit",
        ));
    }

    let mut slug = base.clone();
    let mut n = 1;
    while stores.workspaces.slug_exists(&slug).await? {
        n += 1;
        slug = format!("{}-{}", base, n);
    }

    let ws = stores
        .workspaces
        .insert_workspace(name, &slug, owner_id)
        .await?;
    log::info!("created workspace {} '{}' ({})", ws.id, ws.name, ws.slug);
    Ok(ws)
}

pub async fn get_workspace(stores: &Stores, id: i64) -> AppResult<Workspace> {
    stores
        .workspaces
        .get_workspace(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("workspace {}", id)))
}

pub async fn delete_workspace(stores: &Stores, id: i64) -> AppResult<()> {
    if !stores.workspaces.delete_workspace(id).await? {
        return Err(AppError::not_found(format!("workspace {}", id)));
    }
    log::info!("deleted workspace {} with its forms and entries", id);
    Ok(())
}
