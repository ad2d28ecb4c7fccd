//! Test Helpers

use std::collections::HashMap;

use crate::domain::tenants::{
    TenantsService, TenantsServiceError,
    data::{NewTenant, TenantInsert},
    records::{TenantId, TenantRecord},
    store::{StoreError, TenantTransaction},
};

/// Inserts a tenant directly through a store transaction.
pub(crate) async fn seed_tenant<T>(
    tx: &mut T,
    name: &str,
    parent_id: Option<TenantId>,
) -> Result<TenantRecord, StoreError>
where
    T: TenantTransaction,
{
    tx.insert(TenantInsert {
        id: TenantId::new(),
        name: name.to_string(),
        description: None,
        parent_id,
    })
    .await
}

/// Inserts a tree described by dotted paths (`"t1.t1a.t1a1"`), parents first,
/// and returns every tenant keyed by its last path segment.
pub(crate) async fn seed_tree<T>(
    tx: &mut T,
    paths: &[&str],
) -> Result<HashMap<String, TenantRecord>, StoreError>
where
    T: TenantTransaction,
{
    let mut tree: HashMap<String, TenantRecord> = HashMap::new();

    for path in paths {
        let (parent, name) = split_path(path);
        let parent_id = parent.and_then(|parent| tree.get(parent)).map(|tenant| tenant.id);

        let tenant = seed_tenant(tx, name, parent_id).await?;

        tree.insert(name.to_string(), tenant);
    }

    Ok(tree)
}

/// Same as [`seed_tree`], but through the service so every create is
/// validated and notified.
pub(crate) async fn create_tree<S>(
    service: &S,
    paths: &[&str],
) -> Result<HashMap<String, TenantRecord>, TenantsServiceError>
where
    S: TenantsService,
{
    let mut tree: HashMap<String, TenantRecord> = HashMap::new();

    for path in paths {
        let (parent, name) = split_path(path);

        let tenant = match parent.and_then(|parent| tree.get(parent)) {
            Some(parent) => NewTenant::child_of(parent.id, name),
            None => NewTenant::root(name),
        };

        let tenant = service.create_tenant(tenant, None).await?;

        tree.insert(name.to_string(), tenant);
    }

    Ok(tree)
}

fn split_path(path: &str) -> (Option<&str>, &str) {
    let mut segments = path.rsplit('.');
    let name = segments.next().unwrap_or(path);

    (segments.next(), name)
}
