//! In-process tenant store.
//!
//! Transactions take the store-wide lock for their whole lifetime. Reads go
//! straight to the committed rows; the first write stages a copy, so
//! concurrent mutations are serialised and an abandoned transaction leaves
//! nothing behind.

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use jiff::Timestamp;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::tenants::{
    data::{TenantInsert, TenantUpdate},
    records::{TenantId, TenantRecord},
    store::{StoreError, TenantStore, TenantTransaction},
};

type Rows = BTreeMap<TenantId, TenantRecord>;

#[derive(Debug, Default)]
struct Faults {
    delete: AtomicBool,
    commit: AtomicBool,
}

/// Tenant store held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTenantStore {
    rows: Arc<Mutex<Rows>>,
    faults: Arc<Faults>,
}

impl MemoryTenantStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `delete_many` remove part of its input and then fail.
    pub fn fail_next_delete(&self) {
        self.faults.delete.store(true, Ordering::SeqCst);
    }

    /// Makes the next `commit` fail without publishing the staged rows.
    pub fn fail_next_commit(&self) {
        self.faults.commit.store(true, Ordering::SeqCst);
    }

    /// Number of committed tenants.
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    /// Whether no tenants have been committed.
    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

#[async_trait]
impl TenantStore for MemoryTenantStore {
    type Transaction = MemoryTenantTransaction;

    async fn begin(&self) -> Result<Self::Transaction, StoreError> {
        let guard = Arc::clone(&self.rows).lock_owned().await;

        Ok(MemoryTenantTransaction {
            guard,
            staged: None,
            faults: Arc::clone(&self.faults),
        })
    }
}

/// Transaction over a [`MemoryTenantStore`].
#[derive(Debug)]
pub struct MemoryTenantTransaction {
    guard: OwnedMutexGuard<Rows>,
    /// Copy of the committed rows, taken on first write.
    staged: Option<Rows>,
    faults: Arc<Faults>,
}

impl MemoryTenantTransaction {
    fn rows(&self) -> &Rows {
        self.staged.as_ref().unwrap_or(&*self.guard)
    }

    fn rows_mut(&mut self) -> &mut Rows {
        let committed = &*self.guard;

        self.staged.get_or_insert_with(|| committed.clone())
    }

    fn sorted_where(&self, predicate: impl Fn(&TenantRecord) -> bool) -> Vec<TenantRecord> {
        let mut rows: Vec<TenantRecord> = self
            .rows()
            .values()
            .filter(|row| predicate(*row))
            .cloned()
            .collect();

        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        rows
    }

    fn name_taken(&self, parent: Option<TenantId>, name: &str, except: TenantId) -> bool {
        self.rows()
            .values()
            .any(|row| row.parent_id == parent && row.name == name && row.id != except)
    }
}

#[async_trait]
impl TenantTransaction for MemoryTenantTransaction {
    async fn get(&mut self, id: TenantId) -> Result<Option<TenantRecord>, StoreError> {
        Ok(self.rows().get(&id).cloned())
    }

    async fn insert(&mut self, tenant: TenantInsert) -> Result<TenantRecord, StoreError> {
        if self.rows().contains_key(&tenant.id) {
            return Err(StoreError::AlreadyExists);
        }

        if tenant.parent_id == Some(tenant.id) || tenant.name.trim().is_empty() {
            return Err(StoreError::InvalidData);
        }

        if let Some(parent) = tenant.parent_id
            && !self.rows().contains_key(&parent)
        {
            return Err(StoreError::InvalidReference);
        }

        if self.name_taken(tenant.parent_id, &tenant.name, tenant.id) {
            return Err(StoreError::DuplicateName);
        }

        let now = Timestamp::now();

        let record = TenantRecord {
            id: tenant.id,
            name: tenant.name,
            description: tenant.description,
            parent_id: tenant.parent_id,
            created_at: now,
            updated_at: now,
        };

        self.rows_mut().insert(record.id, record.clone());

        Ok(record)
    }

    async fn update(
        &mut self,
        id: TenantId,
        update: TenantUpdate,
    ) -> Result<Option<TenantRecord>, StoreError> {
        let Some(current) = self.rows().get(&id).cloned() else {
            return Ok(None);
        };

        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(StoreError::InvalidData);
            }

            if self.name_taken(current.parent_id, name, id) {
                return Err(StoreError::DuplicateName);
            }
        }

        let record = TenantRecord {
            name: update.name.unwrap_or(current.name),
            description: update.description.or(current.description),
            updated_at: Timestamp::now(),
            ..current
        };

        self.rows_mut().insert(id, record.clone());

        Ok(Some(record))
    }

    async fn delete_many(&mut self, ids: &[TenantId]) -> Result<Vec<TenantId>, StoreError> {
        let fail = self.faults.delete.swap(false, Ordering::SeqCst);
        let limit = if fail { ids.len() / 2 } else { ids.len() };

        let rows = self.rows_mut();
        let removed: Vec<TenantId> = ids
            .iter()
            .take(limit)
            .filter(|id| rows.remove(*id).is_some())
            .copied()
            .collect();

        if fail {
            return Err(StoreError::Unavailable(format!(
                "delete interrupted after {} of {} rows",
                removed.len(),
                ids.len()
            )));
        }

        let rows = self.rows();

        if rows
            .values()
            .any(|row| row.parent_id.is_some_and(|parent| !rows.contains_key(&parent)))
        {
            return Err(StoreError::InvalidReference);
        }

        Ok(removed)
    }

    async fn children_of(&mut self, parent: TenantId) -> Result<Vec<TenantRecord>, StoreError> {
        Ok(self.sorted_where(|row| row.parent_id == Some(parent)))
    }

    async fn root_children(&mut self) -> Result<Vec<TenantRecord>, StoreError> {
        Ok(self.sorted_where(TenantRecord::is_root))
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        if self.faults.commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("commit rejected".to_string()));
        }

        if let Some(staged) = self.staged {
            *self.guard = staged;
        }

        Ok(())
    }
}
