//! Tenant tree storage contract.
//!
//! A [`TenantStore`] hands out [`TenantTransaction`] units of work. Every
//! read and write performed by the service happens through one transaction,
//! and a transaction dropped without [`TenantTransaction::commit`] is rolled
//! back.

use async_trait::async_trait;
use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

use crate::domain::tenants::{
    data::{TenantInsert, TenantUpdate},
    records::{TenantId, TenantRecord},
};

/// Name of the unique index enforcing sibling name uniqueness.
pub const SIBLING_NAME_CONSTRAINT: &str = "tenants_sibling_name_key";

/// Storage error variants.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row with the same identifier already exists.
    #[error("tenant already exists")]
    AlreadyExists,

    /// A sibling under the same parent already uses the name.
    #[error("sibling name already taken")]
    DuplicateName,

    /// Referenced parent row does not exist.
    #[error("related resource not found")]
    InvalidReference,

    /// Provided data failed a storage-level check.
    #[error("invalid data")]
    InvalidData,

    /// The store could not complete the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Underlying SQL error.
    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for StoreError {
    fn from(error: Error) -> Self {
        let Some(database) = error.as_database_error() else {
            return Self::Sql(error);
        };

        match database.kind() {
            ErrorKind::UniqueViolation
                if database.constraint() == Some(SIBLING_NAME_CONSTRAINT) =>
            {
                Self::DuplicateName
            }
            ErrorKind::UniqueViolation => Self::AlreadyExists,
            ErrorKind::ForeignKeyViolation => Self::InvalidReference,
            ErrorKind::NotNullViolation | ErrorKind::CheckViolation => Self::InvalidData,
            ErrorKind::Other | _ => Self::Sql(error),
        }
    }
}

/// Source of tenant transactions.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Transaction type produced by this store.
    type Transaction: TenantTransaction;

    /// Begins a unit of work.
    async fn begin(&self) -> Result<Self::Transaction, StoreError>;
}

/// Row-level tenant operations inside one transaction.
#[async_trait]
pub trait TenantTransaction: Send {
    /// Fetches a tenant by id.
    async fn get(&mut self, id: TenantId) -> Result<Option<TenantRecord>, StoreError>;

    /// Inserts a tenant, stamping its timestamps.
    async fn insert(&mut self, tenant: TenantInsert) -> Result<TenantRecord, StoreError>;

    /// Applies a name/description patch and restamps `updated_at`.
    ///
    /// Returns `None` when the tenant does not exist.
    async fn update(
        &mut self,
        id: TenantId,
        update: TenantUpdate,
    ) -> Result<Option<TenantRecord>, StoreError>;

    /// Removes every listed tenant in one operation and returns the ids that
    /// were actually removed. Ids already gone are skipped.
    async fn delete_many(&mut self, ids: &[TenantId]) -> Result<Vec<TenantId>, StoreError>;

    /// Direct children of `parent`, ordered by name then id.
    async fn children_of(&mut self, parent: TenantId) -> Result<Vec<TenantRecord>, StoreError>;

    /// Tenants without a parent, ordered by name then id.
    async fn root_children(&mut self) -> Result<Vec<TenantRecord>, StoreError>;

    /// Direct children of every listed parent, ordered by name then id.
    async fn children_of_many(
        &mut self,
        parents: &[TenantId],
    ) -> Result<Vec<TenantRecord>, StoreError> {
        let mut children = Vec::new();

        for parent in parents {
            children.extend(self.children_of(*parent).await?);
        }

        children.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        Ok(children)
    }

    /// The child of `parent` (or root, when `None`) named `name`, if any.
    async fn find_sibling(
        &mut self,
        parent: Option<TenantId>,
        name: &str,
    ) -> Result<Option<TenantRecord>, StoreError> {
        let siblings = match parent {
            Some(parent) => self.children_of(parent).await?,
            None => self.root_children().await?,
        };

        Ok(siblings.into_iter().find(|sibling| sibling.name == name))
    }

    /// Locks the listed tenants against concurrent child inserts until the
    /// transaction ends.
    async fn lock_tenants(&mut self, _ids: &[TenantId]) -> Result<(), StoreError> {
        Ok(())
    }

    /// Commits the unit of work.
    async fn commit(self) -> Result<(), StoreError>;
}
