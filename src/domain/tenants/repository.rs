//! Tenants Repository

use async_trait::async_trait;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as, query_scalar};

use crate::{
    database::Db,
    domain::tenants::{
        data::{TenantInsert, TenantUpdate},
        records::{TenantId, TenantRecord},
        store::{StoreError, TenantStore, TenantTransaction},
    },
};

const GET_TENANT_SQL: &str = include_str!("sql/get_tenant.sql");
const CREATE_TENANT_SQL: &str = include_str!("sql/create_tenant.sql");
const UPDATE_TENANT_SQL: &str = include_str!("sql/update_tenant.sql");
const DELETE_TENANTS_SQL: &str = include_str!("sql/delete_tenants.sql");
const LIST_CHILDREN_SQL: &str = include_str!("sql/list_children.sql");
const LIST_ROOTS_SQL: &str = include_str!("sql/list_roots.sql");
const FIND_SIBLING_SQL: &str = include_str!("sql/find_sibling.sql");
const LOCK_TENANTS_SQL: &str = include_str!("sql/lock_tenants.sql");

fn id_strings(ids: &[TenantId]) -> Vec<String> {
    ids.iter().map(ToString::to_string).collect()
}

#[derive(Debug, Clone)]
/// PostgreSQL-backed tenant store.
pub struct PgTenantStore {
    db: Db,
}

impl PgTenantStore {
    /// Creates a new store instance.
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TenantStore for PgTenantStore {
    type Transaction = PgTenantTransaction;

    async fn begin(&self) -> Result<Self::Transaction, StoreError> {
        Ok(PgTenantTransaction {
            tx: self.db.begin().await?,
        })
    }
}

/// A PostgreSQL transaction over the `tenants` table.
#[derive(Debug)]
pub struct PgTenantTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TenantTransaction for PgTenantTransaction {
    async fn get(&mut self, id: TenantId) -> Result<Option<TenantRecord>, StoreError> {
        Ok(query_as::<Postgres, TenantRecord>(GET_TENANT_SQL)
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn insert(&mut self, tenant: TenantInsert) -> Result<TenantRecord, StoreError> {
        Ok(query_as::<Postgres, TenantRecord>(CREATE_TENANT_SQL)
            .bind(tenant.id.to_string())
            .bind(tenant.name)
            .bind(tenant.description)
            .bind(tenant.parent_id.map(|parent| parent.to_string()))
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn update(
        &mut self,
        id: TenantId,
        update: TenantUpdate,
    ) -> Result<Option<TenantRecord>, StoreError> {
        Ok(query_as::<Postgres, TenantRecord>(UPDATE_TENANT_SQL)
            .bind(id.to_string())
            .bind(update.name)
            .bind(update.description)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn delete_many(&mut self, ids: &[TenantId]) -> Result<Vec<TenantId>, StoreError> {
        let removed = query_scalar::<Postgres, String>(DELETE_TENANTS_SQL)
            .bind(id_strings(ids))
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(removed
            .into_iter()
            .map(|raw| parse_id("id", raw))
            .collect::<sqlx::Result<_>>()?)
    }

    async fn children_of(&mut self, parent: TenantId) -> Result<Vec<TenantRecord>, StoreError> {
        self.children_of_many(&[parent]).await
    }

    async fn root_children(&mut self) -> Result<Vec<TenantRecord>, StoreError> {
        Ok(query_as::<Postgres, TenantRecord>(LIST_ROOTS_SQL)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn children_of_many(
        &mut self,
        parents: &[TenantId],
    ) -> Result<Vec<TenantRecord>, StoreError> {
        Ok(query_as::<Postgres, TenantRecord>(LIST_CHILDREN_SQL)
            .bind(id_strings(parents))
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn find_sibling(
        &mut self,
        parent: Option<TenantId>,
        name: &str,
    ) -> Result<Option<TenantRecord>, StoreError> {
        Ok(query_as::<Postgres, TenantRecord>(FIND_SIBLING_SQL)
            .bind(parent.map(|parent| parent.to_string()))
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn lock_tenants(&mut self, ids: &[TenantId]) -> Result<(), StoreError> {
        query(LOCK_TENANTS_SQL)
            .bind(id_strings(ids))
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        Ok(self.tx.commit().await?)
    }
}

fn parse_id(column: &str, raw: String) -> sqlx::Result<TenantId> {
    raw.parse().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

impl<'r> FromRow<'r, PgRow> for TenantRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: parse_id("id", row.try_get("id")?)?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            parent_id: row
                .try_get::<Option<String>, _>("parent_tenant_id")?
                .map(|raw| parse_id("parent_tenant_id", raw))
                .transpose()?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::test::{db::TestDb, helpers::seed_tenant};

    use super::*;

    #[tokio::test]
    async fn insert_stamps_timestamps_and_round_trips() -> TestResult {
        let test_db = TestDb::new().await;
        let store = PgTenantStore::new(Db::new(test_db.pool().clone()));

        let mut tx = store.begin().await?;
        let created = seed_tenant(&mut tx, "Acme Corp", None).await?;
        tx.commit().await?;

        let mut tx = store.begin().await?;
        let fetched = tx.get(created.id).await?;

        assert_eq!(fetched, Some(created.clone()));
        assert_eq!(created.created_at, created.updated_at);

        Ok(())
    }

    #[tokio::test]
    async fn duplicate_root_name_maps_to_duplicate_name() -> TestResult {
        let test_db = TestDb::new().await;
        let store = PgTenantStore::new(Db::new(test_db.pool().clone()));

        let mut tx = store.begin().await?;
        seed_tenant(&mut tx, "acme", None).await?;

        let result = seed_tenant(&mut tx, "acme", None).await;

        assert!(
            matches!(result, Err(StoreError::DuplicateName)),
            "expected DuplicateName, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn missing_parent_maps_to_invalid_reference() -> TestResult {
        let test_db = TestDb::new().await;
        let store = PgTenantStore::new(Db::new(test_db.pool().clone()));

        let mut tx = store.begin().await?;

        let result = seed_tenant(&mut tx, "orphan", Some(TenantId::new())).await;

        assert!(
            matches!(result, Err(StoreError::InvalidReference)),
            "expected InvalidReference, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn delete_many_removes_subtree_in_one_statement() -> TestResult {
        let test_db = TestDb::new().await;
        let store = PgTenantStore::new(Db::new(test_db.pool().clone()));

        let mut tx = store.begin().await?;
        let root = seed_tenant(&mut tx, "root", None).await?;
        let child = seed_tenant(&mut tx, "child", Some(root.id)).await?;
        let grandchild = seed_tenant(&mut tx, "grandchild", Some(child.id)).await?;
        tx.commit().await?;

        let mut tx = store.begin().await?;
        tx.lock_tenants(&[root.id, child.id]).await?;

        let mut removed = tx.delete_many(&[root.id, child.id, grandchild.id]).await?;
        tx.commit().await?;

        removed.sort();

        let mut expected = vec![root.id, child.id, grandchild.id];
        expected.sort();

        assert_eq!(removed, expected);

        let mut tx = store.begin().await?;

        assert!(tx.root_children().await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn delete_many_skips_rows_already_gone() -> TestResult {
        let test_db = TestDb::new().await;
        let store = PgTenantStore::new(Db::new(test_db.pool().clone()));

        let mut tx = store.begin().await?;
        let kept = seed_tenant(&mut tx, "kept", None).await?;
        tx.commit().await?;

        let mut tx = store.begin().await?;
        let removed = tx.delete_many(&[kept.id, TenantId::new()]).await?;

        assert_eq!(removed, [kept.id]);

        Ok(())
    }

    #[tokio::test]
    async fn children_of_many_orders_by_name() -> TestResult {
        let test_db = TestDb::new().await;
        let store = PgTenantStore::new(Db::new(test_db.pool().clone()));

        let mut tx = store.begin().await?;
        let a = seed_tenant(&mut tx, "a", None).await?;
        let b = seed_tenant(&mut tx, "b", None).await?;
        seed_tenant(&mut tx, "zulu", Some(a.id)).await?;
        seed_tenant(&mut tx, "alpha", Some(b.id)).await?;

        let names: Vec<String> = tx
            .children_of_many(&[a.id, b.id])
            .await?
            .into_iter()
            .map(|tenant| tenant.name)
            .collect();

        assert_eq!(names, ["alpha", "zulu"]);

        Ok(())
    }
}
