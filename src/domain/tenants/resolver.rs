//! Ancestor and descendant resolution.
//!
//! Each tenant only stores its immediate parent. Ancestors are found by
//! walking parent links one point read at a time; descendants by expanding
//! children breadth first, one store round trip per level. Both walks keep a
//! visited set so a stale or duplicated row can never make them loop.

use std::iter;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::domain::tenants::{
    errors::TenantsServiceError,
    records::{TenantId, TenantRecord},
    store::TenantTransaction,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct CascadeResolver;

impl CascadeResolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Ancestors of `id`, nearest first.
    ///
    /// With `until`, the walk stops before that tenant, which is excluded.
    /// `until` is not checked to be an ancestor; an unrelated id yields the
    /// full chain to the root.
    ///
    /// # Errors
    ///
    /// Returns [`TenantsServiceError::NotFound`] when `id` does not exist.
    pub async fn ancestors_of<T>(
        &self,
        tx: &mut T,
        id: TenantId,
        until: Option<TenantId>,
    ) -> Result<Vec<TenantRecord>, TenantsServiceError>
    where
        T: TenantTransaction,
    {
        let tenant = tx.get(id).await?.ok_or(TenantsServiceError::NotFound)?;

        self.walk_up(tx, &tenant, until).await
    }

    /// Every tenant below `id`, breadth first, each level ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`TenantsServiceError::NotFound`] when `id` does not exist.
    pub async fn descendants_of<T>(
        &self,
        tx: &mut T,
        id: TenantId,
    ) -> Result<Vec<TenantRecord>, TenantsServiceError>
    where
        T: TenantTransaction,
    {
        if tx.get(id).await?.is_none() {
            return Err(TenantsServiceError::NotFound);
        }

        self.expand(tx, id, false).await
    }

    /// `id` followed by all of its descendants: the rows a cascading delete
    /// must remove.
    ///
    /// Each level is locked before its children are read, so a child insert
    /// racing with the delete either lands before the lock and is included,
    /// or fails its parent reference afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`TenantsServiceError::NotFound`] when `id` does not exist.
    pub async fn closure_for_delete<T>(
        &self,
        tx: &mut T,
        id: TenantId,
    ) -> Result<Vec<TenantId>, TenantsServiceError>
    where
        T: TenantTransaction,
    {
        tx.lock_tenants(&[id]).await?;

        if tx.get(id).await?.is_none() {
            return Err(TenantsServiceError::NotFound);
        }

        let descendants = self.expand(tx, id, true).await?;

        Ok(iter::once(id)
            .chain(descendants.iter().map(|tenant| tenant.id))
            .collect())
    }

    /// The chain a new child of `parent` joins, ordered root first and
    /// ending with `parent` itself. Empty for a new root.
    ///
    /// # Errors
    ///
    /// Returns [`TenantsServiceError::ParentNotFound`] when `parent` does not
    /// exist.
    pub async fn closure_for_create<T>(
        &self,
        tx: &mut T,
        parent: Option<TenantId>,
    ) -> Result<Vec<TenantId>, TenantsServiceError>
    where
        T: TenantTransaction,
    {
        let Some(parent) = parent else {
            return Ok(Vec::new());
        };

        let parent = tx
            .get(parent)
            .await?
            .ok_or(TenantsServiceError::ParentNotFound)?;

        self.chain_to(tx, &parent).await
    }

    /// Same as [`Self::closure_for_create`] for a parent that is already
    /// loaded.
    ///
    /// # Errors
    ///
    /// Returns [`TenantsServiceError::CycleDetected`] when the parent's chain
    /// loops back on itself.
    pub async fn chain_to<T>(
        &self,
        tx: &mut T,
        parent: &TenantRecord,
    ) -> Result<Vec<TenantId>, TenantsServiceError>
    where
        T: TenantTransaction,
    {
        let ancestors = self.walk_up(tx, parent, None).await?;

        Ok(ancestors
            .iter()
            .rev()
            .map(|tenant| tenant.id)
            .chain(iter::once(parent.id))
            .collect())
    }

    async fn walk_up<T>(
        &self,
        tx: &mut T,
        start: &TenantRecord,
        until: Option<TenantId>,
    ) -> Result<Vec<TenantRecord>, TenantsServiceError>
    where
        T: TenantTransaction,
    {
        let mut visited = FxHashSet::default();
        visited.insert(start.id);

        let mut chain = Vec::new();
        let mut next = start.parent_id;

        while let Some(parent_id) = next {
            if until == Some(parent_id) {
                break;
            }

            if !visited.insert(parent_id) {
                return Err(TenantsServiceError::CycleDetected);
            }

            let parent = tx.get(parent_id).await?.ok_or(
                TenantsServiceError::PartialFailureInvariantViolation(
                    "tenant references a missing parent",
                ),
            )?;

            next = parent.parent_id;
            chain.push(parent);
        }

        Ok(chain)
    }

    async fn expand<T>(
        &self,
        tx: &mut T,
        root: TenantId,
        lock: bool,
    ) -> Result<Vec<TenantRecord>, TenantsServiceError>
    where
        T: TenantTransaction,
    {
        let mut visited = FxHashSet::default();
        visited.insert(root);

        let mut descendants = Vec::new();
        let mut frontier = vec![root];
        let mut depth = 0_usize;

        while !frontier.is_empty() {
            if lock {
                tx.lock_tenants(&frontier).await?;
            }

            let children = tx.children_of_many(&frontier).await?;

            frontier = Vec::with_capacity(children.len());
            depth += 1;

            for child in children {
                if visited.insert(child.id) {
                    frontier.push(child.id);
                    descendants.push(child);
                }
            }

            debug!(tenant_id = %root, depth, found = frontier.len(), "expanded descendant level");
        }

        Ok(descendants)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::{
        domain::tenants::{memory::MemoryTenantStore, store::TenantStore},
        test::helpers::{seed_tenant, seed_tree},
    };

    use super::*;

    const TREE: &[&str] = &[
        "t1",
        "t1.t1a",
        "t1.t1a.t1a1",
        "t1.t1a.t1a1.t1a1a",
        "t1.t1a.t1a1.t1a1b",
        "t1.t1b",
        "t1.t1b.t1b1",
        "t1.t1b.t1b1.t1b1a",
        "t2",
        "t2.t2a",
    ];

    fn names(tenants: &[TenantRecord]) -> Vec<&str> {
        tenants.iter().map(|tenant| tenant.name.as_str()).collect()
    }

    #[tokio::test]
    async fn ancestors_are_nearest_first() -> TestResult {
        let store = MemoryTenantStore::new();
        let mut tx = store.begin().await?;
        let tree = seed_tree(&mut tx, TREE).await?;

        let ancestors = CascadeResolver::new()
            .ancestors_of(&mut tx, tree["t1a1b"].id, None)
            .await?;

        assert_eq!(names(&ancestors), ["t1a1", "t1a", "t1"]);

        Ok(())
    }

    #[tokio::test]
    async fn ancestors_stop_before_boundary() -> TestResult {
        let store = MemoryTenantStore::new();
        let mut tx = store.begin().await?;
        let tree = seed_tree(&mut tx, TREE).await?;

        let ancestors = CascadeResolver::new()
            .ancestors_of(&mut tx, tree["t1a1b"].id, Some(tree["t1a"].id))
            .await?;

        assert_eq!(names(&ancestors), ["t1a1"]);

        Ok(())
    }

    #[tokio::test]
    async fn unrelated_boundary_yields_full_chain() -> TestResult {
        let store = MemoryTenantStore::new();
        let mut tx = store.begin().await?;
        let tree = seed_tree(&mut tx, TREE).await?;

        let ancestors = CascadeResolver::new()
            .ancestors_of(&mut tx, tree["t1a1b"].id, Some(tree["t2"].id))
            .await?;

        assert_eq!(names(&ancestors), ["t1a1", "t1a", "t1"]);

        Ok(())
    }

    #[tokio::test]
    async fn root_has_no_ancestors() -> TestResult {
        let store = MemoryTenantStore::new();
        let mut tx = store.begin().await?;
        let tree = seed_tree(&mut tx, TREE).await?;

        let ancestors = CascadeResolver::new()
            .ancestors_of(&mut tx, tree["t2"].id, None)
            .await?;

        assert!(ancestors.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn ancestors_of_missing_tenant_is_not_found() -> TestResult {
        let store = MemoryTenantStore::new();
        let mut tx = store.begin().await?;

        let result = CascadeResolver::new()
            .ancestors_of(&mut tx, TenantId::new(), None)
            .await;

        assert!(
            matches!(result, Err(TenantsServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn descendants_are_breadth_first_and_stay_in_their_tree() -> TestResult {
        let store = MemoryTenantStore::new();
        let mut tx = store.begin().await?;
        let tree = seed_tree(&mut tx, TREE).await?;

        let descendants = CascadeResolver::new()
            .descendants_of(&mut tx, tree["t1"].id)
            .await?;

        assert_eq!(
            names(&descendants),
            ["t1a", "t1b", "t1a1", "t1b1", "t1a1a", "t1a1b", "t1b1a"]
        );

        Ok(())
    }

    #[tokio::test]
    async fn leaf_has_no_descendants() -> TestResult {
        let store = MemoryTenantStore::new();
        let mut tx = store.begin().await?;
        let tree = seed_tree(&mut tx, TREE).await?;

        let descendants = CascadeResolver::new()
            .descendants_of(&mut tx, tree["t2a"].id)
            .await?;

        assert!(descendants.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn deep_chains_are_fully_resolved() -> TestResult {
        let store = MemoryTenantStore::new();
        let mut tx = store.begin().await?;

        let root = seed_tenant(&mut tx, "level0", None).await?;
        let mut leaf = root.clone();

        for level in 1..=64 {
            leaf = seed_tenant(&mut tx, &format!("level{level}"), Some(leaf.id)).await?;
        }

        let resolver = CascadeResolver::new();

        assert_eq!(resolver.descendants_of(&mut tx, root.id).await?.len(), 64);
        assert_eq!(resolver.ancestors_of(&mut tx, leaf.id, None).await?.len(), 64);

        Ok(())
    }

    #[tokio::test]
    async fn delete_closure_starts_with_target() -> TestResult {
        let store = MemoryTenantStore::new();
        let mut tx = store.begin().await?;
        let tree = seed_tree(&mut tx, TREE).await?;

        let closure = CascadeResolver::new()
            .closure_for_delete(&mut tx, tree["t1b"].id)
            .await?;

        assert_eq!(
            closure,
            [tree["t1b"].id, tree["t1b1"].id, tree["t1b1a"].id]
        );

        Ok(())
    }

    #[tokio::test]
    async fn create_closure_is_root_first_and_ends_at_parent() -> TestResult {
        let store = MemoryTenantStore::new();
        let mut tx = store.begin().await?;
        let tree = seed_tree(&mut tx, TREE).await?;

        let resolver = CascadeResolver::new();

        let closure = resolver
            .closure_for_create(&mut tx, Some(tree["t1a1"].id))
            .await?;

        assert_eq!(closure, [tree["t1"].id, tree["t1a"].id, tree["t1a1"].id]);
        assert!(resolver.closure_for_create(&mut tx, None).await?.is_empty());

        Ok(())
    }
}
