//! Structural checks applied before a tenant mutation.

use rustc_hash::FxHashSet;

use crate::domain::tenants::{
    errors::TenantsServiceError,
    records::{TenantId, TenantRecord},
    store::TenantTransaction,
};

/// Validates hierarchy invariants against the rows visible to a transaction.
///
/// The store may enforce the same rules as constraints, but the validator
/// does not rely on it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchyValidator;

impl HierarchyValidator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Rejects names that are empty or whitespace only.
    ///
    /// # Errors
    ///
    /// Returns [`TenantsServiceError::ValidationFailed`] for a blank name.
    pub fn validate_name(&self, name: &str) -> Result<(), TenantsServiceError> {
        if name.trim().is_empty() {
            return Err(TenantsServiceError::ValidationFailed(
                "name must not be blank",
            ));
        }

        Ok(())
    }

    /// Checks that `parent` exists and no sibling already uses `name`, and
    /// returns the resolved parent.
    ///
    /// # Errors
    ///
    /// Returns [`TenantsServiceError::ParentNotFound`] or
    /// [`TenantsServiceError::DuplicateSibling`] when the create would break
    /// an invariant.
    pub async fn validate_create<T>(
        &self,
        tx: &mut T,
        name: &str,
        parent: Option<TenantId>,
    ) -> Result<Option<TenantRecord>, TenantsServiceError>
    where
        T: TenantTransaction,
    {
        self.validate_name(name)?;

        let parent = match parent {
            Some(parent) => Some(
                tx.get(parent)
                    .await?
                    .ok_or(TenantsServiceError::ParentNotFound)?,
            ),
            None => None,
        };

        if tx
            .find_sibling(parent.as_ref().map(|parent| parent.id), name)
            .await?
            .is_some()
        {
            return Err(TenantsServiceError::DuplicateSibling);
        }

        Ok(parent)
    }

    /// Checks that renaming `tenant` to `name` keeps sibling names unique.
    ///
    /// # Errors
    ///
    /// Returns [`TenantsServiceError::DuplicateSibling`] when another child
    /// of the same parent already has the name.
    pub async fn validate_rename<T>(
        &self,
        tx: &mut T,
        tenant: &TenantRecord,
        name: &str,
    ) -> Result<(), TenantsServiceError>
    where
        T: TenantTransaction,
    {
        self.validate_name(name)?;

        let sibling = tx.find_sibling(tenant.parent_id, name).await?;

        if sibling.is_some_and(|sibling| sibling.id != tenant.id) {
            return Err(TenantsServiceError::DuplicateSibling);
        }

        Ok(())
    }

    /// Walks the ancestor chain of `candidate_parent` and fails if `id`
    /// appears in it, including as the candidate itself.
    ///
    /// Any operation that assigns a parent to an existing tenant must call
    /// this before writing. Creates skip it: a fresh id cannot appear in an
    /// existing chain, and the create closure walk rejects looping chains.
    ///
    /// # Errors
    ///
    /// Returns [`TenantsServiceError::CycleDetected`] when the link would
    /// close a loop, or [`TenantsServiceError::ParentNotFound`] when the
    /// candidate does not exist.
    pub async fn validate_no_cycle<T>(
        &self,
        tx: &mut T,
        id: TenantId,
        candidate_parent: TenantId,
    ) -> Result<(), TenantsServiceError>
    where
        T: TenantTransaction,
    {
        let mut visited = FxHashSet::default();
        let mut next = Some(candidate_parent);

        while let Some(current) = next {
            if current == id || !visited.insert(current) {
                return Err(TenantsServiceError::CycleDetected);
            }

            let Some(tenant) = tx.get(current).await? else {
                return Err(if current == candidate_parent {
                    TenantsServiceError::ParentNotFound
                } else {
                    TenantsServiceError::PartialFailureInvariantViolation(
                        "tenant references a missing parent",
                    )
                });
            };

            next = tenant.parent_id;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::{
        domain::tenants::{
            memory::MemoryTenantStore, records::TenantId, store::TenantStore,
        },
        test::helpers::seed_tenant,
    };

    use super::*;

    #[test]
    fn blank_names_are_rejected() {
        let validator = HierarchyValidator::new();

        assert!(validator.validate_name("").is_err());
        assert!(validator.validate_name("   ").is_err());
        assert!(validator.validate_name("acme").is_ok());
    }

    #[tokio::test]
    async fn create_under_missing_parent_fails() -> TestResult {
        let store = MemoryTenantStore::new();
        let mut tx = store.begin().await?;

        let result = HierarchyValidator::new()
            .validate_create(&mut tx, "child", Some(TenantId::new()))
            .await;

        assert!(
            matches!(result, Err(TenantsServiceError::ParentNotFound)),
            "expected ParentNotFound, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn create_with_taken_sibling_name_fails() -> TestResult {
        let store = MemoryTenantStore::new();
        let mut tx = store.begin().await?;

        let parent = seed_tenant(&mut tx, "parent", None).await?;
        seed_tenant(&mut tx, "ops", Some(parent.id)).await?;

        let result = HierarchyValidator::new()
            .validate_create(&mut tx, "ops", Some(parent.id))
            .await;

        assert!(
            matches!(result, Err(TenantsServiceError::DuplicateSibling)),
            "expected DuplicateSibling, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn root_names_are_compared_among_roots_only() -> TestResult {
        let store = MemoryTenantStore::new();
        let mut tx = store.begin().await?;

        let parent = seed_tenant(&mut tx, "parent", None).await?;
        seed_tenant(&mut tx, "ops", Some(parent.id)).await?;

        let validator = HierarchyValidator::new();

        validator.validate_create(&mut tx, "ops", None).await?;

        let result = validator.validate_create(&mut tx, "parent", None).await;

        assert!(
            matches!(result, Err(TenantsServiceError::DuplicateSibling)),
            "expected DuplicateSibling, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn rename_to_own_name_is_allowed() -> TestResult {
        let store = MemoryTenantStore::new();
        let mut tx = store.begin().await?;

        let tenant = seed_tenant(&mut tx, "acme", None).await?;

        HierarchyValidator::new()
            .validate_rename(&mut tx, &tenant, "acme")
            .await?;

        Ok(())
    }

    #[tokio::test]
    async fn rename_onto_sibling_fails() -> TestResult {
        let store = MemoryTenantStore::new();
        let mut tx = store.begin().await?;

        let tenant = seed_tenant(&mut tx, "acme", None).await?;
        seed_tenant(&mut tx, "globex", None).await?;

        let result = HierarchyValidator::new()
            .validate_rename(&mut tx, &tenant, "globex")
            .await;

        assert!(
            matches!(result, Err(TenantsServiceError::DuplicateSibling)),
            "expected DuplicateSibling, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn parenting_an_ancestor_under_its_descendant_is_a_cycle() -> TestResult {
        let store = MemoryTenantStore::new();
        let mut tx = store.begin().await?;

        let root = seed_tenant(&mut tx, "root", None).await?;
        let a = seed_tenant(&mut tx, "a", Some(root.id)).await?;
        let b = seed_tenant(&mut tx, "b", Some(a.id)).await?;

        let validator = HierarchyValidator::new();

        for (id, candidate) in [(root.id, b.id), (a.id, b.id), (b.id, b.id)] {
            let result = validator.validate_no_cycle(&mut tx, id, candidate).await;

            assert!(
                matches!(result, Err(TenantsServiceError::CycleDetected)),
                "expected CycleDetected for {id} under {candidate}, got {result:?}"
            );
        }

        validator.validate_no_cycle(&mut tx, TenantId::new(), b.id).await?;
        validator.validate_no_cycle(&mut tx, b.id, root.id).await?;

        Ok(())
    }

    #[tokio::test]
    async fn cycle_check_against_missing_parent_fails() -> TestResult {
        let store = MemoryTenantStore::new();
        let mut tx = store.begin().await?;

        let result = HierarchyValidator::new()
            .validate_no_cycle(&mut tx, TenantId::new(), TenantId::new())
            .await;

        assert!(
            matches!(result, Err(TenantsServiceError::ParentNotFound)),
            "expected ParentNotFound, got {result:?}"
        );

        Ok(())
    }
}
