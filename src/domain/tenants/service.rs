//! Tenants service.

use std::{
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    sync::Arc,
};

use async_trait::async_trait;
use mockall::automock;
use rustc_hash::FxHashSet;
use tracing::{Span, info, warn};

use crate::{
    database::Db,
    domain::tenants::{
        data::{NewTenant, TenantInsert, TenantUpdate},
        errors::TenantsServiceError,
        events::{ActorId, ChangeMessage, ChangePublisher, EventType},
        records::{TenantId, TenantRecord},
        repository::PgTenantStore,
        resolver::CascadeResolver,
        store::{TenantStore, TenantTransaction},
        validator::HierarchyValidator,
    },
};

/// Progress of a single mutation, recorded on its tracing span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MutationStage {
    Received,
    Validated,
    Applied,
    Committed,
    Notified,
    Rejected,
    RolledBack,
}

impl Display for MutationStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Applied => "applied",
            Self::Committed => "committed",
            Self::Notified => "notified",
            Self::Rejected => "rejected",
            Self::RolledBack => "rolled_back",
        })
    }
}

fn record_stage(stage: MutationStage) {
    Span::current().record("stage", tracing::field::display(stage));
}

fn rejected<E>(_error: &E) {
    record_stage(MutationStage::Rejected);
}

fn rolled_back<E>(_error: &E) {
    record_stage(MutationStage::RolledBack);
}

/// Tenant hierarchy service over any [`TenantStore`].
///
/// Mutations validate, resolve the affected tenants, and apply the change in
/// one store transaction. Notifications are published only after commit, and
/// a publishing failure never fails the mutation.
pub struct TenantHierarchyService<S> {
    store: S,
    publisher: Arc<dyn ChangePublisher>,
    validator: HierarchyValidator,
    resolver: CascadeResolver,
}

/// PostgreSQL-backed tenants service.
pub type PgTenantsService = TenantHierarchyService<PgTenantStore>;

impl<S> TenantHierarchyService<S>
where
    S: TenantStore,
{
    #[must_use]
    pub fn new(store: S, publisher: Arc<dyn ChangePublisher>) -> Self {
        Self {
            store,
            publisher,
            validator: HierarchyValidator::new(),
            resolver: CascadeResolver::new(),
        }
    }

    async fn notify(&self, message: ChangeMessage) {
        let subject_id = message.subject_id;
        let event_type = message.event_type;

        if let Err(error) = self.publisher.publish(message).await {
            warn!(
                tenant_id = %subject_id,
                %event_type,
                error = %error,
                "failed to publish tenant change"
            );
        }
    }
}

impl PgTenantsService {
    /// Builds a service over PostgreSQL.
    #[must_use]
    pub fn from_db(db: Db, publisher: Arc<dyn ChangePublisher>) -> Self {
        Self::new(PgTenantStore::new(db), publisher)
    }
}

impl<S> Debug for TenantHierarchyService<S>
where
    S: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TenantHierarchyService")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S> TenantsService for TenantHierarchyService<S>
where
    S: TenantStore,
{
    #[tracing::instrument(
        name = "tenants.service.create_tenant",
        skip(self, tenant, actor),
        fields(
            parent_id = tracing::field::Empty,
            tenant_id = tracing::field::Empty,
            stage = %MutationStage::Received
        ),
        err
    )]
    async fn create_tenant(
        &self,
        tenant: NewTenant,
        actor: Option<ActorId>,
    ) -> Result<TenantRecord, TenantsServiceError> {
        let span = Span::current();

        if let Some(parent) = tenant.parent {
            span.record("parent_id", tracing::field::display(parent));
        }

        self.validator
            .validate_name(&tenant.name)
            .inspect_err(rejected)?;

        let mut tx = self.store.begin().await?;

        let parent = self
            .validator
            .validate_create(&mut tx, &tenant.name, tenant.parent)
            .await
            .inspect_err(rejected)?;

        let additional = match &parent {
            Some(parent) => self
                .resolver
                .chain_to(&mut tx, parent)
                .await
                .inspect_err(rejected)?,
            None => Vec::new(),
        };

        let id = TenantId::new();

        span.record("tenant_id", tracing::field::display(id));

        record_stage(MutationStage::Validated);

        let record = tx
            .insert(TenantInsert {
                id,
                name: tenant.name,
                description: tenant.description,
                parent_id: tenant.parent,
            })
            .await
            .inspect_err(rolled_back)?;

        record_stage(MutationStage::Applied);

        tx.commit().await.inspect_err(rolled_back)?;

        record_stage(MutationStage::Committed);

        info!(tenant_id = %record.id, depth = additional.len(), "created tenant");

        self.notify(ChangeMessage::new(
            EventType::Create,
            record.id,
            additional,
            actor,
        ))
        .await;

        record_stage(MutationStage::Notified);

        Ok(record)
    }

    #[tracing::instrument(
        name = "tenants.service.get_tenant",
        skip(self),
        fields(tenant_id = %id),
        err
    )]
    async fn get_tenant(&self, id: TenantId) -> Result<TenantRecord, TenantsServiceError> {
        let mut tx = self.store.begin().await?;

        let tenant = tx.get(id).await?.ok_or(TenantsServiceError::NotFound)?;

        tx.commit().await?;

        Ok(tenant)
    }

    #[tracing::instrument(
        name = "tenants.service.update_tenant",
        skip(self, update, actor),
        fields(tenant_id = %id, stage = %MutationStage::Received),
        err
    )]
    async fn update_tenant(
        &self,
        id: TenantId,
        update: TenantUpdate,
        actor: Option<ActorId>,
    ) -> Result<TenantRecord, TenantsServiceError> {
        if let Some(name) = &update.name {
            self.validator.validate_name(name).inspect_err(rejected)?;
        }

        let mut tx = self.store.begin().await?;

        let current = tx
            .get(id)
            .await?
            .ok_or(TenantsServiceError::NotFound)
            .inspect_err(rejected)?;

        if let Some(name) = &update.name {
            self.validator
                .validate_rename(&mut tx, &current, name)
                .await
                .inspect_err(rejected)?;
        }

        record_stage(MutationStage::Validated);

        let updated = tx
            .update(id, update)
            .await
            .map_err(TenantsServiceError::from)
            .and_then(|updated| updated.ok_or(TenantsServiceError::NotFound))
            .inspect_err(rolled_back)?;

        record_stage(MutationStage::Applied);

        tx.commit().await.inspect_err(rolled_back)?;

        record_stage(MutationStage::Committed);

        info!(tenant_id = %id, "updated tenant");

        self.notify(ChangeMessage::new(EventType::Update, id, Vec::new(), actor))
            .await;

        record_stage(MutationStage::Notified);

        Ok(updated)
    }

    #[tracing::instrument(
        name = "tenants.service.delete_tenant",
        skip(self, actor),
        fields(
            tenant_id = %id,
            closure_size = tracing::field::Empty,
            stage = %MutationStage::Received
        ),
        err
    )]
    async fn delete_tenant(
        &self,
        id: TenantId,
        actor: Option<ActorId>,
    ) -> Result<(), TenantsServiceError> {
        let mut tx = self.store.begin().await?;

        let closure = self
            .resolver
            .closure_for_delete(&mut tx, id)
            .await
            .inspect_err(rejected)?;

        Span::current().record("closure_size", closure.len());

        record_stage(MutationStage::Validated);

        let removed: FxHashSet<TenantId> = tx
            .delete_many(&closure)
            .await
            .inspect_err(rolled_back)?
            .into_iter()
            .collect();

        if !removed.iter().all(|tenant| closure.contains(tenant)) {
            record_stage(MutationStage::RolledBack);

            return Err(TenantsServiceError::PartialFailureInvariantViolation(
                "cascade delete removed a tenant outside the resolved subtree",
            ));
        }

        record_stage(MutationStage::Applied);

        tx.commit().await.inspect_err(rolled_back)?;

        record_stage(MutationStage::Committed);

        // Rows missing from `removed` were deleted by a concurrent transaction
        // after the closure was read.
        let already_deleted = closure.len().saturating_sub(removed.len());

        info!(
            tenant_id = %id,
            removed = removed.len(),
            already_deleted,
            "deleted tenant subtree"
        );

        for tenant in closure.into_iter().filter(|tenant| removed.contains(tenant)) {
            self.notify(ChangeMessage::new(
                EventType::Delete,
                tenant,
                Vec::new(),
                actor.clone(),
            ))
            .await;
        }

        record_stage(MutationStage::Notified);

        Ok(())
    }

    #[tracing::instrument(
        name = "tenants.service.list_children",
        skip(self),
        fields(parent_id = tracing::field::Empty),
        err
    )]
    async fn list_children(
        &self,
        parent: Option<TenantId>,
    ) -> Result<Vec<TenantRecord>, TenantsServiceError> {
        let mut tx = self.store.begin().await?;

        let children = match parent {
            Some(parent) => {
                Span::current().record("parent_id", tracing::field::display(parent));

                if tx.get(parent).await?.is_none() {
                    return Err(TenantsServiceError::NotFound);
                }

                tx.children_of(parent).await?
            }
            None => tx.root_children().await?,
        };

        tx.commit().await?;

        Ok(children)
    }

    #[tracing::instrument(
        name = "tenants.service.list_descendants",
        skip(self),
        fields(tenant_id = %id),
        err
    )]
    async fn list_descendants(
        &self,
        id: TenantId,
    ) -> Result<Vec<TenantRecord>, TenantsServiceError> {
        let mut tx = self.store.begin().await?;

        let descendants = self.resolver.descendants_of(&mut tx, id).await?;

        tx.commit().await?;

        Ok(descendants)
    }

    #[tracing::instrument(
        name = "tenants.service.list_ancestors",
        skip(self),
        fields(tenant_id = %id),
        err
    )]
    async fn list_ancestors(
        &self,
        id: TenantId,
        until: Option<TenantId>,
    ) -> Result<Vec<TenantRecord>, TenantsServiceError> {
        let mut tx = self.store.begin().await?;

        let ancestors = self.resolver.ancestors_of(&mut tx, id, until).await?;

        tx.commit().await?;

        Ok(ancestors)
    }
}

#[automock]
#[async_trait]
/// Tenant hierarchy operations.
pub trait TenantsService: Send + Sync {
    /// Creates a tenant, as a root or under an existing parent.
    async fn create_tenant(
        &self,
        tenant: NewTenant,
        actor: Option<ActorId>,
    ) -> Result<TenantRecord, TenantsServiceError>;

    /// Retrieves a single tenant.
    async fn get_tenant(&self, id: TenantId) -> Result<TenantRecord, TenantsServiceError>;

    /// Renames or re-describes a tenant.
    async fn update_tenant(
        &self,
        id: TenantId,
        update: TenantUpdate,
        actor: Option<ActorId>,
    ) -> Result<TenantRecord, TenantsServiceError>;

    /// Deletes a tenant together with its whole subtree.
    async fn delete_tenant(
        &self,
        id: TenantId,
        actor: Option<ActorId>,
    ) -> Result<(), TenantsServiceError>;

    /// Direct children of `parent`, or the roots when `parent` is `None`.
    async fn list_children(
        &self,
        parent: Option<TenantId>,
    ) -> Result<Vec<TenantRecord>, TenantsServiceError>;

    /// Every tenant below `id`.
    async fn list_descendants(
        &self,
        id: TenantId,
    ) -> Result<Vec<TenantRecord>, TenantsServiceError>;

    /// Ancestors of `id`, nearest first, stopping before `until`.
    async fn list_ancestors(
        &self,
        id: TenantId,
        until: Option<TenantId>,
    ) -> Result<Vec<TenantRecord>, TenantsServiceError>;
}
