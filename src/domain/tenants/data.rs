//! Tenant Data

use crate::domain::tenants::records::TenantId;

/// New Tenant Data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTenant {
    /// Tenant name; must be unique under `parent`.
    pub name: String,

    /// Optional description.
    pub description: Option<String>,

    /// Parent tenant, or `None` to create a root.
    pub parent: Option<TenantId>,
}

impl NewTenant {
    /// A root tenant with no description.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parent: None,
        }
    }

    /// A tenant nested directly under `parent`.
    pub fn child_of(parent: TenantId, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parent: Some(parent),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Tenant Update Data
///
/// Only name and description are mutable; the parent link is fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Row handed to the store on insert, with the engine-assigned identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantInsert {
    pub id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<TenantId>,
}
