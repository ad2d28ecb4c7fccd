//! Tenant Records

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::uuids::{IdPrefix, TypedId};

/// Tenant ID
pub type TenantId = TypedId<TenantRecord>;

/// Tenant Record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantRecord {
    /// Unique tenant identifier.
    pub id: TenantId,

    /// Name, unique among the tenant's siblings.
    pub name: String,

    /// Optional free-form description.
    pub description: Option<String>,

    /// Immediate parent; `None` for a root tenant.
    pub parent_id: Option<TenantId>,

    /// Tenant creation timestamp.
    pub created_at: Timestamp,

    /// Last update timestamp.
    pub updated_at: Timestamp,
}

impl TenantRecord {
    /// Whether the tenant sits at the top of a tree.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl IdPrefix for TenantRecord {
    const PREFIX: &'static str = "tnntten";
}
