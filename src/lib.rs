//! Tenant hierarchy engine.
//!
//! Maintains a forest of tenants linked by parent id, keeps it acyclic and
//! free of orphans across create, rename and cascading delete, and reports
//! every committed change to a [`ChangePublisher`] together with the tenants
//! whose derived state it affects.
//!
//! [`ChangePublisher`]: domain::tenants::events::ChangePublisher

pub mod config;
pub mod database;
pub mod domain;
pub mod observability;
pub mod uuids;

#[cfg(test)]
mod test;
