//! Tenants

pub mod data;
pub mod errors;
pub mod events;
pub mod memory;
pub mod records;
mod repository;
pub mod resolver;
pub mod service;
pub mod store;
pub mod validator;

pub use errors::TenantsServiceError;
pub use repository::{PgTenantStore, PgTenantTransaction};
pub use service::*;
