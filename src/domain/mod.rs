//! Domain Concerns

pub mod tenants;
