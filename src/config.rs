//! CLI configuration

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::tenants::{events::DEFAULT_SUBJECT_PREFIX, records::TenantId};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Compact,

    /// One JSON object per event.
    Json,
}

/// Tenant hierarchy CLI configuration
#[derive(Debug, Parser)]
#[command(name = "tenant-hierarchy", about = "Tenant hierarchy administration", long_about = None)]
pub struct Config {
    /// `PostgreSQL` connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    pub database_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t, global = true)]
    pub log_format: LogFormat,

    /// Prefix for published change subjects
    #[arg(long, env = "EVENTS_SUBJECT_PREFIX", default_value = DEFAULT_SUBJECT_PREFIX, global = true)]
    pub events_subject_prefix: String,

    /// Actor recorded on change notifications
    #[arg(long, env = "TENANT_ACTOR", global = true)]
    pub actor: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply database migrations
    Migrate,

    /// Create a tenant
    Create(CreateArgs),

    /// Show a tenant
    Get(TenantArgs),

    /// Rename or re-describe a tenant
    Update(UpdateArgs),

    /// Delete a tenant and its whole subtree
    Delete(TenantArgs),

    /// List direct children, or roots when no tenant is given
    Children(ChildrenArgs),

    /// List every tenant below a tenant
    Descendants(TenantArgs),

    /// List ancestors, nearest first
    Ancestors(AncestorsArgs),
}

#[derive(Debug, Args)]
pub struct TenantArgs {
    /// Tenant id
    pub id: TenantId,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Tenant name, unique among its siblings
    #[arg(long)]
    pub name: String,

    /// Optional description
    #[arg(long)]
    pub description: Option<String>,

    /// Parent tenant id; creates a root when omitted
    #[arg(long)]
    pub parent: Option<TenantId>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Tenant id
    pub id: TenantId,

    /// New name
    #[arg(long)]
    pub name: Option<String>,

    /// New description
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Debug, Args)]
pub struct ChildrenArgs {
    /// Parent tenant id
    pub id: Option<TenantId>,
}

#[derive(Debug, Args)]
pub struct AncestorsArgs {
    /// Tenant id
    pub id: TenantId,

    /// Stop before this ancestor
    #[arg(long)]
    pub until: Option<TenantId>,
}
