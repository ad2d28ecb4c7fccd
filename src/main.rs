//! Tenant hierarchy CLI

use std::{process, sync::Arc};

use serde::Serialize;
use tenant_hierarchy::{
    config::{Command, Config},
    database::{self, Db},
    domain::tenants::{
        PgTenantsService, TenantsService,
        data::{NewTenant, TenantUpdate},
        events::{ActorId, TracingPublisher},
    },
    observability,
};

#[tokio::main]
pub async fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => error.exit(),
    };

    if let Err(error) = observability::init(&config) {
        eprintln!("{error}");
        process::exit(1);
    }

    if let Err(error) = run(config).await {
        eprintln!("{error}");
        process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), String> {
    let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| "DATABASE_URL is not set".to_string())?;

    let pool = database::connect(database_url)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

    if matches!(config.command, Command::Migrate) {
        database::migrate(&pool)
            .await
            .map_err(|error| format!("failed to apply migrations: {error}"))?;

        println!("migrations applied");

        return Ok(());
    }

    let service = PgTenantsService::from_db(
        Db::new(pool),
        Arc::new(TracingPublisher::new(config.events_subject_prefix)),
    );
    let actor = config.actor.map(ActorId);

    match config.command {
        Command::Migrate => Ok(()),
        Command::Create(args) => {
            let tenant = NewTenant {
                name: args.name,
                description: args.description,
                parent: args.parent,
            };

            print_json(
                &service
                    .create_tenant(tenant, actor)
                    .await
                    .map_err(|error| format!("failed to create tenant: {error}"))?,
            )
        }
        Command::Get(args) => print_json(
            &service
                .get_tenant(args.id)
                .await
                .map_err(|error| format!("failed to get tenant: {error}"))?,
        ),
        Command::Update(args) => {
            let update = TenantUpdate {
                name: args.name,
                description: args.description,
            };

            print_json(
                &service
                    .update_tenant(args.id, update, actor)
                    .await
                    .map_err(|error| format!("failed to update tenant: {error}"))?,
            )
        }
        Command::Delete(args) => {
            service
                .delete_tenant(args.id, actor)
                .await
                .map_err(|error| format!("failed to delete tenant: {error}"))?;

            println!("deleted {}", args.id);

            Ok(())
        }
        Command::Children(args) => print_json(
            &service
                .list_children(args.id)
                .await
                .map_err(|error| format!("failed to list children: {error}"))?,
        ),
        Command::Descendants(args) => print_json(
            &service
                .list_descendants(args.id)
                .await
                .map_err(|error| format!("failed to list descendants: {error}"))?,
        ),
        Command::Ancestors(args) => print_json(
            &service
                .list_ancestors(args.id, args.until)
                .await
                .map_err(|error| format!("failed to list ancestors: {error}"))?,
        ),
    }
}

fn print_json<T>(value: &T) -> Result<(), String>
where
    T: Serialize,
{
    let json = serde_json::to_string_pretty(value)
        .map_err(|error| format!("failed to encode output: {error}"))?;

    println!("{json}");

    Ok(())
}
