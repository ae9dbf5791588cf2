//! Console commands: tenant-aware migrations, one-off resolution, landlord setup.

use crate::connection::{ConnectionRegistry, PgConnectionRegistry};
use crate::context::{ConsoleArgs, ExecutionContext, TENANT_FLAG};
use crate::error::TenantError;
use crate::events::TracingEventSink;
use crate::migration::{migrate_tenants, MigrationReport, SqlScriptMigrator, TenantSelector};
use crate::settings::Settings;
use crate::state::TenantState;
use crate::store::PgTenantStore;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

/// Tenant resolution and per-tenant migrations for database-per-tenant PostgreSQL
#[derive(Parser, Debug)]
#[command(name = "architect-tenant")]
#[command(version)]
#[command(about = "Tenant resolution and per-tenant migrations", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run migrations against one tenant (by subdomain) or `*` for all tenants
    Migrate(MigrateArgs),

    /// Resolve a tenant by subdomain, alias domain or id and print it
    Resolve(ResolveArgs),

    /// Create the tenants table in the landlord database
    Setup,
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Tenant subdomain, or `*` for every tenant
    #[arg(long)]
    pub tenant: Option<String>,

    /// Directory of `.sql` scripts (defaults to MIGRATIONS_PATH)
    #[arg(long)]
    pub path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Subdomain, alias domain or id
    #[arg(long)]
    pub tenant: Option<String>,
}

impl ResolveArgs {
    /// Console options the resolver reads; an absent `--tenant` leaves the selector unset.
    pub fn console_args(&self) -> ConsoleArgs {
        match &self.tenant {
            Some(tenant) => ConsoleArgs::default().with_flag(TENANT_FLAG, tenant.as_str()),
            None => ConsoleArgs::default(),
        }
    }
}

/// Landlord store, registry and state shared by every command.
pub fn build_state(settings: &Settings) -> Result<TenantState, TenantError> {
    let config = settings.connection_config()?;
    let registry = Arc::new(PgConnectionRegistry::new(config).with_max_connections(settings.max_connections));
    let landlord = registry.open_pool(&registry.config().default_connection())?;
    let store = PgTenantStore::with_table(landlord, &settings.tenant_schema, &settings.tenant_table);
    Ok(TenantState::new(Arc::new(store), registry, Arc::new(TracingEventSink)))
}

pub async fn run(cli: Cli, settings: Settings) -> Result<(), TenantError> {
    let state = build_state(&settings)?;
    match cli.command {
        Command::Migrate(args) => {
            let Some(selector) = TenantSelector::parse(args.tenant.as_deref()) else {
                tracing::warn!("You must specify a tenant or * to run for all tenants");
                return Ok(());
            };
            let path = args.path.unwrap_or_else(|| settings.migrations_path.clone());
            let report = migrate(&state, &selector, &path).await?;
            print_json(&report)?;
        }
        Command::Resolve(args) => {
            let mut resolver = state.resolver(ExecutionContext::Console(args.console_args()));
            let resolved = resolver.resolve_tenant().await?;
            resolver.purge_connection().await;
            match resolved {
                Some(tenant) => print_json(&tenant.snapshot())?,
                None => tracing::warn!("could not find tenant"),
            }
        }
        Command::Setup => {
            let landlord = state.registry.open_pool(&state.base_connection)?;
            PgTenantStore::with_table(landlord, &settings.tenant_schema, &settings.tenant_table)
                .ensure_tenants_table()
                .await?;
            tracing::info!(schema = %settings.tenant_schema, table = %settings.tenant_table, "tenants table ready");
        }
    }
    state.registry.purge().await;
    Ok(())
}

async fn migrate(
    state: &TenantState,
    selector: &TenantSelector,
    path: &std::path::Path,
) -> Result<MigrationReport, TenantError> {
    let migrator = SqlScriptMigrator::from_dir(state.registry.clone(), path).await?;
    tracing::info!(scripts = migrator.script_names().len(), path = %path.display(), "loaded migration scripts");
    let mut resolver = state.resolver(ExecutionContext::Console(
        ConsoleArgs::default().with_flag(TENANT_FLAG, selector.to_string()),
    ));
    migrate_tenants(&mut resolver, &migrator, selector).await
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), TenantError> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_accepts_selector_and_path() {
        let cli = Cli::try_parse_from(["architect-tenant", "migrate", "--tenant", "*", "--path", "db/tenant"]).unwrap();
        match cli.command {
            Command::Migrate(args) => {
                assert_eq!(TenantSelector::parse(args.tenant.as_deref()), Some(TenantSelector::All));
                assert_eq!(args.path, Some(PathBuf::from("db/tenant")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn migrate_without_tenant_parses() {
        let cli = Cli::try_parse_from(["architect-tenant", "migrate"]).unwrap();
        assert!(matches!(cli.command, Command::Migrate(MigrateArgs { tenant: None, path: None })));
    }

    #[test]
    fn resolve_and_setup_parse() {
        let cli = Cli::try_parse_from(["architect-tenant", "resolve", "--tenant=acme"]).unwrap();
        assert!(matches!(cli.command, Command::Resolve(ResolveArgs { tenant: Some(ref t) }) if t == "acme"));
        let cli = Cli::try_parse_from(["architect-tenant", "setup"]).unwrap();
        assert!(matches!(cli.command, Command::Setup));
    }

    #[test]
    fn resolve_args_become_console_selector() {
        let cli = Cli::try_parse_from(["architect-tenant", "resolve", "--tenant", "globex"]).unwrap();
        let Command::Resolve(args) = cli.command else {
            panic!("expected resolve");
        };
        assert_eq!(args.console_args().tenant(), Some("globex"));

        let cli = Cli::try_parse_from(["architect-tenant", "resolve"]).unwrap();
        let Command::Resolve(args) = cli.command else {
            panic!("expected resolve");
        };
        assert_eq!(args.console_args(), ConsoleArgs::default());
        assert_eq!(args.console_args().tenant(), None);
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["architect-tenant", "serve"]).is_err());
    }
}
