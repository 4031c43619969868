mod config;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use config::MigrateConfig;
use std::path::Path;
use std::sync::Arc;
#[cfg(feature = "relational")]
use svc_migrate::FileMigration;
use svc_migrate::{
    build_synthetic_migrations, Argon2PasswordHasher, Migration, MigrationContext, MigrationEngine,
    MigrationResult,
};

/// Thin shell over `svc_migrate::MigrationEngine`: `up`/`down`/`reset`
/// recover the CLI collaborator named in the core's external-interfaces
/// section; all ordering, idempotence, and bootstrap logic live in the
/// library crate.
#[derive(Parser)]
#[command(name = "migrate-cli")]
#[command(about = "Run, revert, and scaffold schema migrations")]
struct Cli {
    /// Path to a YAML config file (defaults + env still apply).
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every pending migration, or up to (and including) `to_name`.
    Up {
        to_name: Option<String>,
    },
    /// Revert the last applied migration, or everything after `to_name`.
    Down {
        to_name: Option<String>,
    },
    /// Drop every applied migration and run `up` from scratch.
    Reset,
    /// Write a timestamp-prefixed template file into the migrations directory.
    Create {
        slug: String,
    },
}

fn report(label: &str, result: &MigrationResult) {
    tracing::info!(
        applied = result.applied,
        skipped = result.skipped,
        "{label} complete"
    );
    for name in &result.applied_names {
        println!("{label}: {name}");
    }
    if result.applied == 0 {
        println!("{label}: nothing to do");
    }
}

fn synthetic_migrations(cfg: &config::SyntheticConfig) -> Vec<Box<dyn Migration>> {
    build_synthetic_migrations(&to_engine_config(cfg), Arc::new(Argon2PasswordHasher))
}

fn to_engine_config(cfg: &config::SyntheticConfig) -> svc_migrate::SyntheticConfig {
    svc_migrate::SyntheticConfig {
        multi_tenant: cfg.multi_tenant,
        meta_org_name: cfg.meta_org_name.clone(),
        admin: cfg.admin.as_ref().map(|a| svc_migrate::AdminBootstrapConfig {
            email: a.email.clone(),
            password: a.password.clone(),
        }),
    }
}

/// For single-tenant deployments the engine requires `SystemUserContext`
/// to already be initialized before the admin-user migration runs (§9);
/// there is no meta-org row to derive a system identity from, so this
/// assigns a fixed backend-native placeholder id.
fn initialize_single_tenant_system_context(backend: &str) {
    use svc_core::{SystemUserContext, UserRef};
    use svc_model::Id;

    if SystemUserContext::is_initialized() {
        return;
    }
    let id = if backend == "document" {
        Id::new_document()
    } else {
        Id::Relational(0)
    };
    SystemUserContext::initialize(UserRef::new(id), None);
}

#[cfg(feature = "relational")]
async fn run_relational(config: &MigrateConfig, command: Commands) -> Result<()> {
    let conn = sea_orm::Database::connect(&config.dsn)
        .await
        .context("connecting to relational database")?;
    let ctx = MigrationContext::Relational(&conn);

    if !config.synthetic.multi_tenant {
        initialize_single_tenant_system_context(&config.backend);
    }

    let mut migrations = synthetic_migrations(&config.synthetic);
    let dir = Path::new(&config.migrations_dir);
    if dir.is_dir() {
        migrations.extend(FileMigration::load_directory(dir)?);
    }

    let engine = MigrationEngine::new(ctx);
    match command {
        Commands::Up { to_name } => {
            let result = engine.up(migrations, to_name.as_deref()).await?;
            report("up", &result);
        }
        Commands::Down { to_name } => {
            let result = engine.down(migrations, to_name.as_deref()).await?;
            report("down", &result);
        }
        Commands::Reset => {
            let result = engine.reset(migrations).await?;
            report("reset", &result);
        }
        Commands::Create { slug } => create_file_migration(&config.migrations_dir, &slug)?,
    }
    Ok(())
}

#[cfg(feature = "document")]
async fn run_document(config: &MigrateConfig, command: Commands) -> Result<()> {
    let client = mongodb::Client::with_uri_str(&config.dsn)
        .await
        .context("connecting to document database")?;
    let db = client
        .default_database()
        .unwrap_or_else(|| client.database("demo"));
    let ctx = MigrationContext::Document(&db);

    if !config.synthetic.multi_tenant {
        initialize_single_tenant_system_context(&config.backend);
    }

    let migrations = synthetic_migrations(&config.synthetic);

    let engine = MigrationEngine::new(ctx);
    match command {
        Commands::Up { to_name } => {
            let result = engine.up(migrations, to_name.as_deref()).await?;
            report("up", &result);
        }
        Commands::Down { to_name } => {
            let result = engine.down(migrations, to_name.as_deref()).await?;
            report("down", &result);
        }
        Commands::Reset => {
            let result = engine.reset(migrations).await?;
            report("reset", &result);
        }
        Commands::Create { .. } => {
            anyhow::bail!(
                "`create` writes a `.sql` file template and only applies to the relational backend; \
                 document migrations are authored as in-process `Migration` values"
            );
        }
    }
    Ok(())
}

/// Write a `-- up` / `-- down` template named `<14-digit-timestamp>_<slug>.sql`.
fn create_file_migration(dir: &str, slug: &str) -> Result<()> {
    std::fs::create_dir_all(dir).context("creating migrations directory")?;
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let filename = format!("{stamp}_{slug}.sql");
    let path = Path::new(dir).join(&filename);
    std::fs::write(&path, "-- up\n\n-- down\n").context("writing migration template")?;
    println!("created {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = MigrateConfig::load(cli.config.as_deref())?;

    match config.backend.as_str() {
        #[cfg(feature = "relational")]
        "relational" => run_relational(&config, cli.command).await,
        #[cfg(feature = "document")]
        "document" => run_document(&config, cli.command).await,
        other => anyhow::bail!(
            "backend '{other}' is not linked into this binary; rebuild with --features {other}"
        ),
    }
}
