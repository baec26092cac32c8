use std::{sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use engine::{AuditReport, Engine, MemoryCache};
use migration::{Migrator, MigratorTrait};
use serde::Serialize;
use settings::{Company, Database, Settings};

mod settings;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Maintenance tool for the company ledgers.
#[derive(Debug, Parser)]
#[command(name = "defter", version, about)]
struct Cli {
    /// Settings file, without extension.
    #[arg(short, long, env = "DEFTER_CONFIG", default_value = "settings")]
    config: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run pending migrations on every company database.
    Migrate,
    /// Check stored totals and movement links of every company.
    Audit {
        /// Print the reports as JSON on stdout.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct CompanyAudit<'a> {
    company: &'a str,
    #[serde(flatten)]
    report: AuditReport,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let settings = Settings::new(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "defter={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    if settings.companies.is_empty() {
        tracing::warn!("no companies configured in {}", cli.config);
    }

    let healthy = match cli.command {
        Command::Migrate => migrate(&settings).await,
        Command::Audit { json } => audit(&settings, json).await?,
    };

    if !healthy {
        std::process::exit(1);
    }
    Ok(())
}

async fn migrate(settings: &Settings) -> bool {
    let mut healthy = true;
    for company in &settings.companies {
        match migrate_company(&company.database).await {
            Ok(()) => tracing::info!(company = %company.name, "migrations applied"),
            Err(err) => {
                tracing::error!(company = %company.name, "migration failed: {err}");
                healthy = false;
            }
        }
    }
    healthy
}

async fn audit(settings: &Settings, json: bool) -> Result<bool, BoxError> {
    let ttl = Duration::from_secs(settings.cache.ttl_secs);
    let mut healthy = true;
    let mut audits = Vec::with_capacity(settings.companies.len());

    for company in &settings.companies {
        match audit_company(company, ttl).await {
            Ok(report) => {
                log_report(&company.name, &report);
                healthy &= report.is_clean();
                audits.push(CompanyAudit {
                    company: &company.name,
                    report,
                });
            }
            Err(err) => {
                tracing::error!(company = %company.name, "audit failed: {err}");
                healthy = false;
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&audits)?);
    }
    Ok(healthy)
}

/// Audits one company without changing its schema. A file database is
/// opened read-only; an unmigrated one fails instead of being migrated.
async fn audit_company(company: &Company, ttl: Duration) -> Result<AuditReport, BoxError> {
    let database = connect(&company.database, Access::ReadOnly).await?;
    if company.database == Database::Memory {
        // Fresh and empty on every run.
        Migrator::up(&database, None).await?;
    }
    let engine = Engine::builder()
        .database(database)
        .cache(Arc::new(MemoryCache::new(ttl)))
        .build()
        .await?;
    Ok(engine.audit().await?)
}

fn log_report(company: &str, report: &AuditReport) {
    if report.is_clean() {
        tracing::info!(
            company,
            accounts = report.accounts_checked,
            movements = report.movements_checked,
            "ledger is consistent"
        );
        return;
    }

    for drift in &report.drifts {
        tracing::warn!(
            company,
            account_id = %drift.account_id,
            kind = %drift.kind,
            "stored totals {}/{} differ from movements {}/{}",
            drift.stored_deposit_minor,
            drift.stored_withdrawal_minor,
            drift.ledger_deposit_minor,
            drift.ledger_withdrawal_minor
        );
    }
    for link in &report.broken_links {
        tracing::warn!(
            company,
            movement_id = %link.movement_id,
            linked_id = %link.linked_id,
            "broken movement link: {:?}",
            link.problem
        );
    }
    for movement_id in &report.malformed_movements {
        tracing::warn!(company, %movement_id, "malformed movement");
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Access {
    ReadOnly,
    ReadWrite,
}

async fn connect(
    config: &Database,
    access: Access,
) -> Result<sea_orm::DatabaseConnection, BoxError> {
    let url = match (config, access) {
        (Database::Memory, _) => String::from("sqlite::memory:"),
        (Database::Sqlite(path), Access::ReadOnly) => format!("sqlite:{}?mode=ro", path),
        (Database::Sqlite(path), Access::ReadWrite) => format!("sqlite:{}?mode=rwc", path),
    };
    Ok(sea_orm::Database::connect(url).await?)
}

/// Connects to a company database, creating it if needed, and brings its
/// schema up to date.
async fn migrate_company(config: &Database) -> Result<(), BoxError> {
    let database = connect(config, Access::ReadWrite).await?;
    Migrator::up(&database, None).await?;
    Ok(())
}
