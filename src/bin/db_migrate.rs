//! Apply ./migrations to the target store. `--reset` is the operator-side
//! full-reload path: it drops the normalized tables and the watermarks so the
//! next `migrate` run starts from scratch.

use anyhow::Result;
use aqar_pipeline::database_ops::db::Db;
use aqar_pipeline::util::env as env_util;
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "db_migrate", about = "Apply ./migrations to the target store")]
struct Args {
    /// Drop the normalized tables, seeds and watermarks before re-applying
    #[arg(long)]
    reset: bool,
}

const RESET_STATEMENTS: &[&str] = &[
    "DROP TABLE IF EXISTS message_listing_links CASCADE",
    "DROP TABLE IF EXISTS messages CASCADE",
    "DROP TABLE IF EXISTS listings CASCADE",
    "DROP TABLE IF EXISTS locations CASCADE",
    "DROP TABLE IF EXISTS agents CASCADE",
    "DROP TABLE IF EXISTS payment_types CASCADE",
    "DROP TABLE IF EXISTS finish_types CASCADE",
    "DROP TABLE IF EXISTS listing_types CASCADE",
    "DROP TABLE IF EXISTS regions CASCADE",
    "DROP TABLE IF EXISTS categories CASCADE",
    "DROP TABLE IF EXISTS migration_checkpoints CASCADE",
    "DROP TABLE IF EXISTS _migrations CASCADE",
];

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();
    let pg_url = env_util::db_url()?;
    let db = Db::connect_no_migrate(&pg_url, 5).await?;

    if args.reset {
        warn!("--reset: dropping normalized tables and watermarks");
        for stmt in RESET_STATEMENTS {
            sqlx::raw_sql(stmt).execute(&db.pool).await?;
        }
    }

    Db::run_migrations(&db.pool).await?;
    info!("schema is up to date");
    Ok(())
}
