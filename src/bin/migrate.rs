//! Full pipeline run: properties -> listings, whatsapp_messages -> messages,
//! then message/listing linking. Exits 0 on completion even when individual
//! rows errored; only a failed store connection is fatal.

use anyhow::Result;
use aqar_pipeline::database_ops::db::Db;
use aqar_pipeline::migration::config::MigrationConfig;
use aqar_pipeline::migration::runner::MigrationRun;
use aqar_pipeline::migration::source::connect_sqlite;
use aqar_pipeline::util::env as env_util;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    env_util::preflight_check(
        "migrate",
        &["SOURCE_SQLITE_PATH"],
        &[
            "DATABASE_URL",
            "SOURCE_SQLITE_PATH",
            "MIGRATE_BATCH_SIZE",
            "AUTO_MIGRATE",
        ],
    )?;

    let sqlite_path = env_util::sqlite_path()?;
    let pg_url = env_util::db_url()?;

    let sqlite = connect_sqlite(&sqlite_path).await?;
    let max_conns: u32 = env_util::env_parse("DB_MAX_CONNS", 10);
    let db = Db::connect(&pg_url, max_conns).await?;

    let mut run = MigrationRun::new(db, sqlite).await?;

    let properties = match run.run_properties(&MigrationConfig::properties()).await {
        Ok(stats) => stats,
        Err(e) => {
            error!(stage = run.stage().as_str(), error = %e, "properties migration aborted");
            return Err(e);
        }
    };

    let messages = match run.run_messages(&MigrationConfig::whatsapp_messages()).await {
        Ok(stats) => stats,
        Err(e) => {
            error!(stage = run.stage().as_str(), error = %e, "messages migration aborted");
            return Err(e);
        }
    };

    let links = run.link_messages().await?;
    run.emit_stage_summary();

    info!(
        listings_migrated = properties.migrated,
        listings_errored = properties.errored,
        listings_success_pct = format!("{:.1}", properties.success_pct()),
        messages_migrated = messages.migrated,
        messages_errored = messages.errored,
        messages_success_pct = format!("{:.1}", messages.success_pct()),
        links,
        "migration complete"
    );
    Ok(())
}
