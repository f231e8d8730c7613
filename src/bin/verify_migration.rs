//! Standalone verification pass: row counts, FK coverage, price distribution
//! and referential-integrity violations, printed as a summary. Source counts
//! are included when SOURCE_SQLITE_PATH is configured.

use anyhow::Result;
use aqar_pipeline::database_ops::db::Db;
use aqar_pipeline::database_ops::verify::{verify_migration, TableCount};
use aqar_pipeline::migration::source::{connect_sqlite, sqlite_count};
use aqar_pipeline::util::env as env_util;
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let pg_url = env_util::db_url()?;
    let db = Db::connect_no_migrate(&pg_url, 5).await?;

    let mut source_counts: Vec<TableCount> = Vec::new();
    match env_util::sqlite_path() {
        Ok(path) => {
            let sqlite = connect_sqlite(&path).await?;
            for table in ["properties", "whatsapp_messages"] {
                match sqlite_count(&sqlite, table).await {
                    Ok(rows) => source_counts.push(TableCount {
                        table: table.to_string(),
                        rows,
                    }),
                    Err(e) => warn!(table, error = %e, "source count failed; skipping"),
                }
            }
        }
        Err(e) => warn!(error = %e, "no sqlite source configured; reporting target only"),
    }

    let summary = verify_migration(&db, source_counts).await?;
    if env_util::env_flag("VERIFY_JSON", false) {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary.render());
    }

    if summary.integrity_violations > 0 {
        warn!(
            violations = summary.integrity_violations,
            "referential integrity violations detected"
        );
    }
    Ok(())
}
