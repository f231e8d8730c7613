use anyhow::Result;
use aqar_pipeline::cli::db_counts::{self, DbCountsConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();
    db_counts::run(DbCountsConfig::default()).await
}
