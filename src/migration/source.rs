//! Read side of the pipeline: the legacy SQLite prototype store. Raw rows are
//! immutable inputs; nothing here writes.

use crate::migration::dedupe::Dedupable;
use anyhow::{Context, Result};
use futures::TryStreamExt;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, warn};

pub async fn connect_sqlite(path: &Path) -> Result<SqlitePool> {
    let sqlite_url = format!("sqlite://{}", path.to_string_lossy());
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&sqlite_url)
        .await
        .with_context(|| format!("failed to connect to sqlite at {}", path.display()))?;

    // Read-optimized PRAGMAs for a one-shot import. Controlled via env
    // SQLITE_PERF (default true). Disable with SQLITE_PERF=0.
    if std::env::var("SQLITE_PERF")
        .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
        .unwrap_or(true)
    {
        apply_sqlite_perf_pragmas(&pool).await?;
    }
    Ok(pool)
}

// Aggressive read-optimized PRAGMAs. Safe for a dedicated, read-only import
// process; SQLITE_PERF_SAFE=1 selects a safer subset when the source DB might
// still be written by another process.
async fn apply_sqlite_perf_pragmas(pool: &SqlitePool) -> Result<()> {
    let safe_subset = std::env::var("SQLITE_PERF_SAFE")
        .map(|v| (v == "1" || v.eq_ignore_ascii_case("true")))
        .unwrap_or(false);

    let pragmas = if safe_subset {
        vec![
            "PRAGMA synchronous=NORMAL;",
            "PRAGMA temp_store=MEMORY;",
            "PRAGMA cache_size=-80000;",
            "PRAGMA mmap_size=268435456;", // 256MB
        ]
    } else {
        vec![
            "PRAGMA journal_mode=OFF;",
            "PRAGMA locking_mode=EXCLUSIVE;",
            "PRAGMA synchronous=OFF;",
            "PRAGMA temp_store=MEMORY;",
            "PRAGMA cache_size=-160000;", // ~160MB cache (negative = KB units)
            "PRAGMA mmap_size=536870912;", // 512MB memory map
        ]
    };

    for stmt in pragmas {
        if let Err(e) = sqlx::query(stmt).execute(pool).await {
            warn!(pragma=%stmt, error=?e, "sqlite pragma apply failed (continuing)");
        } else {
            debug!(pragma=%stmt, "sqlite pragma applied");
        }
    }
    Ok(())
}

pub async fn sqlite_count(pool: &SqlitePool, table: &str) -> Result<i64> {
    let sql = format!("SELECT count(*) FROM {table}");
    let n: i64 = sqlx::query_scalar(&sql)
        .persistent(false)
        .fetch_one(pool)
        .await?;
    Ok(n)
}

/// One row of the legacy flat `properties` table. Every field except the id is
/// free text; no uniqueness is guaranteed and near-duplicates are expected.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawProperty {
    pub id: i64,
    pub property_name: Option<String>,
    pub property_type: Option<String>,
    pub region: Option<String>,
    pub price: Option<String>,
    pub area: Option<String>,
    pub bedrooms: Option<String>,
    pub bathrooms: Option<String>,
    pub floor: Option<String>,
    pub finish_type: Option<String>,
    pub payment_type: Option<String>,
    pub offered_by: Option<String>,
    pub message: Option<String>,
    pub agent_name: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub created_at: Option<String>,
}

impl Dedupable for RawProperty {
    fn source_id(&self) -> i64 {
        self.id
    }
    fn message_text(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}

/// One row of the WhatsApp chat corpus.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawChatMessage {
    pub id: i64,
    pub sender: Option<String>,
    pub message: Option<String>,
    pub sent_at: Option<String>,
    pub property_type: Option<String>,
    pub location: Option<String>,
    pub price: Option<String>,
    pub phone: Option<String>,
}

impl Dedupable for RawChatMessage {
    fn source_id(&self) -> i64 {
        self.id
    }
    fn message_text(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}

/// All property rows above the watermark, ascending id order.
pub async fn fetch_properties(pool: &SqlitePool, min_source_id: i64) -> Result<Vec<RawProperty>> {
    let mut stream = sqlx::query_as::<_, RawProperty>(
        "SELECT id, property_name, property_type, region, price, area, bedrooms, bathrooms, \
         floor, finish_type, payment_type, offered_by, message, agent_name, phone, whatsapp, \
         email, created_at \
         FROM properties WHERE id > ? ORDER BY id",
    )
    .persistent(false)
    .bind(min_source_id)
    .fetch(pool);

    let mut out = Vec::new();
    while let Some(row) = stream.try_next().await? {
        out.push(row);
    }
    Ok(out)
}

/// All chat rows above the watermark, ascending id order. The legacy column is
/// called `timestamp`; aliased here because it is free text, not a timestamp.
pub async fn fetch_messages(pool: &SqlitePool, min_source_id: i64) -> Result<Vec<RawChatMessage>> {
    let mut stream = sqlx::query_as::<_, RawChatMessage>(
        "SELECT id, sender, message, timestamp AS sent_at, property_type, location, price, phone \
         FROM whatsapp_messages WHERE id > ? ORDER BY id",
    )
    .persistent(false)
    .bind(min_source_id)
    .fetch(pool);

    let mut out = Vec::new();
    while let Some(row) = stream.try_next().await? {
        out.push(row);
    }
    Ok(out)
}
