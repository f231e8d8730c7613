//! Diagnostic row counts over the normalized store. Resilient to partially
//! migrated schemas: a missing table counts as zero instead of failing the
//! whole command.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::database_ops::db::{is_undefined_table_error, Db};
use crate::util::env as env_util;

#[derive(Debug, Clone, Default)]
pub struct DbCountsConfig {
    /// Optional override for the Postgres connection string.
    pub database_url: Option<String>,
    /// Force whether recent listings should be displayed (defaults to env RECENT_LISTINGS).
    pub show_recent_listings: Option<bool>,
    /// Override the recent listings LIMIT (defaults to env RECENT_LISTINGS_LIMIT or 20).
    pub recent_listings_limit: Option<i64>,
}

pub async fn run(cfg: DbCountsConfig) -> Result<()> {
    env_util::init_env();
    let db_url = match cfg.database_url.clone() {
        Some(url) => url,
        None => env_util::db_url()?,
    };
    let db = Db::connect_no_migrate(&db_url, 5).await?;
    let pool = &db.pool;

    macro_rules! count {
        ($sql:expr) => {
            match sqlx::query_scalar::<_, i64>($sql)
                .persistent(false)
                .fetch_one(pool)
                .await
            {
                Ok(val) => val,
                Err(e) if is_undefined_table_error(&e) => 0,
                Err(e) => return Err(e.into()),
            }
        };
    }

    let listings = count!("SELECT count(*) FROM listings");
    let messages = count!("SELECT count(*) FROM messages");
    let links = count!("SELECT count(*) FROM message_listing_links");
    let categories = count!("SELECT count(*) FROM categories");
    let regions = count!("SELECT count(*) FROM regions");
    let listing_types = count!("SELECT count(*) FROM listing_types");
    let finish_types = count!("SELECT count(*) FROM finish_types");
    let payment_types = count!("SELECT count(*) FROM payment_types");
    let agents = count!("SELECT count(*) FROM agents");
    let locations = count!("SELECT count(*) FROM locations");
    let checkpoints = count!("SELECT count(*) FROM migration_checkpoints");

    let listings_with_price =
        count!("SELECT count(*) FROM listings WHERE price IS NOT NULL AND price > 0");
    let listings_with_category = count!("SELECT count(*) FROM listings WHERE category_id IS NOT NULL");
    let listings_24h =
        count!("SELECT count(*) FROM listings WHERE created_at > now() - interval '1 day'");

    use std::fmt::Write as _;
    let mut out = String::new();
    writeln!(out, "DB COUNTS SUMMARY:").ok();
    writeln!(out, "listings: {listings} (priced: {listings_with_price}, categorized: {listings_with_category}, last 24h: {listings_24h})").ok();
    writeln!(out, "messages: {messages}").ok();
    writeln!(out, "message_listing_links: {links}").ok();
    writeln!(out, "lookups:").ok();
    writeln!(out, "  categories: {categories}").ok();
    writeln!(out, "  regions: {regions}").ok();
    writeln!(out, "  listing_types: {listing_types}").ok();
    writeln!(out, "  finish_types: {finish_types}").ok();
    writeln!(out, "  payment_types: {payment_types}").ok();
    writeln!(out, "  agents: {agents}").ok();
    writeln!(out, "  locations: {locations}").ok();
    writeln!(out, "migration_checkpoints: {checkpoints}").ok();
    println!("{}", out);

    let checkpoint_rows = sqlx::query(
        "SELECT source, last_source_id, updated_at FROM migration_checkpoints ORDER BY source",
    )
    .persistent(false)
    .fetch_all(pool)
    .await
    .unwrap_or_default();
    if !checkpoint_rows.is_empty() {
        println!("watermarks:");
        for r in checkpoint_rows {
            let source: String = r.get("source");
            let last_id: i64 = r.get("last_source_id");
            let updated_at: DateTime<Utc> = r.get("updated_at");
            println!(
                "  {source}: last_source_id={last_id}, updated {}",
                updated_at.format("%Y-%m-%d %H:%M UTC")
            );
        }
        println!();
    }

    let want_recent = cfg.show_recent_listings.unwrap_or_else(|| {
        env_util::env_flag("RECENT_LISTINGS", false)
    });
    if want_recent {
        let limit: i64 = cfg
            .recent_listings_limit
            .unwrap_or_else(|| env_util::env_parse("RECENT_LISTINGS_LIMIT", 20));
        let recent = sqlx::query(
            "SELECT l.name, c.name_ar AS category, r.name AS region, l.price::text AS price, l.created_at
             FROM listings l
             LEFT JOIN categories c ON c.id = l.category_id
             LEFT JOIN regions r ON r.id = l.region_id
             ORDER BY l.created_at DESC, l.id DESC
             LIMIT $1",
        )
        .bind(limit)
        .persistent(false)
        .fetch_all(pool)
        .await
        .unwrap_or_default();
        println!("recent listings (newest first, limit {limit}):");
        for r in recent {
            let name: String = r.get("name");
            let category: Option<String> = r.try_get("category").ok();
            let region: Option<String> = r.try_get("region").ok();
            let price: Option<String> = r.try_get("price").ok().flatten();
            println!(
                "  {} [{}] — {} — {}",
                name,
                category.unwrap_or_else(|| "-".into()),
                region.unwrap_or_else(|| "-".into()),
                price.unwrap_or_else(|| "no-price".into()),
            );
        }
    }

    Ok(())
}
