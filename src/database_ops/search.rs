//! Read-side queries behind the HTTP API: filter composition only, no
//! business logic. Results always order by recency.

use crate::database_ops::db::Db;
use anyhow::Result;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Row};

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub q: Option<String>,
    pub category_id: Option<i64>,
    pub region_id: Option<i64>,
    pub listing_type_id: Option<i64>,
    pub min_price: Option<BigDecimal>,
    pub max_price: Option<BigDecimal>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct ListingSummary {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub category: Option<String>,
    pub region: Option<String>,
    pub listing_type: Option<String>,
    pub price: Option<BigDecimal>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub area_sqm: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ListingDetail {
    #[serde(flatten)]
    pub summary: ListingSummary,
    pub finish_type: Option<String>,
    pub payment_type: Option<String>,
    pub agent: Option<String>,
    pub location: Option<String>,
    pub floor: Option<i32>,
    pub message: String,
    pub raw_category: Option<String>,
    pub raw_region: Option<String>,
    pub raw_price: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
}

const SUMMARY_SELECT: &str = "SELECT l.id, l.slug, l.name, c.name_ar AS category, \
     r.name AS region, lt.name AS listing_type, l.price, l.bedrooms, l.bathrooms, \
     l.area_sqm, l.created_at \
     FROM listings l \
     LEFT JOIN categories c ON c.id = l.category_id \
     LEFT JOIN regions r ON r.id = l.region_id \
     LEFT JOIN listing_types lt ON lt.id = l.listing_type_id";

fn summary_from_row(row: &sqlx::postgres::PgRow) -> ListingSummary {
    ListingSummary {
        id: row.get("id"),
        slug: row.get("slug"),
        name: row.get("name"),
        category: row.try_get("category").ok(),
        region: row.try_get("region").ok(),
        listing_type: row.try_get("listing_type").ok(),
        price: row.try_get("price").ok().flatten(),
        bedrooms: row.try_get("bedrooms").ok().flatten(),
        bathrooms: row.try_get("bathrooms").ok().flatten(),
        area_sqm: row.try_get("area_sqm").ok().flatten(),
        created_at: row.get("created_at"),
    }
}

pub async fn search_listings(db: &Db, filter: &ListingFilter) -> Result<Vec<ListingSummary>> {
    let mut qb: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(SUMMARY_SELECT);
    qb.push(" WHERE 1=1");

    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", q);
        qb.push(" AND (l.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR l.message ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category_id) = filter.category_id {
        qb.push(" AND l.category_id = ").push_bind(category_id);
    }
    if let Some(region_id) = filter.region_id {
        qb.push(" AND l.region_id = ").push_bind(region_id);
    }
    if let Some(listing_type_id) = filter.listing_type_id {
        qb.push(" AND l.listing_type_id = ").push_bind(listing_type_id);
    }
    if let Some(min_price) = filter.min_price.as_ref() {
        qb.push(" AND l.price >= ").push_bind(min_price.clone());
    }
    if let Some(max_price) = filter.max_price.as_ref() {
        qb.push(" AND l.price <= ").push_bind(max_price.clone());
    }
    if let Some(bedrooms) = filter.bedrooms {
        qb.push(" AND l.bedrooms = ").push_bind(bedrooms);
    }
    if let Some(bathrooms) = filter.bathrooms {
        qb.push(" AND l.bathrooms = ").push_bind(bathrooms);
    }

    let limit = filter.limit.clamp(1, MAX_PAGE_SIZE);
    let offset = filter.offset.max(0);
    qb.push(" ORDER BY l.created_at DESC, l.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = qb
        .build()
        .persistent(false)
        .fetch_all(&db.pool)
        .await?;
    Ok(rows.iter().map(summary_from_row).collect())
}

pub async fn listing_by_id(db: &Db, id: i64) -> Result<Option<ListingDetail>> {
    let row = sqlx::query(
        "SELECT l.id, l.slug, l.name, c.name_ar AS category, r.name AS region, \
         lt.name AS listing_type, ft.name AS finish_type, pt.name AS payment_type, \
         a.name AS agent, loc.name AS location, \
         l.price, l.bedrooms, l.bathrooms, l.area_sqm, l.floor, l.message, \
         l.raw_category, l.raw_region, l.raw_price, l.phone, l.whatsapp, l.email, l.created_at \
         FROM listings l \
         LEFT JOIN categories c ON c.id = l.category_id \
         LEFT JOIN regions r ON r.id = l.region_id \
         LEFT JOIN listing_types lt ON lt.id = l.listing_type_id \
         LEFT JOIN finish_types ft ON ft.id = l.finish_type_id \
         LEFT JOIN payment_types pt ON pt.id = l.payment_type_id \
         LEFT JOIN agents a ON a.id = l.agent_id \
         LEFT JOIN locations loc ON loc.id = l.location_id \
         WHERE l.id = $1",
    )
    .persistent(false)
    .bind(id)
    .fetch_optional(&db.pool)
    .await?;

    Ok(row.map(|row| ListingDetail {
        summary: summary_from_row(&row),
        finish_type: row.try_get("finish_type").ok(),
        payment_type: row.try_get("payment_type").ok(),
        agent: row.try_get("agent").ok(),
        location: row.try_get("location").ok(),
        floor: row.try_get("floor").ok().flatten(),
        message: row.get("message"),
        raw_category: row.try_get("raw_category").ok().flatten(),
        raw_region: row.try_get("raw_region").ok().flatten(),
        raw_price: row.try_get("raw_price").ok().flatten(),
        phone: row.try_get("phone").ok().flatten(),
        whatsapp: row.try_get("whatsapp").ok().flatten(),
        email: row.try_get("email").ok().flatten(),
    }))
}

#[derive(Debug, Serialize)]
pub struct CategoryStat {
    pub category: String,
    pub listings: i64,
    pub min_price: Option<BigDecimal>,
    pub avg_price: Option<BigDecimal>,
    pub max_price: Option<BigDecimal>,
}

pub async fn category_stats(db: &Db) -> Result<Vec<CategoryStat>> {
    let rows = sqlx::query(
        "SELECT COALESCE(c.name_ar, '(بدون تصنيف)') AS category, \
         COUNT(*)::bigint AS listings, \
         MIN(l.price) FILTER (WHERE l.price > 0) AS min_price, \
         AVG(l.price) FILTER (WHERE l.price > 0) AS avg_price, \
         MAX(l.price) FILTER (WHERE l.price > 0) AS max_price \
         FROM listings l \
         LEFT JOIN categories c ON c.id = l.category_id \
         GROUP BY COALESCE(c.name_ar, '(بدون تصنيف)') \
         ORDER BY listings DESC",
    )
    .persistent(false)
    .fetch_all(&db.pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| CategoryStat {
            category: r.get("category"),
            listings: r.get("listings"),
            min_price: r.try_get("min_price").ok().flatten(),
            avg_price: r.try_get("avg_price").ok().flatten(),
            max_price: r.try_get("max_price").ok().flatten(),
        })
        .collect())
}
