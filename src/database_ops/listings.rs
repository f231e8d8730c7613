//! Insert-side row types for the normalized target schema.
//!
//! Batches go through one multi-row `INSERT ... ON CONFLICT DO NOTHING`
//! statement (a single round trip per batch); the migration runner falls back
//! to row-at-a-time inserts when a batch fails so one bad row never takes the
//! rest of its batch down with it.

use crate::database_ops::db::Db;
use bigdecimal::BigDecimal;
use sqlx::QueryBuilder;

#[derive(Debug, Clone)]
pub struct ListingInsert {
    pub source_property_id: i64,
    pub slug: String,
    pub name: String,
    pub category_id: Option<i64>,
    pub region_id: Option<i64>,
    pub listing_type_id: Option<i64>,
    pub finish_type_id: Option<i64>,
    pub payment_type_id: Option<i64>,
    pub agent_id: Option<i64>,
    pub location_id: Option<i64>,
    pub area_sqm: Option<i32>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub floor: Option<i32>,
    pub price: Option<BigDecimal>,
    pub message: String,
    pub raw_category: Option<String>,
    pub raw_region: Option<String>,
    pub raw_price: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
}

const LISTING_COLUMNS: &str = "INSERT INTO listings (source_property_id, slug, name, category_id, \
     region_id, listing_type_id, finish_type_id, payment_type_id, agent_id, location_id, \
     area_sqm, bedrooms, bathrooms, floor, price, message, raw_category, raw_region, raw_price, \
     phone, whatsapp, email) ";

fn push_listing_values<'a>(
    qb: &mut QueryBuilder<'a, sqlx::Postgres>,
    rows: impl IntoIterator<Item = &'a ListingInsert>,
) {
    qb.push_values(rows, |mut b, r| {
        b.push_bind(r.source_property_id)
            .push_bind(&r.slug)
            .push_bind(&r.name)
            .push_bind(r.category_id)
            .push_bind(r.region_id)
            .push_bind(r.listing_type_id)
            .push_bind(r.finish_type_id)
            .push_bind(r.payment_type_id)
            .push_bind(r.agent_id)
            .push_bind(r.location_id)
            .push_bind(r.area_sqm)
            .push_bind(r.bedrooms)
            .push_bind(r.bathrooms)
            .push_bind(r.floor)
            .push_bind(r.price.as_ref())
            .push_bind(&r.message)
            .push_bind(r.raw_category.as_ref())
            .push_bind(r.raw_region.as_ref())
            .push_bind(r.raw_price.as_ref())
            .push_bind(r.phone.as_ref())
            .push_bind(r.whatsapp.as_ref())
            .push_bind(r.email.as_ref());
    });
    // DO NOTHING: already-migrated source ids (watermark overlap) are skipped,
    // never double-inserted.
    qb.push(" ON CONFLICT DO NOTHING");
}

/// One statement per batch. Returns rows actually inserted (conflicts excluded).
pub async fn bulk_insert_listings(db: &Db, rows: &[ListingInsert]) -> sqlx::Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }
    let mut qb: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(LISTING_COLUMNS);
    push_listing_values(&mut qb, rows);
    let res = qb.build().persistent(false).execute(&db.pool).await?;
    Ok(res.rows_affected())
}

/// Row-at-a-time fallback used to isolate the failing row of a bad batch.
pub async fn insert_listing(db: &Db, row: &ListingInsert) -> sqlx::Result<u64> {
    let mut qb: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(LISTING_COLUMNS);
    push_listing_values(&mut qb, std::iter::once(row));
    let res = qb.build().persistent(false).execute(&db.pool).await?;
    Ok(res.rows_affected())
}

#[derive(Debug, Clone)]
pub struct MessageInsert {
    pub source_message_id: i64,
    pub sender: String,
    pub body: String,
    pub sent_at_text: Option<String>,
    pub property_type_hint: Option<String>,
    pub location_hint: Option<String>,
    pub location_id: Option<i64>,
    pub price_hint: Option<BigDecimal>,
    pub phone: Option<String>,
}

const MESSAGE_COLUMNS: &str = "INSERT INTO messages (source_message_id, sender, body, \
     sent_at_text, property_type_hint, location_hint, location_id, price_hint, phone) ";

fn push_message_values<'a>(
    qb: &mut QueryBuilder<'a, sqlx::Postgres>,
    rows: impl IntoIterator<Item = &'a MessageInsert>,
) {
    qb.push_values(rows, |mut b, r| {
        b.push_bind(r.source_message_id)
            .push_bind(&r.sender)
            .push_bind(&r.body)
            .push_bind(r.sent_at_text.as_ref())
            .push_bind(r.property_type_hint.as_ref())
            .push_bind(r.location_hint.as_ref())
            .push_bind(r.location_id)
            .push_bind(r.price_hint.as_ref())
            .push_bind(r.phone.as_ref());
    });
    // (sender, body) is the natural key; re-imports of the chat corpus are no-ops.
    qb.push(" ON CONFLICT DO NOTHING");
}

pub async fn bulk_insert_messages(db: &Db, rows: &[MessageInsert]) -> sqlx::Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }
    let mut qb: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(MESSAGE_COLUMNS);
    push_message_values(&mut qb, rows);
    let res = qb.build().persistent(false).execute(&db.pool).await?;
    Ok(res.rows_affected())
}

pub async fn insert_message(db: &Db, row: &MessageInsert) -> sqlx::Result<u64> {
    let mut qb: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(MESSAGE_COLUMNS);
    push_message_values(&mut qb, std::iter::once(row));
    let res = qb.build().persistent(false).execute(&db.pool).await?;
    Ok(res.rows_affected())
}

/// Relationship kinds between a chat message and a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    DerivedFrom,
    SimilarTo,
    DuplicateOf,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::DerivedFrom => "derived_from",
            LinkKind::SimilarTo => "similar_to",
            LinkKind::DuplicateOf => "duplicate_of",
        }
    }
}

/// Confidence scores live in [0, 1]; out-of-range inputs are clamped, NaN maps to 0.
pub fn clamp_confidence(raw: f32) -> f32 {
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_kind_labels_match_schema_check() {
        assert_eq!(LinkKind::DerivedFrom.as_str(), "derived_from");
        assert_eq!(LinkKind::SimilarTo.as_str(), "similar_to");
        assert_eq!(LinkKind::DuplicateOf.as_str(), "duplicate_of");
    }

    #[test]
    fn confidence_is_clamped_to_unit_interval() {
        assert_eq!(clamp_confidence(1.5), 1.0);
        assert_eq!(clamp_confidence(-0.2), 0.0);
        assert_eq!(clamp_confidence(0.42), 0.42);
        assert_eq!(clamp_confidence(f32::NAN), 0.0);
    }
}
