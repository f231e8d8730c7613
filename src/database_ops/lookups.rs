//! Find-or-create resolution of free-text labels against the lookup tables.
//!
//! Every resolver matches on the trimmed, case-sensitive label and creates the
//! row when absent (`ON CONFLICT ... RETURNING id`), so re-running a migration
//! never produces duplicate labels. Values that fail the corruption check
//! (image filenames stored in text fields) resolve to None instead.

use crate::database_ops::db::Db;
use crate::migration::classifier::is_corrupted_value;
use anyhow::Result;
use sqlx::Row;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupTable {
    Categories,
    Regions,
    ListingTypes,
    FinishTypes,
    PaymentTypes,
}

impl LookupTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            LookupTable::Categories => "categories",
            LookupTable::Regions => "regions",
            LookupTable::ListingTypes => "listing_types",
            LookupTable::FinishTypes => "finish_types",
            LookupTable::PaymentTypes => "payment_types",
        }
    }

    pub fn key_column(&self) -> &'static str {
        match self {
            LookupTable::Categories => "name_ar",
            _ => "name",
        }
    }
}

/// Trimmed natural key, or None for null/empty/corrupted input.
pub fn clean_natural_key(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() || is_corrupted_value(value) {
        return None;
    }
    Some(value.to_string())
}

/// Per-run cache of resolved surrogate ids so each natural key costs at most
/// one round trip. Single-writer batch execution is assumed; no cross-process
/// coherence is needed.
#[derive(Default)]
pub struct LookupCache {
    ids: HashMap<(LookupTable, String), i64>,
    agent_ids: HashMap<String, i64>,
    location_ids: HashMap<String, i64>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// resolve(table, natural key) -> surrogate id; None for unusable values.
    pub async fn resolve(
        &mut self,
        db: &Db,
        table: LookupTable,
        raw: Option<&str>,
    ) -> Result<Option<i64>> {
        let Some(value) = clean_natural_key(raw) else {
            return Ok(None);
        };
        if let Some(id) = self.ids.get(&(table, value.clone())) {
            return Ok(Some(*id));
        }
        let id = find_or_create(db, table.table_name(), table.key_column(), &value).await?;
        self.ids.insert((table, value), id);
        Ok(Some(id))
    }

    pub async fn resolve_agent(
        &mut self,
        db: &Db,
        name: Option<&str>,
        phone: Option<&str>,
        whatsapp: Option<&str>,
    ) -> Result<Option<i64>> {
        let Some(name) = clean_natural_key(name) else {
            return Ok(None);
        };
        if let Some(id) = self.agent_ids.get(&name) {
            return Ok(Some(*id));
        }
        let rec = sqlx::query(
            "INSERT INTO agents (name, phone, whatsapp) VALUES ($1, $2, $3)
             ON CONFLICT (name) DO UPDATE
             SET phone = COALESCE(agents.phone, EXCLUDED.phone),
                 whatsapp = COALESCE(agents.whatsapp, EXCLUDED.whatsapp)
             RETURNING id",
        )
        .persistent(false)
        .bind(&name)
        .bind(phone.map(str::trim).filter(|s| !s.is_empty()))
        .bind(whatsapp.map(str::trim).filter(|s| !s.is_empty()))
        .fetch_one(&db.pool)
        .await?;
        let id: i64 = rec.get("id");
        self.agent_ids.insert(name, id);
        Ok(Some(id))
    }

    /// Locations nest (district -> area -> compound); `parent_id` may point at
    /// an enclosing location.
    pub async fn resolve_location(
        &mut self,
        db: &Db,
        name: Option<&str>,
        kind: &str,
        parent_id: Option<i64>,
    ) -> Result<Option<i64>> {
        let Some(name) = clean_natural_key(name) else {
            return Ok(None);
        };
        if let Some(id) = self.location_ids.get(&name) {
            return Ok(Some(*id));
        }
        let rec = sqlx::query(
            "INSERT INTO locations (name, kind, parent_id) VALUES ($1, $2, $3)
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
             RETURNING id",
        )
        .persistent(false)
        .bind(&name)
        .bind(kind)
        .bind(parent_id)
        .fetch_one(&db.pool)
        .await?;
        let id: i64 = rec.get("id");
        self.location_ids.insert(name, id);
        Ok(Some(id))
    }
}

async fn find_or_create(db: &Db, table: &str, key_col: &str, value: &str) -> Result<i64> {
    let select_sql = format!("SELECT id FROM {} WHERE {} = $1", table, key_col);
    if let Some(rec) = sqlx::query(&select_sql)
        .persistent(false)
        .bind(value)
        .fetch_optional(&db.pool)
        .await?
    {
        return Ok(rec.get::<i64, _>("id"));
    }
    let insert_sql = format!(
        "INSERT INTO {table} ({col}) VALUES ($1)
         ON CONFLICT ({col}) DO UPDATE SET {col} = EXCLUDED.{col}
         RETURNING id",
        table = table,
        col = key_col,
    );
    let rec = sqlx::query(&insert_sql)
        .persistent(false)
        .bind(value)
        .fetch_one(&db.pool)
        .await?;
    Ok(rec.get("id"))
}

/// Known location labels, longest first so "التجمع الخامس" wins over "التجمع".
/// Used to attach a location to listings whose free text mentions one.
pub async fn load_location_index(db: &Db) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query("SELECT id, name FROM locations")
        .persistent(false)
        .fetch_all(&db.pool)
        .await?;
    let mut index: Vec<(String, i64)> = rows
        .into_iter()
        .map(|r| (r.get::<String, _>("name"), r.get::<i64, _>("id")))
        .collect();
    index.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
    Ok(index)
}

/// First (longest) known location mentioned in `text`, if any.
pub fn match_location(index: &[(String, i64)], text: &str) -> Option<i64> {
    index
        .iter()
        .find(|(name, _)| text.contains(name.as_str()))
        .map(|(_, id)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_natural_key_trims_and_rejects_garbage() {
        assert_eq!(clean_natural_key(Some("  فيلا ")), Some("فيلا".to_string()));
        assert_eq!(clean_natural_key(Some("   ")), None);
        assert_eq!(clean_natural_key(None), None);
        // image filename stored in a text field
        assert_eq!(clean_natural_key(Some("IMG_2031.jpg")), None);
    }

    #[test]
    fn match_location_prefers_longest_label() {
        let index = vec![
            ("التجمع الخامس".to_string(), 2),
            ("التجمع".to_string(), 1),
        ];
        assert_eq!(
            match_location(&index, "شقة للبيع في التجمع الخامس بجوار الخدمات"),
            Some(2)
        );
        assert_eq!(match_location(&index, "شقة في مدينة نصر"), None);
    }
}
