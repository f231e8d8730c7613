//! Post-run verification: row counts, foreign-key coverage, price
//! distribution, and referential-integrity violation counts. Read-only; the
//! summary is a value, not a side effect.

use crate::database_ops::db::{is_undefined_table_error, Db};
use anyhow::Result;
use bigdecimal::BigDecimal;
use serde::Serialize;
use sqlx::Row;

/// (fact table, fk column, lookup table) triples checked for coverage and orphans.
const FK_CHECKS: &[(&str, &str, &str)] = &[
    ("listings", "category_id", "categories"),
    ("listings", "region_id", "regions"),
    ("listings", "listing_type_id", "listing_types"),
    ("listings", "finish_type_id", "finish_types"),
    ("listings", "payment_type_id", "payment_types"),
    ("listings", "agent_id", "agents"),
    ("listings", "location_id", "locations"),
    ("messages", "location_id", "locations"),
];

const TARGET_TABLES: &[&str] = &[
    "listings",
    "messages",
    "message_listing_links",
    "categories",
    "regions",
    "listing_types",
    "finish_types",
    "payment_types",
    "agents",
    "locations",
];

#[derive(Debug, Clone, Serialize)]
pub struct TableCount {
    pub table: String,
    pub rows: i64,
}

#[derive(Debug, Serialize)]
pub struct FkCoverage {
    pub table: String,
    pub column: String,
    pub populated: i64,
    pub populated_pct: f64,
    pub orphaned: i64,
}

#[derive(Debug, Serialize)]
pub struct PriceDistribution {
    pub priced_rows: i64,
    pub min: BigDecimal,
    pub avg: BigDecimal,
    pub max: BigDecimal,
}

#[derive(Debug, Serialize)]
pub struct VerificationSummary {
    pub source_counts: Vec<TableCount>,
    pub target_counts: Vec<TableCount>,
    pub fk_coverage: Vec<FkCoverage>,
    pub price: Option<PriceDistribution>,
    /// Total fact rows whose FK points at a lookup id that does not exist.
    /// Expected 0 while the schema's FK constraints hold.
    pub integrity_violations: i64,
}

impl VerificationSummary {
    pub fn render(&self) -> String {
        use std::fmt::Write as _;
        let mut out = String::new();
        writeln!(out, "MIGRATION VERIFICATION SUMMARY:").ok();
        if !self.source_counts.is_empty() {
            writeln!(out, "source tables:").ok();
            for c in &self.source_counts {
                writeln!(out, "  {}: {}", c.table, c.rows).ok();
            }
        }
        writeln!(out, "target tables:").ok();
        for c in &self.target_counts {
            writeln!(out, "  {}: {}", c.table, c.rows).ok();
        }
        writeln!(out, "foreign key coverage:").ok();
        for fk in &self.fk_coverage {
            writeln!(
                out,
                "  {}.{}: populated {} ({:.1}%), orphaned {}",
                fk.table, fk.column, fk.populated, fk.populated_pct, fk.orphaned
            )
            .ok();
        }
        match &self.price {
            Some(p) => {
                writeln!(
                    out,
                    "price distribution ({} priced rows): min {}, avg {}, max {}",
                    p.priced_rows, p.min, p.avg, p.max
                )
                .ok();
            }
            None => {
                writeln!(out, "price distribution: no rows with a positive price").ok();
            }
        }
        writeln!(
            out,
            "referential integrity violations: {}",
            self.integrity_violations
        )
        .ok();
        out
    }
}

async fn count_lenient(db: &Db, sql: &str) -> Result<i64> {
    match sqlx::query_scalar::<_, i64>(sql)
        .persistent(false)
        .fetch_one(&db.pool)
        .await
    {
        Ok(val) => Ok(val),
        Err(e) if is_undefined_table_error(&e) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

pub async fn verify_migration(
    db: &Db,
    source_counts: Vec<TableCount>,
) -> Result<VerificationSummary> {
    let mut target_counts = Vec::with_capacity(TARGET_TABLES.len());
    for table in TARGET_TABLES {
        let rows = count_lenient(db, &format!("SELECT count(*) FROM {table}")).await?;
        target_counts.push(TableCount {
            table: (*table).to_string(),
            rows,
        });
    }

    let mut fk_coverage = Vec::with_capacity(FK_CHECKS.len());
    let mut integrity_violations = 0i64;
    for (table, column, lookup) in FK_CHECKS {
        let total = count_lenient(db, &format!("SELECT count(*) FROM {table}")).await?;
        let populated = count_lenient(
            db,
            &format!("SELECT count(*) FROM {table} WHERE {column} IS NOT NULL"),
        )
        .await?;
        let orphaned = count_lenient(
            db,
            &format!(
                "SELECT count(*) FROM {table} t \
                 LEFT JOIN {lookup} lk ON lk.id = t.{column} \
                 WHERE t.{column} IS NOT NULL AND lk.id IS NULL"
            ),
        )
        .await?;
        integrity_violations += orphaned;
        let populated_pct = if total > 0 {
            (populated as f64) * 100.0 / (total as f64)
        } else {
            0.0
        };
        fk_coverage.push(FkCoverage {
            table: (*table).to_string(),
            column: (*column).to_string(),
            populated,
            populated_pct,
            orphaned,
        });
    }

    let price = match sqlx::query(
        "SELECT count(*)::bigint AS priced_rows, MIN(price) AS min, AVG(price) AS avg, \
         MAX(price) AS max FROM listings WHERE price > 0",
    )
    .persistent(false)
    .fetch_one(&db.pool)
    .await
    {
        Ok(row) => {
            let priced_rows: i64 = row.get("priced_rows");
            if priced_rows > 0 {
                Some(PriceDistribution {
                    priced_rows,
                    min: row.get("min"),
                    avg: row.get("avg"),
                    max: row.get("max"),
                })
            } else {
                None
            }
        }
        Err(e) if is_undefined_table_error(&e) => None,
        Err(e) => return Err(e.into()),
    };

    Ok(VerificationSummary {
        source_counts,
        target_counts,
        fk_coverage,
        price,
        integrity_violations,
    })
}
