//! Pipeline orchestration: read -> classify -> dedupe -> normalize -> write ->
//! verify, one source table end-to-end per invocation, strictly sequential.
//!
//! Per-row problems never abort a run; they are counted and logged with the
//! source row id. Only a failed store connection is fatal. Batches already
//! committed stay committed — there is no whole-run transaction, and the
//! durable watermark advances with each written batch.

use crate::database_ops::db::{is_fk_violation, is_unique_violation, Db};
use crate::database_ops::listings::{
    bulk_insert_listings, bulk_insert_messages, clamp_confidence, insert_listing, insert_message,
    LinkKind, ListingInsert, MessageInsert,
};
use crate::database_ops::lookups::{
    clean_natural_key, load_location_index, match_location, LookupCache, LookupTable,
};
use crate::database_ops::verify::{verify_migration, TableCount, VerificationSummary};
use crate::migration::classifier::{classify, Classification};
use crate::migration::config::MigrationConfig;
use crate::migration::dedupe::dedupe_by_message;
use crate::migration::progress::{emit_stage_summary, Progress, StageTiming};
use crate::migration::source::{self, RawChatMessage, RawProperty};
use crate::normalization::category::bucket_listing_kind;
use crate::normalization::contact::extract_phone;
use crate::normalization::numeric::{extract_decimal, extract_i32};
use crate::normalization::slug::listing_slug;
use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    NotStarted,
    ReadingSource,
    Classifying,
    Deduplicating,
    Normalizing,
    Writing,
    Verifying,
    Done,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::NotStarted => "not-started",
            PipelineStage::ReadingSource => "reading-source",
            PipelineStage::Classifying => "classifying",
            PipelineStage::Deduplicating => "deduplicating",
            PipelineStage::Normalizing => "normalizing",
            PipelineStage::Writing => "writing",
            PipelineStage::Verifying => "verifying",
            PipelineStage::Done => "done",
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MigrationStats {
    pub read: usize,
    pub skipped_too_short: usize,
    pub skipped_test_data: usize,
    pub skipped_corrupted: usize,
    pub duplicates_dropped: usize,
    pub migrated: usize,
    pub errored: usize,
}

impl MigrationStats {
    /// Share of attempted inserts that landed. 100% when nothing was attempted.
    pub fn success_pct(&self) -> f64 {
        let attempted = self.migrated + self.errored;
        if attempted == 0 {
            return 100.0;
        }
        (self.migrated as f64) * 100.0 / (attempted as f64)
    }
}

pub struct MigrationRun {
    db: Db,
    sqlite: SqlitePool,
    cache: LookupCache,
    stage: PipelineStage,
    stage_timings: Vec<StageTiming>,
}

impl MigrationRun {
    pub async fn new(db: Db, sqlite: SqlitePool) -> Result<Self> {
        let run = Self {
            db,
            sqlite,
            cache: LookupCache::new(),
            stage: PipelineStage::NotStarted,
            stage_timings: Vec::new(),
        };
        run.ensure_checkpoint_table().await?;
        Ok(run)
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    fn enter(&mut self, stage: PipelineStage) {
        self.stage = stage;
        info!(stage = stage.as_str(), "pipeline stage");
    }

    fn push_timing(&mut self, name: &str, started: Instant) {
        let elapsed = started.elapsed();
        info!(
            target: "metrics",
            stage = name,
            took_ms = format!("{:.2}", elapsed.as_secs_f64() * 1000.0),
            "stage timing"
        );
        self.stage_timings.push(StageTiming {
            name: name.to_string(),
            elapsed,
            success: true,
        });
    }

    pub fn emit_stage_summary(&self) {
        emit_stage_summary(&self.stage_timings);
    }

    // ----- Durable watermarks -----

    async fn ensure_checkpoint_table(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS migration_checkpoints (
                source TEXT PRIMARY KEY,
                last_source_id BIGINT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
             )",
        )
        .persistent(false)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    async fn get_checkpoint(&self, source: &str) -> Result<i64> {
        if let Some(row) =
            sqlx::query("SELECT last_source_id FROM migration_checkpoints WHERE source = $1")
                .persistent(false)
                .bind(source)
                .fetch_optional(&self.db.pool)
                .await?
        {
            let ckpt = row.get::<i64, _>("last_source_id");
            info!(source, resume_min_id = ckpt, "loaded durable watermark");
            Ok(ckpt)
        } else {
            info!(source, "no watermark found — starting from the beginning");
            Ok(0)
        }
    }

    async fn save_checkpoint(&self, source: &str, last_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO migration_checkpoints (source, last_source_id) VALUES ($1, $2)
             ON CONFLICT (source) DO UPDATE
             SET last_source_id = EXCLUDED.last_source_id, updated_at = now()",
        )
        .persistent(false)
        .bind(source)
        .bind(last_id)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    // ----- Lookup resolution with per-field failure isolation -----

    async fn resolve_or_null(
        &mut self,
        table: LookupTable,
        raw: Option<&str>,
        source_id: i64,
        field: &'static str,
    ) -> Option<i64> {
        match self.cache.resolve(&self.db, table, raw).await {
            Ok(id) => id,
            Err(e) => {
                warn!(source_id, field, error = %e, "lookup resolution failed; storing null");
                None
            }
        }
    }

    // ----- properties -> listings -----

    pub async fn run_properties(&mut self, cfg: &MigrationConfig) -> Result<MigrationStats> {
        let mut stats = MigrationStats::default();

        self.enter(PipelineStage::ReadingSource);
        let t = Instant::now();
        let watermark = self.get_checkpoint(cfg.source_table).await?;
        let source_total = source::sqlite_count(&self.sqlite, cfg.source_table).await?;
        let rows = source::fetch_properties(&self.sqlite, watermark).await?;
        stats.read = rows.len();
        self.push_timing("read_properties", t);
        info!(read = stats.read, watermark, source_total, "source rows loaded");

        self.enter(PipelineStage::Classifying);
        let t = Instant::now();
        let mut prog = Progress::new("classify_properties", Some(rows.len()));
        let mut eligible = Vec::with_capacity(rows.len());
        for row in rows {
            match classify(
                row.message.as_deref(),
                row.property_name.as_deref(),
                row.property_type.as_deref(),
                cfg.min_message_len,
            ) {
                Classification::Valid => eligible.push(row),
                Classification::TooShort => stats.skipped_too_short += 1,
                Classification::TestData => stats.skipped_test_data += 1,
                Classification::Corrupted => stats.skipped_corrupted += 1,
            }
            prog.tick(1);
        }
        prog.finish();
        self.push_timing("classify_properties", t);

        self.enter(PipelineStage::Deduplicating);
        let t = Instant::now();
        let (survivors, outcome) = dedupe_by_message(eligible);
        stats.duplicates_dropped = outcome.duplicates_dropped;
        self.push_timing("dedupe_properties", t);
        info!(
            survivors = outcome.survivors,
            duplicates_dropped = outcome.duplicates_dropped,
            "deduplicated by message text"
        );

        self.enter(PipelineStage::Normalizing);
        let t = Instant::now();
        let location_index = load_location_index(&self.db).await?;
        let mut prepared = Vec::with_capacity(survivors.len());
        let mut prog = Progress::new("normalize_properties", Some(survivors.len()));
        for row in survivors {
            let insert = self.normalize_property(cfg, &location_index, row).await;
            prepared.push(insert);
            prog.tick(1);
        }
        prog.finish();
        self.push_timing("normalize_properties", t);

        self.enter(PipelineStage::Writing);
        let t = Instant::now();
        let mut prog = Progress::new("write_listings", Some(prepared.len()));
        for batch in prepared.chunks(cfg.batch_size) {
            match bulk_insert_listings(&self.db, batch).await {
                Ok(inserted) => {
                    stats.migrated += inserted as usize;
                    let conflicts = batch.len() - inserted as usize;
                    if conflicts > 0 {
                        debug!(conflicts, "rows already present; skipped");
                    }
                }
                Err(batch_err) => {
                    warn!(error = %batch_err, rows = batch.len(), "batch insert failed; retrying row-by-row");
                    for row in batch {
                        match insert_listing(&self.db, row).await {
                            Ok(n) if n > 0 => stats.migrated += 1,
                            Ok(_) => {}
                            Err(e) => {
                                stats.errored += 1;
                                let kind = if is_unique_violation(&e) {
                                    "unique_violation"
                                } else if is_fk_violation(&e) {
                                    "fk_violation"
                                } else {
                                    "insert_error"
                                };
                                warn!(
                                    source_property_id = row.source_property_id,
                                    kind,
                                    error = %e,
                                    "row insert failed; skipping"
                                );
                            }
                        }
                    }
                }
            }
            if let Some(last) = batch.last() {
                self.save_checkpoint(cfg.source_table, last.source_property_id)
                    .await?;
            }
            prog.tick(batch.len());
        }
        prog.finish();
        self.push_timing("write_listings", t);

        let summary = self
            .verify(cfg.source_table, source_total)
            .await?;
        self.log_completion(&stats, &summary);
        self.enter(PipelineStage::Done);
        Ok(stats)
    }

    async fn normalize_property(
        &mut self,
        cfg: &MigrationConfig,
        location_index: &[(String, i64)],
        row: RawProperty,
    ) -> ListingInsert {
        let source_id = row.id;
        let message = row.message.as_deref().unwrap_or("").trim().to_string();
        let name = row
            .property_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| message.chars().take(48).collect::<String>().trim().to_string());

        // category: bucket the free text, then resolve the canonical label;
        // an absent label stays unlinked rather than defaulting
        let bucket = cfg.keywords.bucket(row.property_type.as_deref());
        let category_id = if clean_natural_key(row.property_type.as_deref()).is_some() {
            self.resolve_or_null(
                LookupTable::Categories,
                Some(bucket.label_ar()),
                source_id,
                "category",
            )
            .await
        } else {
            None
        };

        let region_id = self
            .resolve_or_null(LookupTable::Regions, row.region.as_deref(), source_id, "region")
            .await;

        let kind_text = format!(
            "{} {}",
            row.offered_by.as_deref().unwrap_or(""),
            message
        );
        let kind = bucket_listing_kind(&kind_text);
        let listing_type_id = self
            .resolve_or_null(
                LookupTable::ListingTypes,
                Some(kind.label_ar()),
                source_id,
                "listing_type",
            )
            .await;

        let finish_type_id = self
            .resolve_or_null(
                LookupTable::FinishTypes,
                row.finish_type.as_deref(),
                source_id,
                "finish_type",
            )
            .await;
        let payment_type_id = self
            .resolve_or_null(
                LookupTable::PaymentTypes,
                row.payment_type.as_deref(),
                source_id,
                "payment_type",
            )
            .await;

        let agent_id = match self
            .cache
            .resolve_agent(
                &self.db,
                row.agent_name.as_deref(),
                row.phone.as_deref(),
                row.whatsapp.as_deref(),
            )
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(source_id, field = "agent", error = %e, "lookup resolution failed; storing null");
                None
            }
        };

        let location_id = match_location(location_index, &format!("{} {}", name, message));

        let phone = row
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| extract_phone(&message));

        ListingInsert {
            source_property_id: source_id,
            slug: listing_slug(&name, source_id),
            name,
            category_id,
            region_id,
            listing_type_id,
            finish_type_id,
            payment_type_id,
            agent_id,
            location_id,
            area_sqm: row.area.as_deref().and_then(extract_i32),
            bedrooms: row.bedrooms.as_deref().and_then(extract_i32),
            bathrooms: row.bathrooms.as_deref().and_then(extract_i32),
            floor: row.floor.as_deref().and_then(extract_i32),
            price: row.price.as_deref().and_then(extract_decimal),
            message,
            raw_category: row.property_type,
            raw_region: row.region,
            raw_price: row.price,
            phone,
            whatsapp: row.whatsapp.filter(|s| !s.trim().is_empty()),
            email: row.email.filter(|s| !s.trim().is_empty()),
        }
    }

    // ----- whatsapp_messages -> messages -----

    pub async fn run_messages(&mut self, cfg: &MigrationConfig) -> Result<MigrationStats> {
        let mut stats = MigrationStats::default();

        self.enter(PipelineStage::ReadingSource);
        let t = Instant::now();
        let watermark = self.get_checkpoint(cfg.source_table).await?;
        let source_total = source::sqlite_count(&self.sqlite, cfg.source_table).await?;
        let rows = source::fetch_messages(&self.sqlite, watermark).await?;
        stats.read = rows.len();
        self.push_timing("read_messages", t);
        info!(read = stats.read, watermark, source_total, "source rows loaded");

        self.enter(PipelineStage::Classifying);
        let t = Instant::now();
        let mut prog = Progress::new("classify_messages", Some(rows.len()));
        let mut eligible = Vec::with_capacity(rows.len());
        for row in rows {
            match classify(
                row.message.as_deref(),
                row.sender.as_deref(),
                row.property_type.as_deref(),
                cfg.min_message_len,
            ) {
                Classification::Valid => eligible.push(row),
                Classification::TooShort => stats.skipped_too_short += 1,
                Classification::TestData => stats.skipped_test_data += 1,
                Classification::Corrupted => stats.skipped_corrupted += 1,
            }
            prog.tick(1);
        }
        prog.finish();
        self.push_timing("classify_messages", t);

        self.enter(PipelineStage::Deduplicating);
        let t = Instant::now();
        let (survivors, outcome) = dedupe_by_message(eligible);
        stats.duplicates_dropped = outcome.duplicates_dropped;
        self.push_timing("dedupe_messages", t);

        self.enter(PipelineStage::Normalizing);
        let t = Instant::now();
        let mut prepared = Vec::with_capacity(survivors.len());
        let mut prog = Progress::new("normalize_messages", Some(survivors.len()));
        for row in survivors {
            let insert = self.normalize_message(row).await;
            prepared.push(insert);
            prog.tick(1);
        }
        prog.finish();
        self.push_timing("normalize_messages", t);

        self.enter(PipelineStage::Writing);
        let t = Instant::now();
        let mut prog = Progress::new("write_messages", Some(prepared.len()));
        for batch in prepared.chunks(cfg.batch_size) {
            match bulk_insert_messages(&self.db, batch).await {
                Ok(inserted) => {
                    stats.migrated += inserted as usize;
                }
                Err(batch_err) => {
                    warn!(error = %batch_err, rows = batch.len(), "batch insert failed; retrying row-by-row");
                    for row in batch {
                        match insert_message(&self.db, row).await {
                            Ok(n) if n > 0 => stats.migrated += 1,
                            Ok(_) => {}
                            Err(e) => {
                                stats.errored += 1;
                                warn!(
                                    source_message_id = row.source_message_id,
                                    error = %e,
                                    "row insert failed; skipping"
                                );
                            }
                        }
                    }
                }
            }
            if let Some(last) = batch.last() {
                self.save_checkpoint(cfg.source_table, last.source_message_id)
                    .await?;
            }
            prog.tick(batch.len());
        }
        prog.finish();
        self.push_timing("write_messages", t);

        let summary = self.verify(cfg.source_table, source_total).await?;
        self.log_completion(&stats, &summary);
        self.enter(PipelineStage::Done);
        Ok(stats)
    }

    async fn normalize_message(&mut self, row: RawChatMessage) -> MessageInsert {
        let source_id = row.id;
        let body = row.message.as_deref().unwrap_or("").trim().to_string();
        let sender = row
            .sender
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("unknown")
            .to_string();

        let location_id = match self
            .cache
            .resolve_location(&self.db, row.location.as_deref(), "area", None)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(source_id, field = "location", error = %e, "lookup resolution failed; storing null");
                None
            }
        };

        let phone = row
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| extract_phone(&body));

        MessageInsert {
            source_message_id: source_id,
            sender,
            body,
            sent_at_text: row.sent_at.filter(|s| !s.trim().is_empty()),
            property_type_hint: row.property_type.filter(|s| !s.trim().is_empty()),
            location_hint: row.location.filter(|s| !s.trim().is_empty()),
            location_id,
            price_hint: row.price.as_deref().and_then(extract_decimal),
            phone,
        }
    }

    // ----- message <-> listing relationships -----

    /// Link migrated chat messages to listings. Exact body equality means the
    /// listing was created from that message; a shared location with a price
    /// within 10% is only a similarity hint.
    pub async fn link_messages(&mut self) -> Result<u64> {
        let derived = sqlx::query(
            "INSERT INTO message_listing_links (message_id, listing_id, kind, confidence)
             SELECT m.id, l.id, $1, $2
             FROM messages m
             JOIN listings l ON l.message = m.body
             ON CONFLICT DO NOTHING",
        )
        .persistent(false)
        .bind(LinkKind::DerivedFrom.as_str())
        .bind(clamp_confidence(1.0))
        .execute(&self.db.pool)
        .await?;

        let similar = sqlx::query(
            "INSERT INTO message_listing_links (message_id, listing_id, kind, confidence)
             SELECT m.id, l.id, $1, $2
             FROM messages m
             JOIN listings l ON l.location_id = m.location_id
             WHERE m.location_id IS NOT NULL
               AND m.price_hint > 0 AND l.price > 0
               AND abs(l.price - m.price_hint) <= l.price * 0.10
               AND l.message <> m.body
             ON CONFLICT DO NOTHING",
        )
        .persistent(false)
        .bind(LinkKind::SimilarTo.as_str())
        .bind(clamp_confidence(0.5))
        .execute(&self.db.pool)
        .await?;

        let created = derived.rows_affected() + similar.rows_affected();
        info!(
            derived_from = derived.rows_affected(),
            similar_to = similar.rows_affected(),
            "message/listing links created"
        );
        Ok(created)
    }

    // ----- verification -----

    async fn verify(&mut self, source_table: &str, source_total: i64) -> Result<VerificationSummary> {
        self.enter(PipelineStage::Verifying);
        let t = Instant::now();
        let summary = verify_migration(
            &self.db,
            vec![TableCount {
                table: source_table.to_string(),
                rows: source_total,
            }],
        )
        .await?;
        self.push_timing("verify", t);
        Ok(summary)
    }

    fn log_completion(&self, stats: &MigrationStats, summary: &VerificationSummary) {
        info!(
            read = stats.read,
            skipped_too_short = stats.skipped_too_short,
            skipped_test_data = stats.skipped_test_data,
            skipped_corrupted = stats.skipped_corrupted,
            duplicates_dropped = stats.duplicates_dropped,
            migrated = stats.migrated,
            errored = stats.errored,
            success_pct = format!("{:.1}", stats.success_pct()),
            integrity_violations = summary.integrity_violations,
            "migration pass complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::classifier::MIN_MESSAGE_LEN;
    use crate::migration::source::RawProperty;

    fn raw(id: i64, message: &str) -> RawProperty {
        RawProperty {
            id,
            property_name: None,
            property_type: None,
            region: None,
            price: None,
            area: None,
            bedrooms: None,
            bathrooms: None,
            floor: None,
            finish_type: None,
            payment_type: None,
            offered_by: None,
            message: Some(message.to_string()),
            agent_name: None,
            phone: None,
            whatsapp: None,
            email: None,
            created_at: None,
        }
    }

    #[test]
    fn stage_labels_follow_pipeline_order() {
        assert_eq!(PipelineStage::NotStarted.as_str(), "not-started");
        assert_eq!(PipelineStage::ReadingSource.as_str(), "reading-source");
        assert_eq!(PipelineStage::Done.as_str(), "done");
    }

    #[test]
    fn success_pct_handles_empty_runs() {
        let stats = MigrationStats::default();
        assert_eq!(stats.success_pct(), 100.0);
        let stats = MigrationStats {
            migrated: 3,
            errored: 1,
            ..Default::default()
        };
        assert_eq!(stats.success_pct(), 75.0);
    }

    // classify + dedupe over three rows: A valid, B a verbatim repost of A,
    // C too short. Exactly one survivor, the lower-id copy of A/B.
    #[test]
    fn classify_then_dedupe_keeps_one_canonical_row() {
        let rows = vec![
            raw(1, "Nice flat 123456789X"),
            raw(2, "Nice flat 123456789X"),
            raw(3, "test"),
        ];
        let mut eligible = Vec::new();
        let mut skipped = 0usize;
        for row in rows {
            match classify(row.message.as_deref(), None, None, MIN_MESSAGE_LEN) {
                Classification::Valid => eligible.push(row),
                _ => skipped += 1,
            }
        }
        assert_eq!(skipped, 1);
        let (survivors, outcome) = dedupe_by_message(eligible);
        assert_eq!(survivors.len(), 1);
        assert_eq!(outcome.duplicates_dropped, 1);
        assert_eq!(survivors[0].id, 1);
    }
}
