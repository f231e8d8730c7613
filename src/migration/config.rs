//! One parameterized pipeline instead of a per-attempt script copy: anything
//! that varied between the legacy one-off migration scripts lives here.

use crate::migration::classifier::MIN_MESSAGE_LEN;
use crate::migration::progress::progress_interval;
use crate::normalization::category::CategoryKeywords;
use crate::util::env::env_parse;

const DEFAULT_BATCH_SIZE: usize = 250;
const MIN_BATCH_SIZE: usize = 100;
const MAX_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub source_table: &'static str,
    pub target_table: &'static str,
    pub batch_size: usize,
    pub min_message_len: usize,
    pub keywords: CategoryKeywords,
    pub progress_interval: usize,
}

impl MigrationConfig {
    fn base(source_table: &'static str, target_table: &'static str) -> Self {
        let batch_size = env_parse("MIGRATE_BATCH_SIZE", DEFAULT_BATCH_SIZE)
            .clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE);
        Self {
            source_table,
            target_table,
            batch_size,
            min_message_len: MIN_MESSAGE_LEN,
            keywords: CategoryKeywords::default(),
            progress_interval: progress_interval(),
        }
    }

    /// Legacy flat `properties` table -> `listings`.
    pub fn properties() -> Self {
        Self::base("properties", "listings")
    }

    /// WhatsApp chat corpus -> `messages`.
    pub fn whatsapp_messages() -> Self {
        Self::base("whatsapp_messages", "messages")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_stays_in_legacy_bounds() {
        let cfg = MigrationConfig::properties();
        assert!(cfg.batch_size >= MIN_BATCH_SIZE && cfg.batch_size <= MAX_BATCH_SIZE);
        assert_eq!(cfg.source_table, "properties");
        assert_eq!(cfg.target_table, "listings");
    }

    #[test]
    fn message_config_targets_chat_tables() {
        let cfg = MigrationConfig::whatsapp_messages();
        assert_eq!(cfg.source_table, "whatsapp_messages");
        assert_eq!(cfg.target_table, "messages");
        assert_eq!(cfg.min_message_len, MIN_MESSAGE_LEN);
    }
}
