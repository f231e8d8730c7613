//! Canonical-copy selection. WhatsApp listings are re-posted verbatim by
//! multiple agents; identical message text is the duplicate signal, and the
//! row with the lowest source id is the keeper so re-runs pick the same one.
//! Two genuinely different listings sharing boilerplate text will merge — an
//! accepted false positive, not something to patch around here.

use std::collections::HashMap;

/// A raw row that can participate in message-text deduplication.
pub trait Dedupable {
    fn source_id(&self) -> i64;
    fn message_text(&self) -> &str;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DedupeOutcome {
    pub survivors: usize,
    pub duplicates_dropped: usize,
}

/// Exactly one row per distinct message body, lowest source id wins.
/// Survivors come back in ascending source-id order.
pub fn dedupe_by_message<T: Dedupable>(rows: Vec<T>) -> (Vec<T>, DedupeOutcome) {
    let total = rows.len();
    let mut keeper_by_body: HashMap<String, T> = HashMap::with_capacity(total);
    for row in rows {
        let body = row.message_text().to_string();
        match keeper_by_body.get(&body) {
            Some(existing) if existing.source_id() <= row.source_id() => {}
            _ => {
                keeper_by_body.insert(body, row);
            }
        }
    }
    let mut survivors: Vec<T> = keeper_by_body.into_values().collect();
    survivors.sort_by_key(|row| row.source_id());
    let outcome = DedupeOutcome {
        survivors: survivors.len(),
        duplicates_dropped: total - survivors.len(),
    };
    (survivors, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Row {
        id: i64,
        body: &'static str,
    }

    impl Dedupable for Row {
        fn source_id(&self) -> i64 {
            self.id
        }
        fn message_text(&self) -> &str {
            self.body
        }
    }

    #[test]
    fn keeps_lowest_id_per_message_body() {
        let rows = vec![
            Row { id: 9, body: "شقة للبيع في الرحاب ١٢٠ متر" },
            Row { id: 3, body: "شقة للبيع في الرحاب ١٢٠ متر" },
            Row { id: 5, body: "فيلا للبيع في زايد" },
        ];
        let (survivors, outcome) = dedupe_by_message(rows);
        assert_eq!(outcome.survivors, 2);
        assert_eq!(outcome.duplicates_dropped, 1);
        assert_eq!(survivors[0].id, 3);
        assert_eq!(survivors[1].id, 5);
    }

    #[test]
    fn is_deterministic_regardless_of_input_order() {
        let forward = vec![
            Row { id: 1, body: "a listing body" },
            Row { id: 2, body: "a listing body" },
        ];
        let backward = vec![
            Row { id: 2, body: "a listing body" },
            Row { id: 1, body: "a listing body" },
        ];
        let (a, _) = dedupe_by_message(forward);
        let (b, _) = dedupe_by_message(backward);
        assert_eq!(a, b);
        assert_eq!(a[0].id, 1);
    }

    #[test]
    fn distinct_bodies_all_survive() {
        let rows = vec![
            Row { id: 1, body: "first unique body" },
            Row { id: 2, body: "second unique body" },
        ];
        let (survivors, outcome) = dedupe_by_message(rows);
        assert_eq!(survivors.len(), 2);
        assert_eq!(outcome.duplicates_dropped, 0);
    }
}
