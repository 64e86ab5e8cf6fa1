//! Exchange record and persisted pool document model

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn is_false(value: &bool) -> bool {
    !*value
}

/// Metadata identifying one pre-created exchange, referenced by its URL.
///
/// Records are created by an [`ExchangeCreator`](crate::ExchangeCreator) or by
/// a manual import, live in the persisted pool until consumed, and are never
/// mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRecord {
    /// Globally unique exchange id, embedded in the URL as `id=`.
    pub id: String,

    /// URL of the prepared exchange page.
    pub url: String,

    /// Tier amount this record belongs to.
    pub amount: u32,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// True for records added through the import path rather than the creator.
    #[serde(default, skip_serializing_if = "is_false")]
    pub manually_added: bool,
}

/// Extract the exchange id from a prepared URL (`...?id=<value>&...`).
pub fn parse_exchange_id(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("id=")?;
    let id = rest.split('&').next()?;
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// The full pool snapshot: one FIFO queue of records per tier.
///
/// Serializes to a single JSON object mapping the string-formatted tier
/// amount to an ordered array of records, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolState {
    queues: BTreeMap<u32, VecDeque<ExchangeRecord>>,
}

impl PoolState {
    /// Make sure the tier has an entry, possibly empty.
    pub fn ensure_tier(&mut self, amount: u32) {
        self.queues.entry(amount).or_default();
    }

    /// Current queue length for a tier (0 when absent).
    pub fn queue_len(&self, amount: u32) -> usize {
        self.queues.get(&amount).map_or(0, VecDeque::len)
    }

    /// Remove and return the oldest record of a tier.
    pub fn pop_oldest(&mut self, amount: u32) -> Option<ExchangeRecord> {
        self.queues.get_mut(&amount)?.pop_front()
    }

    /// Append a record to the back of its tier's queue.
    pub fn append(&mut self, record: ExchangeRecord) {
        self.queues.entry(record.amount).or_default().push_back(record);
    }

    /// Whether the tier already holds a record with this id or url.
    pub fn tier_contains(&self, amount: u32, id: &str, url: &str) -> bool {
        self.queues.get(&amount).is_some_and(|queue| {
            queue
                .iter()
                .any(|record| record.id == id || record.url == url)
        })
    }

    /// Iterate over the records of one tier, oldest first.
    pub fn records(&self, amount: u32) -> impl Iterator<Item = &ExchangeRecord> {
        self.queues.get(&amount).into_iter().flatten()
    }

    /// Total records across all tiers.
    pub fn total_records(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, amount: u32) -> ExchangeRecord {
        ExchangeRecord {
            id: id.to_string(),
            url: format!("https://exchange.test/exchange?id={id}"),
            amount,
            created_at: Utc::now(),
            manually_added: false,
        }
    }

    #[test]
    fn fifo_order() {
        let mut state = PoolState::default();
        state.append(record("a", 19));
        state.append(record("b", 19));
        state.append(record("c", 19));

        assert_eq!(state.pop_oldest(19).unwrap().id, "a");
        assert_eq!(state.pop_oldest(19).unwrap().id, "b");
        assert_eq!(state.queue_len(19), 1);
        assert!(state.pop_oldest(29).is_none());
    }

    #[test]
    fn duplicate_detection_is_per_tier() {
        let mut state = PoolState::default();
        state.append(record("abc", 19));

        assert!(state.tier_contains(19, "abc", "other-url"));
        assert!(state.tier_contains(
            19,
            "other-id",
            "https://exchange.test/exchange?id=abc"
        ));
        assert!(!state.tier_contains(29, "abc", "other-url"));
    }

    #[test]
    fn document_layout_uses_string_tier_keys() {
        let mut state = PoolState::default();
        state.ensure_tier(29);
        state.append(record("abc", 19));

        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("19").unwrap().is_array());
        assert_eq!(json.get("29").unwrap().as_array().unwrap().len(), 0);

        let entry = &json["19"][0];
        assert_eq!(entry["id"], "abc");
        assert!(entry.get("createdAt").is_some());
        // manuallyAdded is omitted unless set
        assert!(entry.get("manuallyAdded").is_none());
    }

    #[test]
    fn manually_added_round_trips() {
        let mut original = record("xyz", 29);
        original.manually_added = true;

        let json = serde_json::to_string(&original).unwrap();
        assert!(json.contains("\"manuallyAdded\":true"));

        let parsed: ExchangeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn exchange_id_parsing() {
        assert_eq!(
            parse_exchange_id("https://exchange.test/exchange?id=abc123&rate=floating"),
            Some("abc123".to_string())
        );
        assert_eq!(
            parse_exchange_id("https://exchange.test/exchange?rate=floating&id=xyz"),
            Some("xyz".to_string())
        );
        assert_eq!(parse_exchange_id("https://exchange.test/exchange"), None);
        assert_eq!(parse_exchange_id("https://exchange.test/exchange?id="), None);
    }
}
