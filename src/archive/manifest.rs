//! Archive manifest (spec §3 "Archive manifest", §9 design note: "prefer a
//! sorted container that serializes as an array rather than a native hash
//! set to make on-disk form deterministic and diff-friendly").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Inserts `value` into `sorted`, keeping it deduplicated and ascending.
fn sorted_insert(sorted: &mut Vec<String>, value: &str) {
    if let Err(pos) = sorted.binary_search_by(|v| v.as_str().cmp(value)) {
        sorted.insert(pos, value.to_string());
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Indices {
    pub authors: Vec<String>,
    pub kinds: Vec<u64>,
    pub tags: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub hours_with_events: Vec<String>,
    pub first_hour: Option<String>,
    pub last_hour: Option<String>,
    pub total_events: u64,
    pub last_updated: i64,
    pub indices: Indices,
}

impl Manifest {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| RelayError::InvalidFilter(format!("corrupt archive manifest: {e}")))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec_pretty(self).expect("manifest always serializes")
    }

    pub fn record_hour(&mut self, hour: &str) {
        sorted_insert(&mut self.hours_with_events, hour);
        if self.first_hour.as_deref().map(|h| hour < h).unwrap_or(true) {
            self.first_hour = Some(hour.to_string());
        }
        if self.last_hour.as_deref().map(|h| hour > h).unwrap_or(true) {
            self.last_hour = Some(hour.to_string());
        }
    }

    pub fn record_author(&mut self, author: &str) {
        sorted_insert(&mut self.indices.authors, author);
    }

    pub fn record_kind(&mut self, kind: u64) {
        if let Err(pos) = self.indices.kinds.binary_search(&kind) {
            self.indices.kinds.insert(pos, kind);
        }
    }

    pub fn record_tag(&mut self, name: &str, value: &str) {
        let values = self.indices.tags.entry(name.to_string()).or_default();
        sorted_insert(values, value);
    }

    pub fn record_event(&mut self, hour: &str, author: &str, kind: u64, tags: &[Vec<String>], now: i64) {
        self.record_hour(hour);
        self.record_author(author);
        self.record_kind(kind);
        for tag in tags {
            if tag.len() > 1 {
                self.record_tag(&tag[0], &tag[1]);
            }
        }
        self.total_events += 1;
        self.last_updated = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_hour_keeps_sorted_and_deduplicated() {
        let mut m = Manifest::default();
        m.record_hour("2026-01-02/05");
        m.record_hour("2026-01-01/10");
        m.record_hour("2026-01-02/05");
        assert_eq!(m.hours_with_events, vec!["2026-01-01/10", "2026-01-02/05"]);
        assert_eq!(m.first_hour.as_deref(), Some("2026-01-01/10"));
        assert_eq!(m.last_hour.as_deref(), Some("2026-01-02/05"));
    }

    #[test]
    fn serializes_sets_as_arrays() {
        let mut m = Manifest::default();
        m.record_author("pubkey1");
        let bytes = m.to_bytes();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains('['));
        assert!(!text.contains("HashSet"));
    }

    #[test]
    fn round_trips_through_json() {
        let mut m = Manifest::default();
        m.record_event("2026-01-01/00", "author1", 34236, &[vec!["t".to_string(), "music".to_string()]], 1_700_000_000);
        let bytes = m.to_bytes();
        let parsed = Manifest::parse(&bytes).unwrap();
        assert_eq!(parsed.total_events, 1);
        assert_eq!(parsed.indices.tags.get("t").unwrap(), &vec!["music".to_string()]);
    }
}
