//! Archive object path layout (spec §6 "Archive object layout").

use chrono::{TimeZone, Utc};

/// `YYYY-MM-DD/HH` for a Unix timestamp.
pub fn hour_key(created_at: i64) -> String {
    let dt = Utc.timestamp_opt(created_at, 0).single().unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap());
    dt.format("%Y-%m-%d/%H").to_string()
}

pub fn primary_path(hour: &str) -> String {
    format!("events/{hour}.jsonl")
}

pub fn author_index_path(pubkey: &str, hour: &str) -> String {
    format!("index/author/{pubkey}/{hour}.jsonl")
}

pub fn kind_index_path(kind: u64, hour: &str) -> String {
    format!("index/kind/{kind}/{hour}.jsonl")
}

pub fn tag_index_path(name: &str, value: &str, hour: &str) -> String {
    format!("index/tag/{name}/{value}/{hour}.jsonl")
}

pub fn id_index_path(event_id: &str) -> String {
    let prefix = &event_id[..event_id.len().min(2)];
    format!("index/id/{prefix}/{event_id}.json")
}

pub const MANIFEST_PATH: &str = "manifest.json";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hour_key_formats_as_spec_requires() {
        // 2024-01-15T13:00:00Z
        assert_eq!(hour_key(1_705_323_600), "2024-01-15/13");
    }

    #[test]
    fn id_index_path_uses_first_two_hex_chars() {
        assert_eq!(id_index_path("abcdef01"), "index/id/ab/abcdef01.json");
    }
}
