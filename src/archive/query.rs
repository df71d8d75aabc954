//! Archive-tier lookups used by the C5 executor's archive-merge step
//! (spec §4.5 "Archive merge").

use nostr::Event;

use crate::archive::blobstore::BlobStore;
use crate::archive::{layout, manifest::Manifest};
use crate::error::Result;
use crate::query::filter::VendorFilter;

fn parse_event(bytes: &[u8]) -> Option<Event> {
    serde_json::from_slice(bytes).ok()
}

async fn fetch_by_id(blob_store: &dyn BlobStore, event_id: &str) -> Option<Event> {
    let path = layout::id_index_path(event_id);
    let bytes = blob_store.get(&path).await.ok()??;
    parse_event(&bytes)
}

fn passes_filter(event: &Event, filter: &VendorFilter) -> bool {
    if !filter.kinds.is_empty() && !filter.kinds.contains(&event.kind.as_u64()) {
        return false;
    }
    if !filter.authors.is_empty() && !filter.authors.contains(&event.pubkey.to_string()) {
        return false;
    }
    if let Some(since) = filter.since {
        if (event.created_at.as_u64() as i64) < since {
            return false;
        }
    }
    if let Some(until) = filter.until {
        if (event.created_at.as_u64() as i64) > until {
            return false;
        }
    }
    true
}

/// Resolves a filter against the archive tier: direct id lookups use the
/// per-id index objects; everything else scans the hour-keyed primary
/// objects named in the manifest and filters in memory.
pub async fn merge_from_archive(blob_store: &dyn BlobStore, filter: &VendorFilter) -> Result<Vec<Event>> {
    if !filter.ids.is_empty() {
        let mut out = Vec::new();
        for id in &filter.ids {
            if let Some(event) = fetch_by_id(blob_store, id).await {
                if passes_filter(&event, filter) {
                    out.push(event);
                }
            }
        }
        return Ok(out);
    }

    let manifest_bytes = match blob_store.get(layout::MANIFEST_PATH).await? {
        Some(bytes) => bytes,
        None => return Ok(Vec::new()),
    };
    let manifest = Manifest::parse(&manifest_bytes)?;

    let mut out = Vec::new();
    for hour in &manifest.hours_with_events {
        let path = layout::primary_path(hour);
        let bytes = match blob_store.get(&path).await? {
            Some(b) => b,
            None => continue,
        };
        for line in bytes.split(|b| *b == b'\n') {
            if line.is_empty() {
                continue;
            }
            if let Some(event) = parse_event(line) {
                if passes_filter(&event, filter) {
                    out.push(event);
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_filter_rejects_events_outside_the_time_window() {
        let keys = nostr::Keys::generate();
        let event = nostr::EventBuilder::new(nostr::Kind::TextNote, "hi", vec![])
            .to_event(&keys)
            .unwrap();
        let filter = VendorFilter {
            since: Some(event.created_at.as_u64() as i64 + 1_000_000),
            ..Default::default()
        };
        assert!(!passes_filter(&event, &filter));
    }
}
