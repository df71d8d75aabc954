//! C5 — query planning: complexity scoring, array chunking, and the
//! archive-merge decision (spec §4.5).

use crate::query::filter::{VendorFilter, CHUNK_SIZE};

/// `Σ|ids|·1 + |authors|·2 + |kinds|·5 + Σ|#tag|·10`, doubled if neither
/// `since` nor `until` is set, ×1.5 if `limit>1000` (spec §4.5).
pub fn complexity_score(filter: &VendorFilter) -> f64 {
    let tag_values: usize = filter.tags.values().map(|v| v.len()).sum();
    let mut score = filter.ids.len() as f64 * 1.0 + filter.authors.len() as f64 * 2.0 + filter.kinds.len() as f64 * 5.0 + tag_values as f64 * 10.0;

    if filter.since.is_none() && filter.until.is_none() {
        score *= 2.0;
    }
    if filter.limit.map(|l| l > 1000).unwrap_or(false) {
        score *= 1.5;
    }
    score
}

pub fn exceeds_complexity_cap(filter: &VendorFilter, cap: u64) -> bool {
    complexity_score(filter) > cap as f64
}

/// Splits an array into chunks of at most [`CHUNK_SIZE`], the unit each is
/// run as an independent query before results are unioned by id.
pub fn chunk<T: Clone>(values: &[T]) -> Vec<Vec<T>> {
    if values.is_empty() {
        return vec![Vec::new()];
    }
    values.chunks(CHUNK_SIZE).map(|c| c.to_vec()).collect()
}

/// Whether archive cutoff time has been reached by `since`/`until`, or the
/// filter does a direct id lookup — both route the query to the archive
/// tier in addition to the hot store (spec §4.5 "Archive merge").
pub fn needs_archive_merge(filter: &VendorFilter, archive_cutoff: i64) -> bool {
    if !filter.ids.is_empty() {
        return true;
    }
    let since_before_cutoff = filter.since.map(|s| s < archive_cutoff).unwrap_or(false);
    let until_before_cutoff = filter.until.map(|u| u < archive_cutoff).unwrap_or(false);
    since_before_cutoff || until_before_cutoff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::filter::VendorFilter;
    use serde_json::json;

    fn filter(v: serde_json::Value) -> VendorFilter {
        VendorFilter::from_json(&v).unwrap()
    }

    #[test]
    fn scores_each_term_with_its_weight() {
        let f = filter(json!({"ids": ["a"], "authors": ["b", "c"], "kinds": [1], "since": 1, "until": 2}));
        // 1*1 + 2*2 + 1*5 = 10, no doubling since since/until both present
        assert_eq!(complexity_score(&f), 10.0);
    }

    #[test]
    fn doubles_when_no_time_bound_is_set() {
        let f = filter(json!({"authors": ["a"]}));
        assert_eq!(complexity_score(&f), 4.0); // 2 * 2.0 (doubled)
    }

    #[test]
    fn multiplies_for_large_limit() {
        let f = filter(json!({"authors": ["a"], "since": 1, "until": 2, "limit": 5000}));
        assert_eq!(complexity_score(&f), 3.0); // 2 * 1.5
    }

    #[test]
    fn chunks_large_arrays_at_the_configured_size() {
        let values: Vec<u64> = (0..120).collect();
        let chunks = chunk(&values);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 50);
        assert_eq!(chunks[2].len(), 20);
    }

    #[test]
    fn empty_array_chunks_to_one_empty_chunk() {
        let values: Vec<u64> = vec![];
        assert_eq!(chunk(&values), vec![Vec::<u64>::new()]);
    }

    #[test]
    fn id_lookup_always_merges_archive() {
        let f = filter(json!({"ids": ["abc"]}));
        assert!(needs_archive_merge(&f, 1_000_000));
    }

    #[test]
    fn recent_time_window_skips_archive() {
        let f = filter(json!({"since": 2_000_000}));
        assert!(!needs_archive_merge(&f, 1_000_000));
    }
}
