//! Filter schema (spec §4.5, §6 "Filter schema"): standard Nostr fields plus
//! the vendor extensions (`int#`, `sort`, `cursor`, `verification`, `search`).

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{RelayError, Result};
use crate::video::VerificationLevel;

pub const MAX_TAG_VALUES_ARRAY: usize = 5; // spec §4.5 hard cap: at most 5 `#t` values
pub const MAX_INT_FILTERS: usize = 3;
pub const CHUNK_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    LoopCount,
    Likes,
    Views,
    Comments,
    AvgCompletion,
    CreatedAt,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::LoopCount => "loop_count",
            SortField::Likes => "likes",
            SortField::Views => "views",
            SortField::Comments => "comments",
            SortField::AvgCompletion => "avg_completion",
            SortField::CreatedAt => "created_at",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "loop_count" => Some(SortField::LoopCount),
            "likes" => Some(SortField::Likes),
            "views" => Some(SortField::Views),
            "comments" => Some(SortField::Comments),
            "avg_completion" => Some(SortField::AvgCompletion),
            "created_at" => Some(SortField::CreatedAt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn sql(&self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }

    /// Default when `sort.dir` is absent: DESC for every field (spec §9 open
    /// question, adopted as-is).
    fn parse_or_default(v: Option<&str>) -> Self {
        match v {
            Some("asc") => SortDir::Asc,
            _ => SortDir::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SortSpec {
    pub field: SortField,
    pub dir: SortDir,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntFilter {
    pub gte: Option<f64>,
    pub gt: Option<f64>,
    pub lte: Option<f64>,
    pub lt: Option<f64>,
    pub eq: Option<f64>,
    pub neq: Option<f64>,
}

impl IntFilter {
    fn from_json(v: &Value) -> Result<Self> {
        let obj = v
            .as_object()
            .ok_or_else(|| RelayError::InvalidFilter("int# filter must be an object".into()))?;
        let mut out = IntFilter::default();
        for (key, slot) in [
            ("gte", &mut out.gte),
            ("gt", &mut out.gt),
            ("lte", &mut out.lte),
            ("lt", &mut out.lt),
            ("eq", &mut out.eq),
            ("neq", &mut out.neq),
        ] {
            if let Some(raw) = obj.get(key) {
                let n = raw
                    .as_f64()
                    .filter(|n| n.is_finite())
                    .ok_or_else(|| RelayError::InvalidFilter(format!("int# {key} must be a finite number")))?;
                *slot = Some(n);
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Default)]
pub struct VendorFilter {
    pub ids: Vec<String>,
    pub authors: Vec<String>,
    pub kinds: Vec<u64>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub limit: Option<i64>,
    pub tags: HashMap<String, Vec<String>>,
    pub int_filters: HashMap<String, IntFilter>,
    pub sort: Option<SortSpec>,
    pub cursor: Option<String>,
    pub verification: Vec<VerificationLevel>,
    pub search: Option<String>,
    pub search_types: Vec<String>,
}

fn string_array(v: &Value, field: &str) -> Result<Vec<String>> {
    match v.get(field) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|i| {
                i.as_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| RelayError::InvalidFilter(format!("{field} must be an array of strings")))
            })
            .collect(),
        Some(_) => Err(RelayError::InvalidFilter(format!("{field} must be an array"))),
    }
}

impl VendorFilter {
    pub fn from_json(v: &Value) -> Result<Self> {
        let obj = v
            .as_object()
            .ok_or_else(|| RelayError::InvalidFilter("filter must be an object".into()))?;

        let ids = string_array(v, "ids")?;
        let authors = string_array(v, "authors")?;
        let kinds: Vec<u64> = match obj.get("kinds") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|i| i.as_u64().ok_or_else(|| RelayError::InvalidFilter("kinds must be integers".into())))
                .collect::<Result<_>>()?,
            Some(_) => return Err(RelayError::InvalidFilter("kinds must be an array".into())),
        };

        let since = obj.get("since").and_then(|v| v.as_i64());
        let until = obj.get("until").and_then(|v| v.as_i64());
        let limit = obj.get("limit").and_then(|v| v.as_i64());

        let mut tags = HashMap::new();
        let mut int_filters = HashMap::new();
        for (key, value) in obj {
            if let Some(name) = key.strip_prefix('#') {
                let values = value
                    .as_array()
                    .ok_or_else(|| RelayError::InvalidFilter(format!("#{name} must be an array")))?
                    .iter()
                    .map(|i| {
                        i.as_str()
                            .map(|s| s.to_string())
                            .ok_or_else(|| RelayError::InvalidFilter(format!("#{name} values must be strings")))
                    })
                    .collect::<Result<Vec<_>>>()?;
                tags.insert(name.to_string(), values);
            } else if let Some(metric) = key.strip_prefix("int#") {
                int_filters.insert(metric.to_string(), IntFilter::from_json(value)?);
            }
        }

        let sort = match obj.get("sort") {
            None => None,
            Some(s) => {
                let field_str = s
                    .get("field")
                    .and_then(|f| f.as_str())
                    .ok_or_else(|| RelayError::InvalidFilter("sort.field is required".into()))?;
                let field = SortField::parse(field_str)
                    .ok_or_else(|| RelayError::InvalidFilter(format!("unrecognized sort field {field_str}")))?;
                let dir = SortDir::parse_or_default(s.get("dir").and_then(|d| d.as_str()));
                Some(SortSpec { field, dir })
            }
        };

        let cursor = obj.get("cursor").and_then(|v| v.as_str()).map(|s| s.to_string());

        let verification = match obj.get("verification") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|i| {
                    let s = i.as_str().ok_or_else(|| RelayError::InvalidFilter("verification values must be strings".into()))?;
                    VerificationLevel::parse(s).ok_or_else(|| RelayError::InvalidFilter(format!("unrecognized verification level {s}")))
                })
                .collect::<Result<_>>()?,
            Some(_) => return Err(RelayError::InvalidFilter("verification must be an array".into())),
        };

        let search = obj.get("search").and_then(|v| v.as_str()).map(|s| s.to_string());
        let search_types = string_array(v, "search_types")?;

        Ok(VendorFilter {
            ids,
            authors,
            kinds,
            since,
            until,
            limit,
            tags,
            int_filters,
            sort,
            cursor,
            verification,
            search,
            search_types,
        })
    }

    /// Whether this filter targets the video projection per spec §4.5's
    /// route decision.
    pub fn uses_projection(&self) -> bool {
        if !self.kinds.contains(&crate::event::VIDEO_KIND) {
            return false;
        }
        !self.int_filters.is_empty()
            || self.sort.map(|s| s.field != SortField::CreatedAt).unwrap_or(false)
            || self.cursor.is_some()
            || !self.verification.is_empty()
            || (!self.authors.is_empty() && self.sort.is_some())
    }

    /// Matches a single freshly-accepted event against this filter (spec
    /// §4.9: "matcher applies the same semantics as C5 but against a single
    /// event"; sort and cursor don't participate in matching, search is a
    /// stored-query-only extension and is likewise skipped for live match).
    pub fn matches_event(&self, event: &nostr::Event, tags: &[Vec<String>]) -> bool {
        if !self.ids.is_empty() && !self.ids.contains(&event.id.to_string()) {
            return false;
        }
        if !self.authors.is_empty() && !self.authors.contains(&event.pubkey.to_string()) {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind.as_u64()) {
            return false;
        }
        let created_at = event.created_at.as_u64() as i64;
        if let Some(since) = self.since {
            if created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if created_at > until {
                return false;
            }
        }
        for (name, values) in &self.tags {
            let has_match = tags
                .iter()
                .any(|t| t.first().map(|n| n.as_str()) == Some(name.as_str()) && t.len() > 1 && values.contains(&t[1]));
            if !has_match {
                return false;
            }
        }

        let is_video = event.kind.as_u64() == crate::event::VIDEO_KIND;
        if !self.int_filters.is_empty() {
            if !is_video {
                return false;
            }
            for (metric, f) in &self.int_filters {
                let value = match crate::video::metric_value_from_tags(tags, metric) {
                    Some(v) => v,
                    None => return false,
                };
                if let Some(gte) = f.gte {
                    if !(value >= gte) {
                        return false;
                    }
                }
                if let Some(gt) = f.gt {
                    if !(value > gt) {
                        return false;
                    }
                }
                if let Some(lte) = f.lte {
                    if !(value <= lte) {
                        return false;
                    }
                }
                if let Some(lt) = f.lt {
                    if !(value < lt) {
                        return false;
                    }
                }
                if let Some(eq) = f.eq {
                    if value != eq {
                        return false;
                    }
                }
                if let Some(neq) = f.neq {
                    if value == neq {
                        return false;
                    }
                }
            }
        }

        if !self.verification.is_empty() {
            if !is_video {
                return false;
            }
            let level = crate::store::tags::first_tag_value(tags, "verification").and_then(VerificationLevel::parse);
            match level {
                Some(l) if self.verification.contains(&l) => {}
                _ => return false,
            }
        }

        true
    }

    /// Validates the hard caps from spec §4.5; returns the first violation.
    pub fn validate_caps(&self) -> Result<()> {
        let limit_max = if self.uses_projection() { 200 } else { 500 };
        if let Some(limit) = self.limit {
            if limit > limit_max {
                return Err(RelayError::InvalidFilter(format!("limit exceeds maximum of {limit_max}")));
            }
        }
        if self.int_filters.len() > MAX_INT_FILTERS {
            return Err(RelayError::InvalidFilter(format!(
                "at most {MAX_INT_FILTERS} int# predicates allowed"
            )));
        }
        if let Some(t_values) = self.tags.get("t") {
            if t_values.len() > MAX_TAG_VALUES_ARRAY {
                return Err(RelayError::InvalidFilter(format!("at most {MAX_TAG_VALUES_ARRAY} #t values allowed")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_standard_fields() {
        let v = json!({"ids": ["a"], "authors": ["b"], "kinds": [1], "since": 10, "until": 20, "limit": 5});
        let f = VendorFilter::from_json(&v).unwrap();
        assert_eq!(f.ids, vec!["a"]);
        assert_eq!(f.authors, vec!["b"]);
        assert_eq!(f.kinds, vec![1]);
        assert_eq!(f.since, Some(10));
        assert_eq!(f.until, Some(20));
        assert_eq!(f.limit, Some(5));
    }

    #[test]
    fn parses_tag_and_int_filters() {
        let v = json!({"#t": ["music", "dance"], "int#likes": {"gte": 10.0}});
        let f = VendorFilter::from_json(&v).unwrap();
        assert_eq!(f.tags.get("t").unwrap(), &vec!["music".to_string(), "dance".to_string()]);
        assert_eq!(f.int_filters.get("likes").unwrap().gte, Some(10.0));
    }

    #[test]
    fn sort_dir_defaults_to_desc() {
        let v = json!({"sort": {"field": "loop_count"}});
        let f = VendorFilter::from_json(&v).unwrap();
        assert_eq!(f.sort.unwrap().dir, SortDir::Desc);
    }

    #[test]
    fn projection_route_requires_video_kind() {
        let v = json!({"kinds": [1], "sort": {"field": "likes"}});
        let f = VendorFilter::from_json(&v).unwrap();
        assert!(!f.uses_projection());
    }

    #[test]
    fn projection_route_triggers_on_non_chronological_sort() {
        let v = json!({"kinds": [34236], "sort": {"field": "likes"}});
        let f = VendorFilter::from_json(&v).unwrap();
        assert!(f.uses_projection());
    }

    #[test]
    fn plain_chronological_video_query_does_not_use_projection() {
        let v = json!({"kinds": [34236]});
        let f = VendorFilter::from_json(&v).unwrap();
        assert!(!f.uses_projection());
    }

    #[test]
    fn caps_reject_too_many_int_filters() {
        let v = json!({
            "kinds": [34236],
            "int#likes": {"gte": 1.0}, "int#views": {"gte": 1.0},
            "int#comments": {"gte": 1.0}, "int#reposts": {"gte": 1.0}
        });
        let f = VendorFilter::from_json(&v).unwrap();
        assert!(f.validate_caps().is_err());
    }

    #[test]
    fn matches_event_checks_kind_and_tags() {
        let keys = nostr::Keys::generate();
        let event = nostr::EventBuilder::new(
            nostr::Kind::TextNote,
            "hi",
            vec![nostr::Tag::parse(vec!["t".to_string(), "music".to_string()]).unwrap()],
        )
        .to_event(&keys)
        .unwrap();
        let tags: Vec<Vec<String>> = event.tags.iter().map(|t| t.as_vec()).collect();

        let matching = VendorFilter::from_json(&json!({"kinds": [1], "#t": ["music"]})).unwrap();
        assert!(matching.matches_event(&event, &tags));

        let non_matching = VendorFilter::from_json(&json!({"kinds": [1], "#t": ["dance"]})).unwrap();
        assert!(!non_matching.matches_event(&event, &tags));
    }

    #[test]
    fn caps_reject_too_many_t_values() {
        let v = json!({"#t": ["a", "b", "c", "d", "e", "f"]});
        let f = VendorFilter::from_json(&v).unwrap();
        assert!(f.validate_caps().is_err());
    }
}
