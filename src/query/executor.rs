//! C5 executor: runs a [`VendorFilter`] against the hot store (and, when
//! routed, the archive tier), returning events in the sort order §4.5
//! establishes plus an optional continuation cursor.

use std::collections::HashMap;

use nostr::Event;
use serde_json::Value;
use sqlx::{PgPool, Row};

use crate::archive::blobstore::BlobStore;
use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::query::cursor;
use crate::query::filter::VendorFilter;
use crate::query::planner;
use crate::query::sql::{self, KeysetPosition};

pub struct ExecutionResult {
    pub events: Vec<Event>,
    pub cursor: Option<String>,
}

fn row_to_event(row: &sqlx::postgres::PgRow) -> Result<Event> {
    let pubkey: String = row.try_get("pubkey").map_err(RelayError::Storage)?;
    let created_at: i64 = row.try_get("created_at").map_err(RelayError::Storage)?;
    let kind: i64 = row.try_get("kind").map_err(RelayError::Storage)?;
    let tags_json: Value = row.try_get("tags").map_err(RelayError::Storage)?;
    let content: String = row.try_get("content").map_err(RelayError::Storage)?;
    let sig: String = row.try_get("sig").map_err(RelayError::Storage)?;
    let event_id: String = row.try_get("event_id").map_err(RelayError::Storage)?;

    let tags: Vec<Vec<String>> = serde_json::from_value(tags_json).unwrap_or_default();
    let nostr_tags: Vec<nostr::Tag> = tags
        .into_iter()
        .filter_map(|t| nostr::Tag::parse(t).ok())
        .collect();

    let json = serde_json::json!({
        "id": event_id,
        "pubkey": pubkey,
        "created_at": created_at,
        "kind": kind,
        "tags": nostr_tags,
        "content": content,
        "sig": sig,
    });
    serde_json::from_value::<Event>(json).map_err(|e| RelayError::InvalidFilter(format!("corrupt stored event: {e}")))
}

/// Runs the fast path against the `videos` projection, decoding any
/// supplied cursor first and re-encoding a continuation cursor when more
/// rows remain than the page limit.
async fn run_projection(
    pool: &PgPool,
    config: &Config,
    filter: &VendorFilter,
    filter_json: &Value,
) -> Result<ExecutionResult> {
    let sort = filter.sort.unwrap_or(crate::query::filter::SortSpec {
        field: crate::query::filter::SortField::CreatedAt,
        dir: crate::query::filter::SortDir::Desc,
    });
    let sort_json = serde_json::json!({ "field": sort.field.column(), "dir": sort.dir.sql().to_lowercase() });

    let keyset = match &filter.cursor {
        Some(c) => {
            let payload = cursor::decode(c, &config.cursor_secret, config.cursor_secret_previous.as_deref(), filter_json, &sort_json)?;
            Some(KeysetPosition {
                field_value: payload.sort_field_value,
                created_at: payload.created_at,
                event_id: payload.event_id,
            })
        }
        None => None,
    };

    let mut qb = sql::build_projection_query(filter, keyset.as_ref(), config.projection_limit_max);
    let rows = qb.build().fetch_all(pool).await.map_err(RelayError::Storage)?;

    let requested_limit = filter.limit.unwrap_or(config.projection_limit_max).min(config.projection_limit_max) as usize;
    let has_more = rows.len() > requested_limit;
    let page = &rows[..rows.len().min(requested_limit)];

    let mut events = Vec::with_capacity(page.len());
    let mut last_field_value = 0.0_f64;
    let mut last_created_at = 0_i64;
    let mut last_event_id = String::new();

    for row in page {
        let created_at: i64 = row.try_get("created_at").map_err(RelayError::Storage)?;
        let field_value: f64 = match sort.field.column() {
            "loop_count" => row.try_get::<i64, _>("loop_count").map_err(RelayError::Storage)? as f64,
            "likes" => row.try_get::<i64, _>("likes").map_err(RelayError::Storage)? as f64,
            "views" => row.try_get::<i64, _>("views").map_err(RelayError::Storage)? as f64,
            "comments" => row.try_get::<i64, _>("comments").map_err(RelayError::Storage)? as f64,
            "avg_completion" => row.try_get::<i32, _>("avg_completion").map_err(RelayError::Storage)? as f64,
            _ => created_at as f64,
        };

        // The joined row carries the real `tags`/`content`/`sig` from
        // `events`, not just the projection's derived metric columns, so
        // this hydrates a genuine, signature-verifiable event.
        let event = row_to_event(row)?;

        last_field_value = field_value;
        last_created_at = created_at;
        last_event_id = event.id.to_string();
        events.push(event);
    }

    let cursor_out = if has_more && !page.is_empty() {
        Some(cursor::encode(
            &config.cursor_secret,
            sort.field.column(),
            &sort.dir.sql().to_lowercase(),
            last_field_value,
            last_created_at,
            &last_event_id,
            filter_json,
            &sort_json,
        ))
    } else {
        None
    };

    Ok(ExecutionResult { events, cursor: cursor_out })
}

/// Runs the generic event-store path: chunks overlarge `ids`/`authors`/
/// `kinds` arrays, runs each chunk, and unions the results by id.
async fn run_generic(pool: &PgPool, filter: &VendorFilter) -> Result<ExecutionResult> {
    let id_chunks = planner::chunk(&filter.ids);
    let author_chunks = planner::chunk(&filter.authors);
    let kind_chunks = planner::chunk(&filter.kinds);

    let mut seen: HashMap<String, Event> = HashMap::new();
    for ids in &id_chunks {
        for authors in &author_chunks {
            for kinds in &kind_chunks {
                let mut qb = sql::build_generic_query(filter, ids, authors, kinds);
                let rows = qb.build().fetch_all(pool).await.map_err(RelayError::Storage)?;
                for row in &rows {
                    if let Ok(event) = row_to_event(row) {
                        seen.insert(event.id.to_string(), event);
                    }
                }
            }
        }
    }

    let mut events: Vec<Event> = seen.into_values().collect();
    events.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    if let Some(limit) = filter.limit {
        events.truncate(limit.max(0) as usize);
    }

    Ok(ExecutionResult { events, cursor: None })
}

/// Top-level entry point: validates caps, routes to the projection or
/// generic path, merges archive results when the filter calls for it.
pub async fn execute(
    pool: &PgPool,
    blob_store: &dyn BlobStore,
    config: &Config,
    filter: &VendorFilter,
    filter_json: &Value,
) -> Result<ExecutionResult> {
    filter.validate_caps()?;
    if planner::exceeds_complexity_cap(filter, config.query_complexity_cap) {
        return Err(RelayError::InvalidFilter("query exceeds complexity cap".into()));
    }

    let mut result = if filter.uses_projection() {
        run_projection(pool, config, filter, filter_json).await?
    } else {
        run_generic(pool, filter).await?
    };

    let archive_cutoff = crate::archive::retention_cutoff(config.retention_days);
    if planner::needs_archive_merge(filter, archive_cutoff) {
        let archived = crate::archive::query::merge_from_archive(blob_store, filter).await.unwrap_or_default();
        let mut merged: HashMap<String, Event> = result.events.into_iter().map(|e| (e.id.to_string(), e)).collect();
        for event in archived {
            merged.entry(event.id.to_string()).or_insert(event);
        }
        let mut events: Vec<Event> = merged.into_values().collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = filter.limit {
            events.truncate(limit.max(0) as usize);
        }
        result.events = events;
    }

    Ok(result)
}
