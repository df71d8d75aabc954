//! C7 — archival worker (spec §4.7): moves events older than the retention
//! cutoff from the hot store to object storage in hourly-partitioned,
//! indexed JSONL files.

pub mod blobstore;
pub mod layout;
pub mod manifest;
pub mod query;

use sqlx::{PgPool, Row};

use crate::archive::blobstore::BlobStore;
use crate::archive::manifest::Manifest;
use crate::config::Config;
use crate::error::{RelayError, Result};

const DELETE_CHUNK: usize = 100;

pub fn retention_cutoff(retention_days: i64) -> i64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    now - retention_days * 86_400
}

struct ArchivableEvent {
    event_id: String,
    pubkey: String,
    created_at: i64,
    kind: i64,
    tags: Vec<Vec<String>>,
    json: serde_json::Value,
}

async fn fetch_batch(pool: &PgPool, cutoff: i64, batch_size: i64) -> Result<Vec<ArchivableEvent>> {
    let rows = sqlx::query(
        "SELECT event_id, pubkey, created_at, kind, tags, content, sig FROM events \
         WHERE created_at < $1 ORDER BY created_at ASC LIMIT $2",
    )
    .bind(cutoff)
    .bind(batch_size)
    .fetch_all(pool)
    .await
    .map_err(RelayError::Storage)?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let event_id: String = row.get("event_id");
        let pubkey: String = row.get("pubkey");
        let created_at: i64 = row.get("created_at");
        let kind: i64 = row.get("kind");
        let tags_json: serde_json::Value = row.get("tags");
        let content: String = row.get("content");
        let sig: String = row.get("sig");

        let tags: Vec<Vec<String>> = serde_json::from_value(tags_json.clone()).unwrap_or_default();
        let json = serde_json::json!({
            "id": event_id, "pubkey": pubkey, "created_at": created_at,
            "kind": kind, "tags": tags, "content": content, "sig": sig,
        });
        out.push(ArchivableEvent { event_id, pubkey, created_at, kind, tags, json });
    }
    Ok(out)
}

async fn write_event_objects(blob_store: &dyn BlobStore, event: &ArchivableEvent, hour: &str) -> Result<()> {
    let line = serde_json::to_vec(&event.json).expect("archived event always serializes");

    blob_store.append_jsonl(&layout::primary_path(hour), &line).await?;
    blob_store
        .append_jsonl(&layout::author_index_path(&event.pubkey, hour), &line)
        .await?;
    blob_store
        .append_jsonl(&layout::kind_index_path(event.kind as u64, hour), &line)
        .await?;
    for tag in &event.tags {
        if tag.len() > 1 {
            blob_store
                .append_jsonl(&layout::tag_index_path(&tag[0], &tag[1], hour), &line)
                .await?;
        }
    }
    blob_store.put(&layout::id_index_path(&event.event_id), &line).await?;
    Ok(())
}

async fn delete_from_hot_store(pool: &PgPool, event_ids: &[String]) -> Result<()> {
    for chunk in event_ids.chunks(DELETE_CHUNK) {
        let mut tx = pool.begin().await.map_err(RelayError::Storage)?;
        for id in chunk {
            crate::store::delete_event_row_tx(&mut tx, id).await?;
        }
        tx.commit().await.map_err(RelayError::Storage)?;
    }
    Ok(())
}

/// Runs one archival pass: repeatedly fetches batches of events older than
/// the retention cutoff until none remain, writing primary/index objects
/// and the manifest, then removing the archived rows from the hot store.
/// A batch's hot-store rows are only deleted after every blob write for
/// that batch has succeeded (spec §4.7: "Failure of any sub-write for a
/// batch leaves the hot store intact for that batch").
pub async fn run_once(pool: &PgPool, blob_store: &dyn BlobStore, config: &Config) -> Result<u64> {
    let cutoff = retention_cutoff(config.retention_days);
    let mut manifest = match blob_store.get(layout::MANIFEST_PATH).await? {
        Some(bytes) => Manifest::parse(&bytes)?,
        None => Manifest::default(),
    };

    let mut total_archived = 0u64;
    loop {
        let batch = fetch_batch(pool, cutoff, config.archive_batch_size).await?;
        if batch.is_empty() {
            break;
        }

        let mut archived_ids = Vec::with_capacity(batch.len());
        for event in &batch {
            let hour = layout::hour_key(event.created_at);
            write_event_objects(blob_store, event, &hour).await?;
            manifest.record_event(&hour, &event.pubkey, event.kind as u64, &event.tags, cutoff);
            archived_ids.push(event.event_id.clone());
        }

        delete_from_hot_store(pool, &archived_ids).await?;
        total_archived += archived_ids.len() as u64;
    }

    blob_store.put(layout::MANIFEST_PATH, &manifest.to_bytes()).await?;
    Ok(total_archived)
}

/// Spawns the scheduled archival loop (spec §4.7 "Runs on schedule").
/// Cancels cleanly between batches at shutdown (spec §5 "Cancellation").
pub fn spawn(pool: PgPool, blob_store: std::sync::Arc<dyn BlobStore>, config: Config) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.archive_interval);
        loop {
            interval.tick().await;
            match run_once(&pool, blob_store.as_ref(), &config).await {
                Ok(count) if count > 0 => tracing::info!(archived = count, "archival pass completed"),
                Ok(_) => tracing::debug!("archival pass found nothing to archive"),
                Err(e) => tracing::error!(error = %e, "archival pass failed; will retry next schedule"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_cutoff_is_in_the_past_for_positive_retention() {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        assert!(retention_cutoff(30) < now);
    }

    #[test]
    fn zero_retention_cutoff_is_effectively_now() {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        assert!((retention_cutoff(0) - now).abs() < 5);
    }
}
