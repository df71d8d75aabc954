//! C2 — event store (spec §4.2): idempotent insert, replaceable-event
//! replacement, deletion, content-hash anti-spam.

pub mod content_hash;
pub mod tags;

use nostr::Event;
use sqlx::{PgPool, Row};

use crate::error::{RelayError, Result};
use crate::event::classify::ReplaceableClass;
use crate::event::{classify_kind, is_anti_spam_kind, VIDEO_KIND};
use crate::search;
use crate::video;

#[derive(Clone)]
pub struct EventStore {
    pool: PgPool,
}

fn event_tags(event: &Event) -> Vec<Vec<String>> {
    event.tags.iter().map(|t| t.as_vec()).collect()
}

pub(crate) async fn delete_event_row_tx(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, event_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM tags WHERE event_id = $1")
        .bind(event_id)
        .execute(&mut **tx)
        .await
        .map_err(RelayError::Storage)?;
    sqlx::query("DELETE FROM cached_tags WHERE event_id = $1")
        .bind(event_id)
        .execute(&mut **tx)
        .await
        .map_err(RelayError::Storage)?;
    sqlx::query("DELETE FROM content_hashes WHERE event_id = $1")
        .bind(event_id)
        .execute(&mut **tx)
        .await
        .map_err(RelayError::Storage)?;
    sqlx::query("DELETE FROM events WHERE event_id = $1")
        .bind(event_id)
        .execute(&mut **tx)
        .await
        .map_err(RelayError::Storage)?;
    Ok(())
}

impl EventStore {
    pub fn new(pool: PgPool) -> Self {
        EventStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn event_exists(&self, event_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM events WHERE event_id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RelayError::Storage)?;
        Ok(row.is_some())
    }

    /// Finds the pubkey's newest existing event of `kind`, optionally scoped
    /// to a `d`-tag value (parameterized-replaceable).
    async fn newest_replaceable(&self, pubkey: &str, kind: i64, d_value: Option<&str>) -> Result<Option<(String, i64)>> {
        let row = if let Some(d) = d_value {
            sqlx::query(
                "SELECT e.event_id, e.created_at FROM events e
                 JOIN tags t ON t.event_id = e.event_id AND t.tag_name = 'd' AND t.value = $3
                 WHERE e.pubkey = $1 AND e.kind = $2
                 ORDER BY e.created_at DESC LIMIT 1",
            )
            .bind(pubkey)
            .bind(kind)
            .bind(d)
            .fetch_optional(&self.pool)
            .await
        } else {
            sqlx::query(
                "SELECT event_id, created_at FROM events
                 WHERE pubkey = $1 AND kind = $2
                 ORDER BY created_at DESC LIMIT 1",
            )
            .bind(pubkey)
            .bind(kind)
            .fetch_optional(&self.pool)
            .await
        }
        .map_err(RelayError::Storage)?;

        Ok(row.map(|r| (r.get::<String, _>("event_id"), r.get::<i64, _>("created_at"))))
    }

    async fn delete_event_row(&self, event_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(RelayError::Storage)?;
        delete_event_row_tx(&mut tx, event_id).await?;
        tx.commit().await.map_err(RelayError::Storage)?;
        Ok(())
    }

    /// Accepts a non-deletion event: runs the replaceable-event check, then
    /// inserts the event row, tag rows, cached-tag row, content hash (if
    /// applicable), and — for kind 34236 — the video projection and search
    /// index, all inside one transaction (spec §4.2 "edge cases").
    pub async fn accept_event(&self, event: &Event) -> Result<()> {
        let event_id = event.id.to_string();
        let pubkey = event.pubkey.to_string();
        let kind = event.kind.as_u64();
        let created_at = event.created_at.as_u64() as i64;
        let tags = event_tags(event);

        if self.event_exists(&event_id).await? {
            return Err(RelayError::DuplicateId);
        }

        // Resolve which (if any) existing replaceable event this supersedes
        // before opening the write transaction — this is a pure read and
        // keeps the replace-then-insert below atomic in a single tx.
        let superseded: Option<String> = match classify_kind(kind) {
            ReplaceableClass::RegularReplaceable => {
                match self.newest_replaceable(&pubkey, kind as i64, None).await? {
                    Some((_, old_created_at)) if old_created_at > created_at => {
                        return Err(RelayError::DuplicateNewerExists)
                    }
                    Some((old_id, _)) => Some(old_id),
                    None => None,
                }
            }
            ReplaceableClass::ParameterizedReplaceable => {
                let d_value = tags::first_tag_value(&tags, "d").unwrap_or("");
                match self.newest_replaceable(&pubkey, kind as i64, Some(d_value)).await? {
                    Some((_, old_created_at)) if old_created_at > created_at => {
                        return Err(RelayError::DuplicateNewerExists)
                    }
                    Some((old_id, _)) => Some(old_id),
                    None => None,
                }
            }
            ReplaceableClass::Regular | ReplaceableClass::Deletion => None,
        };

        let mut tx = self.pool.begin().await.map_err(RelayError::Storage)?;

        if is_anti_spam_kind(kind) {
            if content_hash::global_hash_exists(&mut tx, kind, &tags, &event.content).await?
                || content_hash::per_pubkey_hash_exists(&mut tx, &pubkey, kind, &tags, &event.content).await?
            {
                return Err(RelayError::DuplicateContent);
            }
        }

        if let Some(old_id) = superseded {
            delete_event_row_tx(&mut tx, &old_id).await?;
        }

        let tags_json = serde_json::to_value(&tags).unwrap_or(serde_json::Value::Null);
        sqlx::query(
            "INSERT INTO events (event_id, pubkey, created_at, kind, tags, content, sig)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(&event_id)
        .bind(&pubkey)
        .bind(created_at)
        .bind(kind as i64)
        .bind(&tags_json)
        .bind(&event.content)
        .bind(event.sig.to_string())
        .execute(&mut *tx)
        .await
        .map_err(RelayError::Storage)?;

        let rows = tags::flatten_tag_rows(&tags);
        tags::insert_tag_rows(&mut tx, &event_id, &rows).await?;
        tags::upsert_cached_tags(&mut tx, &event_id, &pubkey, kind as i64, created_at, &tags).await?;

        if is_anti_spam_kind(kind) {
            content_hash::insert_hashes(&mut tx, &event_id, &pubkey, kind, &tags, &event.content).await?;
        }

        if kind == VIDEO_KIND {
            video::upsert_video_projection(&mut tx, event, &tags).await?;
            search::index_event(&mut tx, event, &tags).await?;
        } else {
            search::index_event(&mut tx, event, &tags).await?;
        }

        tx.commit().await.map_err(RelayError::Storage)?;
        Ok(())
    }

    /// Handles a kind-5 deletion event (spec §4.2 "Deletion path").
    ///
    /// For every `e`-tagged target whose stored pubkey doesn't match the
    /// deletion event's author, the target is left untouched; everything
    /// else about the deletion proceeds (authorized targets are removed and
    /// the deletion event itself is persisted), but the overall result
    /// reports the first unauthorized target so the caller can surface
    /// `OK false "unauthorized: ..."` (spec §8 scenario 4).
    pub async fn accept_deletion(&self, event: &Event) -> Result<()> {
        let event_id = event.id.to_string();
        let pubkey = event.pubkey.to_string();
        let tags = event_tags(event);

        if self.event_exists(&event_id).await? {
            return Err(RelayError::DuplicateId);
        }

        let target_ids: Vec<String> = tags
            .iter()
            .filter(|t| t.first().map(|n| n.as_str()) == Some("e") && t.len() > 1)
            .map(|t| t[1].clone())
            .collect();

        let mut first_unauthorized: Option<String> = None;
        for target_id in &target_ids {
            let row = sqlx::query("SELECT pubkey FROM events WHERE event_id = $1")
                .bind(target_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(RelayError::Storage)?;

            match row {
                Some(r) => {
                    let target_pubkey: String = r.get("pubkey");
                    if target_pubkey == pubkey {
                        self.delete_event_row(target_id).await?;
                    } else if first_unauthorized.is_none() {
                        first_unauthorized = Some(target_id.clone());
                    }
                }
                None => {
                    // Nothing to delete; not an authorization failure.
                }
            }
        }

        // Persist the deletion event itself like any regular event.
        let created_at = event.created_at.as_u64() as i64;
        let kind = event.kind.as_u64();
        let tags_json = serde_json::to_value(&tags).unwrap_or(serde_json::Value::Null);
        let mut tx = self.pool.begin().await.map_err(RelayError::Storage)?;
        sqlx::query(
            "INSERT INTO events (event_id, pubkey, created_at, kind, tags, content, sig)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(&event_id)
        .bind(&pubkey)
        .bind(created_at)
        .bind(kind as i64)
        .bind(&tags_json)
        .bind(&event.content)
        .bind(event.sig.to_string())
        .execute(&mut *tx)
        .await
        .map_err(RelayError::Storage)?;
        let rows = tags::flatten_tag_rows(&tags);
        tags::insert_tag_rows(&mut tx, &event_id, &rows).await?;
        tags::upsert_cached_tags(&mut tx, &event_id, &pubkey, kind as i64, created_at, &tags).await?;
        tx.commit().await.map_err(RelayError::Storage)?;

        if let Some(target_id) = first_unauthorized {
            return Err(RelayError::UnauthorizedDelete(target_id));
        }
        Ok(())
    }
}
