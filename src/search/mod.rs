//! C4 — search index (spec §4.4): one full-text document per entity kind,
//! kept current via delete-then-insert keyed on `event_id`, plus hashtag
//! usage statistics for trending.

use nostr::Event;
use sqlx::{Postgres, Transaction};

use crate::error::{RelayError, Result};
use crate::event::VIDEO_KIND;
use crate::store::tags::first_tag_value;

/// Which FTS table an event kind's document belongs in, or `None` if the
/// kind isn't searchable (spec §4.4 lists entity kinds explicitly; anything
/// else — reactions, deletions, ephemeral kinds — carries no document).
fn fts_table_for_kind(kind: u64) -> Option<&'static str> {
    match kind {
        0 => Some("users_fts"),
        1 => Some("notes_fts"),
        k if k == VIDEO_KIND => Some("videos_fts"),
        30000 | 30001 => Some("lists_fts"),
        30023 => Some("articles_fts"),
        34550 => Some("communities_fts"),
        _ => None,
    }
}

/// Builds the plain-text blob fed to `to_tsvector`: the event content plus
/// any `t` (hashtag) and `title`/`name`/`summary`-style tag values, so a
/// search matches both body text and structured metadata.
fn document_text(event: &Event, tags: &[Vec<String>]) -> String {
    let mut parts = vec![event.content.clone()];
    for name in ["t", "title", "name", "summary", "alt", "d"] {
        for tag in tags {
            if tag.first().map(|n| n.as_str()) == Some(name) && tag.len() > 1 {
                parts.push(tag[1].clone());
            }
        }
    }
    parts.join(" ")
}

async fn upsert_fts_row(tx: &mut Transaction<'_, Postgres>, table: &str, event_id: &str, pubkey: &str, text: &str) -> Result<()> {
    let delete_sql = format!("DELETE FROM {table} WHERE event_id = $1");
    sqlx::query(&delete_sql).bind(event_id).execute(&mut **tx).await.map_err(RelayError::Storage)?;

    let insert_sql = format!("INSERT INTO {table} (event_id, pubkey, document) VALUES ($1, $2, to_tsvector('english', $3))");
    sqlx::query(&insert_sql)
        .bind(event_id)
        .bind(pubkey)
        .bind(text)
        .execute(&mut **tx)
        .await
        .map_err(RelayError::Storage)?;
    Ok(())
}

async fn bump_hashtag_stats(tx: &mut Transaction<'_, Postgres>, hashtag: &str, created_at: i64) -> Result<()> {
    sqlx::query(
        "INSERT INTO hashtag_stats (hashtag, total_usage, unique_events, first_seen, last_seen)
         VALUES ($1, 1, 1, $2, $2)
         ON CONFLICT (hashtag) DO UPDATE SET
            total_usage = hashtag_stats.total_usage + 1,
            unique_events = hashtag_stats.unique_events + 1,
            last_seen = GREATEST(hashtag_stats.last_seen, EXCLUDED.last_seen),
            first_seen = LEAST(hashtag_stats.first_seen, EXCLUDED.first_seen)",
    )
    .bind(hashtag)
    .bind(created_at)
    .execute(&mut **tx)
    .await
    .map_err(RelayError::Storage)?;
    Ok(())
}

/// Indexes a single event into its entity's FTS table and bumps hashtag
/// usage stats for any `t` tags it carries. Re-publication of a
/// parameterized-replaceable event (same `d` value, newer `created_at`)
/// calls this again for the new event_id; the old row was already removed
/// by the store layer before this runs, so hashtag counts are not
/// decremented for the superseded event — stats track cumulative usage, not
/// a live count (see design notes).
pub async fn index_event(tx: &mut Transaction<'_, Postgres>, event: &Event, tags: &[Vec<String>]) -> Result<()> {
    let kind = event.kind.as_u64();
    let event_id = event.id.to_string();
    let pubkey = event.pubkey.to_string();
    let created_at = event.created_at.as_u64() as i64;

    if let Some(table) = fts_table_for_kind(kind) {
        let text = document_text(event, tags);
        upsert_fts_row(tx, table, &event_id, &pubkey, &text).await?;
    }

    if kind == VIDEO_KIND || kind == 1 {
        for tag in tags {
            if tag.first().map(|n| n.as_str()) == Some("t") && tag.len() > 1 {
                bump_hashtag_stats(tx, &tag[1], created_at).await?;
            }
        }
    }

    if first_tag_value(tags, "t").is_some() {
        let hashtag_text = tags
            .iter()
            .filter(|t| t.first().map(|n| n.as_str()) == Some("t") && t.len() > 1)
            .map(|t| t[1].as_str())
            .collect::<Vec<_>>()
            .join(" ");
        upsert_fts_row(tx, "hashtags_fts", &event_id, &pubkey, &hashtag_text).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_kind_maps_to_videos_fts() {
        assert_eq!(fts_table_for_kind(VIDEO_KIND), Some("videos_fts"));
    }

    #[test]
    fn metadata_kind_maps_to_users_fts() {
        assert_eq!(fts_table_for_kind(0), Some("users_fts"));
    }

    #[test]
    fn reaction_kind_has_no_document() {
        assert_eq!(fts_table_for_kind(7), None);
    }

    #[test]
    fn document_text_includes_content_and_hashtags() {
        let keys = nostr::Keys::generate();
        let event = nostr::EventBuilder::new(nostr::Kind::from(VIDEO_KIND), "a clip", vec![])
            .to_event(&keys)
            .unwrap();
        let tags = vec![vec!["t".to_string(), "dance".to_string()]];
        let text = document_text(&event, &tags);
        assert!(text.contains("a clip"));
        assert!(text.contains("dance"));
    }
}
