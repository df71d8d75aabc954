//! Tag-row extraction and the cached common-tag upsert (spec §3, §4.2, §5).
//!
//! Tag-row insertion for a single event is chunked to ≤50 rows per batch to
//! respect storage-layer batch limits (spec §5).

use sqlx::{PgPool, Postgres, Transaction};

use crate::error::{RelayError, Result};

pub const TAG_INSERT_CHUNK: usize = 50;

#[derive(Debug, Clone)]
pub struct TagRow {
    pub tag_name: String,
    pub value: String,
    pub position: i32,
}

/// Flattens a `tags` array into one row per `(tag_name, value_i)` for every
/// value position i≥1 (spec §3 "Tag row" — the tag name itself, index 0, is
/// never a row value).
pub fn flatten_tag_rows(tags: &[Vec<String>]) -> Vec<TagRow> {
    let mut rows = Vec::new();
    for tag in tags {
        if tag.is_empty() {
            continue;
        }
        let name = tag[0].clone();
        for (i, value) in tag.iter().enumerate().skip(1) {
            rows.push(TagRow {
                tag_name: name.clone(),
                value: value.clone(),
                position: i as i32,
            });
        }
    }
    rows
}

pub async fn insert_tag_rows(tx: &mut Transaction<'_, Postgres>, event_id: &str, rows: &[TagRow]) -> Result<()> {
    for chunk in rows.chunks(TAG_INSERT_CHUNK) {
        if chunk.is_empty() {
            continue;
        }
        let mut qb = sqlx::QueryBuilder::new("INSERT INTO tags (event_id, tag_name, value, position) ");
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(event_id)
                .push_bind(&row.tag_name)
                .push_bind(&row.value)
                .push_bind(row.position);
        });
        qb.build()
            .execute(&mut **tx)
            .await
            .map_err(RelayError::Storage)?;
    }
    Ok(())
}

/// First value (position 1) of the first occurrence of a named tag.
pub fn first_tag_value<'a>(tags: &'a [Vec<String>], name: &str) -> Option<&'a str> {
    tags.iter()
        .find(|t| t.first().map(|n| n.as_str()) == Some(name) && t.len() > 1)
        .map(|t| t[1].as_str())
}

pub async fn upsert_cached_tags(
    tx: &mut Transaction<'_, Postgres>,
    event_id: &str,
    pubkey: &str,
    kind: i64,
    created_at: i64,
    tags: &[Vec<String>],
) -> Result<()> {
    let p = first_tag_value(tags, "p");
    let e = first_tag_value(tags, "e");
    let a = first_tag_value(tags, "a");

    sqlx::query(
        "INSERT INTO cached_tags (event_id, pubkey, kind, created_at, p_value, e_value, a_value)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (event_id) DO UPDATE SET
            pubkey = EXCLUDED.pubkey, kind = EXCLUDED.kind, created_at = EXCLUDED.created_at,
            p_value = EXCLUDED.p_value, e_value = EXCLUDED.e_value, a_value = EXCLUDED.a_value",
    )
    .bind(event_id)
    .bind(pubkey)
    .bind(kind)
    .bind(created_at)
    .bind(p)
    .bind(e)
    .bind(a)
    .execute(&mut **tx)
    .await
    .map_err(RelayError::Storage)?;
    Ok(())
}

pub async fn delete_tags_for_event(pool: &PgPool, event_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM tags WHERE event_id = $1")
        .bind(event_id)
        .execute(pool)
        .await
        .map_err(RelayError::Storage)?;
    sqlx::query("DELETE FROM cached_tags WHERE event_id = $1")
        .bind(event_id)
        .execute(pool)
        .await
        .map_err(RelayError::Storage)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_multi_valued_tags_preserving_every_value() {
        let tags = vec![
            vec!["e".to_string(), "abc".to_string()],
            vec!["imeta".to_string(), "url https://x".to_string(), "m video/mp4".to_string()],
            vec!["t".to_string()], // name only, no values: produces no rows
        ];
        let rows = flatten_tag_rows(&tags);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].tag_name, "e");
        assert_eq!(rows[0].value, "abc");
        assert_eq!(rows[0].position, 1);
        assert_eq!(rows[1].tag_name, "imeta");
        assert_eq!(rows[1].position, 1);
        assert_eq!(rows[2].tag_name, "imeta");
        assert_eq!(rows[2].position, 2);
    }

    #[test]
    fn first_tag_value_finds_first_occurrence_only() {
        let tags = vec![
            vec!["p".to_string(), "first".to_string()],
            vec!["p".to_string(), "second".to_string()],
        ];
        assert_eq!(first_tag_value(&tags, "p"), Some("first"));
        assert_eq!(first_tag_value(&tags, "e"), None);
    }

    #[test]
    fn chunk_boundary_matches_spec_limit() {
        assert_eq!(TAG_INSERT_CHUNK, 50);
    }
}
