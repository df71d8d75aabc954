//! Anti-spam content-hash dedup (spec §3 "Content-hash row", §4.2).

use sqlx::{Postgres, Transaction};

use crate::error::{RelayError, Result};
use crate::event::canonical;

pub async fn global_hash_exists(tx: &mut Transaction<'_, Postgres>, kind: u64, tags: &[Vec<String>], content: &str) -> Result<bool> {
    let hash = canonical::global_content_hash(kind, tags, content);
    let row = sqlx::query_as::<_, (i64,)>("SELECT 1 FROM content_hashes WHERE hash = $1 AND scope = 'global'")
        .bind(&hash)
        .fetch_optional(&mut **tx)
        .await
        .map_err(RelayError::Storage)?;
    Ok(row.is_some())
}

pub async fn per_pubkey_hash_exists(
    tx: &mut Transaction<'_, Postgres>,
    pubkey: &str,
    kind: u64,
    tags: &[Vec<String>],
    content: &str,
) -> Result<bool> {
    let hash = canonical::per_pubkey_content_hash(pubkey, kind, tags, content);
    let row = sqlx::query_as::<_, (i64,)>("SELECT 1 FROM content_hashes WHERE hash = $1 AND scope = 'per_pubkey'")
        .bind(&hash)
        .fetch_optional(&mut **tx)
        .await
        .map_err(RelayError::Storage)?;
    Ok(row.is_some())
}

pub async fn insert_hashes(
    tx: &mut Transaction<'_, Postgres>,
    event_id: &str,
    pubkey: &str,
    kind: u64,
    tags: &[Vec<String>],
    content: &str,
) -> Result<()> {
    let global = canonical::global_content_hash(kind, tags, content);
    let per_pubkey = canonical::per_pubkey_content_hash(pubkey, kind, tags, content);

    sqlx::query("INSERT INTO content_hashes (hash, scope, event_id) VALUES ($1, 'global', $2) ON CONFLICT DO NOTHING")
        .bind(&global)
        .bind(event_id)
        .execute(&mut **tx)
        .await
        .map_err(RelayError::Storage)?;

    sqlx::query("INSERT INTO content_hashes (hash, scope, event_id) VALUES ($1, 'per_pubkey', $2) ON CONFLICT DO NOTHING")
        .bind(&per_pubkey)
        .bind(event_id)
        .execute(&mut **tx)
        .await
        .map_err(RelayError::Storage)?;

    Ok(())
}
