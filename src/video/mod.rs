//! C3 — video projection (spec §4.3): a denormalized `videos` row and its
//! tag junction tables, maintained for every kind-34236 event.

use nostr::Event;
use sqlx::{Postgres, Transaction};

use crate::error::{RelayError, Result};
use crate::store::tags::first_tag_value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationLevel {
    VerifiedMobile,
    VerifiedWeb,
    BasicProof,
    Unverified,
}

impl VerificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationLevel::VerifiedMobile => "verified_mobile",
            VerificationLevel::VerifiedWeb => "verified_web",
            VerificationLevel::BasicProof => "basic_proof",
            VerificationLevel::Unverified => "unverified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "verified_mobile" => Some(VerificationLevel::VerifiedMobile),
            "verified_web" => Some(VerificationLevel::VerifiedWeb),
            "basic_proof" => Some(VerificationLevel::BasicProof),
            "unverified" => Some(VerificationLevel::Unverified),
            _ => None,
        }
    }
}

/// Parses a metric tag value to a non-negative integer, treating a missing
/// or unparseable tag as 0 (spec §4.3: "missing → 0").
pub fn metric_from_tag(tags: &[Vec<String>], name: &str) -> i64 {
    first_tag_value(tags, name)
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v >= 0)
        .unwrap_or(0)
}

fn clamp_avg_completion(raw: i64) -> i32 {
    raw.clamp(0, 100) as i32
}

/// Maps a vendor `int#<metric>` name (the DB-column spelling) to the raw
/// event tag it's sourced from; the boolean flags read as 1.0/0.0.
pub fn metric_value_from_tags(tags: &[Vec<String>], metric: &str) -> Option<f64> {
    match metric {
        "loop_count" => Some(metric_from_tag(tags, "loops") as f64),
        "likes" => Some(metric_from_tag(tags, "likes") as f64),
        "views" => Some(metric_from_tag(tags, "views") as f64),
        "comments" => Some(metric_from_tag(tags, "comments") as f64),
        "avg_completion" => Some(clamp_avg_completion(metric_from_tag(tags, "avg_completion")) as f64),
        "has_proofmode" => Some(if first_tag_value(tags, "proofmode").is_some() { 1.0 } else { 0.0 }),
        "has_device_attestation" => Some(if first_tag_value(tags, "device_attestation").is_some() { 1.0 } else { 0.0 }),
        "has_pgp_signature" => Some(if first_tag_value(tags, "pgp_fingerprint").is_some() { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Deduplicated values of a given tag name, preserving first-seen order.
fn dedup_tag_values(tags: &[Vec<String>], name: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        if tag.first().map(|n| n.as_str()) == Some(name) && tag.len() > 1 {
            let v = tag[1].clone();
            if seen.insert(v.clone()) {
                out.push(v);
            }
        }
    }
    out
}

async fn replace_junction(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    event_id: &str,
    values: &[String],
) -> Result<()> {
    let delete_sql = format!("DELETE FROM {table} WHERE event_id = $1");
    sqlx::query(&delete_sql)
        .bind(event_id)
        .execute(&mut **tx)
        .await
        .map_err(RelayError::Storage)?;

    if values.is_empty() {
        return Ok(());
    }

    let insert_sql = format!("INSERT INTO {table} (event_id, value) ");
    let mut qb = sqlx::QueryBuilder::new(insert_sql);
    qb.push_values(values, |mut b, value| {
        b.push_bind(event_id).push_bind(value);
    });
    qb.push(" ON CONFLICT DO NOTHING");
    qb.build().execute(&mut **tx).await.map_err(RelayError::Storage)?;
    Ok(())
}

/// Upserts the `videos` row and rebuilds its junction tables. Kind 34236 is
/// parameterized-replaceable, so junction rows are fully delete-then-insert
/// per event rather than merged (spec §4.3).
pub async fn upsert_video_projection(tx: &mut Transaction<'_, Postgres>, event: &Event, tags: &[Vec<String>]) -> Result<()> {
    let event_id = event.id.to_string();
    let author = event.pubkey.to_string();
    let created_at = event.created_at.as_u64() as i64;

    let loop_count = metric_from_tag(tags, "loops");
    let likes = metric_from_tag(tags, "likes");
    let comments = metric_from_tag(tags, "comments");
    let reposts = metric_from_tag(tags, "reposts");
    let views = metric_from_tag(tags, "views");
    let avg_completion = clamp_avg_completion(metric_from_tag(tags, "avg_completion"));

    let hashtag = first_tag_value(tags, "t").map(|s| s.to_string());

    let verification_level = first_tag_value(tags, "verification")
        .and_then(VerificationLevel::parse)
        .map(|v| v.as_str().to_string());
    let has_proofmode = first_tag_value(tags, "proofmode").is_some();
    let has_device_attestation = first_tag_value(tags, "device_attestation").is_some();
    let has_pgp_signature = first_tag_value(tags, "pgp_fingerprint").is_some();

    sqlx::query(
        "INSERT INTO videos (
            event_id, author, created_at, loop_count, likes, views, comments, reposts,
            avg_completion, hashtag, verification_level, has_proofmode, has_device_attestation, has_pgp_signature
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
        ON CONFLICT (event_id) DO UPDATE SET
            author = EXCLUDED.author, created_at = EXCLUDED.created_at,
            loop_count = EXCLUDED.loop_count, likes = EXCLUDED.likes, views = EXCLUDED.views,
            comments = EXCLUDED.comments, reposts = EXCLUDED.reposts, avg_completion = EXCLUDED.avg_completion,
            hashtag = EXCLUDED.hashtag, verification_level = EXCLUDED.verification_level,
            has_proofmode = EXCLUDED.has_proofmode, has_device_attestation = EXCLUDED.has_device_attestation,
            has_pgp_signature = EXCLUDED.has_pgp_signature",
    )
    .bind(&event_id)
    .bind(&author)
    .bind(created_at)
    .bind(loop_count)
    .bind(likes)
    .bind(views)
    .bind(comments)
    .bind(reposts)
    .bind(avg_completion)
    .bind(&hashtag)
    .bind(&verification_level)
    .bind(has_proofmode)
    .bind(has_device_attestation)
    .bind(has_pgp_signature)
    .execute(&mut **tx)
    .await
    .map_err(RelayError::Storage)?;

    replace_junction(tx, "video_hashtags", &event_id, &dedup_tag_values(tags, "t")).await?;
    replace_junction(tx, "video_mentions", &event_id, &dedup_tag_values(tags, "p")).await?;
    replace_junction(tx, "video_references", &event_id, &dedup_tag_values(tags, "e")).await?;
    replace_junction(tx, "video_addresses", &event_id, &dedup_tag_values(tags, "a")).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_missing_defaults_to_zero() {
        let tags: Vec<Vec<String>> = vec![];
        assert_eq!(metric_from_tag(&tags, "likes"), 0);
    }

    #[test]
    fn negative_metric_is_treated_as_absent() {
        let tags = vec![vec!["likes".to_string(), "-5".to_string()]];
        assert_eq!(metric_from_tag(&tags, "likes"), 0);
    }

    #[test]
    fn avg_completion_clamps_into_0_100() {
        assert_eq!(clamp_avg_completion(-10), 0);
        assert_eq!(clamp_avg_completion(50), 50);
        assert_eq!(clamp_avg_completion(250), 100);
    }

    #[test]
    fn dedup_preserves_first_seen_order() {
        let tags = vec![
            vec!["t".to_string(), "music".to_string()],
            vec!["t".to_string(), "dance".to_string()],
            vec!["t".to_string(), "music".to_string()],
        ];
        assert_eq!(dedup_tag_values(&tags, "t"), vec!["music".to_string(), "dance".to_string()]);
    }

    #[test]
    fn metric_value_from_tags_reads_boolean_flags() {
        let tags = vec![vec!["proofmode".to_string(), "true".to_string()]];
        assert_eq!(metric_value_from_tags(&tags, "has_proofmode"), Some(1.0));
        assert_eq!(metric_value_from_tags(&tags, "has_device_attestation"), Some(0.0));
    }

    #[test]
    fn verification_level_round_trips() {
        for s in ["verified_mobile", "verified_web", "basic_proof", "unverified"] {
            assert_eq!(VerificationLevel::parse(s).unwrap().as_str(), s);
        }
        assert!(VerificationLevel::parse("bogus").is_none());
    }
}
