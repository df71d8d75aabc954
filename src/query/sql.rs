//! SQL composition for the hot store (spec §4.5): the video-projection
//! fast path and the generic event/tag path, both built with
//! `sqlx::QueryBuilder` the way the teacher composes its own ad hoc queries.

use sqlx::{Postgres, QueryBuilder};

use crate::query::filter::{SortDir, VendorFilter};

#[derive(Debug, Clone)]
pub struct KeysetPosition {
    pub field_value: f64,
    pub created_at: i64,
    pub event_id: String,
}

/// `WHERE` gains a keyset predicate mirroring the `ORDER BY` tuple (spec
/// §4.5). For DESC: `(field < ?) OR (field = ? AND created_at < ?) OR
/// (field = ? AND created_at = ? AND event_id > ?)`; ASC mirrors with `>`
/// for field/created_at, `event_id` stays ascending either way.
fn push_keyset_predicate(qb: &mut QueryBuilder<'static, Postgres>, column: &str, dir: SortDir, pos: &KeysetPosition) {
    let cmp = match dir {
        SortDir::Desc => "<",
        SortDir::Asc => ">",
    };
    qb.push(" AND (");
    qb.push(format!("{column} {cmp} "));
    qb.push_bind(pos.field_value);
    qb.push(format!(" OR ({column} = "));
    qb.push_bind(pos.field_value);
    qb.push(format!(" AND v.created_at {cmp} "));
    qb.push_bind(pos.created_at);
    qb.push(")");
    qb.push(format!(" OR ({column} = "));
    qb.push_bind(pos.field_value);
    qb.push(" AND v.created_at = ");
    qb.push_bind(pos.created_at);
    qb.push(" AND v.event_id > ");
    qb.push_bind(pos.event_id.clone());
    qb.push("))");
}

/// Builds the fast-path query against the `videos` projection table,
/// joined back to `events` so the rows it returns carry the real
/// `tags`/`content`/`sig` — the projection table only holds the derived
/// metric columns used for filtering/sorting, never a full event body.
/// `LIMIT` is `min(limit, cap) + 1`, the extra row used to detect
/// `hasMore`.
pub fn build_projection_query(filter: &VendorFilter, keyset: Option<&KeysetPosition>, limit_cap: i64) -> QueryBuilder<'static, Postgres> {
    let mut qb: QueryBuilder<'static, Postgres> = QueryBuilder::new(
        "SELECT v.event_id AS event_id, e.pubkey AS pubkey, v.created_at AS created_at, e.kind AS kind, \
         e.tags AS tags, e.content AS content, e.sig AS sig, \
         v.loop_count, v.likes, v.views, v.comments, v.avg_completion \
         FROM videos v JOIN events e ON e.event_id = v.event_id WHERE 1=1",
    );

    if let Some(hashtags) = filter.tags.get("t") {
        if !hashtags.is_empty() {
            qb.push(" AND v.hashtag IN (");
            let mut sep = qb.separated(", ");
            for h in hashtags {
                sep.push_bind(h.clone());
            }
            qb.push(")");
        }
    }

    if !filter.authors.is_empty() {
        qb.push(" AND v.author IN (");
        let mut sep = qb.separated(", ");
        for a in &filter.authors {
            sep.push_bind(a.clone());
        }
        qb.push(")");
    }

    if let Some(since) = filter.since {
        qb.push(" AND v.created_at >= ").push_bind(since);
    }
    if let Some(until) = filter.until {
        qb.push(" AND v.created_at <= ").push_bind(until);
    }

    if !filter.verification.is_empty() {
        qb.push(" AND v.verification_level IN (");
        let mut sep = qb.separated(", ");
        for v in &filter.verification {
            sep.push_bind(v.as_str().to_string());
        }
        qb.push(")");
    }

    for (metric, int_filter) in &filter.int_filters {
        let column = metric_column(metric);
        if let Some(column) = column {
            if let Some(gte) = int_filter.gte {
                qb.push(format!(" AND {column} >= ")).push_bind(gte);
            }
            if let Some(gt) = int_filter.gt {
                qb.push(format!(" AND {column} > ")).push_bind(gt);
            }
            if let Some(lte) = int_filter.lte {
                qb.push(format!(" AND {column} <= ")).push_bind(lte);
            }
            if let Some(lt) = int_filter.lt {
                qb.push(format!(" AND {column} < ")).push_bind(lt);
            }
            if let Some(eq) = int_filter.eq {
                qb.push(format!(" AND {column} = ")).push_bind(eq);
            }
            if let Some(neq) = int_filter.neq {
                qb.push(format!(" AND {column} != ")).push_bind(neq);
            }
        }
    }

    let sort = filter.sort.unwrap_or(crate::query::filter::SortSpec {
        field: crate::query::filter::SortField::CreatedAt,
        dir: SortDir::Desc,
    });
    let column = format!("v.{}", sort.field.column());

    if let Some(pos) = keyset {
        push_keyset_predicate(&mut qb, &column, sort.dir, pos);
    }

    qb.push(format!(" ORDER BY {column} {dir}, v.created_at {dir}, v.event_id ASC", dir = sort.dir.sql()));

    let limit = filter.limit.unwrap_or(limit_cap).min(limit_cap);
    qb.push(" LIMIT ").push_bind(limit + 1);

    qb
}

fn metric_column(metric: &str) -> Option<&'static str> {
    match metric {
        "loop_count" => Some("v.loop_count"),
        "likes" => Some("v.likes"),
        "views" => Some("v.views"),
        "comments" => Some("v.comments"),
        "avg_completion" => Some("v.avg_completion"),
        "has_proofmode" => Some("(v.has_proofmode::int)"),
        "has_device_attestation" => Some("(v.has_device_attestation::int)"),
        "has_pgp_signature" => Some("(v.has_pgp_signature::int)"),
        _ => None,
    }
}

/// Builds the generic event-store query. When the filter's only tag
/// predicates are `p`/`e`/`a`, it joins the cached common-tag table;
/// otherwise it builds a CTE against the general `tags` table (spec §4.5
/// "Generic event store composition").
pub fn build_generic_query(filter: &VendorFilter, ids_chunk: &[String], authors_chunk: &[String], kinds_chunk: &[u64]) -> QueryBuilder<'static, Postgres> {
    let only_cached_tags = filter.tags.keys().all(|k| k == "p" || k == "e" || k == "a");

    let mut qb: QueryBuilder<'static, Postgres> = if only_cached_tags && !filter.tags.is_empty() {
        QueryBuilder::new("SELECT e.event_id, e.pubkey, e.created_at, e.kind, e.tags, e.content, e.sig FROM events e JOIN cached_tags c ON c.event_id = e.event_id WHERE 1=1")
    } else if !filter.tags.is_empty() {
        let mut pre: QueryBuilder<'static, Postgres> = QueryBuilder::new("WITH m AS (SELECT DISTINCT event_id FROM tags WHERE ");
        let mut first = true;
        for (name, values) in &filter.tags {
            if !first {
                pre.push(" OR ");
            }
            first = false;
            pre.push("(tag_name = ").push_bind(name.clone()).push(" AND value IN (");
            {
                let mut sep = pre.separated(", ");
                for v in values {
                    sep.push_bind(v.clone());
                }
            }
            pre.push("))");
        }
        pre.push(") SELECT e.event_id, e.pubkey, e.created_at, e.kind, e.tags, e.content, e.sig FROM events e JOIN m ON m.event_id = e.event_id WHERE 1=1");
        pre
    } else {
        QueryBuilder::new("SELECT event_id, pubkey, created_at, kind, tags, content, sig FROM events e WHERE 1=1")
    };

    if only_cached_tags {
        for (name, values) in &filter.tags {
            let column = match name.as_str() {
                "p" => "c.p_value",
                "e" => "c.e_value",
                "a" => "c.a_value",
                _ => continue,
            };
            qb.push(format!(" AND {column} IN ("));
            {
                let mut sep = qb.separated(", ");
                for v in values {
                    sep.push_bind(v.clone());
                }
            }
            qb.push(")");
        }
    }

    if !ids_chunk.is_empty() {
        qb.push(" AND e.event_id IN (");
        let mut sep = qb.separated(", ");
        for id in ids_chunk {
            sep.push_bind(id.clone());
        }
        qb.push(")");
    }
    if !authors_chunk.is_empty() {
        qb.push(" AND e.pubkey IN (");
        let mut sep = qb.separated(", ");
        for a in authors_chunk {
            sep.push_bind(a.clone());
        }
        qb.push(")");
    }
    if !kinds_chunk.is_empty() {
        qb.push(" AND e.kind IN (");
        let mut sep = qb.separated(", ");
        for k in kinds_chunk {
            sep.push_bind(*k as i64);
        }
        qb.push(")");
    }
    if let Some(since) = filter.since {
        qb.push(" AND e.created_at >= ").push_bind(since);
    }
    if let Some(until) = filter.until {
        qb.push(" AND e.created_at <= ").push_bind(until);
    }

    qb.push(" ORDER BY e.created_at DESC, e.event_id ASC");
    let limit = filter.limit.unwrap_or(500).min(500);
    qb.push(" LIMIT ").push_bind(limit);

    qb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::filter::VendorFilter;
    use serde_json::json;

    #[test]
    fn projection_query_embeds_the_limit_plus_one() {
        let f = VendorFilter::from_json(&json!({"kinds": [34236], "sort": {"field": "likes"}, "limit": 10})).unwrap();
        let qb = build_projection_query(&f, None, 200);
        assert!(qb.sql().contains("ORDER BY v.likes DESC, v.created_at DESC, v.event_id ASC"));
    }

    #[test]
    fn generic_query_uses_cached_tags_for_p_e_a_only() {
        let f = VendorFilter::from_json(&json!({"#p": ["abc"]})).unwrap();
        let qb = build_generic_query(&f, &[], &[], &[]);
        assert!(qb.sql().contains("cached_tags"));
    }

    #[test]
    fn projection_query_joins_events_for_the_real_event_body() {
        let f = VendorFilter::from_json(&json!({"kinds": [34236], "sort": {"field": "likes"}})).unwrap();
        let qb = build_projection_query(&f, None, 200);
        assert!(qb.sql().contains("JOIN events e ON e.event_id = v.event_id"));
        assert!(qb.sql().contains("e.tags AS tags"));
        assert!(qb.sql().contains("e.sig AS sig"));
    }

    #[test]
    fn generic_query_uses_cte_for_other_tags() {
        let f = VendorFilter::from_json(&json!({"#t": ["music"]})).unwrap();
        let qb = build_generic_query(&f, &[], &[], &[]);
        assert!(qb.sql().contains("WITH m AS"));
    }
}
