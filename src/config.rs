//! Process configuration, loaded from environment variables at startup.
//!
//! Follows the teacher's own idiom (`std::env::var(...).expect(...)` for
//! required values, `unwrap_or_else` for defaults) rather than introducing a
//! file-based config layer the teacher never had.

use std::collections::HashSet;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub relay_port: u16,

    pub retention_days: i64,
    pub archive_batch_size: i64,
    pub archive_interval: Duration,
    pub archive_root: String,

    pub query_complexity_cap: u64,
    pub projection_limit_max: i64,
    pub legacy_limit_max: i64,

    pub cursor_secret: Vec<u8>,
    pub cursor_secret_previous: Option<Vec<u8>>,

    pub pubkey_blocklist: HashSet<String>,
    pub pubkey_allowlist: Option<HashSet<String>>,
    pub kind_blocklist: HashSet<u64>,
    pub kind_allowlist: Option<HashSet<u64>>,
    pub tag_blocklist: HashSet<String>,
    pub tag_allowlist: Option<HashSet<String>>,
    pub content_blocklist: Vec<String>,
    pub nip05_domain_blocklist: HashSet<String>,
    pub nip05_domain_allowlist: Option<HashSet<String>>,
    pub nip05_enforced: bool,

    pub pay_to_relay_enabled: bool,
    pub pay_to_relay_price_sats: u64,
    pub pay_to_relay_pubkey: Option<String>,

    pub event_bucket_rate_per_sec: f64,
    pub event_bucket_capacity: f64,
    pub req_bucket_rate_per_sec: f64,
    pub req_bucket_capacity: f64,

    pub relay_name: String,
    pub relay_description: String,
    pub relay_pubkey: String,
    pub relay_contact: String,
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_csv_set(key: &str) -> HashSet<String> {
    env_var(key)
        .map(|v| v.split(',').map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn env_csv_u64_set(key: &str) -> HashSet<u64> {
    env_var(key)
        .map(|v| v.split(',').filter_map(|s| s.trim().parse::<u64>().ok()).collect())
        .unwrap_or_default()
}

fn env_csv_opt_set(key: &str) -> Option<HashSet<String>> {
    env_var(key).map(|v| v.split(',').map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()).collect())
}

fn env_csv_opt_u64_set(key: &str) -> Option<HashSet<u64>> {
    env_var(key).map(|v| v.split(',').filter_map(|s| s.trim().parse::<u64>().ok()).collect())
}

impl Config {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let relay_port = env_var("RELAY_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(3001);

        let retention_days = env_var("RETENTION_DAYS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        let archive_batch_size = env_var("ARCHIVE_BATCH_SIZE")
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);

        let archive_interval_secs: u64 = env_var("ARCHIVE_INTERVAL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);

        let archive_root = env_var("ARCHIVE_ROOT").unwrap_or_else(|| "./archive".to_string());

        let query_complexity_cap = env_var("QUERY_COMPLEXITY_CAP")
            .and_then(|v| v.parse().ok())
            .unwrap_or(10_000);

        let cursor_secret = env_var("CURSOR_SECRET")
            .expect("CURSOR_SECRET must be set")
            .into_bytes();
        let cursor_secret_previous = env_var("CURSOR_SECRET_PREVIOUS").map(|v| v.into_bytes());

        Config {
            database_url,
            relay_port,
            retention_days,
            archive_batch_size,
            archive_interval: Duration::from_secs(archive_interval_secs),
            archive_root,
            query_complexity_cap,
            projection_limit_max: 200,
            legacy_limit_max: 500,
            cursor_secret,
            cursor_secret_previous,
            pubkey_blocklist: env_csv_set("PUBKEY_BLOCKLIST"),
            pubkey_allowlist: env_csv_opt_set("PUBKEY_ALLOWLIST"),
            kind_blocklist: env_csv_u64_set("KIND_BLOCKLIST"),
            kind_allowlist: env_csv_opt_u64_set("KIND_ALLOWLIST"),
            tag_blocklist: env_csv_set("TAG_BLOCKLIST"),
            tag_allowlist: env_csv_opt_set("TAG_ALLOWLIST"),
            content_blocklist: env_var("CONTENT_BLOCKLIST")
                .map(|v| v.split(',').map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_default(),
            nip05_domain_blocklist: env_csv_set("NIP05_DOMAIN_BLOCKLIST"),
            nip05_domain_allowlist: env_csv_opt_set("NIP05_DOMAIN_ALLOWLIST"),
            nip05_enforced: env_var("NIP05_ENFORCED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            pay_to_relay_enabled: env_var("PAY_TO_RELAY_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            pay_to_relay_price_sats: env_var("PAY_TO_RELAY_PRICE_SATS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            pay_to_relay_pubkey: env_var("PAY_TO_RELAY_PUBKEY"),
            event_bucket_rate_per_sec: env_var("EVENT_BUCKET_RATE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(5.0),
            event_bucket_capacity: env_var("EVENT_BUCKET_CAPACITY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(20.0),
            req_bucket_rate_per_sec: env_var("REQ_BUCKET_RATE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10.0),
            req_bucket_capacity: env_var("REQ_BUCKET_CAPACITY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30.0),
            relay_name: env_var("RELAY_NAME").unwrap_or_else(|| "Clipcast Relay".to_string()),
            relay_description: env_var("RELAY_DESCRIPTION")
                .unwrap_or_else(|| "A Nostr relay specialized for short-form video".to_string()),
            relay_pubkey: env_var("RELAY_PUBKEY").unwrap_or_default(),
            relay_contact: env_var("RELAY_CONTACT").unwrap_or_default(),
        }
    }

    /// Kinds exempt from the per-pubkey EVENT token bucket (spec §4.1 step 9).
    pub fn rate_limit_exempt_kinds(&self) -> &'static [u64] {
        // kind 5 (deletion) is exempt so users can always clean up under load.
        &[5]
    }
}
