//! NIP-05 resolution: `name@domain` → `GET https://domain/.well-known/nostr.json?name=name`,
//! requiring `names[name] == pubkey` (spec §4.1 step 7).

use std::time::Duration;

use crate::config::Config;
use crate::error::{RelayError, Result};

const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ParsedAddress<'a> {
    pub name: &'a str,
    pub domain: &'a str,
}

pub fn parse_address(addr: &str) -> Option<ParsedAddress<'_>> {
    let (name, domain) = addr.split_once('@')?;
    if name.is_empty() || domain.is_empty() {
        return None;
    }
    Some(ParsedAddress { name, domain })
}

/// Verifies that `addr` (`name@domain`) resolves to `pubkey`, honoring the
/// configured domain blocklist/allowlist. The HTTP fetch always carries a
/// 5-second timeout and its resources are released whether it succeeds,
/// errors, or times out — `reqwest`'s request future is dropped in every
/// branch here, which tears down the underlying connection attempt.
pub async fn verify(addr: &str, pubkey: &str, cfg: &Config) -> Result<()> {
    let parsed = parse_address(addr).ok_or(RelayError::Nip05Invalid)?;
    let domain_lower = parsed.domain.to_lowercase();

    if cfg.nip05_domain_blocklist.contains(&domain_lower) {
        return Err(RelayError::Nip05Invalid);
    }
    if let Some(allow) = &cfg.nip05_domain_allowlist {
        if !allow.contains(&domain_lower) {
            return Err(RelayError::Nip05Invalid);
        }
    }

    let url = format!(
        "https://{}/.well-known/nostr.json?name={}",
        parsed.domain,
        urlencode(parsed.name)
    );

    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|_| RelayError::Nip05Invalid)?;

    let resp = client
        .get(&url)
        .send()
        .await
        .map_err(|_| RelayError::Nip05Invalid)?;

    let body: serde_json::Value = resp.json().await.map_err(|_| RelayError::Nip05Invalid)?;

    let resolved = body
        .get("names")
        .and_then(|names| names.get(parsed.name))
        .and_then(|v| v.as_str())
        .ok_or(RelayError::Nip05Invalid)?;

    if resolved.eq_ignore_ascii_case(pubkey) {
        Ok(())
    } else {
        Err(RelayError::Nip05Invalid)
    }
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_address() {
        let parsed = parse_address("alice@example.com").unwrap();
        assert_eq!(parsed.name, "alice");
        assert_eq!(parsed.domain, "example.com");
    }

    #[test]
    fn rejects_addresses_without_at() {
        assert!(parse_address("not-an-address").is_none());
    }

    #[test]
    fn rejects_empty_name_or_domain() {
        assert!(parse_address("@example.com").is_none());
        assert!(parse_address("alice@").is_none());
    }

    #[test]
    fn urlencodes_reserved_characters() {
        assert_eq!(urlencode("a b"), "a%20b");
        assert_eq!(urlencode("under_score-dash.dot~tilde"), "under_score-dash.dot~tilde");
    }
}
