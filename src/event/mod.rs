//! Event model helpers: replaceable-kind classification, canonical id/hash
//! computation, signature/policy validation, and NIP-05 resolution.
//!
//! The wire-level `Event`, `Tag`, and `Filter` types themselves are the
//! `nostr` crate's (the teacher already depends on it and uses `Event`,
//! `Tag`, `Filter`, `EventBuilder` directly); this module only adds the
//! domain logic the spec requires on top of them.

pub mod canonical;
pub mod classify;
pub mod nip05;
pub mod validator;

pub use classify::{classify_kind, ReplaceableClass};

pub const VIDEO_KIND: u64 = 34_236;

/// Kinds for which EVENT-rate-limiting is not applied to NIP-05 lookups
/// (spec §4.1 step 7: "when kind != 0, 1059").
pub const NIP05_EXEMPT_KINDS: [u64; 2] = [0, 1059];

/// Kinds against which the content-hash anti-spam table is maintained.
/// The spec leaves the exact kind set to the implementer ("for anti-spam
/// kinds only"); this relay applies it to ordinary text notes and the video
/// kind, the two kinds that actually see copy-paste spam in practice.
pub const ANTI_SPAM_KINDS: [u64; 2] = [1, VIDEO_KIND as u64];

pub fn is_anti_spam_kind(kind: u64) -> bool {
    ANTI_SPAM_KINDS.contains(&kind)
}
