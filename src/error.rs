//! Error taxonomy shared across the ingress, query, cursor, and archive paths.
//!
//! The `Display` text of each variant is normative: clients match on the
//! prefix (`invalid:`, `duplicate:`, `blocked:`, `rate-limited:`, ...), so
//! changing the wording here is a wire-protocol change, not a refactor.

use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid: bad signature")]
    BadSignature,

    #[error("invalid: event id mismatch")]
    IdMismatch,

    #[error("duplicate: already have this event")]
    DuplicateId,

    #[error("duplicate: newer event already exists")]
    DuplicateNewerExists,

    #[error("duplicate: content already exists")]
    DuplicateContent,

    #[error("blocked: {0}")]
    Blocked(String),

    #[error("invalid: NIP-05 validation failed")]
    Nip05Invalid,

    #[error("rate-limited: {0}")]
    RateLimited(&'static str),

    #[error("invalid: {0}")]
    InvalidFilter(String),

    #[error("invalid: cursor tampering detected")]
    CursorTampered,

    #[error("invalid: cursor query mismatch")]
    CursorQueryMismatch,

    #[error("auth-required: payment")]
    PaymentRequired,

    #[error("error: could not save event")]
    Storage(#[source] sqlx::Error),

    #[error("unauthorized: cannot delete event {0} - wrong pubkey")]
    UnauthorizedDelete(String),
}

impl RelayError {
    /// The literal text sent back to the client in `["OK", id, false, reason]`
    /// or `["CLOSED", subId, reason]`. Kept as a method (rather than relying
    /// solely on `Display`) so call sites that need the `String` for a JSON
    /// frame read clearly at the call site.
    pub fn wire_reason(&self) -> String {
        self.to_string()
    }
}

/// Classification used by call sites that need to decide *where* an error
/// surfaces (OK-false on the event, CLOSED on the subscription, or a
/// transport-level close) without matching on the prefix string itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// `["OK", id, false, reason]` — event-scoped, session stays open.
    Event,
    /// `["CLOSED", subId, reason]` — subscription-scoped only.
    Subscription,
}

impl fmt::Display for ErrorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorScope::Event => write!(f, "event"),
            ErrorScope::Subscription => write!(f, "subscription"),
        }
    }
}

impl RelayError {
    pub fn scope(&self) -> ErrorScope {
        match self {
            RelayError::InvalidFilter(_)
            | RelayError::CursorTampered
            | RelayError::CursorQueryMismatch => ErrorScope::Subscription,
            _ => ErrorScope::Event,
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_normative() {
        assert_eq!(RelayError::BadSignature.wire_reason(), "invalid: bad signature");
        assert_eq!(
            RelayError::DuplicateId.wire_reason(),
            "duplicate: already have this event"
        );
        assert_eq!(
            RelayError::DuplicateNewerExists.wire_reason(),
            "duplicate: newer event already exists"
        );
        assert_eq!(
            RelayError::DuplicateContent.wire_reason(),
            "duplicate: content already exists"
        );
        assert_eq!(
            RelayError::Blocked("pubkey not allowlisted".into()).wire_reason(),
            "blocked: pubkey not allowlisted"
        );
        assert_eq!(
            RelayError::Nip05Invalid.wire_reason(),
            "invalid: NIP-05 validation failed"
        );
        assert_eq!(
            RelayError::RateLimited("event").wire_reason(),
            "rate-limited: event"
        );
        assert_eq!(
            RelayError::CursorTampered.wire_reason(),
            "invalid: cursor tampering detected"
        );
        assert_eq!(
            RelayError::CursorQueryMismatch.wire_reason(),
            "invalid: cursor query mismatch"
        );
        assert_eq!(
            RelayError::UnauthorizedDelete("abc123".into()).wire_reason(),
            "unauthorized: cannot delete event abc123 - wrong pubkey"
        );
    }

    #[test]
    fn scope_routes_subscription_errors_correctly() {
        assert_eq!(
            RelayError::InvalidFilter("too many kinds".into()).scope(),
            ErrorScope::Subscription
        );
        assert_eq!(RelayError::CursorTampered.scope(), ErrorScope::Subscription);
        assert_eq!(RelayError::BadSignature.scope(), ErrorScope::Event);
    }
}
