//! Replaceable-event classification (spec §4.2, §9 "Re-architecture hints").
//!
//! A small closed enum, matched on once at the event store's write entry
//! point, rather than virtual dispatch.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceableClass {
    /// Ordinary, append-only event.
    Regular,
    /// At most one stored event per `(pubkey, kind)`.
    RegularReplaceable,
    /// At most one stored event per `(pubkey, kind, d-tag)`.
    ParameterizedReplaceable,
    /// Kind 5 — deletion request.
    Deletion,
}

pub fn classify_kind(kind: u64) -> ReplaceableClass {
    if kind == 5 {
        ReplaceableClass::Deletion
    } else if kind == 0 || kind == 3 || (10_000..20_000).contains(&kind) {
        ReplaceableClass::RegularReplaceable
    } else if (30_000..40_000).contains(&kind) {
        ReplaceableClass::ParameterizedReplaceable
    } else {
        ReplaceableClass::Regular
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_boundaries() {
        assert_eq!(classify_kind(5), ReplaceableClass::Deletion);
        assert_eq!(classify_kind(0), ReplaceableClass::RegularReplaceable);
        assert_eq!(classify_kind(3), ReplaceableClass::RegularReplaceable);
        assert_eq!(classify_kind(10_000), ReplaceableClass::RegularReplaceable);
        assert_eq!(classify_kind(19_999), ReplaceableClass::RegularReplaceable);
        assert_eq!(classify_kind(20_000), ReplaceableClass::Regular);
        assert_eq!(classify_kind(30_000), ReplaceableClass::ParameterizedReplaceable);
        assert_eq!(classify_kind(39_999), ReplaceableClass::ParameterizedReplaceable);
        assert_eq!(classify_kind(40_000), ReplaceableClass::Regular);
        assert_eq!(classify_kind(1), ReplaceableClass::Regular);
        assert_eq!(classify_kind(34_236), ReplaceableClass::ParameterizedReplaceable);
    }
}
