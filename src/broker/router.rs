//! C10 — location router: maps a connection's `(continent, country, region)`
//! to a preferred shard via a static lookup table, with a continent-level
//! fallback and a hard default (spec §4.9).

use std::collections::HashMap;

/// The fixed shard set (spec §4.9: "roughly WNAM, ENAM, WEUR, EEUR, APAC,
/// OC, SAM, AFR, ME — the exact list is configuration").
pub const DEFAULT_SHARDS: &[&str] = &["WNAM", "ENAM", "WEUR", "EEUR", "APAC", "OC", "SAM", "AFR", "ME"];

pub struct LocationRouter {
    /// `"continent/country/region"` → shard id, most specific match wins.
    table: HashMap<String, String>,
    continent_fallback: HashMap<String, String>,
    default_shard: String,
}

impl LocationRouter {
    pub fn new(default_shard: impl Into<String>) -> Self {
        LocationRouter {
            table: HashMap::new(),
            continent_fallback: HashMap::new(),
            default_shard: default_shard.into(),
        }
    }

    pub fn with_region(mut self, continent: &str, country: &str, region: &str, shard: &str) -> Self {
        self.table.insert(format!("{continent}/{country}/{region}"), shard.to_string());
        self
    }

    pub fn with_continent_fallback(mut self, continent: &str, shard: &str) -> Self {
        self.continent_fallback.insert(continent.to_string(), shard.to_string());
        self
    }

    /// Resolves the preferred shard for a caller's location, falling back
    /// to the continent default and finally the hard default.
    pub fn resolve(&self, continent: &str, country: &str, region: &str) -> &str {
        let key = format!("{continent}/{country}/{region}");
        if let Some(shard) = self.table.get(&key) {
            return shard;
        }
        if let Some(shard) = self.continent_fallback.get(continent) {
            return shard;
        }
        &self.default_shard
    }

    /// Builds a sensible default router over [`DEFAULT_SHARDS`]: one
    /// continent-level fallback per shard, NA/EU split further by country.
    pub fn default_table() -> Self {
        LocationRouter::new("ENAM")
            .with_region("NA", "US", "west", "WNAM")
            .with_region("NA", "CA", "west", "WNAM")
            .with_region("NA", "US", "east", "ENAM")
            .with_continent_fallback("NA", "ENAM")
            .with_continent_fallback("EU", "WEUR")
            .with_continent_fallback("AS", "APAC")
            .with_continent_fallback("OC", "OC")
            .with_continent_fallback("SA", "SAM")
            .with_continent_fallback("AF", "AFR")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_exact_region_match() {
        let router = LocationRouter::default_table();
        assert_eq!(router.resolve("NA", "US", "west"), "WNAM");
    }

    #[test]
    fn falls_back_to_continent() {
        let router = LocationRouter::default_table();
        assert_eq!(router.resolve("EU", "DE", "berlin"), "WEUR");
    }

    #[test]
    fn falls_back_to_hard_default_for_unknown_continent() {
        let router = LocationRouter::default_table();
        assert_eq!(router.resolve("ZZ", "ZZ", "ZZ"), "ENAM");
    }
}
