//! Ticker symbols and the popular/all symbol partition

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A ticker identifier as understood by the market-data provider
/// (e.g. `RELIANCE.NS`, `AAPL`). Stored trimmed and upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Listed on an Indian exchange (NSE `.NS` or BSE `.BO` suffix)
    pub fn is_indian_listing(&self) -> bool {
        self.0.ends_with(".NS") || self.0.ends_with(".BO")
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Symbol::new(value)
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Symbol::new(value)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered, deduplicated symbols split into a priority "popular" subset and
/// the full "all" universe.
///
/// Every constructor inserts popular symbols into `all` first, so
/// `popular ⊆ all` holds for any value of this type. Sets are replaced
/// wholesale, never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SymbolLists")]
pub struct SymbolSet {
    popular: IndexSet<Symbol>,
    all: IndexSet<Symbol>,
}

/// Wire shape of a [`SymbolSet`]; deserialization goes through
/// [`SymbolSet::new`] so the subset relation is re-established.
#[derive(Deserialize)]
struct SymbolLists {
    #[serde(default)]
    popular: Vec<Symbol>,
    #[serde(default)]
    all: Vec<Symbol>,
}

impl From<SymbolLists> for SymbolSet {
    fn from(lists: SymbolLists) -> Self {
        SymbolSet::new(lists.popular, lists.all)
    }
}

impl SymbolSet {
    pub fn new(
        popular: impl IntoIterator<Item = Symbol>,
        universe: impl IntoIterator<Item = Symbol>,
    ) -> Self {
        let popular: IndexSet<Symbol> = popular.into_iter().collect();
        let mut all = popular.clone();
        all.extend(universe);
        Self { popular, all }
    }

    pub fn popular(&self) -> &IndexSet<Symbol> {
        &self.popular
    }

    pub fn all(&self) -> &IndexSet<Symbol> {
        &self.all
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.all.contains(symbol)
    }

    /// Popular symbols first, then the rest of the universe in order, capped
    /// at `limit`.
    pub fn priority(&self, limit: usize) -> Vec<Symbol> {
        self.popular
            .iter()
            .chain(self.all.iter().filter(|s| !self.popular.contains(*s)))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Case-insensitive substring search over the full universe
    pub fn search<'a>(&'a self, query: &str) -> impl Iterator<Item = &'a Symbol> + 'a {
        let needle = query.trim().to_uppercase();
        self.all
            .iter()
            .filter(move |s| needle.is_empty() || s.as_str().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(raw: &[&str]) -> Vec<Symbol> {
        raw.iter().map(|s| Symbol::new(s)).collect()
    }

    #[test]
    fn test_symbol_normalization() {
        assert_eq!(Symbol::new("  reliance.ns ").as_str(), "RELIANCE.NS");
        assert!(Symbol::new("tcs.ns").is_indian_listing());
        assert!(!Symbol::new("AAPL").is_indian_listing());
    }

    #[test]
    fn test_popular_is_subset_of_all() {
        let set = SymbolSet::new(symbols(&["AAPL", "TCS.NS"]), symbols(&["MSFT", "AAPL"]));
        assert_eq!(set.len(), 3);
        assert!(set.popular().iter().all(|s| set.contains(s)));
        // Popular symbols lead the universe ordering
        let all: Vec<_> = set.all().iter().map(|s| s.as_str()).collect();
        assert_eq!(all, vec!["AAPL", "TCS.NS", "MSFT"]);
    }

    #[test]
    fn test_priority_fills_from_universe() {
        let set = SymbolSet::new(
            symbols(&["AAPL", "TCS.NS"]),
            symbols(&["MSFT", "INFY.NS", "GOOGL"]),
        );
        assert_eq!(set.priority(4), symbols(&["AAPL", "TCS.NS", "MSFT", "INFY.NS"]));
        assert_eq!(set.priority(1), symbols(&["AAPL"]));
        assert!(SymbolSet::default().priority(30).is_empty());
    }

    #[test]
    fn test_deserialize_restores_subset() {
        let json = r#"{"popular":["AAPL","NVDA"],"all":["MSFT"]}"#;
        let set: SymbolSet = serde_json::from_str(json).unwrap();
        assert!(set.contains(&Symbol::new("NVDA")));
        assert_eq!(set.len(), 3);

        let round: SymbolSet = serde_json::from_str(&serde_json::to_string(&set).unwrap()).unwrap();
        assert_eq!(round, set);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let set = SymbolSet::new(symbols(&["TCS.NS"]), symbols(&["INFY.NS", "AAPL"]));
        let hits: Vec<_> = set.search("ns").map(|s| s.as_str()).collect();
        assert_eq!(hits, vec!["TCS.NS", "INFY.NS"]);
        assert_eq!(set.search("").count(), 3);
    }
}
