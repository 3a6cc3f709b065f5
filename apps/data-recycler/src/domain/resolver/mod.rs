//! Symbol Resolution
//!
//! Maps each requested output symbol to a source symbol that actually has
//! historical data. Symbols with native data resolve to themselves; symbols
//! without data resolve to a proxy symbol so the outbound feed still carries
//! their requested name with real OHLCV values behind it.
//!
//! # Design
//!
//! Resolution runs exactly once, at session start, and produces an immutable
//! `SymbolMapping`. The mapping is never re-evaluated during a running
//! session, even if data for a previously-missing symbol is ingested later;
//! picking up new data requires a fresh session. This keeps the lookup an
//! explicit, testable data structure instead of an ad hoc per-call fallback.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised while building a `SymbolMapping`.
///
/// These are configuration-class errors: they are fatal at session start and
/// the session never reaches streaming.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// No requested symbol has any historical data, so there is nothing to
    /// proxy from.
    #[error("no requested symbol has historical data available: {0:?}")]
    NoResolvableSymbols(Vec<String>),

    /// The requested symbol list was empty.
    #[error("requested symbol list is empty")]
    EmptySymbolList,
}

// =============================================================================
// Symbol Mapping
// =============================================================================

/// Immutable mapping from requested symbols to resolved source symbols.
///
/// Invariant: every requested symbol has exactly one resolved source symbol,
/// which is either itself (native data exists) or the proxy symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMapping {
    entries: BTreeMap<String, String>,
    proxy: String,
}

impl SymbolMapping {
    /// Resolve a requested symbol to its source symbol.
    #[must_use]
    pub fn resolve(&self, requested: &str) -> Option<&str> {
        self.entries.get(requested).map(String::as_str)
    }

    /// Iterate over `(requested, resolved)` pairs in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(req, src)| (req.as_str(), src.as_str()))
    }

    /// Requested symbols that resolve to the proxy instead of themselves.
    pub fn proxied(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(req, src)| req != src)
            .map(|(req, _)| req.as_str())
    }

    /// The proxy symbol used for requested symbols without native data.
    #[must_use]
    pub fn proxy(&self) -> &str {
        &self.proxy
    }

    /// Number of requested symbols in the mapping.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Build the `SymbolMapping` for a session.
///
/// Every requested symbol with data in `available` maps to itself. Symbols
/// without data map to the proxy: `proxy_override` when it is set and has
/// data, otherwise the first requested symbol (in request order) that has
/// data. An override without data is ignored with a warning rather than
/// silently proxying from an empty series.
///
/// Resolution is deterministic: the same request list and availability set
/// always yield an identical mapping.
///
/// # Errors
///
/// Returns `ResolveError::EmptySymbolList` for an empty request, and
/// `ResolveError::NoResolvableSymbols` when no requested symbol has data.
pub fn resolve_symbols(
    requested: &[String],
    available: &BTreeSet<String>,
    proxy_override: Option<&str>,
) -> Result<SymbolMapping, ResolveError> {
    if requested.is_empty() {
        return Err(ResolveError::EmptySymbolList);
    }

    let first_with_data = requested
        .iter()
        .find(|sym| available.contains(*sym))
        .ok_or_else(|| ResolveError::NoResolvableSymbols(requested.to_vec()))?;

    let proxy = match proxy_override {
        Some(sym) if available.contains(sym) => sym.to_string(),
        Some(sym) => {
            tracing::warn!(
                proxy = %sym,
                fallback = %first_with_data,
                "configured proxy symbol has no data, using first symbol with data"
            );
            first_with_data.clone()
        }
        None => first_with_data.clone(),
    };

    let mut entries = BTreeMap::new();
    for sym in requested {
        if available.contains(sym) {
            entries.insert(sym.clone(), sym.clone());
        } else {
            tracing::warn!(symbol = %sym, proxy = %proxy, "no historical data, serving proxy data");
            entries.insert(sym.clone(), proxy.clone());
        }
    }

    Ok(SymbolMapping { entries, proxy })
}

// =============================================================================
// Tests
// =============================================================================
