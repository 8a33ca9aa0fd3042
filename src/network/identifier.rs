//! Unique processor identifiers, owned by one network.

use std::collections::HashSet;

/// Base used when a processor is added with an empty identifier.
pub const FALLBACK_IDENTIFIER: &str = "Processor";

#[derive(Debug, Default)]
pub struct IdentifierRegistry {
    used: HashSet<String>,
}

impl IdentifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.used.contains(identifier)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    /// First free identifier derived from `base`.
    ///
    /// `"Scale"` becomes `"Scale 2"`, `"Scale 2"` becomes `"Scale 3"` and so on
    /// until an unused one is found.
    pub fn unique(&self, base: &str) -> String {
        let base = base.trim();
        let base = if base.is_empty() {
            FALLBACK_IDENTIFIER
        } else {
            base
        };
        if !self.used.contains(base) {
            return base.to_string();
        }

        let (stem, mut counter) = match split_numeric_suffix(base) {
            Some((stem, n)) => (stem, n.saturating_add(1)),
            None => (base, 2),
        };
        loop {
            let candidate = format!("{} {}", stem, counter);
            if !self.used.contains(&candidate) {
                return candidate;
            }
            counter = counter.saturating_add(1);
        }
    }

    /// Reserve a unique identifier derived from `base` and return it.
    pub fn reserve(&mut self, base: &str) -> String {
        let identifier = self.unique(base);
        self.used.insert(identifier.clone());
        identifier
    }

    pub fn release(&mut self, identifier: &str) -> bool {
        self.used.remove(identifier)
    }
}

fn split_numeric_suffix(identifier: &str) -> Option<(&str, u64)> {
    let (stem, suffix) = identifier.rsplit_once(' ')?;
    if stem.is_empty() || suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok().map(|n| (stem, n))
}
