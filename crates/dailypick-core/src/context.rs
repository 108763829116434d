//! Selection context keys.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a selection context.
///
/// Built from named dimensions (band, focus, slot, ...). Dimensions are
/// sorted by name, so the same set always yields the same key regardless of
/// the order they were added in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextKey(String);

impl ContextKey {
    /// Wrap an already composed key.
    pub fn raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn builder() -> ContextKeyBuilder {
        ContextKeyBuilder::default()
    }

    /// Context that only varies by band.
    pub fn for_band(band: &str) -> Self {
        Self::builder().dimension("band", band).build()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accumulates dimensions for a [`ContextKey`].
#[derive(Debug, Default, Clone)]
pub struct ContextKeyBuilder {
    dimensions: BTreeMap<String, String>,
}

/// Percent-encode a name or value so `=`, `|` and `,` only ever appear as
/// separators.
fn escape(part: &str) -> String {
    urlencoding::encode(part.trim()).into_owned()
}

impl ContextKeyBuilder {
    /// Add a dimension. Empty values are skipped; a repeated name replaces
    /// the previous value.
    pub fn dimension(mut self, name: &str, value: &str) -> Self {
        if !value.trim().is_empty() {
            self.dimensions.insert(escape(name), escape(value));
        }
        self
    }

    /// Add a dimension holding several values, joined with `,` in the given
    /// order. Empty values are dropped; an empty list adds nothing.
    pub fn list<'v>(mut self, name: &str, values: impl IntoIterator<Item = &'v str>) -> Self {
        let joined = values
            .into_iter()
            .filter(|v| !v.trim().is_empty())
            .map(escape)
            .collect::<Vec<_>>()
            .join(",");
        if !joined.is_empty() {
            self.dimensions.insert(escape(name), joined);
        }
        self
    }

    /// Add an optional dimension.
    pub fn maybe(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.dimension(name, v),
            None => self,
        }
    }

    pub fn build(self) -> ContextKey {
        let key = self
            .dimensions
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("|");
        ContextKey(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_independent() {
        let a = ContextKey::builder()
            .dimension("focus", "calm")
            .dimension("band", "3-5")
            .build();
        let b = ContextKey::builder()
            .dimension("band", "3-5")
            .dimension("focus", "calm")
            .build();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "band=3-5|focus=calm");
    }

    #[test]
    fn empty_values_skipped() {
        let key = ContextKey::builder()
            .dimension("band", "3-5")
            .dimension("mood", "  ")
            .maybe("slot", None)
            .build();
        assert_eq!(key, ContextKey::for_band("3-5"));
    }

    #[test]
    fn separators_in_values_are_escaped() {
        let two_tags = ContextKey::builder().list("focus", ["calm", "create"]).build();
        let one_tag = ContextKey::builder().list("focus", ["calm,create"]).build();
        assert_ne!(two_tags, one_tag);
        assert_eq!(two_tags.as_str(), "focus=calm,create");
        assert_eq!(one_tag.as_str(), "focus=calm%2Ccreate");

        let nested = ContextKey::builder().dimension("band", "3-5|focus=calm").build();
        let split = ContextKey::builder()
            .dimension("band", "3-5")
            .dimension("focus", "calm")
            .build();
        assert_ne!(nested, split);
    }

    #[test]
    fn serializes_as_plain_string() {
        let key = ContextKey::for_band("6-8");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"band=6-8\"");
    }
}
