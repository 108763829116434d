//! Static content catalog and the band fallback cascade.
//!
//! The catalog is loaded once and never mutated. Pools are built per request
//! by filtering on band and tags; when a request is too narrow the search
//! widens to the nearest bands, then drops the tag filter, then falls back to
//! the catalog's default item.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::context::ContextKey;
use crate::error::{CoreError, SelectionError};

pub type Tag = String;
pub type BandId = String;

/// A piece of content that can be picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    /// Category, part of the de-duplication key.
    #[serde(default = "default_kind")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub tags: BTreeSet<Tag>,
    /// Items without a band suit every band.
    #[serde(default)]
    pub band: Option<BandId>,
}

fn default_kind() -> String {
    "activity".into()
}

impl ContentItem {
    pub fn new(id: &str, kind: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            title: title.to_string(),
            tags: BTreeSet::new(),
            band: None,
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags.extend(tags.iter().map(|t| t.to_string()));
        self
    }

    pub fn with_band(mut self, band: &str) -> Self {
        self.band = Some(band.to_string());
        self
    }

    /// Whether the item carries every tag in `tags`.
    pub fn has_tags(&self, tags: &BTreeSet<Tag>) -> bool {
        tags.is_subset(&self.tags)
    }

    /// Whether the item suits `band` (`None` matches everything).
    pub fn fits_band(&self, band: Option<&str>) -> bool {
        match (band, self.band.as_deref()) {
            (None, _) | (_, None) => true,
            (Some(wanted), Some(own)) => wanted == own,
        }
    }

    /// Composite key used to collapse duplicates across sources.
    pub fn dedup_key(&self) -> (String, String) {
        (
            self.kind.trim().to_lowercase(),
            self.title.trim().to_lowercase(),
        )
    }
}

/// A coarse bucket such as an age range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub id: BandId,
    #[serde(default)]
    pub label: String,
    /// Position used to measure distance between bands.
    pub ordinal: i32,
}

impl Band {
    pub fn new(id: &str, label: &str, ordinal: i32) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            ordinal,
        }
    }
}

/// What a pool request asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolQuery {
    pub band: Option<BandId>,
    #[serde(default)]
    pub tags: BTreeSet<Tag>,
}

impl PoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn band(mut self, band: &str) -> Self {
        self.band = Some(band.to_string());
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.insert(tag.to_string());
        self
    }

    /// The selection context this query describes.
    pub fn context_key(&self) -> ContextKey {
        ContextKey::builder()
            .maybe("band", self.band.as_deref())
            .list("focus", self.tags.iter().map(String::as_str))
            .build()
    }
}

/// How a pool was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PoolSource {
    /// The requested band and tags matched enough items.
    Exact,
    /// Widened to another band at the given ordinal distance.
    NearestBand { band: BandId, distance: u32 },
    /// No band matched the tags; the tag filter was dropped.
    TagsRelaxed { band: Option<BandId> },
    /// Nothing matched; the catalog default item.
    Default,
}

/// Candidates for one selection or rotation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    pub items: Vec<ContentItem>,
    pub source: PoolSource,
}

/// Immutable list of content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub bands: Vec<Band>,
    pub items: Vec<ContentItem>,
    #[serde(default)]
    pub default_item: Option<ContentItem>,
}

impl Catalog {
    pub fn new(bands: Vec<Band>, items: Vec<ContentItem>) -> Self {
        Self {
            bands,
            items,
            default_item: None,
        }
    }

    pub fn with_default(mut self, item: ContentItem) -> Self {
        self.default_item = Some(item);
        self
    }

    /// Parse a catalog from JSON.
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        let catalog: Catalog = serde_json::from_str(raw)?;
        catalog.check()?;
        Ok(catalog)
    }

    /// Load a JSON catalog file.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    fn check(&self) -> Result<(), CoreError> {
        let mut seen = BTreeSet::new();
        for band in &self.bands {
            if !seen.insert(band.id.as_str()) {
                return Err(CoreError::Catalog(format!("duplicate band '{}'", band.id)));
            }
        }
        for item in &self.items {
            if let Some(band) = &item.band {
                if !seen.contains(band.as_str()) {
                    tracing::warn!(item = %item.id, %band, "item references unknown band");
                }
            }
        }
        Ok(())
    }

    pub fn band(&self, id: &str) -> Option<&Band> {
        self.bands.iter().find(|b| b.id == id)
    }

    pub fn item(&self, id: &str) -> Option<&ContentItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Items fitting `band` and carrying every tag, in catalog order.
    pub fn filter(&self, band: Option<&str>, tags: &BTreeSet<Tag>) -> Vec<ContentItem> {
        self.items
            .iter()
            .filter(|item| item.fits_band(band) && item.has_tags(tags))
            .cloned()
            .collect()
    }

    /// Bands other than `requested`, nearest first; ties keep declaration
    /// order. Unknown or missing bands measure from the first declared band.
    pub fn bands_by_distance(&self, requested: Option<&str>) -> Vec<(&Band, u32)> {
        let origin = requested
            .and_then(|id| self.band(id))
            .or_else(|| self.bands.first())
            .map(|b| i64::from(b.ordinal));
        let Some(origin) = origin else {
            return Vec::new();
        };

        let mut ordered: Vec<(usize, &Band, u32)> = self
            .bands
            .iter()
            .enumerate()
            .filter(|(_, b)| Some(b.id.as_str()) != requested)
            .map(|(i, b)| {
                let distance = (i64::from(b.ordinal) - origin).unsigned_abs();
                (i, b, u32::try_from(distance).unwrap_or(u32::MAX))
            })
            .collect();
        ordered.sort_by_key(|(i, _, d)| (*d, *i));
        ordered.into_iter().map(|(_, b, d)| (b, d)).collect()
    }

    /// Build the pool for `query`, widening until it is non-empty.
    ///
    /// # Errors
    /// [`SelectionError::EmptyPool`] only when every step of the cascade
    /// came up empty and the catalog has no default item.
    pub fn pool(&self, query: &PoolQuery, min_viable: usize) -> Result<Pool, SelectionError> {
        let requested = query.band.as_deref();
        let min_viable = min_viable.max(1);
        let others = self.bands_by_distance(requested);

        let with_tags = std::iter::once((None, self.filter(requested, &query.tags))).chain(
            others
                .iter()
                .map(|(b, d)| (Some((*b, *d)), self.filter(Some(b.id.as_str()), &query.tags))),
        );
        if let Some((band, items)) = first_viable(with_tags, min_viable) {
            let source = match band {
                None => PoolSource::Exact,
                Some((b, distance)) => PoolSource::NearestBand {
                    band: b.id.clone(),
                    distance,
                },
            };
            return Ok(Pool { items, source });
        }

        if !query.tags.is_empty() {
            let no_tags = BTreeSet::new();
            let relaxed = std::iter::once((None, self.filter(requested, &no_tags))).chain(
                others
                    .iter()
                    .map(|(b, d)| (Some((*b, *d)), self.filter(Some(b.id.as_str()), &no_tags))),
            );
            if let Some((band, items)) = first_viable(relaxed, min_viable) {
                let band = match band {
                    None => query.band.clone(),
                    Some((b, _)) => Some(b.id.clone()),
                };
                return Ok(Pool {
                    items,
                    source: PoolSource::TagsRelaxed { band },
                });
            }
        }

        match &self.default_item {
            Some(item) => Ok(Pool {
                items: vec![item.clone()],
                source: PoolSource::Default,
            }),
            None => Err(SelectionError::EmptyPool),
        }
    }

    /// Demo catalog shipped with the CLI.
    pub fn builtin() -> Self {
        let bands = vec![
            Band::new("0-2", "Toddlers", 0),
            Band::new("3-5", "Preschool", 3),
            Band::new("6-8", "Early school", 6),
            Band::new("9-12", "Preteen", 9),
        ];
        let items = vec![
            ContentItem::new("peekaboo", "activity", "Peekaboo with a scarf")
                .with_band("0-2")
                .with_tags(&["calm", "bond"]),
            ContentItem::new("stack-cups", "activity", "Stacking cups tower")
                .with_band("0-2")
                .with_tags(&["create"]),
            ContentItem::new("bath-song", "activity", "Bath time song")
                .with_band("0-2")
                .with_tags(&["calm", "music"]),
            ContentItem::new("animal-walk", "activity", "Animal walk relay")
                .with_band("3-5")
                .with_tags(&["move"]),
            ContentItem::new("cloud-shapes", "activity", "Find shapes in the clouds")
                .with_band("3-5")
                .with_tags(&["calm", "outdoor"]),
            ContentItem::new("finger-paint", "activity", "Finger painting")
                .with_band("3-5")
                .with_tags(&["create"]),
            ContentItem::new("breathing-bear", "activity", "Belly breathing with a teddy")
                .with_band("3-5")
                .with_tags(&["calm"]),
            ContentItem::new("obstacle", "activity", "Living room obstacle course")
                .with_band("6-8")
                .with_tags(&["move"]),
            ContentItem::new("comic-strip", "activity", "Draw a three-panel comic")
                .with_band("6-8")
                .with_tags(&["create"]),
            ContentItem::new("bug-hunt", "activity", "Backyard bug hunt")
                .with_band("6-8")
                .with_tags(&["outdoor", "move"]),
            ContentItem::new("story-dice", "activity", "Story dice")
                .with_band("6-8")
                .with_tags(&["create", "calm"]),
            ContentItem::new("bike-loop", "activity", "Neighbourhood bike loop")
                .with_band("9-12")
                .with_tags(&["move", "outdoor"]),
            ContentItem::new("recipe", "activity", "Cook a recipe together")
                .with_band("9-12")
                .with_tags(&["create", "bond"]),
            ContentItem::new("stop-motion", "activity", "Make a stop-motion clip")
                .with_band("9-12")
                .with_tags(&["create"]),
            ContentItem::new("gratitude", "reflection", "Three good things").with_tags(&["calm"]),
        ];
        Catalog::new(bands, items).with_default(ContentItem::new(
            "free-play",
            "activity",
            "Free play: let them lead",
        ))
    }
}

type Candidate<'a> = (Option<(&'a Band, u32)>, Vec<ContentItem>);

/// First candidate with at least `min_viable` items, else the first
/// non-empty one.
fn first_viable<'a>(
    candidates: impl Iterator<Item = Candidate<'a>>,
    min_viable: usize,
) -> Option<Candidate<'a>> {
    let mut fallback = None;
    for (band, items) in candidates {
        if items.len() >= min_viable {
            return Some((band, items));
        }
        if fallback.is_none() && !items.is_empty() {
            fallback = Some((band, items));
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::new(
            vec![
                Band::new("a", "A", 0),
                Band::new("b", "B", 10),
                Band::new("c", "C", 20),
                Band::new("d", "D", 30),
            ],
            vec![
                ContentItem::new("a1", "activity", "A one").with_band("a").with_tags(&["x"]),
                ContentItem::new("a2", "activity", "A two").with_band("a").with_tags(&["x"]),
                ContentItem::new("c1", "activity", "C one").with_band("c").with_tags(&["y"]),
                ContentItem::new("c2", "activity", "C two").with_band("c").with_tags(&["y"]),
                ContentItem::new("d1", "activity", "D one").with_band("d").with_tags(&["z"]),
            ],
        )
    }

    fn ids(pool: &Pool) -> Vec<&str> {
        pool.items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn exact_match() {
        let pool = catalog().pool(&PoolQuery::new().band("a"), 2).unwrap();
        assert_eq!(pool.source, PoolSource::Exact);
        assert_eq!(ids(&pool), ["a1", "a2"]);
    }

    #[test]
    fn empty_band_widens_to_nearest() {
        // "b" has nothing; "a" and "c" are both 10 away, "a" is declared first.
        let pool = catalog().pool(&PoolQuery::new().band("b"), 2).unwrap();
        assert_eq!(
            pool.source,
            PoolSource::NearestBand {
                band: "a".into(),
                distance: 10
            }
        );
        assert_eq!(ids(&pool), ["a1", "a2"]);
    }

    #[test]
    fn thin_band_prefers_viable_neighbour() {
        // "d" has one item, below the minimum; "c" has two.
        let pool = catalog().pool(&PoolQuery::new().band("d"), 2).unwrap();
        assert_eq!(
            pool.source,
            PoolSource::NearestBand {
                band: "c".into(),
                distance: 10
            }
        );
    }

    #[test]
    fn thin_band_kept_when_nothing_better() {
        let pool = catalog()
            .pool(&PoolQuery::new().band("d").tag("z"), 2)
            .unwrap();
        assert_eq!(pool.source, PoolSource::Exact);
        assert_eq!(ids(&pool), ["d1"]);
    }

    #[test]
    fn tag_filter_follows_bands() {
        let pool = catalog()
            .pool(&PoolQuery::new().band("a").tag("y"), 2)
            .unwrap();
        assert_eq!(
            pool.source,
            PoolSource::NearestBand {
                band: "c".into(),
                distance: 20
            }
        );
    }

    #[test]
    fn unknown_tag_relaxes_filter() {
        let pool = catalog()
            .pool(&PoolQuery::new().band("c").tag("nope"), 2)
            .unwrap();
        assert_eq!(
            pool.source,
            PoolSource::TagsRelaxed {
                band: Some("c".into())
            }
        );
        assert_eq!(ids(&pool), ["c1", "c2"]);
    }

    #[test]
    fn default_item_when_nothing_matches() {
        let catalog = Catalog::new(vec![Band::new("a", "A", 0)], vec![])
            .with_default(ContentItem::new("fallback", "activity", "Fallback"));
        let pool = catalog.pool(&PoolQuery::new().band("a").tag("x"), 2).unwrap();
        assert_eq!(pool.source, PoolSource::Default);
        assert_eq!(ids(&pool), ["fallback"]);
    }

    #[test]
    fn empty_catalog_without_default_is_empty_pool() {
        let catalog = Catalog::default();
        assert_eq!(
            catalog.pool(&PoolQuery::new().band("a"), 2),
            Err(SelectionError::EmptyPool)
        );
    }

    #[test]
    fn unknown_band_measures_from_first_band() {
        let catalog = catalog();
        let order: Vec<&str> = catalog
            .bands_by_distance(Some("zz"))
            .into_iter()
            .map(|(b, _)| b.id.as_str())
            .collect();
        assert_eq!(order, ["a", "b", "c", "d"]);
    }

    #[test]
    fn unbanded_items_match_every_band() {
        let mut catalog = catalog();
        catalog
            .items
            .push(ContentItem::new("any", "reflection", "Any band").with_tags(&["x"]));
        let pool = catalog.pool(&PoolQuery::new().band("b").tag("x"), 1).unwrap();
        assert_eq!(pool.source, PoolSource::Exact);
        assert_eq!(ids(&pool), ["any"]);
    }

    #[test]
    fn builtin_never_empty_for_any_band() {
        let catalog = Catalog::builtin();
        for band in ["0-2", "3-5", "6-8", "9-12", "13-17"] {
            for tag in [None, Some("calm"), Some("move"), Some("music"), Some("unknown")] {
                let mut query = PoolQuery::new().band(band);
                if let Some(t) = tag {
                    query = query.tag(t);
                }
                let pool = catalog.pool(&query, 2).unwrap();
                assert!(!pool.items.is_empty(), "{band} {tag:?}");
            }
        }
    }

    #[test]
    fn query_context_key() {
        let query = PoolQuery::new().band("3-5").tag("move").tag("calm");
        assert_eq!(query.context_key().as_str(), "band=3-5|focus=calm,move");
        assert_eq!(PoolQuery::new().context_key().as_str(), "");
    }

    #[test]
    fn comma_in_tag_does_not_merge_contexts() {
        let two_tags = PoolQuery::new().band("6-8").tag("calm").tag("create");
        let one_tag = PoolQuery::new().band("6-8").tag("calm,create");
        assert_ne!(two_tags.context_key(), one_tag.context_key());

        let catalog = Catalog::builtin();
        assert_eq!(catalog.pool(&two_tags, 1).unwrap().source, PoolSource::Exact);
        assert!(matches!(
            catalog.pool(&one_tag, 1).unwrap().source,
            PoolSource::TagsRelaxed { .. }
        ));
    }

    #[test]
    fn json_catalog_defaults_kind() {
        let raw = r#"{
            "bands": [{"id": "a", "ordinal": 0}],
            "items": [{"id": "i", "title": "Item", "band": "a", "tags": ["x"]}]
        }"#;
        let catalog = Catalog::from_json(raw).unwrap();
        assert_eq!(catalog.items[0].kind, "activity");
        assert!(catalog.default_item.is_none());
    }

    #[test]
    fn json_catalog_rejects_duplicate_bands() {
        let raw = r#"{"bands": [{"id": "a", "ordinal": 0}, {"id": "a", "ordinal": 1}], "items": []}"#;
        assert!(matches!(Catalog::from_json(raw), Err(CoreError::Catalog(_))));
    }
}
