//! Round-robin rotation for "generate again".
//!
//! Each regeneration bumps a persisted counter for the feature and context;
//! the pool is rotated by that counter so every candidate comes up first
//! once before any repeats.

use std::collections::HashSet;

use crate::catalog::ContentItem;
use crate::context::ContextKey;
use crate::storage::Store;

/// `pool` rotated left so that `pool[generation % len]` comes first.
/// An empty pool gives an empty result.
pub fn rotate<T: Clone>(pool: &[T], generation: u64) -> Vec<T> {
    if pool.is_empty() {
        return Vec::new();
    }
    let start = (generation % pool.len() as u64) as usize;
    pool[start..].iter().chain(&pool[..start]).cloned().collect()
}

/// Concatenate candidate lists, keeping the first item for each
/// `(kind, title)` pair.
pub fn merge_sources<I>(sources: I) -> Vec<ContentItem>
where
    I: IntoIterator<Item = Vec<ContentItem>>,
{
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .flatten()
        .filter(|item| seen.insert(item.dedup_key()))
        .collect()
}

/// Rotation with a persisted generation counter per feature and context.
pub struct RotationPicker<'a> {
    store: &'a Store,
    feature: String,
}

impl<'a> RotationPicker<'a> {
    pub fn new(store: &'a Store, feature: &str) -> Self {
        Self {
            store,
            feature: feature.to_string(),
        }
    }

    fn counter_key(&self, context: &ContextKey) -> String {
        format!("gen:{}:{}", self.feature, context)
    }

    /// How many generations have been handed out for `context`.
    pub fn generation(&self, context: &ContextKey) -> u64 {
        self.store.get_counter(&self.counter_key(context))
    }

    /// The next `take` items without advancing.
    pub fn peek(&self, context: &ContextKey, pool: &[ContentItem], take: usize) -> Vec<ContentItem> {
        let mut rotated = rotate(pool, self.generation(context));
        rotated.truncate(take);
        rotated
    }

    /// The next `take` items; advances the counter when the pool is non-empty.
    pub fn next(&self, context: &ContextKey, pool: &[ContentItem], take: usize) -> Vec<ContentItem> {
        let generation = self.generation(context);
        let mut rotated = rotate(pool, generation);
        rotated.truncate(take);
        if !rotated.is_empty() {
            self.store
                .set_counter(&self.counter_key(context), generation.saturating_add(1));
        }
        rotated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn items(titles: &[&str]) -> Vec<ContentItem> {
        titles
            .iter()
            .map(|t| ContentItem::new(t, "activity", t))
            .collect()
    }

    #[test]
    fn rotates_with_wraparound() {
        let pool = [1, 2, 3, 4];
        assert_eq!(rotate(&pool, 0), vec![1, 2, 3, 4]);
        assert_eq!(rotate(&pool, 1), vec![2, 3, 4, 1]);
        assert_eq!(rotate(&pool, 3), vec![4, 1, 2, 3]);
        assert_eq!(rotate(&pool, 4), vec![1, 2, 3, 4]);
        assert_eq!(rotate(&pool, 9), vec![2, 3, 4, 1]);
    }

    #[test]
    fn empty_pool_rotates_to_empty() {
        let pool: [u8; 0] = [];
        assert!(rotate(&pool, 5).is_empty());
    }

    #[test]
    fn first_elements_cover_pool() {
        let pool = ["a", "b", "c", "d", "e"];
        let firsts: Vec<&str> = (0..pool.len() as u64).map(|g| rotate(&pool, g)[0]).collect();
        assert_eq!(firsts, pool);
        assert_eq!(rotate(&pool, pool.len() as u64)[0], "a");
    }

    #[test]
    fn merge_collapses_kind_and_title() {
        let catalog = items(&["Bug hunt", "Story dice"]);
        let generated = vec![
            ContentItem::new("gen-1", "activity", "  bug HUNT "),
            ContentItem::new("gen-2", "reflection", "Bug hunt"),
            ContentItem::new("gen-3", "activity", "Kite flying"),
        ];
        let merged = merge_sources([catalog, generated]);
        let ids: Vec<&str> = merged.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["Bug hunt", "Story dice", "gen-2", "gen-3"]);
    }

    #[test]
    fn picker_advances_and_persists() {
        let store = Store::in_memory("t");
        let pool = items(&["a", "b", "c"]);
        let ctx = ContextKey::for_band("3-5");
        let picker = RotationPicker::new(&store, "plan");

        assert_eq!(picker.peek(&ctx, &pool, 1)[0].id, "a");
        assert_eq!(picker.generation(&ctx), 0);

        let firsts: Vec<String> = (0..4)
            .map(|_| picker.next(&ctx, &pool, 2)[0].id.clone())
            .collect();
        assert_eq!(firsts, ["a", "b", "c", "a"]);
        assert_eq!(picker.generation(&ctx), 4);

        // Counter is per feature and context, and survives a new picker.
        let again = RotationPicker::new(&store, "plan");
        assert_eq!(again.generation(&ctx), 4);
        assert_eq!(RotationPicker::new(&store, "story").generation(&ctx), 0);
        assert_eq!(again.generation(&ContextKey::for_band("6-8")), 0);
    }

    #[test]
    fn picker_take_limits_output() {
        let store = Store::in_memory("t");
        let pool = items(&["a", "b", "c"]);
        let ctx = ContextKey::raw("c");
        let picker = RotationPicker::new(&store, "plan");
        let got: Vec<String> = picker.next(&ctx, &pool, 2).into_iter().map(|i| i.id).collect();
        assert_eq!(got, ["a", "b"]);
        assert_eq!(picker.next(&ctx, &pool, 10).len(), 3);
    }

    #[test]
    fn empty_pool_does_not_advance() {
        let store = Store::in_memory("t");
        let ctx = ContextKey::raw("c");
        let picker = RotationPicker::new(&store, "plan");
        assert!(picker.next(&ctx, &[], 3).is_empty());
        assert_eq!(picker.generation(&ctx), 0);
    }

    proptest! {
        #[test]
        fn rotation_is_a_permutation(len in 1usize..40, generation in 0u64..10_000) {
            let pool: Vec<usize> = (0..len).collect();
            let rotated = rotate(&pool, generation);
            prop_assert_eq!(rotated.len(), len);
            prop_assert_eq!(rotated[0], (generation % len as u64) as usize);
            for pair in rotated.windows(2) {
                prop_assert_eq!(pair[1], (pair[0] + 1) % len);
            }
        }
    }
}
