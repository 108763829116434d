//! Deterministic daily selection.
//!
//! A pick is a pure function of `(date_key, context_key, pool_size)`: the
//! string `"<date_key>:<context_key>"` is hashed and reduced modulo the pool
//! size. No clock, no randomness, no I/O, so the same day and context give
//! the same index in every process.

use crate::context::ContextKey;
use crate::date_key::DateKey;
use crate::error::SelectionError;

/// String hash used for selection. Must be stable across processes and
/// platforms; `std`'s `DefaultHasher` is not.
pub trait KeyHasher {
    fn hash(&self, input: &str) -> u32;
}

/// Multiplicative rolling hash, `h = h * 31 + byte`, wrapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct RollingHash;

impl KeyHasher for RollingHash {
    fn hash(&self, input: &str) -> u32 {
        input
            .bytes()
            .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(u32::from(b)))
    }
}

/// 32-bit FNV-1a.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fnv1a;

impl KeyHasher for Fnv1a {
    fn hash(&self, input: &str) -> u32 {
        const OFFSET: u32 = 0x811c_9dc5;
        const PRIME: u32 = 0x0100_0193;
        input
            .bytes()
            .fold(OFFSET, |h, b| (h ^ u32::from(b)).wrapping_mul(PRIME))
    }
}

/// Maps a day and a context to a stable index.
#[derive(Debug, Default, Clone)]
pub struct DeterministicSelector<H = RollingHash> {
    hasher: H,
}

impl DeterministicSelector<RollingHash> {
    pub fn new() -> Self {
        Self { hasher: RollingHash }
    }
}

impl<H: KeyHasher> DeterministicSelector<H> {
    pub fn with_hasher(hasher: H) -> Self {
        Self { hasher }
    }

    /// Index in `[0, pool_size)` for this day and context.
    ///
    /// # Errors
    /// [`SelectionError::InvalidPoolSize`] when `pool_size` is zero; callers
    /// must run the fallback cascade first.
    pub fn select_index(
        &self,
        date_key: &DateKey,
        context_key: &ContextKey,
        pool_size: usize,
    ) -> Result<usize, SelectionError> {
        if pool_size == 0 {
            return Err(SelectionError::InvalidPoolSize(pool_size));
        }
        let seed = format!("{date_key}:{context_key}");
        let hash = self.hasher.hash(&seed) as usize;
        Ok(hash % pool_size)
    }

    /// Pick one element of `pool`.
    ///
    /// # Errors
    /// [`SelectionError::EmptyPool`] for an empty slice.
    pub fn select<'a, T>(
        &self,
        date_key: &DateKey,
        context_key: &ContextKey,
        pool: &'a [T],
    ) -> Result<&'a T, SelectionError> {
        if pool.is_empty() {
            return Err(SelectionError::EmptyPool);
        }
        let index = self.select_index(date_key, context_key, pool.len())?;
        Ok(&pool[index])
    }
}
