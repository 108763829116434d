//! Namespaced key-value store.
//!
//! Every component persists through a [`Store`], which wraps a
//! [`KvBackend`] and prefixes each key with a fixed namespace. The store is
//! best-effort: a failing backend degrades reads to "absent" and writes to
//! no-ops, so callers behave as if the feature were used for the first time
//! that day.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;

/// A synchronous string key-value backend.
///
/// Implementations are single-writer and take `&self`; interior mutability
/// is up to the backend.
pub trait KvBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<B: KvBackend + ?Sized> KvBackend for Rc<B> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// In-process backend. Nothing outlives the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw keys currently held, including the namespace prefix.
    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Backend for sandboxed or disabled storage. Every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableBackend;

impl KvBackend for UnavailableBackend {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }
}

/// Outcome of a typed read.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Present(T),
    Absent,
    /// A value exists but does not parse into the expected shape.
    Corrupt(String),
}

impl<T> Decoded<T> {
    /// Collapse to an option, treating corrupt values as absent.
    pub fn ok(self) -> Option<T> {
        match self {
            Decoded::Present(v) => Some(v),
            Decoded::Absent | Decoded::Corrupt(_) => None,
        }
    }
}

/// Namespaced, best-effort view over a backend.
pub struct Store {
    backend: Box<dyn KvBackend>,
    prefix: String,
}

impl Store {
    pub fn new(backend: Box<dyn KvBackend>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
        }
    }

    /// An in-memory store, mostly for tests.
    pub fn in_memory(prefix: impl Into<String>) -> Self {
        Self::new(Box::new(MemoryBackend::new()), prefix)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    /// Read a raw value. Backend failures read as absent.
    pub fn get(&self, key: &str) -> Option<String> {
        let full = self.full_key(key);
        match self.backend.get(&full) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key = %full, error = %e, "store read failed, treating as miss");
                None
            }
        }
    }

    /// Write a raw value. Returns whether the write reached the backend.
    pub fn set(&self, key: &str, value: &str) -> bool {
        let full = self.full_key(key);
        match self.backend.set(&full, value) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key = %full, error = %e, "store write failed, dropping");
                false
            }
        }
    }

    /// Remove a value. Returns whether the removal reached the backend.
    pub fn remove(&self, key: &str) -> bool {
        let full = self.full_key(key);
        match self.backend.remove(&full) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key = %full, error = %e, "store remove failed");
                false
            }
        }
    }

    /// Read and decode a JSON value.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Decoded<T> {
        match self.get(key) {
            None => Decoded::Absent,
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(v) => Decoded::Present(v),
                Err(e) => Decoded::Corrupt(e.to_string()),
            },
        }
    }

    /// Encode and write a JSON value.
    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw),
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to encode record");
                false
            }
        }
    }

    /// Read an unsigned counter. Missing or malformed counters read as zero.
    pub fn get_counter(&self, key: &str) -> u64 {
        self.get(key)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(0)
    }

    pub fn set_counter(&self, key: &str, value: u64) -> bool {
        self.set(key, &value.to_string())
    }
}
