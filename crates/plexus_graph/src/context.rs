// SPDX-License-Identifier: MIT OR Apache-2.0
//! Evaluation context.
//!
//! A [`Context`] is an immutable set of named entries (frame, scene path,
//! loop index, ...) that parameterizes an evaluation. Contexts are passed
//! explicitly through every evaluation call; deriving a new context with
//! [`Context::with`] leaves the original untouched, so worker threads never
//! share a mutable "current" context.

use crate::fingerprint::{Fingerprint, FingerprintHasher};
use crate::value::PlugValue;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name of the frame entry
pub const FRAME: &str = "frame";

/// Immutable, hashable evaluation environment
#[derive(Debug, Clone)]
pub struct Context {
    entries: Arc<BTreeMap<String, PlugValue>>,
    hash: Fingerprint,
}

impl Context {
    /// Create an empty context with no frame entry
    pub fn empty() -> Self {
        Self::from_entries(BTreeMap::new())
    }

    /// Create a context at the given frame
    pub fn at_frame(frame: f32) -> Self {
        Self::default().with_frame(frame)
    }

    fn from_entries(entries: BTreeMap<String, PlugValue>) -> Self {
        let mut hasher = FingerprintHasher::new();
        hasher.append_u64(entries.len() as u64);
        for (name, value) in &entries {
            hasher.append_str(name);
            value.hash_into(&mut hasher);
        }
        Self {
            entries: Arc::new(entries),
            hash: hasher.finish(),
        }
    }

    /// Get an entry
    pub fn get(&self, name: &str) -> Option<&PlugValue> {
        self.entries.get(name)
    }

    /// Get a float entry, converting integers
    pub fn get_float(&self, name: &str) -> Option<f32> {
        self.get(name).and_then(PlugValue::as_float)
    }

    /// Get a string entry
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PlugValue::as_str)
    }

    /// Current frame, 0 if unset
    pub fn frame(&self) -> f32 {
        self.get_float(FRAME).unwrap_or(0.0)
    }

    /// Whether an entry exists
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate over entries in name order
    pub fn entries(&self) -> impl Iterator<Item = (&String, &PlugValue)> {
        self.entries.iter()
    }

    /// Derive a context with one entry set
    pub fn with(&self, name: impl Into<String>, value: impl Into<PlugValue>) -> Self {
        let name = name.into();
        let value = value.into();
        if self.entries.get(&name) == Some(&value) {
            return self.clone();
        }
        let mut entries = (*self.entries).clone();
        entries.insert(name, value);
        Self::from_entries(entries)
    }

    /// Derive a context at another frame
    pub fn with_frame(&self, frame: f32) -> Self {
        self.with(FRAME, frame)
    }

    /// Derive a context with one entry removed
    pub fn without(&self, name: &str) -> Self {
        if !self.entries.contains_key(name) {
            return self.clone();
        }
        let mut entries = (*self.entries).clone();
        entries.remove(name);
        Self::from_entries(entries)
    }

    /// Fingerprint of all entries
    pub fn hash(&self) -> Fingerprint {
        self.hash
    }
}

impl Default for Context {
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(FRAME.to_string(), PlugValue::Float(1.0));
        Self::from_entries(entries)
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.entries == other.entries
    }
}
