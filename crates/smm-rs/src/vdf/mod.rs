//! Valve's text key-value format, as found in `localconfig.vdf`.
//!
//! A [`VdfDocument`] is an ordered, string keyed tree. Keys are unique per
//! level (last write wins, the first position is kept) and iteration follows
//! insertion order, which both [`serialize`] and the depth-first lookups rely
//! on.

mod codec;
mod escape;

pub use codec::{ParseWarning, parse, parse_with_warnings, serialize};
pub use escape::{escape, quote, unescape, unquote};

use indexmap::IndexMap;
use std::fmt;

/// A value stored under a key: either a leaf string or a nested object.
///
/// Leaf strings are kept verbatim, including any surrounding double quotes
/// present in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VdfValue {
    String(String),
    Object(VdfDocument),
}

impl VdfValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            VdfValue::String(s) => Some(s),
            VdfValue::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&VdfDocument> {
        match self {
            VdfValue::Object(object) => Some(object),
            VdfValue::String(_) => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut VdfDocument> {
        match self {
            VdfValue::Object(object) => Some(object),
            VdfValue::String(_) => None,
        }
    }
}

impl From<&str> for VdfValue {
    fn from(value: &str) -> Self {
        VdfValue::String(value.to_owned())
    }
}

impl From<String> for VdfValue {
    fn from(value: String) -> Self {
        VdfValue::String(value)
    }
}

impl From<VdfDocument> for VdfValue {
    fn from(value: VdfDocument) -> Self {
        VdfValue::Object(value)
    }
}

#[derive(Debug, Clone, Default, Eq)]
pub struct VdfDocument {
    entries: IndexMap<String, VdfValue>,
}

impl VdfDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks `key` up at this level only.
    pub fn get(&self, key: &str) -> Option<&VdfValue> {
        self.entries.get(key)
    }

    /// Inserts or overwrites `key` at this level, returning the previous value.
    ///
    /// An overwritten key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<VdfValue>) -> Option<VdfValue> {
        self.entries.insert(key.into(), value.into())
    }

    /// The first entry in insertion order.
    pub fn first(&self) -> Option<(&str, &VdfValue)> {
        self.entries.first().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VdfValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Depth-first pre-order search for `key`.
    ///
    /// The current level is checked before any child object is entered, and
    /// children are visited in insertion order, so the shallowest and earliest
    /// match wins.
    pub fn find_entry(&self, key: &str) -> Option<&VdfValue> {
        if let Some(value) = self.entries.get(key) {
            return Some(value);
        }
        self.entries
            .values()
            .filter_map(VdfValue::as_object)
            .find_map(|child| child.find_entry(key))
    }

    /// Mutable counterpart of [`VdfDocument::find_entry`], same visiting order.
    pub fn find_entry_mut(&mut self, key: &str) -> Option<&mut VdfValue> {
        if self.entries.contains_key(key) {
            return self.entries.get_mut(key);
        }
        self.entries
            .values_mut()
            .filter_map(VdfValue::as_object_mut)
            .find_map(|child| child.find_entry_mut(key))
    }

    /// Replaces the value of the first `key` found by [`VdfDocument::find_entry`].
    ///
    /// Exactly one occurrence is touched. Returns `false` when `key` appears
    /// nowhere in the tree.
    pub fn replace_first(&mut self, key: &str, value: impl Into<VdfValue>) -> bool {
        match self.find_entry_mut(key) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }
}

impl PartialEq for VdfDocument {
    /// Structural equality, including entry order.
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len() && self.entries.iter().eq(other.entries.iter())
    }
}

impl<K: Into<String>> FromIterator<(K, VdfValue)> for VdfDocument {
    fn from_iter<I: IntoIterator<Item = (K, VdfValue)>>(iter: I) -> Self {
        let mut document = VdfDocument::new();
        for (key, value) in iter {
            document.insert(key, value);
        }
        document
    }
}

impl fmt::Display for VdfDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&serialize(self))
    }
}
