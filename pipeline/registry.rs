//! # Allele Registry
//!
//! Assigns every distinct allele identifier a dense column index in the order
//! the identifiers are first seen. The registry only ever grows: an identifier
//! keeps its index for the whole run, and indices are contiguous from zero.
//!
//! Once encoding is finished the registry is frozen into a [`Vocabulary`],
//! which has no mutating operations at all.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Insert-or-lookup mapping from allele identifier to column index.
#[derive(Debug, Default, Clone)]
pub struct AlleleRegistry {
    index: AHashMap<String, u32>,
    names: Vec<String>,
}

impl AlleleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `id`, assigning the next free index if `id` has
    /// never been seen. A fresh identifier always receives `self.len()`.
    pub fn intern(&mut self, id: &str) -> u32 {
        if let Some(&existing) = self.index.get(id) {
            return existing;
        }
        let assigned = self.names.len() as u32;
        self.index.insert(id.to_owned(), assigned);
        self.names.push(id.to_owned());
        assigned
    }

    pub fn get(&self, id: &str) -> Option<u32> {
        self.index.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Ends the growth phase.
    pub fn freeze(self) -> Vocabulary {
        Vocabulary {
            index: self.index,
            names: self.names,
        }
    }
}

/// A frozen registry: the column layout of an encoded design matrix.
///
/// Serialized as the list of identifiers in column order; the lookup table is
/// rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    index: AHashMap<String, u32>,
    names: Vec<String>,
}

impl Vocabulary {
    pub fn index_of(&self, id: &str) -> Option<u32> {
        self.index.get(id).copied()
    }

    pub fn name(&self, column: usize) -> Option<&str> {
        self.names.get(column).map(String::as_str)
    }

    /// Identifiers in column order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl PartialEq for Vocabulary {
    fn eq(&self, other: &Self) -> bool {
        self.names == other.names
    }
}

impl Eq for Vocabulary {}

impl From<Vec<String>> for Vocabulary {
    fn from(names: Vec<String>) -> Self {
        let mut registry = AlleleRegistry::new();
        for name in &names {
            registry.intern(name);
        }
        registry.freeze()
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocabulary: Vocabulary) -> Self {
        vocabulary.names
    }
}
