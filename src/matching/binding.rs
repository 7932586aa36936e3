//! Variable bindings and the multiset algebra over them.
//!
//! A [`Binding`] maps pattern variables to values; a variable may be present
//! but unassigned, which is distinct from being bound. A [`ResultSet`] is a
//! multiset of bindings: two different paths producing identical bindings
//! count twice.
//!
//! `union` is multiset sum (identity: [`ResultSet::empty`]); `product` joins
//! every compatible pair (identity: [`ResultSet::epsilon`], absorbing:
//! [`ResultSet::empty`]).

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::graph::value::PropValue;

/// One tuple of variable bindings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Binding {
    slots: BTreeMap<String, Option<PropValue>>,
}

impl Binding {
    /// The fully-unassigned binding.
    pub fn new() -> Self {
        Self::default()
    }

    /// A binding declaring `names` without assigning them.
    pub fn with_unassigned<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: names.into_iter().map(|name| (name.into(), None)).collect(),
        }
    }

    /// Builder-style assignment that overwrites any previous value.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.slots.insert(name.into(), Some(value.into()));
        self
    }

    /// Assigns `name` unless it already holds a different value.
    ///
    /// Returns `false` on conflict, leaving the binding untouched.
    pub fn assign(&mut self, name: &str, value: PropValue) -> bool {
        match self.slots.get_mut(name) {
            Some(Some(existing)) => *existing == value,
            Some(slot) => {
                *slot = Some(value);
                true
            }
            None => {
                self.slots.insert(name.to_owned(), Some(value));
                true
            }
        }
    }

    /// Value bound to `name`; `None` if absent or unassigned.
    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.slots.get(name).and_then(Option::as_ref)
    }

    /// Returns `true` if `name` is declared, assigned or not.
    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Returns `true` if `name` holds a value.
    pub fn is_assigned(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of declared variables.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` when no variable is declared.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates declared variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&PropValue>)> {
        self.slots.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Joins two bindings.
    ///
    /// An unassigned side takes the other side's value; equal values
    /// (numerically, for numbers) are kept; differing values make the pair
    /// incompatible and yield `None`.
    pub fn merge(&self, other: &Binding) -> Option<Binding> {
        let mut merged = self.clone();
        for (name, theirs) in &other.slots {
            let Some(theirs) = theirs else {
                merged.slots.entry(name.clone()).or_insert(None);
                continue;
            };
            match merged.slots.entry(name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(Some(theirs.clone()));
                }
                Entry::Occupied(mut slot) => {
                    if let Some(mine) = slot.get() {
                        if mine != theirs {
                            return None;
                        }
                    } else {
                        slot.insert(Some(theirs.clone()));
                    }
                }
            }
        }
        Some(merged)
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (name, value)) in self.slots.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            match value {
                Some(value) => write!(f, "{name}={value}")?,
                None => write!(f, "{name}=_")?,
            }
        }
        f.write_str("}")
    }
}

impl<K: Into<String>, V: Into<PropValue>> FromIterator<(K, V)> for Binding {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Binding::new(), |binding, (k, v)| binding.bind(k, v))
    }
}

/// Multiset of [`Binding`]s produced by a traversal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(Binding, usize)>", into = "Vec<(Binding, usize)>")]
pub struct ResultSet {
    counts: FxHashMap<Binding, usize>,
}

impl ResultSet {
    /// The empty multiset.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The multiset holding exactly one fully-unassigned binding.
    pub fn epsilon() -> Self {
        Self::singleton(Binding::new())
    }

    /// A multiset holding `binding` once.
    pub fn singleton(binding: Binding) -> Self {
        let mut set = Self::empty();
        set.add(binding);
        set
    }

    /// Adds one occurrence of `binding`.
    pub fn add(&mut self, binding: Binding) {
        self.add_times(binding, 1);
    }

    /// Adds `count` occurrences of `binding`.
    pub fn add_times(&mut self, binding: Binding, count: usize) {
        if count > 0 {
            *self.counts.entry(binding).or_insert(0) += count;
        }
    }

    /// Returns `true` when the multiset holds nothing.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total number of elements, counting multiplicity.
    pub fn len(&self) -> usize {
        self.counts.values().sum()
    }

    /// Number of distinct bindings.
    pub fn distinct_len(&self) -> usize {
        self.counts.len()
    }

    /// How many times `binding` occurs.
    pub fn multiplicity(&self, binding: &Binding) -> usize {
        self.counts.get(binding).copied().unwrap_or(0)
    }

    /// Returns `true` if `binding` occurs at least once.
    pub fn contains(&self, binding: &Binding) -> bool {
        self.counts.contains_key(binding)
    }

    /// Iterates every element, repeating bindings by multiplicity.
    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.counts
            .iter()
            .flat_map(|(binding, &count)| std::iter::repeat(binding).take(count))
    }

    /// Iterates distinct bindings with their multiplicity.
    pub fn entries(&self) -> impl Iterator<Item = (&Binding, usize)> {
        self.counts.iter().map(|(binding, &count)| (binding, count))
    }

    /// Multiset sum.
    pub fn union(mut self, mut other: ResultSet) -> ResultSet {
        if self.counts.len() < other.counts.len() {
            std::mem::swap(&mut self, &mut other);
        }
        for (binding, count) in other.counts {
            self.add_times(binding, count);
        }
        self
    }

    /// Join of every compatible pair drawn from `self × other`.
    pub fn product(&self, other: &ResultSet) -> ResultSet {
        let mut joined = ResultSet::empty();
        for (left, &left_count) in &self.counts {
            for (right, &right_count) in &other.counts {
                if let Some(merged) = left.merge(right) {
                    joined.add_times(merged, left_count * right_count);
                }
            }
        }
        joined
    }
}

impl FromIterator<Binding> for ResultSet {
    fn from_iter<I: IntoIterator<Item = Binding>>(iter: I) -> Self {
        let mut set = ResultSet::empty();
        set.extend(iter);
        set
    }
}

impl Extend<Binding> for ResultSet {
    fn extend<I: IntoIterator<Item = Binding>>(&mut self, iter: I) {
        for binding in iter {
            self.add(binding);
        }
    }
}

impl From<Vec<(Binding, usize)>> for ResultSet {
    fn from(entries: Vec<(Binding, usize)>) -> Self {
        let mut set = ResultSet::empty();
        for (binding, count) in entries {
            set.add_times(binding, count);
        }
        set
    }
}

impl From<ResultSet> for Vec<(Binding, usize)> {
    fn from(set: ResultSet) -> Self {
        set.counts.into_iter().collect()
    }
}
