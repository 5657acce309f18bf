//! Keyed contour storage with an explicit iteration order.
//!
//! Every entry carries a rank. Iteration walks ranks ascending.
//! Labeling an entry, or inserting an already labeled one, gives it a
//! rank below every other rank (front); unlabeling it or inserting an
//! unlabeled one gives it a rank above every other rank (back). Labels
//! only change through the registry, so labeled entries always form a
//! prefix of the iteration order.

use std::collections::BTreeMap;

use crate::contour::Contour;
use crate::types::{ContourKey, Point};

#[derive(Debug, Clone)]
struct Entry {
    contour: Contour,
    rank: i64,
}

/// Contours by key, iterated in user-visible order.
#[derive(Debug, Clone, Default)]
pub struct ContourRegistry {
    entries: BTreeMap<ContourKey, Entry>,
    order: BTreeMap<i64, ContourKey>,
}

impl ContourRegistry {
    /// An empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            order: BTreeMap::new(),
        }
    }

    /// A registry holding `discovered` under keys `0..N`, in discovery order.
    #[must_use]
    pub fn from_discovered(discovered: impl IntoIterator<Item = Contour>) -> Self {
        let mut registry = Self::new();
        for contour in discovered {
            let key = registry.next_key();
            registry.insert(key, contour);
        }
        registry
    }

    /// Number of contours.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry holds no contours.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: ContourKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// The contour stored under `key`.
    #[must_use]
    pub fn get(&self, key: ContourKey) -> Option<&Contour> {
        self.entries.get(&key).map(|e| &e.contour)
    }

    /// Mutable access to the contour stored under `key`.
    pub fn get_mut(&mut self, key: ContourKey) -> Option<&mut Contour> {
        self.entries.get_mut(&key).map(|e| &mut e.contour)
    }

    /// Entries in iteration order.
    pub fn iter(&self) -> impl Iterator<Item = (ContourKey, &Contour)> + '_ {
        self.order
            .values()
            .filter_map(|&key| self.entries.get(&key).map(|e| (key, &e.contour)))
    }

    /// Keys in iteration order.
    pub fn keys(&self) -> impl Iterator<Item = ContourKey> + '_ {
        self.order.values().copied()
    }

    /// The largest key in use.
    #[must_use]
    pub fn max_key(&self) -> Option<ContourKey> {
        self.entries.keys().next_back().copied()
    }

    /// The key the next inserted contour should use: one past the
    /// current maximum, or 0 when empty.
    #[must_use]
    pub fn next_key(&self) -> ContourKey {
        self.max_key().map_or(ContourKey(0), |k| ContourKey(k.0 + 1))
    }

    /// Labeled entries: the prefix of the iteration order.
    pub fn labeled(&self) -> impl Iterator<Item = (ContourKey, &Contour)> + '_ {
        self.iter().take_while(|(_, c)| c.is_labeled())
    }

    /// Store `contour` under `key`: at the front of the order when it is
    /// labeled, otherwise at the back.
    ///
    /// An existing entry under `key` is replaced.
    pub fn insert(&mut self, key: ContourKey, contour: Contour) {
        if let Some(old) = self.entries.remove(&key) {
            self.order.remove(&old.rank);
        }
        let rank = if contour.is_labeled() {
            self.front_rank()
        } else {
            self.back_rank()
        };
        self.order.insert(rank, key);
        self.entries.insert(key, Entry { contour, rank });
    }

    /// Remove `key`, dropping it from every other contour's children.
    pub fn remove(&mut self, key: ContourKey) -> Option<Contour> {
        let entry = self.entries.remove(&key)?;
        self.order.remove(&entry.rank);
        for other in self.entries.values_mut() {
            other.contour.remove_child(key);
        }
        Some(entry.contour)
    }

    /// Remove every contour.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn move_to_front(&mut self, key: ContourKey) -> bool {
        let rank = self.front_rank();
        self.rerank(key, rank)
    }

    fn move_to_back(&mut self, key: ContourKey) -> bool {
        let rank = self.back_rank();
        self.rerank(key, rank)
    }

    /// Label `key` and move it to the front, or clear its label and
    /// move it to the back when `label` is empty.
    ///
    /// Returns false when `key` is absent.
    pub fn set_label(&mut self, key: ContourKey, label: String, coordinate: Option<Point>) -> bool {
        let Some(entry) = self.entries.get_mut(&key) else {
            return false;
        };
        let labeled = !label.is_empty();
        entry.contour.set_label(label, coordinate);
        if labeled {
            self.move_to_front(key)
        } else {
            self.move_to_back(key)
        }
    }

    fn rerank(&mut self, key: ContourKey, rank: i64) -> bool {
        let Some(entry) = self.entries.get_mut(&key) else {
            return false;
        };
        self.order.remove(&entry.rank);
        entry.rank = rank;
        self.order.insert(rank, key);
        true
    }

    fn front_rank(&self) -> i64 {
        self.order.keys().next().map_or(0, |r| r - 1)
    }

    fn back_rank(&self) -> i64 {
        self.order.keys().next_back().map_or(0, |r| r + 1)
    }
}
