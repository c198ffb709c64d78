//! Client-side certified caches.
//!
//! Stores distinguish three lifecycle states: never loaded, loaded, and
//! explicitly reset ("known empty", which downstream presentation renders
//! differently from "still loading"). Certified data is sticky: an
//! uncertified write never silently replaces certified data; only a
//! certified write, a merge, or an explicit reset may touch it.

use skiff_types::{CertifiedValue, ResourceId};
use std::fmt::Debug;

/// Lifecycle of a store's contents.
///
/// `Unloaded` is "not yet loaded"; `Cleared` is "explicitly known to be
/// empty or invalid". The two must never be conflated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreState<T> {
    Unloaded,
    Loaded(T),
    Cleared,
}

impl<T> StoreState<T> {
    pub fn is_unloaded(&self) -> bool {
        matches!(self, Self::Unloaded)
    }

    pub fn is_cleared(&self) -> bool {
        matches!(self, Self::Cleared)
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            Self::Loaded(v) => Some(v),
            _ => None,
        }
    }
}

// ── Single-value store ──────────────────────────────────────────────────

/// A store holding one certified value (a balance, a metadata record).
pub struct CertifiedCell<T> {
    state: StoreState<CertifiedValue<T>>,
}

impl<T> CertifiedCell<T> {
    pub fn new() -> Self {
        Self {
            state: StoreState::Unloaded,
        }
    }

    /// Store a value. Returns `false` (and leaves the store untouched) when
    /// an uncertified value would replace stored certified data.
    pub fn set(&mut self, value: CertifiedValue<T>) -> bool {
        if let StoreState::Loaded(current) = &self.state {
            if current.certified && !value.certified {
                tracing::debug!("refusing uncertified overwrite of certified value");
                return false;
            }
        }
        self.state = StoreState::Loaded(value);
        true
    }

    pub fn get(&self) -> Option<&CertifiedValue<T>> {
        self.state.loaded()
    }

    /// Explicitly mark the store as known-empty.
    pub fn reset(&mut self) {
        self.state = StoreState::Cleared;
    }

    pub fn state(&self) -> &StoreState<CertifiedValue<T>> {
        &self.state
    }
}

impl<T> Default for CertifiedCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Collection store with identity-preserving merge ─────────────────────

/// An entry type with a natural key (e.g. a ledger address) distinct from
/// its display identity.
pub trait Keyed {
    type NaturalKey: Eq + Clone + Debug;

    fn natural_key(&self) -> Self::NaturalKey;
    fn identity(&self) -> ResourceId;
    fn adopt_identity(&mut self, id: ResourceId);
}

/// A store holding a collection of certified entries, merged by natural key.
///
/// When an incoming entry shares a natural key with an existing one, the
/// incoming entry adopts the existing entry's identity token before
/// replacing it, so UI state keyed by identity survives reloads. No two
/// entries with the same natural key ever coexist.
pub struct CertifiedTable<T: Keyed> {
    state: StoreState<Vec<CertifiedValue<T>>>,
}

impl<T: Keyed> CertifiedTable<T> {
    pub fn new() -> Self {
        Self {
            state: StoreState::Unloaded,
        }
    }

    /// Merge a batch of freshly loaded entries into the store.
    ///
    /// Idempotent: applying the same batch twice yields the same state as
    /// applying it once.
    pub fn set_all(&mut self, incoming: Vec<CertifiedValue<T>>) {
        let mut current = match std::mem::replace(&mut self.state, StoreState::Unloaded) {
            StoreState::Loaded(entries) => entries,
            StoreState::Unloaded | StoreState::Cleared => Vec::new(),
        };

        for mut entry in incoming {
            let key = entry.data.natural_key();
            match current.iter().position(|e| e.data.natural_key() == key) {
                Some(pos) => {
                    let existing = current.remove(pos);
                    if existing.certified && !entry.certified {
                        // Certified data is sticky: the uncertified reload
                        // is dropped, the existing entry keeps its slot.
                        tracing::debug!(
                            key = ?key,
                            "keeping certified entry over uncertified reload"
                        );
                        current.push(existing);
                    } else {
                        entry.data.adopt_identity(existing.data.identity());
                        current.push(entry);
                    }
                }
                None => current.push(entry),
            }
        }

        self.state = StoreState::Loaded(current);
    }

    /// Merge a single entry.
    pub fn set(&mut self, entry: CertifiedValue<T>) {
        self.set_all(vec![entry]);
    }

    /// Remove exactly the entries whose identity equals `id`.
    pub fn reset(&mut self, id: ResourceId) {
        if let StoreState::Loaded(entries) = &mut self.state {
            entries.retain(|e| e.data.identity() != id);
        }
    }

    /// Mark the whole store as explicitly known-empty.
    pub fn reset_all(&mut self) {
        self.state = StoreState::Cleared;
    }

    pub fn get_by_key(&self, key: &T::NaturalKey) -> Option<&CertifiedValue<T>> {
        self.state
            .loaded()?
            .iter()
            .find(|e| e.data.natural_key() == *key)
    }

    /// Loaded entries, or an empty slice when unloaded or cleared.
    pub fn entries(&self) -> &[CertifiedValue<T>] {
        self.state.loaded().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn state(&self) -> &StoreState<Vec<CertifiedValue<T>>> {
        &self.state
    }
}

impl<T: Keyed> Default for CertifiedTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
