use crate::action::Action;
use crate::types::KeyCoord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// Lookup key of the chord table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chord {
    Single(KeyCoord),
    Pair(KeyCoord, KeyCoord),
}

impl Chord {
    pub fn from_keys(keys: &[KeyCoord]) -> Option<Self> {
        match *keys {
            [k] => Some(Chord::Single(k)),
            [k1, k2] => Some(Chord::Pair(k1, k2)),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("chord {chord:?} is already bound to \"{existing}\"")]
pub struct ConflictError {
    pub chord: Chord,
    pub existing: String,
}

/// Immutable chord table. Pairs are stored under both orders, so a
/// single ordered lookup is enough.
#[derive(Debug, Clone, Default)]
pub struct ChordMapping {
    name: Option<String>,
    table: HashMap<Chord, Arc<Action>>,
}

impl ChordMapping {
    pub fn builder() -> ChordMappingBuilder {
        ChordMappingBuilder::default()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Action for one or two keys; anything else has no entry.
    pub fn lookup(&self, keys: &[KeyCoord]) -> Option<&Arc<Action>> {
        Chord::from_keys(keys).and_then(|c| self.table.get(&c))
    }

    pub fn has_single(&self, key: KeyCoord) -> bool {
        self.table.contains_key(&Chord::Single(key))
    }

    /// Number of table entries (pairs count twice).
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Chord, &Arc<Action>)> {
        self.table.iter()
    }
}

#[derive(Debug, Default)]
pub struct ChordMappingBuilder {
    name: Option<String>,
    table: HashMap<Chord, Arc<Action>>,
}

impl ChordMappingBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn single(&mut self, key: KeyCoord, action: Action) -> Result<&mut Self, ConflictError> {
        self.insert(Chord::Single(key), Arc::new(action))?;
        Ok(self)
    }

    /// Binds `action` to the pair in both orders.
    pub fn pair(
        &mut self,
        k1: KeyCoord,
        k2: KeyCoord,
        action: Action,
    ) -> Result<&mut Self, ConflictError> {
        let action = Arc::new(action);
        self.insert(Chord::Pair(k1, k2), action.clone())?;
        self.insert(Chord::Pair(k2, k1), action)?;
        Ok(self)
    }

    fn insert(&mut self, chord: Chord, action: Arc<Action>) -> Result<(), ConflictError> {
        if let Some(existing) = self.table.get(&chord) {
            // Re-registering the same action is harmless.
            if **existing == *action {
                return Ok(());
            }
            return Err(ConflictError {
                chord,
                existing: existing.label().to_string(),
            });
        }
        self.table.insert(chord, action);
        Ok(())
    }

    pub fn build(self) -> ChordMapping {
        ChordMapping {
            name: self.name,
            table: self.table,
        }
    }
}

/// How releases are grouped into chords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChordMode {
    /// Keys held at the same time form a chord, resolved on the last release.
    #[default]
    Concurrent,
    /// One contact at a time; a key without a single-key binding waits for
    /// the next release to complete the pair. A key that has a single-key
    /// binding always resolves alone, so its pairs are unreachable here.
    Sequential,
}

/// What a release did to the waiting list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    /// Chord not complete yet.
    Waiting,
    /// Final contact ended outside both panes; the chord is dropped.
    Cancelled,
    /// The chord is complete; look these keys up.
    Resolved(Vec<KeyCoord>),
}

#[derive(Debug, Default)]
pub struct ChordResolver {
    mode: ChordMode,
    waiting: Vec<KeyCoord>,
}

impl ChordResolver {
    pub fn new(mode: ChordMode) -> Self {
        Self {
            mode,
            waiting: Vec::new(),
        }
    }

    pub fn waiting(&self) -> &[KeyCoord] {
        &self.waiting
    }

    /// Records the end of a contact hovering `key`. `others_active` tells
    /// whether any other contact is still down.
    pub fn release(
        &mut self,
        key: Option<KeyCoord>,
        others_active: bool,
        mapping: &ChordMapping,
    ) -> Release {
        if others_active {
            // Contacts released off the panes don't take part in the chord.
            if let Some(k) = key {
                self.waiting.push(k);
            }
            return Release::Waiting;
        }

        let Some(key) = key else {
            self.waiting.clear();
            return Release::Cancelled;
        };

        if self.mode == ChordMode::Sequential && self.waiting.is_empty() && !mapping.has_single(key)
        {
            self.waiting.push(key);
            return Release::Waiting;
        }

        let mut keys = std::mem::take(&mut self.waiting);
        keys.push(key);
        trace!("chord complete: {:?}", keys);
        Release::Resolved(keys)
    }

    /// Action a release of `candidate` would produce right now, without
    /// touching the waiting list.
    pub fn preview<'m>(
        &self,
        candidate: KeyCoord,
        mapping: &'m ChordMapping,
    ) -> Option<&'m Arc<Action>> {
        let mut keys = self.waiting.clone();
        keys.push(candidate);
        mapping.lookup(&keys)
    }

    pub fn label_for<'m>(&self, candidate: KeyCoord, mapping: &'m ChordMapping) -> Option<&'m str> {
        self.preview(candidate, mapping).map(|a| a.label())
    }

    pub fn reset(&mut self) {
        self.waiting.clear();
    }
}
