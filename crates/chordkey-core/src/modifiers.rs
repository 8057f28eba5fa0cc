use crate::synth::KeySynth;
use crate::types::ModCode;
use std::collections::BTreeMap;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModLatch {
    /// Applies to the next committed action only.
    Latched,
    /// Held until toggled off.
    Locked,
}

/// Sticky modifier table. Codes that are neither latched nor locked are
/// simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifierState {
    mods: BTreeMap<ModCode, ModLatch>,
}

impl ModifierState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, code: ModCode) -> Option<ModLatch> {
        self.mods.get(&code).copied()
    }

    /// Advances `code` one step through absent -> latched -> locked -> absent.
    /// The synth is locked on entering latched and unlocked on leaving
    /// locked; latched -> locked needs no synth call.
    pub fn apply(&mut self, code: ModCode, synth: Option<&mut dyn KeySynth>) -> Option<ModLatch> {
        let next = match self.get(code) {
            None => {
                if let Some(s) = synth {
                    s.lock_mod(code);
                }
                Some(ModLatch::Latched)
            }
            Some(ModLatch::Latched) => Some(ModLatch::Locked),
            Some(ModLatch::Locked) => {
                if let Some(s) = synth {
                    s.unlock_mod(code);
                }
                None
            }
        };
        match next {
            Some(state) => {
                self.mods.insert(code, state);
            }
            None => {
                self.mods.remove(&code);
            }
        }
        trace!("modifier {} -> {:?}", code, next);
        next
    }

    /// Releases every latched code, leaving locked ones alone.
    pub fn clear_latched(&mut self, mut synth: Option<&mut dyn KeySynth>) -> Vec<ModCode> {
        let latched: Vec<ModCode> = self
            .mods
            .iter()
            .filter(|(_, state)| **state == ModLatch::Latched)
            .map(|(code, _)| *code)
            .collect();
        for code in &latched {
            self.mods.remove(code);
            if let Some(s) = synth.as_deref_mut() {
                s.unlock_mod(*code);
            }
        }
        latched
    }

    /// Releases latched and locked codes alike.
    pub fn release_all(&mut self, mut synth: Option<&mut dyn KeySynth>) -> Vec<ModCode> {
        let codes: Vec<ModCode> = self.mods.keys().copied().collect();
        self.mods.clear();
        if let Some(s) = synth.as_deref_mut() {
            for code in &codes {
                s.unlock_mod(*code);
            }
        }
        codes
    }

    pub fn latched(&self) -> impl Iterator<Item = ModCode> + '_ {
        self.codes_in(ModLatch::Latched)
    }

    pub fn locked(&self) -> impl Iterator<Item = ModCode> + '_ {
        self.codes_in(ModLatch::Locked)
    }

    fn codes_in(&self, wanted: ModLatch) -> impl Iterator<Item = ModCode> + '_ {
        self.mods
            .iter()
            .filter(move |(_, state)| **state == wanted)
            .map(|(code, _)| *code)
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }
}
