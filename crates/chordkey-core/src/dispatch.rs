use crate::action::{Action, InvokeContext};
use crate::modifiers::ModifierState;
use crate::synth::KeySynth;
use crate::types::ModCode;
use tracing::debug;

/// Single funnel from resolved chords to the synthesis boundary. Owns the
/// synth and the sticky modifier table.
#[derive(Default)]
pub struct ActionDispatcher {
    synth: Option<Box<dyn KeySynth + Send>>,
    modifiers: ModifierState,
}

impl ActionDispatcher {
    pub fn new(synth: Option<Box<dyn KeySynth + Send>>) -> Self {
        Self {
            synth,
            modifiers: ModifierState::new(),
        }
    }

    pub fn set_synth(&mut self, synth: Option<Box<dyn KeySynth + Send>>) {
        self.synth = synth;
    }

    pub fn modifiers(&self) -> &ModifierState {
        &self.modifiers
    }

    /// Invokes `action` and releases latched modifiers if it typed
    /// something. Returns false when there was nothing to dispatch.
    pub fn dispatch(&mut self, action: Option<&Action>) -> bool {
        let Some(action) = action else {
            return false;
        };
        debug!("dispatching \"{}\"", action.label());

        let typed = {
            let mut ctx = InvokeContext {
                synth: synth_ref(&mut self.synth),
                modifiers: &mut self.modifiers,
            };
            action.invoke(&mut ctx)
        };
        if typed {
            self.modifiers.clear_latched(synth_ref(&mut self.synth));
        }
        true
    }

    /// Drops every sticky modifier, latched or locked.
    pub fn release_all_modifiers(&mut self) -> Vec<ModCode> {
        self.modifiers.release_all(synth_ref(&mut self.synth))
    }
}

fn synth_ref(synth: &mut Option<Box<dyn KeySynth + Send>>) -> Option<&mut dyn KeySynth> {
    match synth {
        Some(s) => Some(&mut **s),
        None => None,
    }
}
