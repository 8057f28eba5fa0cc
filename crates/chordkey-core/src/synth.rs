use crate::types::ModCode;
use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

pub const KEYSYM_BACKSPACE: u32 = 0xff08;
pub const KEYSYM_RETURN: u32 = 0xff0d;

/// Key injection backend. Implementations talk to the platform; the engine
/// only ever sees this trait.
pub trait KeySynth {
    fn press_unicode(&mut self, ch: char);
    fn release_unicode(&mut self, ch: char);
    fn press_keysym(&mut self, keysym: u32);
    fn release_keysym(&mut self, keysym: u32);
    fn press_keycode(&mut self, keycode: u32);
    fn release_keycode(&mut self, keycode: u32);
    fn lock_mod(&mut self, code: ModCode);
    fn unlock_mod(&mut self, code: ModCode);

    /// Types a whole string. `\b` becomes BackSpace and newlines (literal or
    /// the two-character `\n` escape) become Return, since unicode newlines
    /// are dropped by some clients.
    fn type_text(&mut self, text: &str) {
        let text = text.replace("\\n", "\n");
        for ch in text.chars() {
            match ch {
                '\u{8}' => {
                    self.press_keysym(KEYSYM_BACKSPACE);
                    self.release_keysym(KEYSYM_BACKSPACE);
                }
                '\n' => {
                    self.press_keysym(KEYSYM_RETURN);
                    self.release_keysym(KEYSYM_RETURN);
                }
                c => {
                    self.press_unicode(c);
                    self.release_unicode(c);
                }
            }
        }
    }
}

/// Call made against the synthesis boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthEvent {
    /// (char, up)
    Unicode(char, bool),
    /// (keysym, up)
    Keysym(u32, bool),
    /// (keycode, up)
    Keycode(u32, bool),
    LockMod(ModCode),
    UnlockMod(ModCode),
}

/// Forwards every call as a [`SynthEvent`] to an injection thread.
#[derive(Debug, Clone)]
pub struct ChannelSynth {
    tx: Sender<SynthEvent>,
}

impl ChannelSynth {
    pub fn new(tx: Sender<SynthEvent>) -> Self {
        Self { tx }
    }

    /// Creates a synth together with the receiving end of its channel.
    pub fn unbounded() -> (Self, Receiver<SynthEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self::new(tx), rx)
    }

    fn send(&self, ev: SynthEvent) {
        // Receiver gone means the backend shut down; nothing to type into.
        if self.tx.send(ev).is_err() {
            debug!("synth receiver disconnected, dropping {:?}", ev);
        }
    }
}

impl KeySynth for ChannelSynth {
    fn press_unicode(&mut self, ch: char) {
        self.send(SynthEvent::Unicode(ch, false));
    }

    fn release_unicode(&mut self, ch: char) {
        self.send(SynthEvent::Unicode(ch, true));
    }

    fn press_keysym(&mut self, keysym: u32) {
        self.send(SynthEvent::Keysym(keysym, false));
    }

    fn release_keysym(&mut self, keysym: u32) {
        self.send(SynthEvent::Keysym(keysym, true));
    }

    fn press_keycode(&mut self, keycode: u32) {
        self.send(SynthEvent::Keycode(keycode, false));
    }

    fn release_keycode(&mut self, keycode: u32) {
        self.send(SynthEvent::Keycode(keycode, true));
    }

    fn lock_mod(&mut self, code: ModCode) {
        self.send(SynthEvent::LockMod(code));
    }

    fn unlock_mod(&mut self, code: ModCode) {
        self.send(SynthEvent::UnlockMod(code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_text_special_chars() {
        let (mut synth, rx) = ChannelSynth::unbounded();
        synth.type_text("a\u{8}\\n");
        let events: Vec<SynthEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                SynthEvent::Unicode('a', false),
                SynthEvent::Unicode('a', true),
                SynthEvent::Keysym(KEYSYM_BACKSPACE, false),
                SynthEvent::Keysym(KEYSYM_BACKSPACE, true),
                SynthEvent::Keysym(KEYSYM_RETURN, false),
                SynthEvent::Keysym(KEYSYM_RETURN, true),
            ]
        );
    }

    #[test]
    fn test_disconnected_receiver_does_not_panic() {
        let (mut synth, rx) = ChannelSynth::unbounded();
        drop(rx);
        synth.press_keycode(36);
        synth.lock_mod(1);
    }
}
