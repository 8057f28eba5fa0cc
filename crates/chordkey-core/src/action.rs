use crate::modifiers::ModifierState;
use crate::synth::KeySynth;
use crate::types::ModCode;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

lazy_static::lazy_static! {
    static ref KEYSYMS: HashMap<&'static str, u32> = {
        let mut m = HashMap::new();
        m.insert("backspace", 0xff08); m.insert("tab", 0xff09); m.insert("return", 0xff0d);
        m.insert("enter", 0xff0d); m.insert("escape", 0xff1b); m.insert("esc", 0xff1b);
        m.insert("delete", 0xffff); m.insert("insert", 0xff63); m.insert("home", 0xff50);
        m.insert("end", 0xff57); m.insert("left", 0xff51); m.insert("up", 0xff52);
        m.insert("right", 0xff53); m.insert("down", 0xff54); m.insert("page_up", 0xff55);
        m.insert("prior", 0xff55); m.insert("page_down", 0xff56); m.insert("next", 0xff56);
        m.insert("space", 0x0020); m.insert("menu", 0xff67); m.insert("print", 0xff61);
        m.insert("shift_l", 0xffe1); m.insert("shift_r", 0xffe2); m.insert("control_l", 0xffe3);
        m.insert("control_r", 0xffe4); m.insert("alt_l", 0xffe9); m.insert("alt_r", 0xffea);
        m.insert("super_l", 0xffeb); m.insert("super_r", 0xffec); m.insert("caps_lock", 0xffe5);
        m.insert("num_lock", 0xff7f);
        m.insert("f1", 0xffbe); m.insert("f2", 0xffbf); m.insert("f3", 0xffc0);
        m.insert("f4", 0xffc1); m.insert("f5", 0xffc2); m.insert("f6", 0xffc3);
        m.insert("f7", 0xffc4); m.insert("f8", 0xffc5); m.insert("f9", 0xffc6);
        m.insert("f10", 0xffc7); m.insert("f11", 0xffc8); m.insert("f12", 0xffc9);
        m.insert("f13", 0xffca); m.insert("f14", 0xffcb); m.insert("f15", 0xffcc);
        m.insert("f16", 0xffcd); m.insert("f17", 0xffce); m.insert("f18", 0xffcf);
        m.insert("f19", 0xffd0); m.insert("f20", 0xffd1); m.insert("f21", 0xffd2);
        m.insert("f22", 0xffd3); m.insert("f23", 0xffd4); m.insert("f24", 0xffd5);
        m
    };
}

/// Looks up an X keysym by (case-insensitive) name.
pub fn keysym_from_name(name: &str) -> Option<u32> {
    KEYSYMS.get(name.to_ascii_lowercase().as_str()).copied()
}

/// What a [`Action::Type`] sends to the synth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    Char(char),
    Keysym(u32),
    Keycode(u32),
    Text(String),
}

/// Host callback bound to a generic action (e.g. hiding the keyboard).
/// Returns whether it consumed input the way typing does.
#[derive(Clone)]
pub struct Command {
    name: String,
    f: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl Command {
    pub fn new(name: impl Into<String>, f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self) -> bool {
        (self.f)()
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command").field("name", &self.name).finish()
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.f, &other.f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAction {
    pub label: String,
    pub symbol: Symbol,
    /// Locked around this one key press only.
    pub modifiers: Vec<ModCode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModAction {
    pub label: String,
    pub code: ModCode,
}

/// Result of a resolved chord.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Generic {
        label: String,
        command: Option<Command>,
    },
    Type(TypeAction),
    Modifier(ModAction),
}

/// Collaborators an action may touch while it runs.
pub struct InvokeContext<'a> {
    pub synth: Option<&'a mut dyn KeySynth>,
    pub modifiers: &'a mut ModifierState,
}

impl Action {
    pub fn char(ch: char) -> Self {
        Self::typed(ch.to_string(), Symbol::Char(ch))
    }

    pub fn keysym(label: impl Into<String>, keysym: u32) -> Self {
        Self::typed(label, Symbol::Keysym(keysym))
    }

    pub fn keycode(label: impl Into<String>, keycode: u32) -> Self {
        Self::typed(label, Symbol::Keycode(keycode))
    }

    pub fn text(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self::typed(label, Symbol::Text(text.into()))
    }

    pub fn typed(label: impl Into<String>, symbol: Symbol) -> Self {
        Action::Type(TypeAction {
            label: label.into(),
            symbol,
            modifiers: Vec::new(),
        })
    }

    pub fn modifier(label: impl Into<String>, code: ModCode) -> Self {
        Action::Modifier(ModAction {
            label: label.into(),
            code,
        })
    }

    pub fn command(label: impl Into<String>, command: Command) -> Self {
        Action::Generic {
            label: label.into(),
            command: Some(command),
        }
    }

    /// Adds a one-shot modifier bracket; no effect on non-type actions.
    pub fn with_modifiers(mut self, mods: &[ModCode]) -> Self {
        if let Action::Type(ref mut t) = self {
            t.modifiers.extend_from_slice(mods);
        }
        self
    }

    pub fn label(&self) -> &str {
        match self {
            Action::Generic { label, .. } => label,
            Action::Type(t) => &t.label,
            Action::Modifier(m) => &m.label,
        }
    }

    /// Runs the action. Returns true when it typed something, meaning
    /// pending latched modifiers should now be released. A missing synth
    /// turns every key operation into a no-op.
    pub fn invoke(&self, ctx: &mut InvokeContext<'_>) -> bool {
        match self {
            Action::Generic { command, .. } => command.as_ref().is_some_and(Command::call),
            Action::Type(t) => {
                if let Some(synth) = reborrow(&mut ctx.synth) {
                    t.send(synth, ctx.modifiers);
                }
                true
            }
            Action::Modifier(m) => {
                ctx.modifiers.apply(m.code, reborrow(&mut ctx.synth));
                false
            }
        }
    }
}

fn reborrow<'s>(synth: &'s mut Option<&mut dyn KeySynth>) -> Option<&'s mut dyn KeySynth> {
    match synth {
        Some(s) => Some(&mut **s),
        None => None,
    }
}

impl TypeAction {
    /// Codes already latched or locked in `sticky` are held by the synth
    /// and stay out of the bracket.
    fn send(&self, synth: &mut dyn KeySynth, sticky: &ModifierState) {
        let bracket: Vec<ModCode> = self
            .modifiers
            .iter()
            .copied()
            .filter(|code| sticky.get(*code).is_none())
            .collect();
        for code in &bracket {
            synth.lock_mod(*code);
        }
        match &self.symbol {
            Symbol::Char(c) => {
                synth.press_unicode(*c);
                synth.release_unicode(*c);
            }
            Symbol::Keysym(sym) => {
                synth.press_keysym(*sym);
                synth.release_keysym(*sym);
            }
            Symbol::Keycode(code) => {
                synth.press_keycode(*code);
                synth.release_keycode(*code);
            }
            Symbol::Text(text) => synth.type_text(text),
        }
        for code in bracket.iter().rev() {
            synth.unlock_mod(*code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::ModLatch;
    use crate::synth::{ChannelSynth, SynthEvent};
    use crate::types::mod_codes::{MOD4, SHIFT};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn invoke(action: &Action, synth: &mut ChannelSynth, mods: &mut ModifierState) -> bool {
        let mut ctx = InvokeContext {
            synth: Some(synth),
            modifiers: mods,
        };
        action.invoke(&mut ctx)
    }

    #[test]
    fn test_type_char() {
        let (mut synth, rx) = ChannelSynth::unbounded();
        let mut mods = ModifierState::new();
        assert!(invoke(&Action::char('x'), &mut synth, &mut mods));
        let events: Vec<SynthEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![SynthEvent::Unicode('x', false), SynthEvent::Unicode('x', true)]
        );
    }

    #[test]
    fn test_type_with_modifier_bracket() {
        let (mut synth, rx) = ChannelSynth::unbounded();
        let mut mods = ModifierState::new();
        let action = Action::keycode("⇆", 23).with_modifiers(&[MOD4, SHIFT]);
        assert!(invoke(&action, &mut synth, &mut mods));
        let events: Vec<SynthEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                SynthEvent::LockMod(MOD4),
                SynthEvent::LockMod(SHIFT),
                SynthEvent::Keycode(23, false),
                SynthEvent::Keycode(23, true),
                SynthEvent::UnlockMod(SHIFT),
                SynthEvent::UnlockMod(MOD4),
            ]
        );
        assert!(mods.is_empty());
    }

    #[test]
    fn test_bracket_skips_sticky_modifiers() {
        let (mut synth, rx) = ChannelSynth::unbounded();
        let mut mods = ModifierState::new();
        mods.apply(SHIFT, None);
        mods.apply(SHIFT, None);
        let action = Action::char('a').with_modifiers(&[SHIFT, MOD4]);
        assert!(invoke(&action, &mut synth, &mut mods));
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![
                SynthEvent::LockMod(MOD4),
                SynthEvent::Unicode('a', false),
                SynthEvent::Unicode('a', true),
                SynthEvent::UnlockMod(MOD4),
            ]
        );
        assert_eq!(mods.get(SHIFT), Some(ModLatch::Locked));
    }

    #[test]
    fn test_modifier_action_returns_false() {
        let (mut synth, rx) = ChannelSynth::unbounded();
        let mut mods = ModifierState::new();
        let action = Action::modifier("Shift", SHIFT);
        assert!(!invoke(&action, &mut synth, &mut mods));
        assert_eq!(mods.get(SHIFT), Some(ModLatch::Latched));
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![SynthEvent::LockMod(SHIFT)]);
    }

    #[test]
    fn test_no_synth_degrades_to_noop() {
        let mut mods = ModifierState::new();
        let mut ctx = InvokeContext {
            synth: None,
            modifiers: &mut mods,
        };
        assert!(Action::keysym("↵", 0xff0d).invoke(&mut ctx));
        assert!(!Action::modifier("Ctrl", 4).invoke(&mut ctx));
        assert_eq!(mods.get(4), Some(ModLatch::Latched));
    }

    #[test]
    fn test_generic_command() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let action = Action::command(
            "Hide",
            Command::new("hide", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                false
            }),
        );
        let mut mods = ModifierState::new();
        let mut ctx = InvokeContext {
            synth: None,
            modifiers: &mut mods,
        };
        assert!(!action.invoke(&mut ctx));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let empty = Action::Generic {
            label: "nop".into(),
            command: None,
        };
        assert!(!empty.invoke(&mut ctx));
    }

    #[test]
    fn test_keysym_lookup() {
        assert_eq!(keysym_from_name("Return"), Some(0xff0d));
        assert_eq!(keysym_from_name("F1"), Some(0xffbe));
        assert_eq!(keysym_from_name("f24"), Some(0xffd5));
        assert_eq!(keysym_from_name("no_such_key"), None);
    }
}
