pub mod action;
pub mod chord;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod gesture;
pub mod grid;
pub mod layout;
pub mod modifiers;
pub mod sequence;
pub mod synth;
pub mod timer;
pub mod types;
pub mod view;

pub use action::{Action, Command};
pub use chord::{ChordMapping, ChordMode};
pub use config::EngineConfig;
pub use engine::{ChordKeyboardEngine, SharedEngine};
pub use layout::{builtin_layout, load_layout, parse_layout_content};
pub use synth::{ChannelSynth, KeySynth, SynthEvent};
pub use types::{ContactEvent, KeyCoord, Outcome, Phase, Point, Rect, SequenceId, Side};
