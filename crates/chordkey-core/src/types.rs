use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// One of the two hand zones of the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Left, Side::Right];

    pub const fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Side::Left),
            1 => Some(Side::Right),
            _ => None,
        }
    }
}

/// Discrete key position: pane, column and row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyCoord {
    pub side: Side,
    pub col: u8,
    pub row: u8,
}

impl KeyCoord {
    pub const fn new(side: Side, col: u8, row: u8) -> Self {
        Self { side, col, row }
    }

    pub const fn left(col: u8, row: u8) -> Self {
        Self::new(Side::Left, col, row)
    }

    pub const fn right(col: u8, row: u8) -> Self {
        Self::new(Side::Right, col, row)
    }
}

impl fmt::Display for KeyCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.side.index(), self.col, self.row)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, half-open on its right and bottom edges.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.x + self.w && p.y >= self.y && p.y < self.y + self.h
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }
}

/// Identity of a contact. The core pointer shares a single sentinel id,
/// every touch point carries the id assigned by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SequenceId {
    Pointer,
    Touch(u64),
}

impl SequenceId {
    pub const fn is_touch(self) -> bool {
        matches!(self, SequenceId::Touch(_))
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceId::Pointer => write!(f, "pointer"),
            SequenceId::Touch(id) => write!(f, "touch#{}", id),
        }
    }
}

/// Pointer button/modifier bitmask as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ButtonMask(pub u32);

impl ButtonMask {
    pub const BUTTON1: ButtonMask = ButtonMask(1 << 8);

    pub const fn empty() -> Self {
        Self(0)
    }
}

/// X11-style modifier mask bit (Shift = 1, Control = 4, Mod1 = 8, ...).
pub type ModCode = u32;

pub mod mod_codes {
    use super::ModCode;

    pub const SHIFT: ModCode = 1;
    pub const CONTROL: ModCode = 4;
    pub const MOD1: ModCode = 8;
    pub const MOD2: ModCode = 16;
    pub const MOD4: ModCode = 64;
}

/// Where a raw event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Mouse,
    Touchscreen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Begin,
    Update,
    End,
}

/// A raw platform event, already converted to widget-local coordinates.
#[derive(Debug, Clone)]
pub struct ContactEvent {
    pub id: SequenceId,
    pub phase: Phase,
    pub source: Source,
    pub point: Point,
    pub root_point: Point,
    /// Platform event timestamp in milliseconds.
    pub time: u64,
    pub state: ButtonMask,
    /// Whether the event was reported against the keyboard window
    /// (only meaningful for raw device events).
    pub window_hit: bool,
    pub t: Instant,
}

impl ContactEvent {
    pub fn touch(id: u64, phase: Phase, point: Point, time: u64, t: Instant) -> Self {
        Self {
            id: SequenceId::Touch(id),
            phase,
            source: Source::Touchscreen,
            point,
            root_point: point,
            time,
            state: ButtonMask::BUTTON1,
            window_hit: true,
            t,
        }
    }

    pub fn pointer(phase: Phase, point: Point, time: u64, t: Instant) -> Self {
        let state = match phase {
            Phase::End => ButtonMask::empty(),
            _ => ButtonMask::BUTTON1,
        };
        Self {
            id: SequenceId::Pointer,
            phase,
            source: Source::Mouse,
            point,
            root_point: point,
            time,
            state,
            window_hit: true,
            t,
        }
    }
}

/// What the engine did with a completed release.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// An action was found and invoked.
    Dispatched { keys: Vec<KeyCoord>, label: String },
    /// The chord has no entry in the mapping.
    Unresolved(Vec<KeyCoord>),
    /// The final contact was released outside both panes.
    Cancelled,
}
