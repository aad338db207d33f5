use crate::core::geo::{Point, Size};
use serde::{Deserialize, Serialize};

/// Input events the viewer reacts to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    /// Start of drag operation
    DragStart { position: Point },
    /// Drag in progress; `position` is the current pointer position
    Drag { position: Point },
    /// End of drag operation
    DragEnd,
    /// Double click/tap
    DoubleClick {
        position: Point,
        modifiers: KeyModifiers,
    },
    /// Scroll wheel; positive zooms in
    Scroll { delta: f64 },
    /// Keyboard input
    KeyPress {
        key: KeyCode,
        modifiers: KeyModifiers,
    },
    /// Viewport/window resize
    Resize { size: Size },
}

/// Keyboard key codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Plus,
    Minus,
    /// Printable key; `c` re-centres on the sun
    Char(char),
    Other(u32),
}

/// Keyboard modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct KeyModifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// Whether an event was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventHandled {
    Handled,
    NotHandled,
}

impl InputEvent {
    /// Gets the primary position associated with this event, if any
    pub fn position(&self) -> Option<Point> {
        match self {
            InputEvent::DragStart { position }
            | InputEvent::Drag { position }
            | InputEvent::DoubleClick { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Checks if this is a mouse/pointer event
    pub fn is_pointer_event(&self) -> bool {
        matches!(
            self,
            InputEvent::DragStart { .. }
                | InputEvent::Drag { .. }
                | InputEvent::DragEnd
                | InputEvent::DoubleClick { .. }
                | InputEvent::Scroll { .. }
        )
    }

    /// Checks if this is a keyboard event
    pub fn is_keyboard_event(&self) -> bool {
        matches!(self, InputEvent::KeyPress { .. })
    }
}
