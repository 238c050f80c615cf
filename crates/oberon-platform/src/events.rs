// SPDX-License-Identifier: CEPL-1.0
use oberon_core::{Offset2d, Rect2d};

use crate::keys::{Key, MouseButton};
use crate::modifiers::{LayoutGroups, ModifierMask};

/// Window-system bookkeeping that the event core consumes itself.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlatformEvent {
    ModifierState {
        base: ModifierMask,
        latched: ModifierMask,
        locked: ModifierMask,
        groups: LayoutGroups,
    },
    /// Pressed modifiers only, for window systems that do not report latches
    /// and locks.
    PressedModifiers(ModifierMask),
    /// Keyboard replaced or keymap changed. Modifier state is rebuilt.
    NewKeyboard,
    Ping {
        timestamp: u32,
    },
    Minimized(bool),
    Focused(bool),
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Event {
    /// Returned by `poll_events` when the queue is drained.
    #[default]
    None,
    Platform(PlatformEvent),
    WindowClose,
    GeometryReconfigure {
        rect: Rect2d,
    },
    KeyPress {
        key: Key,
        echoing: bool,
    },
    KeyRelease {
        key: Key,
    },
    ButtonPress {
        button: MouseButton,
    },
    ButtonRelease {
        button: MouseButton,
    },
    Motion {
        screen_offset: Offset2d,
        window_offset: Offset2d,
    },
}

impl Event {
    pub fn is_none(&self) -> bool {
        matches!(self, Event::None)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WmTarget {
    Root,
    Window,
}

/// Messages the event core asks the window system to send on its behalf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WmRequest {
    PingReply { target: WmTarget, timestamp: u32 },
}
