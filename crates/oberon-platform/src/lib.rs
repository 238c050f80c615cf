// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]

pub mod events;
pub mod keys;
pub mod modifiers;
pub mod window_state;
pub mod winit_glue;

pub use events::{Event, PlatformEvent, WmRequest, WmTarget};
pub use keys::{Key, ModifierKey, MouseButton};
pub use modifiers::{LayoutGroups, ModifierMask, ModifierTracker};
pub use window_state::{DisplayStyle, KeyState, VisibilityFlags, WindowEventCore};

pub use winit;
