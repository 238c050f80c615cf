// SPDX-License-Identifier: CEPL-1.0
use bitflags::bitflags;

use crate::keys::{Key, ModifierKey};

bitflags! {
    /// Modifier bits in the order the X keyboard extension reports them.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ModifierMask: u32 {
        const SHIFT = 1 << 0;
        const CAPS_LOCK = 1 << 1;
        const CONTROL = 1 << 2;
        const ALT = 1 << 3;
        const NUM_LOCK = 1 << 4;
        const WINDOW = 1 << 6;
    }
}

impl From<ModifierKey> for ModifierMask {
    fn from(m: ModifierKey) -> Self {
        match m {
            ModifierKey::Shift => ModifierMask::SHIFT,
            ModifierKey::CapsLock => ModifierMask::CAPS_LOCK,
            ModifierKey::Control => ModifierMask::CONTROL,
            ModifierKey::Alt => ModifierMask::ALT,
            ModifierKey::NumLock => ModifierMask::NUM_LOCK,
            ModifierKey::Window => ModifierMask::WINDOW,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayoutGroups {
    pub base: i32,
    pub latched: i32,
    pub locked: i32,
}

/// Effective modifier state. A group is active when it is pressed, latched
/// or locked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModifierTracker {
    base: ModifierMask,
    latched: ModifierMask,
    locked: ModifierMask,
    groups: LayoutGroups,
}

impl ModifierTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when any mask or group changed.
    pub fn update_mask(
        &mut self,
        base: ModifierMask,
        latched: ModifierMask,
        locked: ModifierMask,
        groups: LayoutGroups,
    ) -> bool {
        let next = ModifierTracker {
            base,
            latched,
            locked,
            groups,
        };
        let changed = next != *self;
        *self = next;
        changed
    }

    /// Pressed modifiers only. Latched and locked bits are left alone.
    pub fn update_base(&mut self, base: ModifierMask) {
        self.base = base;
    }

    /// Lock keys flip their locked bit on a fresh press.
    pub fn note_key_press(&mut self, key: Key) {
        match key {
            Key::CapsLock => self.locked.toggle(ModifierMask::CAPS_LOCK),
            Key::NumLock => self.locked.toggle(ModifierMask::NUM_LOCK),
            _ => {}
        }
    }

    pub fn effective(&self) -> ModifierMask {
        self.base | self.latched | self.locked
    }

    pub fn is_active(&self, m: ModifierKey) -> bool {
        self.effective().contains(m.into())
    }

    pub fn groups(&self) -> LayoutGroups {
        self.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_if_pressed_latched_or_locked() {
        let mut t = ModifierTracker::new();
        assert!(!t.is_active(ModifierKey::Alt));

        t.update_mask(
            ModifierMask::ALT,
            ModifierMask::empty(),
            ModifierMask::empty(),
            LayoutGroups::default(),
        );
        assert!(t.is_active(ModifierKey::Alt));

        t.update_mask(
            ModifierMask::empty(),
            ModifierMask::SHIFT,
            ModifierMask::CAPS_LOCK,
            LayoutGroups::default(),
        );
        assert!(!t.is_active(ModifierKey::Alt));
        assert!(t.is_active(ModifierKey::Shift));
        assert!(t.is_active(ModifierKey::CapsLock));
    }

    #[test]
    fn update_reports_change() {
        let mut t = ModifierTracker::new();
        let g = LayoutGroups::default();
        assert!(t.update_mask(ModifierMask::CONTROL, ModifierMask::empty(), ModifierMask::empty(), g));
        assert!(!t.update_mask(ModifierMask::CONTROL, ModifierMask::empty(), ModifierMask::empty(), g));
    }

    #[test]
    fn lock_keys_toggle() {
        let mut t = ModifierTracker::new();
        t.note_key_press(Key::NumLock);
        assert!(t.is_active(ModifierKey::NumLock));
        t.update_base(ModifierMask::SHIFT);
        assert!(t.is_active(ModifierKey::NumLock));
        t.note_key_press(Key::NumLock);
        assert!(!t.is_active(ModifierKey::NumLock));
        t.note_key_press(Key::A);
        assert_eq!(t.effective(), ModifierMask::SHIFT);
    }
}
