// SPDX-License-Identifier: CEPL-1.0
//! Event-driven window state.
//!
//! [`WindowEventCore`] owns the queue of translated window-system events and the
//! state derived from them. State changes when an event is drained with
//! [`WindowEventCore::poll_events`], not when it is pushed, so a caller sees
//! key and geometry state consistent with the last event it handled.

use std::collections::VecDeque;

use bitflags::bitflags;
use oberon_core::{Extent2d, Offset2d, Rect2d};
use tracing::debug;

use crate::events::{Event, PlatformEvent, WmRequest, WmTarget};
use crate::keys::{Key, ModifierKey, MouseButton};
use crate::modifiers::ModifierTracker;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyState {
    pub pressed: bool,
    /// Pressed and the last transition was an auto-repeat.
    pub echoing: bool,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct VisibilityFlags: u8 {
        const MAPPED = 1 << 0;
        const ICONIC = 1 << 1;
        const HIDDEN = 1 << 2;
    }
}

impl VisibilityFlags {
    /// Mapped, or iconified by the window manager.
    pub fn is_shown(self) -> bool {
        self == VisibilityFlags::MAPPED || self.is_minimized()
    }

    pub fn is_minimized(self) -> bool {
        self == VisibilityFlags::ICONIC | VisibilityFlags::HIDDEN
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisplayStyle {
    #[default]
    Windowed,
    FullscreenComposited,
    FullscreenBypassCompositor,
}

#[derive(Debug, Default)]
pub struct WindowEventCore {
    queue: VecDeque<Event>,
    keys: Vec<KeyState>,
    buttons: [bool; MouseButton::COUNT],
    modifiers: ModifierTracker,
    visibility: VisibilityFlags,
    focused: bool,
    rect: Rect2d,
    pointer_screen: Offset2d,
    pointer_window: Offset2d,
    swapchain_extent: Extent2d,
    swapchain_dirty: bool,
    wm_requests: Vec<WmRequest>,
}

impl WindowEventCore {
    pub fn new(rect: Rect2d) -> Self {
        Self {
            keys: vec![KeyState::default(); Key::COUNT],
            rect,
            swapchain_extent: rect.extent,
            ..Default::default()
        }
    }

    pub fn push(&mut self, event: Event) {
        if !event.is_none() {
            self.queue.push_back(event);
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drains one event and applies it. `Event::None` when the queue is empty.
    pub fn poll_events(&mut self) -> Event {
        let Some(event) = self.queue.pop_front() else {
            return Event::None;
        };
        self.apply(&event);
        event
    }

    fn apply(&mut self, event: &Event) {
        match *event {
            Event::None => {}
            Event::Platform(p) => self.apply_platform(p),
            Event::WindowClose => {
                self.visibility = VisibilityFlags::empty();
            }
            Event::GeometryReconfigure { rect } => {
                self.rect = rect;
                if rect.extent != self.swapchain_extent {
                    debug!(
                        "configure {}x{} differs from swapchain {}x{}",
                        rect.extent.width,
                        rect.extent.height,
                        self.swapchain_extent.width,
                        self.swapchain_extent.height
                    );
                    self.swapchain_dirty = true;
                }
            }
            Event::KeyPress { key, echoing } => {
                let state = &mut self.keys[key.index()];
                state.pressed = true;
                state.echoing = echoing;
                if !echoing {
                    self.modifiers.note_key_press(key);
                }
            }
            Event::KeyRelease { key } => {
                self.keys[key.index()] = KeyState::default();
            }
            Event::ButtonPress { button } => self.buttons[button.index()] = true,
            Event::ButtonRelease { button } => self.buttons[button.index()] = false,
            Event::Motion {
                screen_offset,
                window_offset,
            } => {
                self.pointer_screen = screen_offset;
                self.pointer_window = window_offset;
            }
        }
    }

    fn apply_platform(&mut self, p: PlatformEvent) {
        match p {
            PlatformEvent::ModifierState {
                base,
                latched,
                locked,
                groups,
            } => {
                self.modifiers.update_mask(base, latched, locked, groups);
            }
            PlatformEvent::PressedModifiers(base) => self.modifiers.update_base(base),
            PlatformEvent::NewKeyboard => {
                self.modifiers = ModifierTracker::new();
            }
            PlatformEvent::Ping { timestamp } => {
                self.wm_requests.push(WmRequest::PingReply {
                    target: WmTarget::Root,
                    timestamp,
                });
            }
            PlatformEvent::Minimized(true) => {
                self.visibility = VisibilityFlags::ICONIC | VisibilityFlags::HIDDEN;
            }
            PlatformEvent::Minimized(false) => {
                if self.visibility.is_minimized() {
                    self.visibility = VisibilityFlags::MAPPED;
                }
            }
            PlatformEvent::Focused(f) => self.focused = f,
        }
    }

    pub fn take_wm_requests(&mut self) -> Vec<WmRequest> {
        std::mem::take(&mut self.wm_requests)
    }

    pub fn key_state(&self, key: Key) -> KeyState {
        self.keys[key.index()]
    }

    pub fn is_key_pressed(&self, key: Key) -> bool {
        self.keys[key.index()].pressed
    }

    pub fn is_key_echoing(&self, key: Key) -> bool {
        self.keys[key.index()].echoing
    }

    pub fn is_key_just_pressed(&self, key: Key) -> bool {
        let s = self.keys[key.index()];
        s.pressed && !s.echoing
    }

    pub fn is_modifier_pressed(&self, m: ModifierKey) -> bool {
        self.modifiers.is_active(m)
    }

    pub fn modifiers(&self) -> &ModifierTracker {
        &self.modifiers
    }

    pub fn is_mouse_button_pressed(&self, b: MouseButton) -> bool {
        self.buttons[b.index()]
    }

    pub fn pointer(&self) -> (Offset2d, Offset2d) {
        (self.pointer_screen, self.pointer_window)
    }

    pub fn visibility(&self) -> VisibilityFlags {
        self.visibility
    }

    pub fn set_visibility(&mut self, flags: VisibilityFlags) {
        self.visibility = flags;
    }

    pub fn is_shown(&self) -> bool {
        self.visibility.is_shown()
    }

    pub fn is_minimized(&self) -> bool {
        self.visibility.is_minimized()
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn rect(&self) -> Rect2d {
        self.rect
    }

    /// Client area at the origin, as of the last drained configure.
    pub fn drawable_rect(&self) -> Rect2d {
        Rect2d::new(Offset2d::default(), self.rect.extent)
    }

    /// Records the extent a freshly built swapchain uses and clears the
    /// dirty bit.
    pub fn swapchain_rebuilt(&mut self, extent: Extent2d) {
        self.swapchain_extent = extent;
        self.swapchain_dirty = false;
    }

    pub fn mark_swapchain_dirty(&mut self) {
        self.swapchain_dirty = true;
    }

    pub fn is_swapchain_dirty(&self) -> bool {
        self.swapchain_dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::{LayoutGroups, ModifierMask};

    fn core() -> WindowEventCore {
        let mut c = WindowEventCore::new(Rect2d::new(
            Offset2d::default(),
            Extent2d::new(1280, 720),
        ));
        c.set_visibility(VisibilityFlags::MAPPED);
        c
    }

    fn drain(c: &mut WindowEventCore) {
        while !c.poll_events().is_none() {}
    }

    #[test]
    fn empty_queue_polls_none() {
        let mut c = core();
        assert_eq!(c.poll_events(), Event::None);
        c.push(Event::None);
        assert_eq!(c.pending(), 0);
    }

    #[test]
    fn key_transitions() {
        let mut c = core();
        c.push(Event::KeyPress {
            key: Key::Enter,
            echoing: false,
        });
        assert!(!c.is_key_pressed(Key::Enter), "state changes on drain");
        c.poll_events();
        assert!(c.is_key_pressed(Key::Enter));
        assert!(c.is_key_just_pressed(Key::Enter));

        c.push(Event::KeyPress {
            key: Key::Enter,
            echoing: true,
        });
        c.poll_events();
        assert!(c.is_key_pressed(Key::Enter));
        assert!(c.is_key_echoing(Key::Enter));
        assert!(!c.is_key_just_pressed(Key::Enter));

        c.push(Event::KeyPress {
            key: Key::Enter,
            echoing: false,
        });
        c.poll_events();
        assert!(!c.is_key_echoing(Key::Enter));

        c.push(Event::KeyRelease { key: Key::Enter });
        c.poll_events();
        assert_eq!(c.key_state(Key::Enter), KeyState::default());
    }

    #[test]
    fn modifiers_follow_state_and_reset_on_new_keyboard() {
        let mut c = core();
        c.push(Event::Platform(PlatformEvent::ModifierState {
            base: ModifierMask::ALT,
            latched: ModifierMask::empty(),
            locked: ModifierMask::empty(),
            groups: LayoutGroups::default(),
        }));
        drain(&mut c);
        assert!(c.is_modifier_pressed(ModifierKey::Alt));

        c.push(Event::Platform(PlatformEvent::NewKeyboard));
        drain(&mut c);
        assert!(!c.is_modifier_pressed(ModifierKey::Alt));
    }

    #[test]
    fn mouse_buttons() {
        let mut c = core();
        c.push(Event::ButtonPress {
            button: MouseButton::LEFT,
        });
        drain(&mut c);
        assert!(c.is_mouse_button_pressed(MouseButton::Button1));
        c.push(Event::ButtonRelease {
            button: MouseButton::LEFT,
        });
        drain(&mut c);
        assert!(!c.is_mouse_button_pressed(MouseButton::Button1));
    }

    #[test]
    fn visibility_rules() {
        let mapped = VisibilityFlags::MAPPED;
        let iconic = VisibilityFlags::ICONIC | VisibilityFlags::HIDDEN;
        assert!(mapped.is_shown());
        assert!(!mapped.is_minimized());
        assert!(iconic.is_shown());
        assert!(iconic.is_minimized());
        assert!(!VisibilityFlags::empty().is_shown());
        assert!(!(VisibilityFlags::MAPPED | VisibilityFlags::HIDDEN).is_shown());
        assert!(!VisibilityFlags::ICONIC.is_minimized());
    }

    #[test]
    fn minimize_and_restore() {
        let mut c = core();
        c.push(Event::Platform(PlatformEvent::Minimized(true)));
        drain(&mut c);
        assert!(c.is_minimized());
        assert!(c.is_shown());
        c.push(Event::Platform(PlatformEvent::Minimized(false)));
        drain(&mut c);
        assert!(!c.is_minimized());
        assert_eq!(c.visibility(), VisibilityFlags::MAPPED);
    }

    #[test]
    fn close_hides_on_next_drain() {
        let mut c = core();
        c.push(Event::WindowClose);
        assert!(c.is_shown());
        assert_eq!(c.poll_events(), Event::WindowClose);
        assert!(!c.is_shown());
    }

    #[test]
    fn configure_with_new_extent_dirties_swapchain() {
        let mut c = core();
        let same = Rect2d::new(Offset2d::new(10, 10), Extent2d::new(1280, 720));
        c.push(Event::GeometryReconfigure { rect: same });
        drain(&mut c);
        assert!(!c.is_swapchain_dirty());
        assert_eq!(c.rect().offset, Offset2d::new(10, 10));

        let smaller = Rect2d::new(Offset2d::new(10, 10), Extent2d::new(640, 360));
        c.push(Event::GeometryReconfigure { rect: smaller });
        drain(&mut c);
        assert!(c.is_swapchain_dirty());
        assert_eq!(c.rect().extent, Extent2d::new(640, 360));

        c.swapchain_rebuilt(Extent2d::new(640, 360));
        assert!(!c.is_swapchain_dirty());
    }

    #[test]
    fn drawable_rect_follows_drained_configure() {
        let mut c = core();
        let moved = Rect2d::new(Offset2d::new(40, 30), Extent2d::new(640, 360));
        c.push(Event::GeometryReconfigure { rect: moved });
        assert_eq!(c.drawable_rect().extent, Extent2d::new(1280, 720));
        drain(&mut c);
        assert_eq!(
            c.drawable_rect(),
            Rect2d::new(Offset2d::default(), Extent2d::new(640, 360))
        );
        assert_eq!(c.rect(), moved);
    }

    #[test]
    fn ping_reply_targets_root() {
        let mut c = core();
        c.push(Event::Platform(PlatformEvent::Ping { timestamp: 42 }));
        drain(&mut c);
        assert_eq!(
            c.take_wm_requests(),
            vec![WmRequest::PingReply {
                target: WmTarget::Root,
                timestamp: 42
            }]
        );
        assert!(c.take_wm_requests().is_empty());
    }

    #[test]
    fn motion_updates_pointer() {
        let mut c = core();
        c.push(Event::Motion {
            screen_offset: Offset2d::new(110, 120),
            window_offset: Offset2d::new(10, 20),
        });
        drain(&mut c);
        assert_eq!(c.pointer(), (Offset2d::new(110, 120), Offset2d::new(10, 20)));
    }
}
