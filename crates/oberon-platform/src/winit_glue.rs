// SPDX-License-Identifier: CEPL-1.0
use oberon_core::{Extent2d, Offset2d, Rect2d};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::keyboard::{ModifiersState, PhysicalKey};
use winit::window::{Fullscreen, Window, WindowLevel};

use crate::events::{Event, PlatformEvent};
use crate::keys::{Key, MouseButton};
use crate::modifiers::ModifierMask;
use crate::window_state::DisplayStyle;

/// Translates one winit window event. `rect` is the window geometry before the
/// event; winit reports size and position separately.
pub fn translate(event: &WindowEvent, rect: Rect2d) -> Option<Event> {
    match event {
        WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key: PhysicalKey::Code(code),
                    state,
                    repeat,
                    ..
                },
            ..
        } => {
            let key = Key::from_winit(*code)?;
            Some(match state {
                ElementState::Pressed => Event::KeyPress {
                    key,
                    echoing: *repeat,
                },
                ElementState::Released => Event::KeyRelease { key },
            })
        }
        WindowEvent::ModifiersChanged(m) => Some(Event::Platform(
            PlatformEvent::PressedModifiers(modifier_mask(m.state())),
        )),
        WindowEvent::MouseInput { state, button, .. } => {
            let button = MouseButton::from_winit(*button)?;
            Some(match state {
                ElementState::Pressed => Event::ButtonPress { button },
                ElementState::Released => Event::ButtonRelease { button },
            })
        }
        WindowEvent::CursorMoved { position, .. } => {
            let window_offset = Offset2d::new(position.x as i32, position.y as i32);
            Some(Event::Motion {
                screen_offset: Offset2d::new(
                    rect.offset.x + window_offset.x,
                    rect.offset.y + window_offset.y,
                ),
                window_offset,
            })
        }
        WindowEvent::Resized(size) => Some(Event::GeometryReconfigure {
            rect: Rect2d::new(rect.offset, extent_of(*size)),
        }),
        WindowEvent::Moved(pos) => Some(Event::GeometryReconfigure {
            rect: Rect2d::new(Offset2d::new(pos.x, pos.y), rect.extent),
        }),
        WindowEvent::Focused(f) => Some(Event::Platform(PlatformEvent::Focused(*f))),
        WindowEvent::CloseRequested => Some(Event::WindowClose),
        _ => None,
    }
}

pub fn modifier_mask(state: ModifiersState) -> ModifierMask {
    let mut mask = ModifierMask::empty();
    mask.set(ModifierMask::SHIFT, state.shift_key());
    mask.set(ModifierMask::CONTROL, state.control_key());
    mask.set(ModifierMask::ALT, state.alt_key());
    mask.set(ModifierMask::WINDOW, state.super_key());
    mask
}

pub fn extent_of(size: PhysicalSize<u32>) -> Extent2d {
    Extent2d::new(size.width, size.height)
}

/// Current client-area geometry. Platforms that hide the window position
/// report the origin.
pub fn window_rect(window: &Window) -> Rect2d {
    let offset = window
        .outer_position()
        .map(|p: PhysicalPosition<i32>| Offset2d::new(p.x, p.y))
        .unwrap_or_default();
    Rect2d::new(offset, extent_of(window.inner_size()))
}

pub fn apply_display_style(window: &Window, style: DisplayStyle) {
    match style {
        DisplayStyle::Windowed => {
            window.set_fullscreen(None);
            window.set_window_level(WindowLevel::Normal);
        }
        DisplayStyle::FullscreenComposited => {
            window.set_fullscreen(Some(Fullscreen::Borderless(None)));
            window.set_window_level(WindowLevel::Normal);
        }
        DisplayStyle::FullscreenBypassCompositor => {
            window.set_fullscreen(Some(Fullscreen::Borderless(None)));
            window.set_window_level(WindowLevel::AlwaysOnTop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_state_maps_to_mask() {
        let state = ModifiersState::ALT | ModifiersState::SHIFT;
        assert_eq!(modifier_mask(state), ModifierMask::ALT | ModifierMask::SHIFT);
        assert_eq!(modifier_mask(ModifiersState::empty()), ModifierMask::empty());
    }

    #[test]
    fn resize_keeps_offset() {
        let before = Rect2d::new(Offset2d::new(5, 6), Extent2d::new(1280, 720));
        let ev = WindowEvent::Resized(PhysicalSize::new(640, 360));
        assert_eq!(
            translate(&ev, before),
            Some(Event::GeometryReconfigure {
                rect: Rect2d::new(Offset2d::new(5, 6), Extent2d::new(640, 360))
            })
        );
    }

    #[test]
    fn close_and_focus() {
        let r = Rect2d::default();
        assert_eq!(
            translate(&WindowEvent::CloseRequested, r),
            Some(Event::WindowClose)
        );
        assert_eq!(
            translate(&WindowEvent::Focused(false), r),
            Some(Event::Platform(PlatformEvent::Focused(false)))
        );
    }

    #[test]
    fn occlusion_leaves_visibility_alone() {
        let r = Rect2d::default();
        assert_eq!(translate(&WindowEvent::Occluded(true), r), None);
        assert_eq!(translate(&WindowEvent::Occluded(false), r), None);
    }
}
