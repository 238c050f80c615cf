// SPDX-License-Identifier: CEPL-1.0
//! Physical keys, modifier groups and mouse buttons.
//!
//! Key names follow the US layout. They identify positions on the keyboard, not
//! the symbols a layout produces.

use winit::keyboard::KeyCode;

macro_rules! physical_keys {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum Key {
            $($variant),+
        }

        impl Key {
            pub const ALL: &'static [Key] = &[$(Key::$variant),+];
            pub const COUNT: usize = Key::ALL.len();

            pub fn name(self) -> &'static str {
                match self {
                    $(Key::$variant => $name),+
                }
            }

            pub(crate) fn index(self) -> usize {
                self as usize
            }
        }
    };
}

physical_keys! {
    Escape => "escape",
    F1 => "function_01",
    F2 => "function_02",
    F3 => "function_03",
    F4 => "function_04",
    F5 => "function_05",
    F6 => "function_06",
    F7 => "function_07",
    F8 => "function_08",
    F9 => "function_09",
    F10 => "function_10",
    F11 => "function_11",
    F12 => "function_12",
    PrintScreen => "print_screen",
    ScrollLock => "scroll_lock",
    Pause => "pause",
    Tilde => "character_tilde",
    Digit1 => "character_1",
    Digit2 => "character_2",
    Digit3 => "character_3",
    Digit4 => "character_4",
    Digit5 => "character_5",
    Digit6 => "character_6",
    Digit7 => "character_7",
    Digit8 => "character_8",
    Digit9 => "character_9",
    Digit0 => "character_0",
    Minus => "character_minus",
    Equal => "character_equal",
    Backspace => "backspace",
    Tab => "tab",
    Q => "character_q",
    W => "character_w",
    E => "character_e",
    R => "character_r",
    T => "character_t",
    Y => "character_y",
    U => "character_u",
    I => "character_i",
    O => "character_o",
    P => "character_p",
    LeftBracket => "character_left_bracket",
    RightBracket => "character_right_bracket",
    Backslash => "character_backward_slash",
    CapsLock => "caps_lock",
    A => "character_a",
    S => "character_s",
    D => "character_d",
    F => "character_f",
    G => "character_g",
    H => "character_h",
    J => "character_j",
    K => "character_k",
    L => "character_l",
    Semicolon => "character_semicolon",
    Apostrophe => "character_apostrophe",
    Enter => "enter",
    LeftShift => "left_shift",
    Z => "character_z",
    X => "character_x",
    C => "character_c",
    V => "character_v",
    B => "character_b",
    N => "character_n",
    M => "character_m",
    Comma => "character_comma",
    Period => "character_period",
    Slash => "character_forward_slash",
    RightShift => "right_shift",
    LeftControl => "left_control",
    LeftWindow => "left_window",
    LeftAlt => "left_alt",
    Space => "space",
    RightAlt => "right_alt",
    RightWindow => "right_window",
    Menu => "menu",
    RightControl => "right_control",
    Insert => "insert",
    Home => "home",
    PageUp => "page_up",
    Delete => "rub_out",
    End => "end",
    PageDown => "page_down",
    Up => "up",
    Left => "left",
    Down => "down",
    Right => "right",
    NumLock => "num_lock",
    KeyPadDivide => "key_pad_divide",
    KeyPadMultiply => "key_pad_multiply",
    KeyPadSubtract => "key_pad_subtract",
    KeyPad7 => "key_pad_7",
    KeyPad8 => "key_pad_8",
    KeyPad9 => "key_pad_9",
    KeyPad4 => "key_pad_4",
    KeyPad5 => "key_pad_5",
    KeyPad6 => "key_pad_6",
    KeyPad1 => "key_pad_1",
    KeyPad2 => "key_pad_2",
    KeyPad3 => "key_pad_3",
    KeyPad0 => "key_pad_0",
    KeyPadDecimal => "key_pad_decimal",
    KeyPadAdd => "key_pad_add",
    KeyPadEnter => "key_pad_enter",
}

impl Key {
    pub fn from_winit(code: KeyCode) -> Option<Key> {
        let key = match code {
            KeyCode::Escape => Key::Escape,
            KeyCode::F1 => Key::F1,
            KeyCode::F2 => Key::F2,
            KeyCode::F3 => Key::F3,
            KeyCode::F4 => Key::F4,
            KeyCode::F5 => Key::F5,
            KeyCode::F6 => Key::F6,
            KeyCode::F7 => Key::F7,
            KeyCode::F8 => Key::F8,
            KeyCode::F9 => Key::F9,
            KeyCode::F10 => Key::F10,
            KeyCode::F11 => Key::F11,
            KeyCode::F12 => Key::F12,
            KeyCode::PrintScreen => Key::PrintScreen,
            KeyCode::ScrollLock => Key::ScrollLock,
            KeyCode::Pause => Key::Pause,
            KeyCode::Backquote => Key::Tilde,
            KeyCode::Digit1 => Key::Digit1,
            KeyCode::Digit2 => Key::Digit2,
            KeyCode::Digit3 => Key::Digit3,
            KeyCode::Digit4 => Key::Digit4,
            KeyCode::Digit5 => Key::Digit5,
            KeyCode::Digit6 => Key::Digit6,
            KeyCode::Digit7 => Key::Digit7,
            KeyCode::Digit8 => Key::Digit8,
            KeyCode::Digit9 => Key::Digit9,
            KeyCode::Digit0 => Key::Digit0,
            KeyCode::Minus => Key::Minus,
            KeyCode::Equal => Key::Equal,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Tab => Key::Tab,
            KeyCode::KeyQ => Key::Q,
            KeyCode::KeyW => Key::W,
            KeyCode::KeyE => Key::E,
            KeyCode::KeyR => Key::R,
            KeyCode::KeyT => Key::T,
            KeyCode::KeyY => Key::Y,
            KeyCode::KeyU => Key::U,
            KeyCode::KeyI => Key::I,
            KeyCode::KeyO => Key::O,
            KeyCode::KeyP => Key::P,
            KeyCode::BracketLeft => Key::LeftBracket,
            KeyCode::BracketRight => Key::RightBracket,
            KeyCode::Backslash => Key::Backslash,
            KeyCode::CapsLock => Key::CapsLock,
            KeyCode::KeyA => Key::A,
            KeyCode::KeyS => Key::S,
            KeyCode::KeyD => Key::D,
            KeyCode::KeyF => Key::F,
            KeyCode::KeyG => Key::G,
            KeyCode::KeyH => Key::H,
            KeyCode::KeyJ => Key::J,
            KeyCode::KeyK => Key::K,
            KeyCode::KeyL => Key::L,
            KeyCode::Semicolon => Key::Semicolon,
            KeyCode::Quote => Key::Apostrophe,
            KeyCode::Enter => Key::Enter,
            KeyCode::ShiftLeft => Key::LeftShift,
            KeyCode::KeyZ => Key::Z,
            KeyCode::KeyX => Key::X,
            KeyCode::KeyC => Key::C,
            KeyCode::KeyV => Key::V,
            KeyCode::KeyB => Key::B,
            KeyCode::KeyN => Key::N,
            KeyCode::KeyM => Key::M,
            KeyCode::Comma => Key::Comma,
            KeyCode::Period => Key::Period,
            KeyCode::Slash => Key::Slash,
            KeyCode::ShiftRight => Key::RightShift,
            KeyCode::ControlLeft => Key::LeftControl,
            KeyCode::SuperLeft => Key::LeftWindow,
            KeyCode::AltLeft => Key::LeftAlt,
            KeyCode::Space => Key::Space,
            KeyCode::AltRight => Key::RightAlt,
            KeyCode::SuperRight => Key::RightWindow,
            KeyCode::ContextMenu => Key::Menu,
            KeyCode::ControlRight => Key::RightControl,
            KeyCode::Insert => Key::Insert,
            KeyCode::Home => Key::Home,
            KeyCode::PageUp => Key::PageUp,
            KeyCode::Delete => Key::Delete,
            KeyCode::End => Key::End,
            KeyCode::PageDown => Key::PageDown,
            KeyCode::ArrowUp => Key::Up,
            KeyCode::ArrowLeft => Key::Left,
            KeyCode::ArrowDown => Key::Down,
            KeyCode::ArrowRight => Key::Right,
            KeyCode::NumLock => Key::NumLock,
            KeyCode::NumpadDivide => Key::KeyPadDivide,
            KeyCode::NumpadMultiply => Key::KeyPadMultiply,
            KeyCode::NumpadSubtract => Key::KeyPadSubtract,
            KeyCode::Numpad7 => Key::KeyPad7,
            KeyCode::Numpad8 => Key::KeyPad8,
            KeyCode::Numpad9 => Key::KeyPad9,
            KeyCode::Numpad4 => Key::KeyPad4,
            KeyCode::Numpad5 => Key::KeyPad5,
            KeyCode::Numpad6 => Key::KeyPad6,
            KeyCode::Numpad1 => Key::KeyPad1,
            KeyCode::Numpad2 => Key::KeyPad2,
            KeyCode::Numpad3 => Key::KeyPad3,
            KeyCode::Numpad0 => Key::KeyPad0,
            KeyCode::NumpadDecimal => Key::KeyPadDecimal,
            KeyCode::NumpadAdd => Key::KeyPadAdd,
            KeyCode::NumpadEnter => Key::KeyPadEnter,
            _ => return None,
        };
        Some(key)
    }
}

/// Logical modifier groups. Left and right physical keys share a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModifierKey {
    Shift,
    CapsLock,
    Control,
    Alt,
    NumLock,
    Window,
}

impl ModifierKey {
    pub fn name(self) -> &'static str {
        match self {
            ModifierKey::Shift => "shift",
            ModifierKey::CapsLock => "caps_lock",
            ModifierKey::Control => "control",
            ModifierKey::Alt => "alt",
            ModifierKey::NumLock => "num_lock",
            ModifierKey::Window => "window",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Button1,
    Button2,
    Button3,
    Button4,
    Button5,
    Button6,
    Button7,
    Button8,
    Button9,
    Button10,
    Button11,
    Button12,
    Button13,
    Button14,
    Button15,
    Button16,
    Button17,
    Button18,
    Button19,
    Button20,
}

impl MouseButton {
    pub const LEFT: MouseButton = MouseButton::Button1;
    pub const MIDDLE: MouseButton = MouseButton::Button2;
    pub const RIGHT: MouseButton = MouseButton::Button3;
    pub const SCROLL_UP: MouseButton = MouseButton::Button4;
    pub const SCROLL_DOWN: MouseButton = MouseButton::Button5;

    pub const COUNT: usize = 20;

    /// Buttons are numbered from 1 as the X server numbers them.
    pub fn from_number(n: u32) -> Option<MouseButton> {
        use MouseButton::*;
        const ORDER: [MouseButton; MouseButton::COUNT] = [
            Button1, Button2, Button3, Button4, Button5, Button6, Button7, Button8, Button9,
            Button10, Button11, Button12, Button13, Button14, Button15, Button16, Button17,
            Button18, Button19, Button20,
        ];
        let idx = usize::try_from(n).ok()?.checked_sub(1)?;
        ORDER.get(idx).copied()
    }

    pub fn number(self) -> u32 {
        self as u32 + 1
    }

    pub fn from_winit(button: winit::event::MouseButton) -> Option<MouseButton> {
        use winit::event::MouseButton as W;
        match button {
            W::Left => Some(MouseButton::LEFT),
            W::Middle => Some(MouseButton::MIDDLE),
            W::Right => Some(MouseButton::RIGHT),
            W::Back => Some(MouseButton::Button8),
            W::Forward => Some(MouseButton::Button9),
            W::Other(n) => MouseButton::from_number(u32::from(n)),
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_are_unique() {
        let mut names: Vec<_> = Key::ALL.iter().map(|k| k.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Key::COUNT);
    }

    #[test]
    fn indices_cover_the_table() {
        for (i, k) in Key::ALL.iter().enumerate() {
            assert_eq!(k.index(), i);
        }
    }

    #[test]
    fn winit_codes_map_to_physical_keys() {
        assert_eq!(Key::from_winit(KeyCode::Enter), Some(Key::Enter));
        assert_eq!(Key::from_winit(KeyCode::Insert), Some(Key::Insert));
        assert_eq!(Key::from_winit(KeyCode::Backquote), Some(Key::Tilde));
        assert_eq!(Key::from_winit(KeyCode::F24), None);
    }

    #[test]
    fn button_numbers_round_trip_and_alias() {
        assert_eq!(MouseButton::from_number(0), None);
        assert_eq!(MouseButton::from_number(21), None);
        assert_eq!(MouseButton::from_number(1), Some(MouseButton::LEFT));
        assert_eq!(MouseButton::Button20.number(), 20);
        assert_eq!(
            MouseButton::from_winit(winit::event::MouseButton::Right),
            Some(MouseButton::Button3)
        );
    }
}
