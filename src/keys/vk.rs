//! Virtual key codes
//!
//! Mapping files store Windows virtual-key codes so files stay portable
//! between hosts. Terminal key events are translated into these codes, and
//! the injector translates them back into backend keys.

use crossterm::event::{KeyCode as TermKey, KeyEvent, KeyModifiers, ModifierKeyCode};
use enigo::Key;

use crate::mapping::KeyCode;

pub const BACKSPACE: KeyCode = 0x08;
pub const TAB: KeyCode = 0x09;
pub const RETURN: KeyCode = 0x0D;
pub const SHIFT: KeyCode = 0x10;
pub const CONTROL: KeyCode = 0x11;
pub const MENU: KeyCode = 0x12;
pub const CAPITAL: KeyCode = 0x14;
pub const ESCAPE: KeyCode = 0x1B;
pub const SPACE: KeyCode = 0x20;
pub const PRIOR: KeyCode = 0x21;
pub const NEXT: KeyCode = 0x22;
pub const END: KeyCode = 0x23;
pub const HOME: KeyCode = 0x24;
pub const LEFT: KeyCode = 0x25;
pub const UP: KeyCode = 0x26;
pub const RIGHT: KeyCode = 0x27;
pub const DOWN: KeyCode = 0x28;
pub const INSERT: KeyCode = 0x2D;
pub const DELETE: KeyCode = 0x2E;
pub const LWIN: KeyCode = 0x5B;
pub const F1: KeyCode = 0x70;
pub const F24: KeyCode = 0x87;

/// Translate a terminal key-down event into virtual key codes.
///
/// Held modifiers come first (Ctrl, Shift, Alt), followed by the key itself.
/// Returns an empty vector for keys without a virtual key equivalent.
pub fn from_key_event(event: &KeyEvent) -> Vec<KeyCode> {
    let Some(main) = from_term_key(event.code) else {
        return Vec::new();
    };

    let mut codes = Vec::with_capacity(4);
    if event.modifiers.contains(KeyModifiers::CONTROL) && main != CONTROL {
        codes.push(CONTROL);
    }
    let shifted_letter = matches!(event.code, TermKey::Char(c) if c.is_ascii_uppercase());
    if (event.modifiers.contains(KeyModifiers::SHIFT) || shifted_letter) && main != SHIFT {
        codes.push(SHIFT);
    }
    if event.modifiers.contains(KeyModifiers::ALT) && main != MENU {
        codes.push(MENU);
    }
    codes.push(main);
    codes
}

fn from_term_key(code: TermKey) -> Option<KeyCode> {
    let vk = match code {
        TermKey::Backspace => BACKSPACE,
        TermKey::Tab | TermKey::BackTab => TAB,
        TermKey::Enter => RETURN,
        TermKey::Esc => ESCAPE,
        TermKey::PageUp => PRIOR,
        TermKey::PageDown => NEXT,
        TermKey::End => END,
        TermKey::Home => HOME,
        TermKey::Left => LEFT,
        TermKey::Up => UP,
        TermKey::Right => RIGHT,
        TermKey::Down => DOWN,
        TermKey::Insert => INSERT,
        TermKey::Delete => DELETE,
        TermKey::CapsLock => CAPITAL,
        TermKey::F(n) if (1..=24).contains(&n) => F1 + KeyCode::from(n - 1),
        TermKey::Char(c) => return from_char(c),
        TermKey::Modifier(modifier) => match modifier {
            ModifierKeyCode::LeftShift | ModifierKeyCode::RightShift => SHIFT,
            ModifierKeyCode::LeftControl | ModifierKeyCode::RightControl => CONTROL,
            ModifierKeyCode::LeftAlt | ModifierKeyCode::RightAlt => MENU,
            ModifierKeyCode::LeftSuper | ModifierKeyCode::RightSuper => LWIN,
            _ => return None,
        },
        _ => return None,
    };
    Some(vk)
}

fn from_char(c: char) -> Option<KeyCode> {
    let vk = match c {
        'a'..='z' | 'A'..='Z' => c.to_ascii_uppercase() as KeyCode,
        '0'..='9' => c as KeyCode,
        ' ' => SPACE,
        ';' => 0xBA,
        '=' => 0xBB,
        ',' => 0xBC,
        '-' => 0xBD,
        '.' => 0xBE,
        '/' => 0xBF,
        '`' => 0xC0,
        '[' => 0xDB,
        '\\' => 0xDC,
        ']' => 0xDD,
        '\'' => 0xDE,
        _ => return None,
    };
    Some(vk)
}

/// Translate a virtual key code into a key for the injection backend.
///
/// On Windows the code is passed through untouched. Elsewhere common keys
/// are mapped by name and anything else is handed over as a raw code.
pub fn to_backend_key(code: KeyCode) -> Key {
    if cfg!(windows) {
        return Key::Other(u32::from(code));
    }

    match code {
        BACKSPACE => Key::Backspace,
        TAB => Key::Tab,
        RETURN => Key::Return,
        SHIFT => Key::Shift,
        CONTROL => Key::Control,
        MENU => Key::Alt,
        CAPITAL => Key::CapsLock,
        ESCAPE => Key::Escape,
        SPACE => Key::Space,
        PRIOR => Key::PageUp,
        NEXT => Key::PageDown,
        END => Key::End,
        HOME => Key::Home,
        LEFT => Key::LeftArrow,
        UP => Key::UpArrow,
        RIGHT => Key::RightArrow,
        DOWN => Key::DownArrow,
        DELETE => Key::Delete,
        LWIN => Key::Meta,
        0x30..=0x39 => Key::Unicode(char::from(code as u8)),
        0x41..=0x5A => Key::Unicode(char::from(code as u8).to_ascii_lowercase()),
        0x70 => Key::F1,
        0x71 => Key::F2,
        0x72 => Key::F3,
        0x73 => Key::F4,
        0x74 => Key::F5,
        0x75 => Key::F6,
        0x76 => Key::F7,
        0x77 => Key::F8,
        0x78 => Key::F9,
        0x79 => Key::F10,
        0x7A => Key::F11,
        0x7B => Key::F12,
        0xBA => Key::Unicode(';'),
        0xBB => Key::Unicode('='),
        0xBC => Key::Unicode(','),
        0xBD => Key::Unicode('-'),
        0xBE => Key::Unicode('.'),
        0xBF => Key::Unicode('/'),
        0xC0 => Key::Unicode('`'),
        0xDB => Key::Unicode('['),
        0xDC => Key::Unicode('\\'),
        0xDD => Key::Unicode(']'),
        0xDE => Key::Unicode('\''),
        other => Key::Other(u32::from(other)),
    }
}
