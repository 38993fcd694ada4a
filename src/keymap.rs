use crossterm::event::KeyCode;

use crate::keypad::Key;

pub const LEGEND: &str = "Key Mapping:\n\
    1 2 3 4    →    1 2 3 C\n\
    Q W E R    →    4 5 6 D\n\
    A S D F    →    7 8 9 E\n\
    Z X C V    →    A 0 B F";

/// Maps the left-hand 4x4 block of a QWERTY keyboard onto the hex keypad.
pub fn key_for(code: KeyCode) -> Option<Key> {
    let KeyCode::Char(c) = code else {
        return None;
    };
    let key = match c.to_ascii_lowercase() {
        '1' => Key::Key1,
        '2' => Key::Key2,
        '3' => Key::Key3,
        '4' => Key::KeyC,
        'q' => Key::Key4,
        'w' => Key::Key5,
        'e' => Key::Key6,
        'r' => Key::KeyD,
        'a' => Key::Key7,
        's' => Key::Key8,
        'd' => Key::Key9,
        'f' => Key::KeyE,
        'z' => Key::KeyA,
        'x' => Key::Key0,
        'c' => Key::KeyB,
        'v' => Key::KeyF,
        _ => return None,
    };
    Some(key)
}
