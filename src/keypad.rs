use crate::error::FaultKind;

pub const NUM_KEYS: usize = 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Key0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF,
}
impl Key {
    pub const ALL: [Key; NUM_KEYS] = [
        Key::Key0,
        Key::Key1,
        Key::Key2,
        Key::Key3,
        Key::Key4,
        Key::Key5,
        Key::Key6,
        Key::Key7,
        Key::Key8,
        Key::Key9,
        Key::KeyA,
        Key::KeyB,
        Key::KeyC,
        Key::KeyD,
        Key::KeyE,
        Key::KeyF,
    ];

    pub fn from_index(index: u8) -> Result<Key, FaultKind> {
        Self::ALL
            .get(usize::from(index))
            .copied()
            .ok_or(FaultKind::InvalidKey(index))
    }

    pub fn index(self) -> u8 {
        self as u8
    }
}

/// State of the sixteen keys plus the latch used by the wait-for-key
/// instruction.
///
/// The latch remembers the first key that went from up to down since the
/// host last called [`Keypad::clear_latch`], typically once per frame. A key
/// that was already held before then has to be released and pressed again.
#[derive(Clone, Debug, Default)]
pub struct Keypad {
    pressed: [bool; NUM_KEYS],
    awaiting: bool,
    latched: Option<Key>,
}
impl Keypad {
    pub fn new() -> Self {
        Keypad::default()
    }

    pub fn set_key(&mut self, key: Key, pressed: bool) {
        let slot = &mut self.pressed[usize::from(key.index())];
        if pressed && !*slot && self.latched.is_none() {
            self.latched = Some(key);
        }
        *slot = pressed;
    }

    pub fn press_key(&mut self, key: Key) {
        self.set_key(key, true);
    }

    pub fn release_key(&mut self, key: Key) {
        self.set_key(key, false);
    }

    pub fn release_all(&mut self) {
        self.pressed = [false; NUM_KEYS];
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        self.pressed[usize::from(key.index())]
    }

    /// Forgets any press not yet consumed by a wait.
    pub fn clear_latch(&mut self) {
        self.latched = None;
    }

    /// Polls for a key press on behalf of a wait instruction.
    ///
    /// Returns the latched key exactly once. While nothing is latched the
    /// keypad stays in the waiting state.
    pub fn await_key(&mut self) -> Option<Key> {
        match self.latched.take() {
            Some(key) => {
                self.awaiting = false;
                Some(key)
            }
            None => {
                self.awaiting = true;
                None
            }
        }
    }

    pub fn is_awaiting(&self) -> bool {
        self.awaiting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_from_index_rejects_out_of_range() {
        assert_eq!(Key::from_index(0xA), Ok(Key::KeyA));
        assert_eq!(Key::from_index(0x10), Err(FaultKind::InvalidKey(0x10)));
    }

    #[test]
    fn set_key_is_independent_per_key() {
        let mut keypad = Keypad::new();
        keypad.press_key(Key::Key1);
        keypad.press_key(Key::KeyF);
        keypad.release_key(Key::Key1);

        assert!(!keypad.is_pressed(Key::Key1));
        assert!(keypad.is_pressed(Key::KeyF));
        keypad.release_all();
        assert!(!keypad.is_pressed(Key::KeyF));
    }

    #[test]
    fn await_key_reports_a_new_press_once() {
        let mut keypad = Keypad::new();
        assert_eq!(keypad.await_key(), None);
        assert!(keypad.is_awaiting());

        keypad.press_key(Key::Key7);
        keypad.press_key(Key::Key8);
        assert_eq!(keypad.await_key(), Some(Key::Key7));
        assert!(!keypad.is_awaiting());

        // Keys still held do not satisfy the next wait.
        assert_eq!(keypad.await_key(), None);
        assert_eq!(keypad.await_key(), None);
    }

    #[test]
    fn press_just_before_the_wait_is_reported() {
        let mut keypad = Keypad::new();
        keypad.press_key(Key::Key9);
        keypad.release_key(Key::Key9);

        assert_eq!(keypad.await_key(), Some(Key::Key9));
    }

    #[test]
    fn await_key_ignores_keys_held_across_a_clear() {
        let mut keypad = Keypad::new();
        keypad.press_key(Key::Key2);
        keypad.clear_latch();
        assert_eq!(keypad.await_key(), None);

        keypad.press_key(Key::Key2);
        assert_eq!(keypad.await_key(), None);

        keypad.release_key(Key::Key2);
        keypad.press_key(Key::Key2);
        assert_eq!(keypad.await_key(), Some(Key::Key2));
    }

    #[test]
    fn cleared_presses_are_forgotten() {
        let mut keypad = Keypad::new();
        keypad.press_key(Key::Key3);
        keypad.release_key(Key::Key3);
        keypad.clear_latch();

        assert_eq!(keypad.await_key(), None);
        assert_eq!(keypad.await_key(), None);
    }
}
