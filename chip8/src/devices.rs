//! IO device interface
use std::collections::VecDeque;

use crate::{constants::*, display::Framebuffer};

/// Display collaborator.
///
/// Receives read-only snapshots of the framebuffer.
pub trait Screen {
    /// Blit the display buffer to screen output.
    fn draw(&mut self, display: &Framebuffer);

    /// The program cleared the screen.
    fn clear(&mut self);
}

/// Keyboard collaborator.
pub trait Keyboard {
    /// Checks immediately whether the given key is currently pressed.
    fn is_pressed(&self, key: KeyCode) -> bool;

    /// Take the next key press event, if one happened. Must not block.
    fn poll_key_press(&mut self) -> Option<KeyCode>;
}

/// Audio collaborator.
pub trait Speaker {
    /// Turn the sound buzzer on or off.
    fn buzz(&mut self, state: bool);
}

/// Hooks to provide IO devices to the virtual machine.
pub trait Devices: Screen + Keyboard + Speaker {}

impl<T> Devices for T where T: Screen + Keyboard + Speaker {}

/// Keyboard input state of the 16 key hex keypad.
///
/// Pressed is a 1 bit, released is a 0 bit. Presses are also
/// queued as events, which is what `Fx0A (LD Vx, K)` waits on.
/// Only the most recent 16 unpolled presses are kept.
#[derive(Debug, Default)]
pub struct Keypad {
    state: u16,
    events: VecDeque<KeyCode>,
}

impl Keypad {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set_key(&mut self, key: KeyCode, pressed: bool) {
        let mask = 1 << key.as_u8();
        if pressed {
            // Holding a key down doesn't repeat the press event.
            if self.state & mask == 0 {
                if self.events.len() >= KEY_COUNT as usize {
                    self.events.pop_front();
                }
                self.events.push_back(key);
            }
            self.state |= mask;
        } else {
            self.state &= !mask;
        }
    }

    pub fn press(&mut self, key: KeyCode) {
        self.set_key(key, true)
    }

    pub fn release(&mut self, key: KeyCode) {
        self.set_key(key, false)
    }

    /// Check whether any key is pressed down.
    #[inline(always)]
    pub fn any_key(&self) -> bool {
        self.state > 0
    }

    /// Iterate the keys that are currently pressed down.
    pub fn pressed(&self) -> impl Iterator<Item = KeyCode> + '_ {
        KeyCode::ALL
            .into_iter()
            .filter(|k| self.is_pressed(*k))
    }

    /// Clear the keyboard input state, setting all keys to up.
    pub fn clear(&mut self) {
        self.state = 0;
        self.events.clear();
    }
}

impl std::fmt::Display for Keypad {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "keys:")?;
        for key in self.pressed() {
            write!(f, " {key}")?;
        }
        Ok(())
    }
}

impl Keyboard for Keypad {
    #[inline]
    fn is_pressed(&self, key: KeyCode) -> bool {
        self.state & (1 << key.as_u8()) > 0
    }

    #[inline]
    fn poll_key_press(&mut self) -> Option<KeyCode> {
        self.events.pop_front()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyCode {
    Key0 = 0,
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
    KeyF = 0xF,
}

impl KeyCode {
    /// All keys, indexed by their value.
    pub const ALL: [KeyCode; KEY_COUNT as usize] = [
        Self::Key0,
        Self::Key1,
        Self::Key2,
        Self::Key3,
        Self::Key4,
        Self::Key5,
        Self::Key6,
        Self::Key7,
        Self::Key8,
        Self::Key9,
        Self::KeyA,
        Self::KeyB,
        Self::KeyC,
        Self::KeyD,
        Self::KeyE,
        Self::KeyF,
    ];

    #[inline(always)]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let key_id = self.as_u8();
        write!(f, "k{key_id:x}")
    }
}

impl From<KeyCode> for u8 {
    fn from(keycode: KeyCode) -> Self {
        keycode.as_u8()
    }
}

impl TryFrom<u8> for KeyCode {
    type Error = InvalidKeyCode;

    fn try_from(key_id: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(key_id as usize)
            .copied()
            .ok_or(InvalidKeyCode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidKeyCode;

impl std::error::Error for InvalidKeyCode {}

impl std::fmt::Display for InvalidKeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "keycode must be in range 0 <= keycode < 16")
    }
}

#[cfg(feature = "serde")]
mod de {
    use std::fmt::Display;

    use num_traits::ToPrimitive;
    use serde::de::{Deserialize, Error, Expected, Unexpected, Visitor};

    use super::*;

    impl Expected for InvalidKeyCode {
        fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            <Self as Display>::fmt(self, f)
        }
    }

    impl<'de> Deserialize<'de> for KeyCode {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            // YAML integer type
            deserializer.deserialize_i64(KeyCodeVisitor)
        }
    }

    struct KeyCodeVisitor;

    impl KeyCodeVisitor {
        #[inline]
        fn to_key<N, E>(val: N, unexpected: Unexpected) -> Result<KeyCode, E>
        where
            N: ToPrimitive,
            E: Error,
        {
            val.to_u8()
                .and_then(|key_id| KeyCode::try_from(key_id).ok())
                .ok_or_else(|| E::invalid_value(unexpected, &InvalidKeyCode))
        }
    }

    impl<'de> Visitor<'de> for KeyCodeVisitor {
        type Value = KeyCode;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "an integer between 0 and 15")
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Self::to_key(v, Unexpected::Signed(v))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Self::to_key(v, Unexpected::Unsigned(v))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_key_state() {
        let mut keypad = Keypad::new();

        keypad.press(KeyCode::Key0);
        assert_eq!(keypad.state, 0b00000000_00000001);
        assert!(keypad.is_pressed(KeyCode::Key0));
        assert!(!keypad.is_pressed(KeyCode::Key1));
        assert!(!keypad.is_pressed(KeyCode::Key7));

        keypad.press(KeyCode::Key7);
        assert_eq!(keypad.state, 0b00000000_10000001);

        keypad.release(KeyCode::Key0);
        assert_eq!(keypad.state, 0b00000000_10000000);
        assert!(!keypad.is_pressed(KeyCode::Key0));
        assert!(keypad.is_pressed(KeyCode::Key7));

        keypad.press(KeyCode::KeyF);
        assert_eq!(keypad.state, 0b10000000_10000000);
        assert_eq!(
            keypad.pressed().collect::<Vec<_>>(),
            vec![KeyCode::Key7, KeyCode::KeyF]
        );
    }

    #[test]
    fn test_press_events() {
        let mut keypad = Keypad::new();

        keypad.press(KeyCode::Key5);
        keypad.press(KeyCode::Key5); // held
        keypad.press(KeyCode::KeyA);

        assert_eq!(keypad.poll_key_press(), Some(KeyCode::Key5));
        assert_eq!(keypad.poll_key_press(), Some(KeyCode::KeyA));
        assert_eq!(keypad.poll_key_press(), None);
        assert!(keypad.any_key());

        keypad.clear();
        assert!(!keypad.any_key());
    }

    #[test]
    fn test_press_queue_capped() {
        let mut keypad = Keypad::new();

        for _ in 0..2 {
            for key in KeyCode::ALL {
                keypad.press(key);
                keypad.release(key);
            }
        }
        keypad.press(KeyCode::Key3);

        // Oldest presses are dropped first.
        assert_eq!(keypad.poll_key_press(), Some(KeyCode::Key1));
        assert_eq!(keypad.events.len(), 15);
        assert_eq!(keypad.events.back(), Some(&KeyCode::Key3));
    }

    #[test]
    fn test_keypad_display() {
        let mut keypad = Keypad::new();
        assert_eq!(keypad.to_string(), "keys:");

        keypad.press(KeyCode::KeyA);
        keypad.press(KeyCode::Key5);
        assert_eq!(keypad.to_string(), "keys: k5 ka");
    }

    #[test]
    fn test_keycode_conversion() {
        assert_eq!(KeyCode::try_from(0xB).unwrap(), KeyCode::KeyB);
        assert!(KeyCode::try_from(16).is_err());
        assert_eq!(u8::from(KeyCode::KeyC), 12);
        assert_eq!(KeyCode::KeyC.to_string(), "kc");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_keycode() {
        let keys: Vec<KeyCode> = serde_yaml::from_str("[0, 10, 15]").unwrap();
        assert_eq!(keys, vec![KeyCode::Key0, KeyCode::KeyA, KeyCode::KeyF]);

        assert!(serde_yaml::from_str::<KeyCode>("16").is_err());
        assert!(serde_yaml::from_str::<KeyCode>("-1").is_err());
    }
}
