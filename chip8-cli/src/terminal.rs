//! Headless devices backed by the terminal.
use std::{io::Write, time::Duration};

use chip8::{prelude::*, KeyCode};
use log::{debug, info, warn};

use crate::{config::ScheduledPress, error::AppError};

/// Prints frames to a writer, and takes key input from a [`Keypad`].
pub struct Terminal<W: Write> {
    out: W,
    keypad: Keypad,
    render: bool,
    /// Last frame that was printed, to skip redraws that change nothing.
    last_frame: Option<Framebuffer>,
    frame_count: usize,
}

impl<W: Write> Terminal<W> {
    pub fn new(out: W, render: bool) -> Self {
        Self {
            out,
            keypad: Keypad::new(),
            render,
            last_frame: None,
            frame_count: 0,
        }
    }

    pub fn keypad_mut(&mut self) -> &mut Keypad {
        &mut self.keypad
    }

    /// Number of distinct frames printed so far.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn print_frame(&mut self, display: &Framebuffer) -> Result<(), AppError> {
        let text = display.dump()?;
        writeln!(self.out, "frame {} ({})", self.frame_count, self.keypad)?;
        writeln!(self.out, "{text}")?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> Screen for Terminal<W> {
    fn draw(&mut self, display: &Framebuffer) {
        if !self.render || self.last_frame.as_ref() == Some(display) {
            return;
        }

        self.frame_count += 1;
        if let Err(err) = self.print_frame(display) {
            warn!("failed to print frame: {err}");
        }
        self.last_frame = Some(display.clone());
    }

    fn clear(&mut self) {
        debug!("screen cleared");
    }
}

impl<W: Write> Keyboard for Terminal<W> {
    fn is_pressed(&self, key: KeyCode) -> bool {
        self.keypad.is_pressed(key)
    }

    fn poll_key_press(&mut self) -> Option<KeyCode> {
        self.keypad.poll_key_press()
    }
}

impl<W: Write> Speaker for Terminal<W> {
    fn buzz(&mut self, state: bool) {
        info!("buzzer {}", if state { "on" } else { "off" });
    }
}

/// Replays scheduled key presses as the run progresses.
#[derive(Debug)]
pub struct KeyScript {
    /// Key transitions ordered by time.
    events: Vec<(Duration, KeyCode, bool)>,
    cursor: usize,
}

impl KeyScript {
    pub fn new(presses: &[ScheduledPress]) -> Result<Self, AppError> {
        let mut events = Vec::with_capacity(presses.len() * 2);
        for press in presses {
            let (down, up) = press.span()?;
            events.push((down, press.key, true));
            events.push((up, press.key, false));
        }
        events.sort_by_key(|(at, _, _)| *at);

        Ok(Self { events, cursor: 0 })
    }

    /// Apply every key transition that is due by `elapsed`.
    pub fn apply(&mut self, elapsed: Duration, keypad: &mut Keypad) {
        while let Some((at, key, pressed)) = self.events.get(self.cursor).copied() {
            if at > elapsed {
                break;
            }
            debug!("scripted key {key} {}", if pressed { "down" } else { "up" });
            keypad.set_key(key, pressed);
            self.cursor += 1;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::CliConf;

    #[test]
    fn test_draw_skips_unchanged_frames() {
        let mut terminal = Terminal::new(Vec::new(), true);
        let mut display = Framebuffer::new();

        terminal.draw(&display);
        terminal.draw(&display);
        assert_eq!(terminal.frame_count(), 1);

        display.toggle(0, 0);
        terminal.draw(&display);
        assert_eq!(terminal.frame_count(), 2);

        let text = String::from_utf8(terminal.out.clone()).unwrap();
        assert!(text.starts_with("frame 1 (keys:)\n"));
        assert!(text.contains("frame 2 (keys:)\n#"));
    }

    #[test]
    fn test_render_disabled() {
        let mut terminal = Terminal::new(Vec::new(), false);
        terminal.draw(&Framebuffer::new());
        assert_eq!(terminal.frame_count(), 0);
        assert!(terminal.out.is_empty());
    }

    #[test]
    fn test_key_script() {
        let conf = CliConf::parse(
            r#"
presses:
  - { at: 1, key: 7, hold: 1 }
  - { at: 0.5, key: 3 }
"#,
        )
        .unwrap();
        let mut script = KeyScript::new(&conf.presses).unwrap();
        let mut keypad = Keypad::new();

        script.apply(Duration::from_millis(100), &mut keypad);
        assert!(!keypad.any_key());

        script.apply(Duration::from_millis(550), &mut keypad);
        assert!(keypad.is_pressed(KeyCode::Key3));

        script.apply(Duration::from_millis(1500), &mut keypad);
        assert!(!keypad.is_pressed(KeyCode::Key3));
        assert!(keypad.is_pressed(KeyCode::Key7));
        assert_eq!(keypad.poll_key_press(), Some(KeyCode::Key3));
        assert_eq!(keypad.poll_key_press(), Some(KeyCode::Key7));

        script.apply(Duration::from_secs(2), &mut keypad);
        assert!(!keypad.any_key());
        assert_eq!(script.cursor, 4);
    }
}
