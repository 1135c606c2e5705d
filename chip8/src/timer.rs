//! Delay and sound timers.

/// Countdown registers that tick at 60Hz, independent of the CPU clock.
#[derive(Debug, Default, Clone)]
pub struct Timers {
    /// (DT) Delay timer that counts down to 0.
    pub delay: u8,
    /// (ST) Sound timer that counts down to 0. When it has a non-zero value, a beep is played.
    pub sound: u8,
    /// Buzzer state last reported to the outside world.
    buzzer_state: bool,
}

impl Timers {
    /// Count down both timers by one, stopping at zero.
    #[inline]
    pub fn tick(&mut self) {
        self.delay = self.delay.saturating_sub(1);
        self.sound = self.sound.saturating_sub(1);
    }

    /// Buzzer should be on while sound timer counts down.
    #[inline(always)]
    pub fn is_buzzing(&self) -> bool {
        self.sound > 0
    }

    /// Returns the new buzzer state when it changed since the last call.
    pub fn buzzer_change(&mut self) -> Option<bool> {
        let buzzing = self.is_buzzing();
        if buzzing != self.buzzer_state {
            self.buzzer_state = buzzing;
            Some(buzzing)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tick_stops_at_zero() {
        let mut timers = Timers {
            delay: 2,
            sound: 1,
            ..Default::default()
        };

        timers.tick();
        assert_eq!((timers.delay, timers.sound), (1, 0));
        timers.tick();
        timers.tick();
        assert_eq!((timers.delay, timers.sound), (0, 0));
    }

    #[test]
    fn test_buzzer_transitions() {
        let mut timers = Timers::default();
        assert_eq!(timers.buzzer_change(), None);

        timers.sound = 2;
        assert_eq!(timers.buzzer_change(), Some(true));
        assert_eq!(timers.buzzer_change(), None);

        timers.tick();
        assert_eq!(timers.buzzer_change(), None);
        timers.tick();
        assert_eq!(timers.buzzer_change(), Some(false));
        assert_eq!(timers.buzzer_change(), None);
    }
}
