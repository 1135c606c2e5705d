//! Runner configuration, loaded from YAML.
use std::{fs, time::Duration};

use chip8::{prelude::*, KeyCode};
use log::debug;
use serde::Deserialize;

use crate::error::AppError;

/// Settings for the terminal runner.
///
/// ```yaml
/// clock_frequency: 700
/// seed: 42
/// run_seconds: 10
/// render: true
/// presses:
///   - { at: 1.5, key: 5 }
///   - { at: 2.0, key: 10, hold: 0.5 }
/// ```
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CliConf {
    #[serde(flatten)]
    pub vm: Chip8Conf,
    /// Stop after this many seconds. Runs until halted when unset.
    pub run_seconds: Option<f64>,
    /// Print frames to the terminal when they change.
    pub render: bool,
    /// Scripted key input.
    pub presses: Vec<ScheduledPress>,
}

impl Default for CliConf {
    fn default() -> Self {
        Self {
            vm: Chip8Conf::default(),
            run_seconds: None,
            render: true,
            presses: Vec::new(),
        }
    }
}

/// Key held down at a point in time, relative to the start of the run.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduledPress {
    /// Seconds after start.
    pub at: f64,
    pub key: KeyCode,
    /// Seconds until the key is released.
    #[serde(default = "default_hold")]
    pub hold: f64,
}

fn default_hold() -> f64 {
    0.1
}

impl CliConf {
    pub fn from_file(filepath: &str) -> Result<Self, AppError> {
        let file = fs::File::open(filepath)?;
        let conf: Self = serde_yaml::from_reader(file)?;
        debug!("loaded config: {conf:#?}");
        Ok(conf)
    }

    pub fn parse(text: &str) -> Result<Self, AppError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn run_limit(&self) -> Result<Option<Duration>, AppError> {
        self.run_seconds.map(seconds("run_seconds")).transpose()
    }
}

impl ScheduledPress {
    /// Times at which the key goes down and comes back up.
    pub fn span(&self) -> Result<(Duration, Duration), AppError> {
        let down = seconds("presses.at")(self.at)?;
        let hold = seconds("presses.hold")(self.hold)?;
        let up = down.checked_add(hold).ok_or_else(|| {
            AppError::config(format!(
                "presses.at + presses.hold = {} + {} is too large",
                self.at, self.hold
            ))
        })?;
        Ok((down, up))
    }
}

fn seconds(field: &'static str) -> impl Fn(f64) -> Result<Duration, AppError> {
    move |value| {
        Duration::try_from_secs_f64(value)
            .map_err(|err| AppError::config(format!("{field} = {value}: {err}")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let conf = CliConf::parse("{}").unwrap();
        assert!(conf.render);
        assert_eq!(conf.run_seconds, None);
        assert_eq!(conf.vm.clock_frequency, None);
        assert!(!conf.vm.step_mode);
        assert!(conf.presses.is_empty());
    }

    #[test]
    fn test_parse_full() {
        let conf = CliConf::parse(
            r#"
clock_frequency: 1000
step_mode: true
seed: 42
run_seconds: 3
render: false
presses:
  - { at: 0.5, key: 5 }
  - { at: 1, key: 15, hold: 0.25 }
"#,
        )
        .unwrap();

        assert_eq!(conf.vm.clock_frequency, Some(Hz(1000)));
        assert!(conf.vm.step_mode);
        assert_eq!(conf.vm.seed, Some(42));
        assert_eq!(conf.run_limit().unwrap(), Some(Duration::from_secs(3)));
        assert!(!conf.render);

        assert_eq!(conf.presses[0].key, KeyCode::Key5);
        assert_eq!(
            conf.presses[0].span().unwrap(),
            (Duration::from_millis(500), Duration::from_millis(600))
        );
        assert_eq!(conf.presses[1].key, KeyCode::KeyF);
        assert_eq!(
            conf.presses[1].span().unwrap(),
            (Duration::from_secs(1), Duration::from_millis(1250))
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(CliConf::parse("presses: [{ at: 0, key: 16 }]").is_err());

        let conf = CliConf::parse("run_seconds: -1").unwrap();
        assert!(conf.run_limit().is_err());

        // Each value fits, but the release time doesn't.
        let conf = CliConf::parse("presses: [{ at: 1.0e19, key: 1, hold: 1.0e19 }]").unwrap();
        assert!(conf.presses[0].span().is_err());
    }
}
