//! Application errors
use std::fmt;

#[derive(Debug)]
pub struct AppError {
    pub kind: ErrorKind,
}

impl std::error::Error for AppError {}

#[derive(Debug)]
pub enum ErrorKind {
    Chip8(chip8::prelude::Chip8Error),
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    /// Configuration that parsed but can't be used.
    Config(String),
}

impl AppError {
    pub fn config(msg: impl ToString) -> Self {
        Self {
            kind: ErrorKind::Config(msg.to_string()),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "application error: {}", self.kind)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chip8(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Yaml(err) => write!(f, "config file: {err}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl From<chip8::prelude::Chip8Error> for AppError {
    fn from(err: chip8::prelude::Chip8Error) -> Self {
        Self {
            kind: ErrorKind::Chip8(err),
        }
    }
}

impl From<fmt::Error> for AppError {
    fn from(err: fmt::Error) -> Self {
        chip8::prelude::Chip8Error::from(err).into()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self {
            kind: ErrorKind::Io(err),
        }
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        Self {
            kind: ErrorKind::Yaml(err),
        }
    }
}
