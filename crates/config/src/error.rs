use std::path::PathBuf;

use crate::validate::Diagnostic;

/// Startup-fatal configuration problems.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("unsupported config format: .{0}")]
    UnsupportedFormat(String),

    #[error("invalid value in {name}: {message}")]
    InvalidEnv { name: String, message: String },

    #[error("invalid configuration: {}", summarize(.problems))]
    Invalid { problems: Vec<Diagnostic> },
}

impl Error {
    #[must_use]
    pub fn invalid_env(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::InvalidEnv {
            name: name.into(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

fn summarize(problems: &[Diagnostic]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;
