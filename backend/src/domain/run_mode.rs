//! Development/production switch consulted by the launch-context resolvers.

use std::fmt;
use std::str::FromStr;

/// Run mode controlling fallback behaviour for missing launch context.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunMode {
    /// Missing identity or group context falls back to fixed stand-ins.
    Development,
    /// Missing identity or group context is reported as an error.
    Production,
}

/// Error returned when a configured run mode is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown run mode '{value}'; expected development|production")]
pub struct RunModeParseError {
    value: String,
}

impl RunMode {
    /// Determine the run mode from `cfg!(debug_assertions)`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use taskboard::domain::RunMode;
    ///
    /// let mode = RunMode::from_debug_assertions();
    /// if cfg!(debug_assertions) {
    ///     assert_eq!(mode, RunMode::Development);
    /// } else {
    ///     assert_eq!(mode, RunMode::Production);
    /// }
    /// ```
    #[must_use]
    pub fn from_debug_assertions() -> Self {
        if cfg!(debug_assertions) {
            Self::Development
        } else {
            Self::Production
        }
    }

    /// Whether development fallbacks apply.
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for RunMode {
    type Err = RunModeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(RunModeParseError {
                value: value.to_owned(),
            }),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Production => f.write_str("production"),
        }
    }
}
