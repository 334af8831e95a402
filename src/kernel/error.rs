//! Simulator errors
//!
//! Every rejected intent leaves the simulation untouched.

use super::Variant;
use std::fmt;

/// Result type for simulator operations
pub type SimResult<T> = Result<T, SimError>;

/// Reasons a host intent or configuration is rejected
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// Slot count of zero or above the maximum
    InvalidConcurrency(usize),
    /// This variant has a fixed number of slots
    FixedConcurrency(Variant),
    /// Category hint belongs to a different variant
    ForeignCategory {
        variant: Variant,
        category: &'static str,
    },
    /// No category with this id
    UnknownCategory(String),
    /// No priority with this id
    UnknownPriority(String),
    /// No variant with this id
    UnknownVariant(String),
    /// Configuration failed to parse or validate
    InvalidConfig(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::InvalidConcurrency(n) => write!(
                f,
                "invalid concurrency {} (must be 1..={})",
                n,
                super::MAX_CONCURRENCY
            ),
            SimError::FixedConcurrency(v) => write!(f, "{} has a fixed number of slots", v),
            SimError::ForeignCategory { variant, category } => {
                write!(f, "category '{}' does not belong to {}", category, variant)
            }
            SimError::UnknownCategory(s) => write!(f, "unknown category: {}", s),
            SimError::UnknownPriority(s) => write!(f, "unknown priority: {}", s),
            SimError::UnknownVariant(s) => write!(f, "unknown variant: {}", s),
            SimError::InvalidConfig(s) => write!(f, "invalid config: {}", s),
        }
    }
}

impl std::error::Error for SimError {}

impl From<serde_json::Error> for SimError {
    fn from(e: serde_json::Error) -> Self {
        SimError::InvalidConfig(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            SimError::InvalidConcurrency(0).to_string(),
            "invalid concurrency 0 (must be 1..=64)"
        );
        assert_eq!(
            SimError::FixedConcurrency(Variant::Tasklet).to_string(),
            "tasklet has a fixed number of slots"
        );
    }
}
