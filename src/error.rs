//! Error types.

use std::fmt;

/// Why a single morphology could not be synthesized. Nothing from a failed
/// morphology is published to the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisError {
    /// The tree structure and the built primitive index disagree.
    StructuralInconsistency {
        morphology: u64,
        section: usize,
        detail: String,
    },
    /// A configuration value is outside its accepted range.
    InvalidConfig { field: &'static str, detail: String },
}

impl fmt::Display for SynthesisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthesisError::StructuralInconsistency { morphology, section, detail } => write!(
                f,
                "[synthesis] morphology {} section {}: {}",
                morphology, section, detail
            ),
            SynthesisError::InvalidConfig { field, detail } => {
                write!(f, "[config] {}: {}", field, detail)
            }
        }
    }
}

impl std::error::Error for SynthesisError {}

/// Unknown display name given to a configuration enum's `FromStr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigParseError {
    pub option: &'static str,
    pub value: String,
}

impl fmt::Display for ConfigParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.option, self.value)
    }
}

impl std::error::Error for ConfigParseError {}
