//! Error type for the fallible edges of the crate (storage, config, parsing
//! of user-supplied names). Graph operations themselves never fail; they
//! degrade to no-ops and report through their return values.

/// Main Planboard error type
#[derive(Debug, thiserror::Error)]
pub enum PlanboardError {
    /// Filesystem failure while reading or writing boards/settings
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Board or stage file is not valid JSON for the expected shape
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// No board file with this name
    #[error("board not found: {0}")]
    UnknownBoard(String),

    /// Layout algorithm name not recognised
    #[error("unknown layout algorithm: {0} (expected hierarchical, depth, force, radial or staged)")]
    UnknownAlgorithm(String),

    /// Stage id not recognised
    #[error("unknown stage: {0}")]
    UnknownStage(String),
}

impl PlanboardError {
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::UnknownBoard(_) => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlanboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PlanboardError::UnknownStage("marketing".to_string());
        assert!(err.to_string().contains("unknown stage"));
    }

    #[test]
    fn not_found_classification() {
        assert!(PlanboardError::UnknownBoard("x".into()).is_not_found());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(PlanboardError::from(io).is_not_found());
        assert!(!PlanboardError::UnknownAlgorithm("spiral".into()).is_not_found());
    }
}
