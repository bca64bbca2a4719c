//! Error types for the sf-app service layer.

use crate::coastline::LandPoint;
use crate::solver_stage::SolverPhase;
use std::fmt;

/// Application error covering every pipeline stage. Each variant maps to one
/// category of [`ErrorCategory`].
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Spill coordinates lie on land: {}", describe_points(.points))]
    LandLocked { points: Vec<LandPoint> },

    #[error("Acquisition of {source_name} failed: {message}")]
    Acquisition {
        source_name: &'static str,
        message: String,
    },

    #[error("Preprocessing failed: {0}")]
    Preprocessing(String),

    #[error("Solver {phase} failed for event {event}: {message}")]
    SolverExecution {
        phase: SolverPhase,
        event: usize,
        message: String,
    },

    #[error("Postprocessing failed: {0}")]
    Postprocessing(String),

    #[error("Presentation failed: {0}")]
    Presentation(String),

    #[error("Project error: {0}")]
    Project(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sf-app operations.
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Acquisition,
    Preprocessing,
    SolverExecution,
    Postprocessing,
    Presentation,
    Io,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Acquisition => "acquisition",
            ErrorCategory::Preprocessing => "preprocessing",
            ErrorCategory::SolverExecution => "solver_execution",
            ErrorCategory::Postprocessing => "postprocessing",
            ErrorCategory::Presentation => "presentation",
            ErrorCategory::Io => "io",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Configuration(_) | AppError::LandLocked { .. } | AppError::Project(_) => {
                ErrorCategory::Configuration
            }
            AppError::Acquisition { .. } => ErrorCategory::Acquisition,
            AppError::Preprocessing(_) => ErrorCategory::Preprocessing,
            AppError::SolverExecution { .. } => ErrorCategory::SolverExecution,
            AppError::Postprocessing(_) => ErrorCategory::Postprocessing,
            AppError::Presentation(_) => ErrorCategory::Presentation,
            AppError::Results(_) | AppError::Io(_) => ErrorCategory::Io,
        }
    }
}

fn describe_points(points: &[LandPoint]) -> String {
    points
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// Conversions from backend error types
impl From<sf_project::ProjectError> for AppError {
    fn from(err: sf_project::ProjectError) -> Self {
        match err {
            sf_project::ProjectError::Validation(v) => AppError::Configuration(v.to_string()),
            other => AppError::Project(other.to_string()),
        }
    }
}

impl From<sf_core::CoreError> for AppError {
    fn from(err: sf_core::CoreError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl From<sf_results::ResultsError> for AppError {
    fn from(err: sf_results::ResultsError) -> Self {
        AppError::Results(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn land_error_lists_every_point() {
        let err = AppError::LandLocked {
            points: vec![
                LandPoint {
                    index: 0,
                    lat: 35.0,
                    lon: 36.5,
                },
                LandPoint {
                    index: 2,
                    lat: 34.9,
                    lon: 36.4,
                },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("#0 (35.0000, 36.5000)"));
        assert!(text.contains("#2 (34.9000, 36.4000)"));
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn validation_errors_are_configuration_errors() {
        let err: AppError = sf_project::ProjectError::Validation(
            sf_project::ValidationError::Missing {
                field: "simulation.name".into(),
            },
        )
        .into();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn solver_errors_name_phase_and_event() {
        let err = AppError::SolverExecution {
            phase: SolverPhase::Build,
            event: 1,
            message: "exit status 2".into(),
        };
        assert_eq!(err.category(), ErrorCategory::SolverExecution);
        assert_eq!(
            err.to_string(),
            "Solver BUILD failed for event 1: exit status 2"
        );
    }
}
