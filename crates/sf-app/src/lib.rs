//! Shared application service layer for slickflow.
//!
//! Turns a validated configuration into a completed spill-fate run:
//! domain and timing setup, forcing acquisition, solver input preparation,
//! solver execution per spill event, and the combined concentration dataset.

pub mod acquisition;
pub mod area_spill;
pub mod coastline;
pub mod convert;
pub mod error;
pub mod postprocess;
pub mod preprocess;
pub mod presentation;
pub mod progress;
pub mod run_log;
pub mod run_service;
pub mod setup;
pub mod solver_files;
pub mod solver_stage;
pub mod staging;
pub mod tools;

// Re-export key types for convenience
pub use acquisition::{ForcingProvider, ForcingRequest, ForcingSource, ToolProvider};
pub use coastline::{CoastlineShapes, LandClassifier, LandPoint};
pub use convert::{ForcingConverter, ToolConverter};
pub use error::{AppError, AppResult, ErrorCategory};
pub use presentation::PresentationOutcome;
pub use progress::{RunProgressEvent, RunStage, SolverProgress};
pub use run_service::{
    InitializedRun, RunOptions, RunRequest, RunResponse, RunServices, RunTimingSummary,
    ensure_run, ensure_run_with_progress, initialize, load_run,
};
pub use setup::{RunSetup, apply_aging, initialize_setup, resolve_domain};
pub use solver_stage::{SolverPhase, SolverStage};
