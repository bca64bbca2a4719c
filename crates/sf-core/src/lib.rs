//! sf-core: stable foundation for slickflow.
//!
//! Contains:
//! - domain (geographic bounding box + forcing region selection)
//! - spill (spill events, oil types, run timing)
//! - time (forcing windows, run identifiers, start-time parsing)
//! - error (shared error types)

pub mod domain;
pub mod error;
pub mod spill;
pub mod time;

// Re-exports: nice ergonomics for downstream crates
pub use domain::{Domain, Region};
pub use error::{CoreError, CoreResult};
pub use spill::{EventMode, OilType, RunTiming, SpillEvent, degrees_minutes};
pub use time::{TimeWindow, parse_start_datetime, run_identifier, solver_output_name};
