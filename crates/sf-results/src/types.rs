//! Records persisted next to an experiment.

use serde::{Deserialize, Serialize};
use sf_core::{Domain, EventMode, Region};

pub type RunId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunManifest {
    pub run_id: RunId,
    pub experiment: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub config_hash: String,
    /// Start time after aging.
    pub start_time: String,
    pub sim_length_h: f64,
    pub domain: Domain,
    pub region: Region,
    pub mode: EventMode,
    pub n_events: usize,
    pub status: RunStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Initialized,
    Running { stage: String },
    Completed,
    Failed { category: String, message: String },
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed { .. })
    }
}

/// A non-zero grid cell, indexed `(lat, lon)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GridCell {
    pub j: usize,
    pub i: usize,
    pub value: f64,
}

/// Per-event surface concentration summed onto a regular grid.
///
/// Each time step keeps only its non-zero cells, ordered by `(j, i)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConcentrationDataset {
    /// Cell-center longitudes.
    pub lon: Vec<f64>,
    /// Cell-center latitudes.
    pub lat: Vec<f64>,
    pub time_h: Vec<f64>,
    /// One slice per entry of `time_h`.
    pub concentration: Vec<Vec<GridCell>>,
    /// Source event labels in index order.
    pub events: Vec<String>,
    pub units: String,
}

impl ConcentrationDataset {
    pub fn total_at(&self, t: usize) -> f64 {
        self.concentration
            .get(t)
            .map(|cells| cells.iter().map(|c| c.value).sum())
            .unwrap_or(0.0)
    }

    /// Value of cell `(j, i)` at time step `t`; zero when not stored.
    pub fn value_at(&self, t: usize, j: usize, i: usize) -> f64 {
        let Some(cells) = self.concentration.get(t) else {
            return 0.0;
        };
        cells
            .binary_search_by(|c| (c.j, c.i).cmp(&(j, i)))
            .map(|k| cells[k].value)
            .unwrap_or(0.0)
    }

    pub fn stored_cells(&self) -> usize {
        self.concentration.iter().map(Vec::len).sum()
    }
}
