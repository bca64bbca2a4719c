//! Figures from the combined dataset, produced by external plot tools.

use crate::error::{AppError, AppResult};
use crate::tools::{Placeholders, run_tool};
use sf_core::Domain;
use sf_project::SimulationConfig;
use sf_results::ExperimentStore;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationOutcome {
    /// Plotting disabled.
    Skipped,
    Done,
    /// Primary figures written; the secondary plot failed.
    Degraded(String),
}

impl PresentationOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, PresentationOutcome::Degraded(_))
    }
}

/// Plot window: configured `plot_lat`/`plot_lon`, else the run domain.
pub fn plot_bounds(config: &SimulationConfig, domain: &Domain) -> Domain {
    let plot = &config.plot_options;
    let (lat_min, lat_max) = match plot.plot_lat.as_deref() {
        Some([a, b]) => (*a, *b),
        _ => (domain.lat_min, domain.lat_max),
    };
    let (lon_min, lon_max) = match plot.plot_lon.as_deref() {
        Some([a, b]) => (*a, *b),
        _ => (domain.lon_min, domain.lon_max),
    };
    Domain::new(lat_min, lat_max, lon_min, lon_max)
}

pub fn present(
    config: &SimulationConfig,
    store: &ExperimentStore,
    domain: &Domain,
    dataset: &Path,
) -> AppResult<PresentationOutcome> {
    let plot = &config.plot_options;
    if !plot.plotting {
        return Ok(PresentationOutcome::Skipped);
    }

    let bounds = plot_bounds(config, domain);
    let vars = Placeholders::new()
        .with_domain(&bounds)
        .with_path("dataset", dataset)
        .with_path("figures_dir", &store.figures_dir())
        .with_path("out_dir", &store.out_dir())
        .with("name", store.name());

    let tool = plot
        .plot_command
        .as_ref()
        .ok_or_else(|| AppError::Presentation("plotting enabled but no plot tool configured".into()))?;

    tracing::info!(bounds = %bounds, "plotting surface concentration");
    run_tool(tool, &vars, None, &[]).map_err(|e| AppError::Presentation(e.to_string()))?;

    let Some(mass_balance) = plot.mass_balance_command.as_ref() else {
        return Ok(PresentationOutcome::Done);
    };
    match run_tool(mass_balance, &vars, None, &[]) {
        Ok(_) => Ok(PresentationOutcome::Done),
        Err(e) => {
            tracing::warn!(error = %e, "mass balance plot failed; continuing");
            Ok(PresentationOutcome::Degraded(e.to_string()))
        }
    }
}
