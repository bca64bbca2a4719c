//! Run initialization: domain, aging and input checks.
//!
//! Order matters. The domain comes from the configured start point before
//! aging; aging rewrites timing before anything downstream reads it; the
//! shapefile override runs last so that it replaces the validated rates.

use crate::area_spill::AreaSpill;
use crate::coastline::{LandClassifier, check_spill_points};
use crate::error::{AppError, AppResult};
use sf_core::{Domain, EventMode, RunTiming, parse_start_datetime};
use sf_project::SimulationConfig;

/// Everything later stages need that is derived, not configured.
#[derive(Debug, Clone)]
pub struct RunSetup {
    pub domain: Domain,
    /// Timing after aging.
    pub timing: RunTiming,
    /// Per-point rates, replaced by the shapefile volume when one is used.
    pub rates: Vec<f64>,
    pub area_spill: Option<AreaSpill>,
    pub mode: EventMode,
}

impl RunSetup {
    pub fn n_points(&self) -> usize {
        self.rates.len()
    }
}

/// Explicit bounds when `set_domain`, else point 0 ± `delta[0]`.
pub fn resolve_domain(config: &SimulationConfig) -> Domain {
    let input = &config.input_files;
    if input.set_domain {
        tracing::info!("using configured domain");
        Domain::new(input.lat[0], input.lat[1], input.lon[0], input.lon[1])
    } else {
        let delta = input.delta[0];
        tracing::info!(delta, "domain centred on first spill point");
        Domain::around(
            config.simulation.spill_lat[0],
            config.simulation.spill_lon[0],
            delta,
        )
    }
}

/// Timing as configured, with the start time parsed.
pub fn configured_timing(config: &SimulationConfig) -> AppResult<RunTiming> {
    let sim = &config.simulation;
    Ok(RunTiming {
        start: parse_start_datetime(&sim.start_datetime)?,
        sim_length_h: sim.sim_length,
        spill_duration_h: sim.spill_duration.clone(),
    })
}

/// Shift timing back by the slick age when there is more than one point.
/// The age is taken from point 0.
pub fn apply_aging(config: &SimulationConfig, timing: &RunTiming) -> RunTiming {
    if config.n_spill_points() > 1 {
        let age = config.simulation.slick_age[0];
        if config.simulation.slick_age.iter().any(|a| *a != age) {
            tracing::warn!(
                ages = ?config.simulation.slick_age,
                "slick ages differ between points; aging uses the first"
            );
        }
        tracing::info!(age_h = age, "applying slick aging");
        timing.aged(age)
    } else {
        timing.clone()
    }
}

/// Land check plus the optional shapefile volume override.
///
/// An existing shapefile always overrides the configured rates. Asking for
/// an area spill without one is a configuration error.
pub fn validate_inputs(
    config: &SimulationConfig,
    land: &dyn LandClassifier,
) -> AppResult<(Vec<f64>, Option<AreaSpill>)> {
    let sim = &config.simulation;
    check_spill_points(land, &sim.spill_lat, &sim.spill_lon)?;

    let shapefile = &config.input_files.shapefile;
    match shapefile.existing_path() {
        Some(path) => {
            if !sim.area_spill {
                tracing::warn!(
                    path = %path.display(),
                    "area_spill is off but a slick shapefile exists; starting from the area spill"
                );
            }
            tracing::info!(
                path = %path.display(),
                "area spill provided; configured spill rates are ignored"
            );
            let spill = AreaSpill::load(path, shapefile.thickness_m)?;
            let rates = spill.split_volume(config.n_spill_points());
            Ok((rates, Some(spill)))
        }
        None => {
            if let Some(path) = &shapefile.shape_path {
                tracing::warn!(path = %path.display(), "configured shapefile does not exist");
            }
            if sim.area_spill {
                return Err(AppError::Configuration(
                    "area_spill is set but no slick shapefile exists at input_files.shapefile.shape_path"
                        .to_string(),
                ));
            }
            Ok((sim.spill_rate.clone(), None))
        }
    }
}

/// Resolve domain, parse the date, age the timing and validate inputs.
pub fn initialize_setup(
    config: &SimulationConfig,
    land: &dyn LandClassifier,
) -> AppResult<RunSetup> {
    let domain = resolve_domain(config);
    let timing = apply_aging(config, &configured_timing(config)?);
    let (rates, area_spill) = validate_inputs(config, land)?;

    let mode = EventMode::for_point_count(config.n_spill_points());
    if config.simulation.multiple_slick != mode.is_separate() {
        tracing::warn!(
            multiple_slick = config.simulation.multiple_slick,
            points = config.n_spill_points(),
            "multiple_slick flag disagrees with the point count; using {:?} mode",
            mode
        );
    }

    tracing::info!(%domain, region = %domain.region(), ?mode, "run initialized");
    Ok(RunSetup {
        domain,
        timing,
        rates,
        area_spill,
        mode,
    })
}
