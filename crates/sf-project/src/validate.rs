//! Structural validation of a loaded configuration.
//!
//! Physical plausibility (land, dates, shapefile volume) is checked later
//! by the run initialization; this layer only guarantees the shape the rest
//! of the pipeline relies on.

use crate::schema::SimulationConfig;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Missing value: {field}")]
    Missing { field: String },

    #[error("Length mismatch: {field} has {found} entries, expected {expected}")]
    LengthMismatch {
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

fn invalid(field: impl Into<String>, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

pub fn validate_config(config: &SimulationConfig) -> Result<(), ValidationError> {
    let sim = &config.simulation;

    if sim.name.trim().is_empty() {
        return Err(ValidationError::Missing {
            field: "simulation.name".to_string(),
        });
    }
    if sim.name.contains(['/', '\\']) || sim.name == "." || sim.name == ".." {
        return Err(invalid(
            "simulation.name",
            &sim.name,
            "must be a single path component",
        ));
    }
    if !(sim.sim_length.is_finite() && sim.sim_length > 0.0) {
        return Err(invalid("simulation.sim_length", sim.sim_length, "must be > 0"));
    }

    let n = config.n_spill_points();
    if n == 0 {
        return Err(ValidationError::Missing {
            field: "simulation.spill_lat".to_string(),
        });
    }

    let lengths = [
        ("simulation.spill_lon", sim.spill_lon.len()),
        ("simulation.spill_duration", sim.spill_duration.len()),
        ("simulation.spill_rate", sim.spill_rate.len()),
        ("simulation.slick_age", sim.slick_age.len()),
        ("simulation.oil", sim.oil.len()),
    ];
    for (field, found) in lengths {
        if found != n {
            return Err(ValidationError::LengthMismatch {
                field: field.to_string(),
                expected: n,
                found,
            });
        }
    }

    for (i, (&lat, &lon)) in sim.spill_lat.iter().zip(&sim.spill_lon).enumerate() {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(invalid(format!("simulation.spill_lat[{i}]"), lat, "outside [-90, 90]"));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(invalid(
                format!("simulation.spill_lon[{i}]"),
                lon,
                "outside [-180, 180]",
            ));
        }
    }

    let non_negative = [
        ("simulation.spill_duration", &sim.spill_duration),
        ("simulation.spill_rate", &sim.spill_rate),
        ("simulation.slick_age", &sim.slick_age),
    ];
    for (field, values) in non_negative {
        if let Some((i, v)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !(v.is_finite() && **v >= 0.0))
        {
            return Err(invalid(format!("{field}[{i}]"), v, "must be >= 0"));
        }
    }

    let input = &config.input_files;
    if input.set_domain {
        for (field, bounds) in [("input_files.lat", &input.lat), ("input_files.lon", &input.lon)] {
            if bounds.len() != 2 {
                return Err(ValidationError::LengthMismatch {
                    field: field.to_string(),
                    expected: 2,
                    found: bounds.len(),
                });
            }
            if bounds[0] >= bounds[1] {
                return Err(invalid(field, format!("{:?}", bounds), "min must be < max"));
            }
        }
    } else {
        match input.delta.first() {
            None => {
                return Err(ValidationError::Missing {
                    field: "input_files.delta".to_string(),
                });
            }
            Some(&delta) if !(delta.is_finite() && delta > 0.0) => {
                return Err(invalid("input_files.delta[0]", delta, "must be > 0"));
            }
            Some(_) => {}
        }
    }

    if !(input.shapefile.thickness_m.is_finite() && input.shapefile.thickness_m > 0.0) {
        return Err(invalid(
            "input_files.shapefile.thickness_m",
            input.shapefile.thickness_m,
            "must be > 0",
        ));
    }

    let resolution = config.postprocessing.grid_resolution_deg;
    if !(resolution.is_finite() && resolution > 0.0) {
        return Err(invalid(
            "postprocessing.grid_resolution_deg",
            resolution,
            "must be > 0",
        ));
    }

    for (field, bounds) in [
        ("plot_options.plot_lon", &config.plot_options.plot_lon),
        ("plot_options.plot_lat", &config.plot_options.plot_lat),
    ] {
        if let Some(bounds) = bounds {
            if bounds.len() != 2 {
                return Err(ValidationError::LengthMismatch {
                    field: field.to_string(),
                    expected: 2,
                    found: bounds.len(),
                });
            }
        }
    }

    Ok(())
}
