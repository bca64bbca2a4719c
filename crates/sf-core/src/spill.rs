//! Spill events and run timing.

use chrono::{Duration, NaiveDateTime};
use core::fmt;

/// Oil identification: an API gravity number or an exact oil name.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum OilType {
    Api(f64),
    Name(String),
}

impl fmt::Display for OilType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OilType::Api(api) => write!(f, "{}", api),
            OilType::Name(name) => f.write_str(name),
        }
    }
}

/// Whether spill points share one solver invocation or run one each.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EventMode {
    Combined,
    Separate,
}

impl EventMode {
    pub fn for_point_count(n_spill_points: usize) -> Self {
        if n_spill_points > 1 {
            EventMode::Separate
        } else {
            EventMode::Combined
        }
    }

    pub fn is_separate(self) -> bool {
        matches!(self, EventMode::Separate)
    }
}

/// Timing fields that aging may rewrite.
#[derive(Clone, Debug, PartialEq)]
pub struct RunTiming {
    pub start: NaiveDateTime,
    pub sim_length_h: f64,
    pub spill_duration_h: Vec<f64>,
}

impl RunTiming {
    /// Timing shifted back by a slick age: the run starts `age_h` earlier,
    /// lasts `age_h` longer, and every release becomes instantaneous.
    pub fn aged(&self, age_h: f64) -> Self {
        let shift = Duration::seconds((age_h * 3600.0).round() as i64);
        Self {
            start: self.start - shift,
            sim_length_h: self.sim_length_h + age_h,
            spill_duration_h: vec![0.0; self.spill_duration_h.len()],
        }
    }
}

/// One physically distinct release handed to exactly one solver invocation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpillEvent {
    pub index: usize,
    pub simname: String,
    pub start_time: NaiveDateTime,
    /// Whole hours.
    pub sim_length: u32,
    pub longitude: f64,
    pub latitude: f64,
    /// Whole hours, 0 for an instantaneous release.
    pub duration: u32,
    pub rate: f64,
    pub oil: OilType,
    pub mode: EventMode,
}

impl SpillEvent {
    /// Per-event subdirectory name used in separate mode.
    pub fn slick_dir_name(&self) -> String {
        format!("slick{}", self.index + 1)
    }
}

/// Split decimal degrees into whole degrees and decimal minutes, both
/// carrying the sign of the input.
pub fn degrees_minutes(value: f64) -> (i32, f64) {
    let degrees = value.trunc();
    (degrees as i32, (value - degrees) * 60.0)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn aging_is_independent_of_durations(
            durations in prop::collection::vec(0.0_f64..48.0, 2..5),
            sim_length in 1.0_f64..240.0,
            age in 0.0_f64..72.0,
        ) {
            let start = chrono::NaiveDate::from_ymd_opt(2022, 1, 10)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap();
            let timing = RunTiming { start, sim_length_h: sim_length, spill_duration_h: durations.clone() };
            let aged = timing.aged(age);
            prop_assert!((aged.sim_length_h - (sim_length + age)).abs() < 1e-9);
            let shift = start - aged.start;
            prop_assert!((shift.num_seconds() as f64 - age * 3600.0).abs() <= 1.0);
            prop_assert_eq!(aged.spill_duration_h.len(), durations.len());
            prop_assert!(aged.spill_duration_h.iter().all(|d| *d == 0.0));
        }
    }
}
