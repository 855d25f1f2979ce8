//! Carries the finalized preprocessing namelist into the model namelist.
//!
//! The model template supplies every structural key; only the keys derived
//! here are overwritten, and only where the template already has them.

use crate::core::namelist::{join_list, repeated, NamelistStore};
use crate::core::synthesizer::{format_real, parent_ids};
use crate::utils::error::{PipelineError, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};

/// Keys copied verbatim from the preprocessing namelist.
pub const PASS_THROUGH_KEYS: [&str; 9] = [
    "max_dom",
    "e_we",
    "e_sn",
    "start_date",
    "end_date",
    "parent_grid_ratio",
    "i_parent_start",
    "j_parent_start",
    "fg_name",
];

pub const HISTORY_INTERVAL_MINUTES: &str = "60";
pub const FRAMES_PER_OUTFILE: &str = "24";

/// Integration step in seconds per kilometer of outer grid spacing.
const TIME_STEP_SECONDS_PER_KM: f64 = 6.0;

fn parse_timestamp(store: &NamelistStore, key: &str) -> Result<NaiveDateTime> {
    let raw = store.first_item(key)?;
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d_%H:%M:%S")
        .map_err(|e| PipelineError::invalid_value(key, raw.as_str(), e.to_string()))
}

fn ratios(store: &NamelistStore, max_dom: usize) -> Result<Vec<u32>> {
    let items = store.items("parent_grid_ratio")?;
    let parsed = items
        .iter()
        .map(|r| {
            r.parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| PipelineError::invalid_value("parent_grid_ratio", r.as_str(), "Not a positive integer"))
        })
        .collect::<Result<Vec<_>>>()?;
    if parsed.len() < max_dom {
        return Err(PipelineError::invalid_value(
            "parent_grid_ratio",
            items.join(", "),
            format!("Expected {} entries", max_dom),
        ));
    }
    Ok(parsed)
}

/// Spacing per level, each level divided by its refinement ratio.
pub fn cascade_spacing(base: f64, ratios: &[u32], max_dom: usize) -> Vec<f64> {
    let mut spacing = Vec::with_capacity(max_dom);
    spacing.push(base);
    for level in 1..max_dom {
        let parent = spacing[level - 1];
        spacing.push(parent / f64::from(ratios[level]));
    }
    spacing
}

pub fn time_step_seconds(base_dx_m: f64) -> i64 {
    (base_dx_m * TIME_STEP_SECONDS_PER_KM / 1000.0) as i64
}

/// Model namelist values derived from the preprocessing namelist and template.
pub fn derive_model_parameters(wps: &NamelistStore, template: &NamelistStore) -> Result<NamelistStore> {
    let max_dom: usize = wps.parse_first("max_dom")?;
    if max_dom == 0 {
        return Err(PipelineError::invalid_value("max_dom", "0", "At least one domain is required"));
    }
    let dx: f64 = wps.parse_first("dx")?;
    let dy: f64 = wps.parse_first("dy")?;
    let ratios = ratios(wps, max_dom)?;
    let start = parse_timestamp(wps, "start_date")?;
    let end = parse_timestamp(wps, "end_date")?;
    let e_vert = template.first_item("e_vert")?;

    let elapsed = end - start;
    if elapsed.num_seconds() < 0 {
        return Err(PipelineError::invalid_value(
            "end_date",
            end.to_string(),
            "End precedes start",
        ));
    }
    let run_days = elapsed.num_days();
    let run_hours = (elapsed - chrono::Duration::days(run_days)).num_hours();

    let mut derived = NamelistStore::new();
    derived.insert("run_days", run_days.to_string());
    derived.insert("run_hours", run_hours.to_string());

    let per_level = |v: u32| repeated(&v.to_string(), max_dom);
    derived.insert("start_year", repeated(&start.year().to_string(), max_dom));
    derived.insert("start_month", per_level(start.month()));
    derived.insert("start_day", per_level(start.day()));
    derived.insert("start_hour", per_level(start.hour()));
    derived.insert("end_year", repeated(&end.year().to_string(), max_dom));
    derived.insert("end_month", per_level(end.month()));
    derived.insert("end_day", per_level(end.day()));
    derived.insert("end_hour", per_level(end.hour()));

    for key in PASS_THROUGH_KEYS {
        derived.insert(key, wps.require(key)?);
    }

    let dxs = cascade_spacing(dx, &ratios, max_dom);
    let dys = cascade_spacing(dy, &ratios, max_dom);
    derived.insert("parent_id", parent_ids(max_dom));
    derived.insert("grid_id", join_list(1..=max_dom));
    derived.insert("dx", join_list(dxs.iter().map(|v| format_real(*v))));
    derived.insert("dy", join_list(dys.iter().map(|v| format_real(*v))));

    derived.insert("e_vert", repeated(&e_vert, max_dom));
    derived.insert("parent_time_step_ratio", join_list(ratios.iter().take(max_dom)));
    derived.insert("time_step", time_step_seconds(dx).to_string());

    derived.insert("feedback", "0");
    derived.insert("input_from_file", repeated(".true.", max_dom));
    derived.insert("history_interval", repeated(HISTORY_INTERVAL_MINUTES, max_dom));
    derived.insert("frames_per_outfile", repeated(FRAMES_PER_OUTFILE, max_dom));

    Ok(derived)
}

/// Template with every derived key it contains overwritten.
pub fn propagate(wps: &NamelistStore, template: &NamelistStore) -> Result<NamelistStore> {
    let derived = derive_model_parameters(wps, template)?;
    Ok(template.overlay_existing(&derived))
}
