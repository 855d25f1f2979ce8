use crate::core::namelist::{join_list, quoted, repeated, NamelistStore};
use crate::domain::model::{namelist_timestamp, DomainCenter, GridLayout, NestingSpec, RunPeriod};
use crate::utils::error::{PipelineError, Result};

pub const DEFAULT_GEOG_DATA_RES: &str = "modis_landuse_20class_30s_with_lakes";

/// Latitude beyond which the conic projection is used.
const LAMBERT_LAT_THRESHOLD: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapProjection {
    Lambert,
    Mercator,
}

impl MapProjection {
    pub fn for_latitude(lat: f64) -> Self {
        if lat > LAMBERT_LAT_THRESHOLD || lat < -LAMBERT_LAT_THRESHOLD {
            MapProjection::Lambert
        } else {
            MapProjection::Mercator
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MapProjection::Lambert => "lambert",
            MapProjection::Mercator => "mercator",
        }
    }
}

/// Parent of each domain, 1-based; the outer domain is its own parent.
pub fn parent_ids(max_dom: usize) -> String {
    join_list((0..max_dom).map(|i| i.max(1)))
}

/// Real-valued namelist entries always carry a decimal point.
pub fn format_real(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Values for the preprocessing namelist derived from the run description.
#[derive(Debug, Clone)]
pub struct PreprocessParameters<'a> {
    pub period: &'a RunPeriod,
    pub center: &'a DomainCenter,
    pub nesting: &'a NestingSpec,
    pub layouts: &'a [GridLayout],
    pub geog_data_res: &'a str,
}

impl<'a> PreprocessParameters<'a> {
    pub fn synthesize(&self) -> Result<NamelistStore> {
        synthesize(
            self.period,
            self.center,
            self.nesting,
            self.layouts,
            self.geog_data_res,
        )
    }
}

pub fn synthesize(
    period: &RunPeriod,
    center: &DomainCenter,
    nesting: &NestingSpec,
    layouts: &[GridLayout],
    geog_data_res: &str,
) -> Result<NamelistStore> {
    let max_dom = nesting.max_dom;
    if max_dom == 0 || layouts.len() != max_dom {
        return Err(PipelineError::invalid_value(
            "domain.max_dom",
            max_dom.to_string(),
            format!("Expected one aligned layout per domain, got {}", layouts.len()),
        ));
    }
    let ratios = (0..max_dom)
        .map(|level| nesting.ratio(level))
        .collect::<Result<Vec<_>>>()?;

    let mut store = NamelistStore::new();

    store.insert("max_dom", max_dom.to_string());
    store.insert(
        "start_date",
        repeated(&quoted(&namelist_timestamp(&period.start)), max_dom),
    );
    store.insert(
        "end_date",
        repeated(&quoted(&namelist_timestamp(&period.end)), max_dom),
    );
    store.insert("geog_data_res", repeated(&quoted(geog_data_res), max_dom));
    store.insert("parent_id", parent_ids(max_dom));
    store.insert("parent_grid_ratio", join_list(ratios));

    // Only the outer domain's spacing is read by the grid preprocessor.
    store.insert("dx", layouts[0].dx.to_string());
    store.insert("dy", layouts[0].dy.to_string());
    store.insert("i_parent_start", join_list(layouts.iter().map(|l| l.i_parent_start)));
    store.insert("j_parent_start", join_list(layouts.iter().map(|l| l.j_parent_start)));
    store.insert("e_we", join_list(layouts.iter().map(|l| l.e_we)));
    store.insert("e_sn", join_list(layouts.iter().map(|l| l.e_sn)));

    let ref_lat = center.lat.to_string();
    let ref_lon = center.lon.to_string();
    let projection = MapProjection::for_latitude(center.lat);
    match projection {
        MapProjection::Lambert => tracing::info!(lat = center.lat, "high latitude domain, using lambert"),
        MapProjection::Mercator => tracing::info!(lat = center.lat, "low latitude domain, using mercator"),
    }

    store.insert("ref_lat", ref_lat.clone());
    store.insert("ref_lon", ref_lon.clone());
    store.insert("map_proj", quoted(projection.as_str()));
    // Both projections take the reference point as their standard parallels.
    store.insert("truelat1", ref_lat.clone());
    store.insert("truelat2", ref_lat);
    store.insert("stand_lon", ref_lon);

    Ok(store)
}
