use crate::domain::model::{BoundingBox, DomainCenter, OuterDomainSpec};
use crate::utils::error::{PipelineError, Result};

const KM_PER_DEGREE_LAT: f64 = 111.0;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rectangle around `center` wide enough to hold the outer domain.
pub fn compute_bounding_box(center: &DomainCenter, outer: &OuterDomainSpec) -> Result<BoundingBox> {
    let km_per_degree_lon = KM_PER_DEGREE_LAT * center.lat.to_radians().cos();
    if center.lat.abs() >= 90.0 || km_per_degree_lon <= 0.0 {
        return Err(PipelineError::DegenerateGeometry { lat: center.lat });
    }

    let cells = outer.e_we.first().copied().ok_or_else(|| {
        PipelineError::invalid_value("domain.e_we", "[]", "Outer domain cell count is required")
    })?;

    let width_km = outer.dx * f64::from(cells) / 1000.0 * 2.0;
    let half_width_lat = (width_km / 2.0) / KM_PER_DEGREE_LAT;
    let half_width_lon = (width_km / 2.0) / km_per_degree_lon;

    Ok(BoundingBox {
        north: round2(center.lat + half_width_lat),
        south: round2(center.lat - half_width_lat),
        east: round2(center.lon + half_width_lon),
        west: round2(center.lon - half_width_lon),
    })
}
