//! Dimension sizes of the interpolation output, read with the netCDF library.
//!
//! The interpolation stage writes classic or netCDF-4 files depending on how
//! it was built; the library handles both.

use crate::adapters::staging::met_em_files;
use crate::domain::model::MetgridMetadata;
use crate::domain::ports::MetadataReader;
use crate::utils::error::{PipelineError, Result};
use std::path::Path;

pub const METGRID_LEVELS_DIM: &str = "num_metgrid_levels";
pub const SOIL_LAYERS_DIM: &str = "num_st_layers";
/// Land-use fractions; axis 1 is the land category axis.
pub const LANDUSE_VAR: &str = "LANDUSEF";

/// Reads the three dimension sizes from the first `met_em*.nc` in the run directory.
#[derive(Debug, Clone, Default)]
pub struct MetgridFileReader;

impl MetgridFileReader {
    pub fn read_file(path: &Path) -> Result<MetgridMetadata> {
        let unavailable = |reason: String| PipelineError::MetadataUnavailable {
            reason: format!("{}: {}", path.display(), reason),
        };
        let file = netcdf::open(path).map_err(|e| unavailable(e.to_string()))?;

        let dimension = |name: &str| {
            file.dimension(name)
                .map(|d| d.len() as u64)
                .ok_or_else(|| unavailable(format!("dimension {} not found", name)))
        };
        let num_metgrid_levels = dimension(METGRID_LEVELS_DIM)?;
        let num_metgrid_soil_levels = dimension(SOIL_LAYERS_DIM)?;

        let num_land_cat = file
            .variable(LANDUSE_VAR)
            .ok_or_else(|| unavailable(format!("variable {} not found", LANDUSE_VAR)))?
            .dimensions()
            .get(1)
            .map(|d| d.len() as u64)
            .ok_or_else(|| unavailable(format!("variable {} has no category axis", LANDUSE_VAR)))?;

        Ok(MetgridMetadata {
            num_metgrid_levels,
            num_land_cat,
            num_metgrid_soil_levels,
        })
    }
}

impl MetadataReader for MetgridFileReader {
    fn read(&self, run_dir: &Path) -> Result<MetgridMetadata> {
        let files = met_em_files(run_dir)?;
        let first = files.first().ok_or_else(|| PipelineError::MetadataUnavailable {
            reason: format!("no met_em files in {}", run_dir.display()),
        })?;
        tracing::debug!(file = %first.display(), "reading interpolation output dimensions");
        Self::read_file(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MET_EM: &str = "met_em.d01.2024-01-01_00:00:00.nc";

    fn write_met_em(path: &Path, with_landuse: bool) {
        let mut file = netcdf::create(path).unwrap();
        file.add_unlimited_dimension("Time").unwrap();
        file.add_dimension("west_east", 4).unwrap();
        file.add_dimension("south_north", 3).unwrap();
        file.add_dimension(METGRID_LEVELS_DIM, 38).unwrap();
        file.add_dimension(SOIL_LAYERS_DIM, 4).unwrap();
        file.add_dimension("z-dimension0021", 21).unwrap();
        if with_landuse {
            file.add_variable::<f32>(
                LANDUSE_VAR,
                &["Time", "z-dimension0021", "south_north", "west_east"],
            )
            .unwrap();
        }
    }

    #[test]
    fn test_reads_dimension_sizes() {
        let dir = TempDir::new().unwrap();
        write_met_em(&dir.path().join(MET_EM), true);

        let meta = MetgridFileReader.read(dir.path()).unwrap();
        assert_eq!(
            meta,
            MetgridMetadata {
                num_metgrid_levels: 38,
                num_land_cat: 21,
                num_metgrid_soil_levels: 4,
            }
        );
    }

    #[test]
    fn test_missing_landuse_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(MET_EM);
        write_met_em(&path, false);

        match MetgridFileReader::read_file(&path) {
            Err(PipelineError::MetadataUnavailable { reason }) => {
                assert!(reason.contains(LANDUSE_VAR))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_reader_requires_output_files() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            MetgridFileReader.read(dir.path()),
            Err(PipelineError::MetadataUnavailable { .. })
        ));
    }

    #[test]
    fn test_corrupt_files_are_unavailable_not_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(MET_EM);

        let mut oversized_name = b"CDF\x05".to_vec();
        oversized_name.extend_from_slice(&0u64.to_be_bytes());
        oversized_name.extend_from_slice(&0x0Au32.to_be_bytes());
        oversized_name.extend_from_slice(&1u64.to_be_bytes());
        oversized_name.extend_from_slice(&u64::MAX.to_be_bytes());

        let samples: [&[u8]; 3] = [
            b"\x89HDF\r\n\x1a\n\0\0\0\0",
            b"CDF\x01\0\0",
            &oversized_name,
        ];
        for bytes in samples {
            std::fs::write(&path, bytes).unwrap();
            assert!(matches!(
                MetgridFileReader.read(dir.path()),
                Err(PipelineError::MetadataUnavailable { .. })
            ));
        }
    }
}
