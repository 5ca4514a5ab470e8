use crate::types::{GeoTransform, GridInfo, LosError, LosResult};
use gdal::Dataset;
use std::path::Path;

/// GDAL virtual file system paths (`/vsizip/...`, `/vsimem/...`) have no
/// counterpart on the local file system
fn is_virtual_path(path: &Path) -> bool {
    path.to_string_lossy().starts_with("/vsi")
}

/// Source of reference grid metadata (geotransform, projection, size)
pub trait GridSource {
    fn grid_info(&self, path: &Path) -> LosResult<GridInfo>;
}

/// Reads reference grids (DEMs) through GDAL, read-only
#[derive(Debug, Clone, Copy, Default)]
pub struct GdalGridSource;

impl GridSource for GdalGridSource {
    fn grid_info(&self, path: &Path) -> LosResult<GridInfo> {
        log::info!("Reading reference grid: {}", path.display());

        // The dataset handle is closed when `dataset` drops, on every return path
        let dataset = Dataset::open(path).map_err(|e| {
            if is_virtual_path(path) || path.exists() {
                LosError::Gdal(e)
            } else {
                LosError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("reference grid not found: {}", path.display()),
                ))
            }
        })?;

        let geo_transform = dataset.geo_transform().map_err(|e| {
            LosError::MissingReferenceData(format!(
                "cannot get geotransform from {}: {}",
                path.display(),
                e
            ))
        })?;
        let spatial_reference = dataset
            .spatial_ref()
            .and_then(|srs| srs.to_wkt())
            .map_err(|e| {
                LosError::MissingReferenceData(format!(
                    "cannot get spatial reference from {}: {}",
                    path.display(),
                    e
                ))
            })?;
        if spatial_reference.trim().is_empty() {
            return Err(LosError::MissingReferenceData(format!(
                "{} has an empty spatial reference",
                path.display()
            )));
        }

        let (cols, rows) = dataset.raster_size();
        log::debug!("Reference grid size: {} rows x {} cols", rows, cols);
        log::debug!("Reference grid geotransform: {:?}", geo_transform);

        Ok(GridInfo {
            geo_transform: GeoTransform::from(geo_transform),
            spatial_reference,
            rows,
            cols,
        })
    }
}

impl<T: GridSource + ?Sized> GridSource for &T {
    fn grid_info(&self, path: &Path) -> LosResult<GridInfo> {
        (**self).grid_info(path)
    }
}
