use crate::io::{GdalGridSource, GridSource, VrtWriter};
use crate::types::{ByteOrder, GridInfo, LosError, LosResult, PixelType, RawRasterDescriptor};
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Byte layout of a packed single-band raster: (image, pixel, line) offsets
pub fn single_band_layout(pixel_type: PixelType, cols: usize) -> (u64, u64, u64) {
    let bytes_per_pixel = pixel_type.size() as u64;
    (0, bytes_per_pixel, bytes_per_pixel * cols as u64)
}

/// Check that a raw file of `byte_length` bytes holds exactly `rows x cols`
/// pixels of `dtype_size` bytes.
pub fn check_geometry(rows: usize, cols: usize, dtype_size: usize, byte_length: u64) -> LosResult<()> {
    let expected = (rows as u64)
        .checked_mul(cols as u64)
        .and_then(|n| n.checked_mul(dtype_size as u64));
    if expected == Some(byte_length) {
        Ok(())
    } else {
        Err(LosError::InconsistentGeometry {
            rows,
            cols,
            dtype_size,
            byte_length,
        })
    }
}

/// `<raw>.vrt`, next to the raw file
pub fn default_vrt_path<P: AsRef<Path>>(raw_path: P) -> PathBuf {
    let mut name = OsString::from(raw_path.as_ref().as_os_str());
    name.push(".vrt");
    PathBuf::from(name)
}

/// Path of `target` relative to the directory `base`. Both must be absolute.
fn relative_to(base: &Path, target: &Path) -> Option<PathBuf> {
    let base: Vec<Component> = base.components().collect();
    let target: Vec<Component> = target.components().collect();

    // different roots/prefixes cannot be expressed relatively
    if base.first() != target.first() {
        return None;
    }
    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..base.len() {
        rel.push("..");
    }
    for component in &target[common..] {
        rel.push(component.as_os_str());
    }
    Some(rel)
}

/// Describes headerless binary rasters as VRTs inheriting the spatial
/// reference and geotransform of a reference grid.
pub struct RawRasterGeoreferencer<G: GridSource = GdalGridSource> {
    grid_source: G,
    pixel_type: PixelType,
    byte_order: ByteOrder,
}

impl Default for RawRasterGeoreferencer<GdalGridSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl RawRasterGeoreferencer<GdalGridSource> {
    pub fn new() -> Self {
        Self::with_grid_source(GdalGridSource)
    }
}

impl<G: GridSource> RawRasterGeoreferencer<G> {
    pub fn with_grid_source(grid_source: G) -> Self {
        Self {
            grid_source,
            pixel_type: PixelType::default(),
            byte_order: ByteOrder::native(),
        }
    }

    pub fn with_pixel_type(mut self, pixel_type: PixelType) -> Self {
        self.pixel_type = pixel_type;
        self
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Build the descriptor of `raw_path` for a VRT written at `vrt_path`.
    ///
    /// Fails with [`LosError::InconsistentGeometry`] when the raw file size
    /// does not match the grid dimensions and pixel type.
    pub fn describe(
        &self,
        raw_path: &Path,
        grid: &GridInfo,
        vrt_path: &Path,
    ) -> LosResult<RawRasterDescriptor> {
        let dtype_size = self.pixel_type.size();
        let (image_offset, pixel_offset, line_offset) = single_band_layout(self.pixel_type, grid.cols);

        let byte_length = fs::metadata(raw_path)?.len();
        check_geometry(grid.rows, grid.cols, dtype_size, byte_length)?;

        let source_filename = self.source_filename(raw_path, vrt_path)?;
        log::debug!(
            "{}: {}x{} {}, offsets image={} pixel={} line={}",
            source_filename,
            grid.rows,
            grid.cols,
            self.pixel_type,
            image_offset,
            pixel_offset,
            line_offset
        );

        Ok(RawRasterDescriptor {
            rows: grid.rows,
            cols: grid.cols,
            pixel_type: self.pixel_type,
            byte_order: self.byte_order,
            image_offset,
            pixel_offset,
            line_offset,
            geo_transform: grid.geo_transform,
            spatial_reference: grid.spatial_reference.clone(),
            source_filename,
        })
    }

    /// Write a VRT for `raw_path` georeferenced like `grid_path`.
    ///
    /// `outfile` defaults to `<raw_path>.vrt`. No file is written unless all
    /// checks pass. Returns the path of the VRT.
    pub fn save_as_vrt(
        &self,
        raw_path: &Path,
        grid_path: &Path,
        outfile: Option<&Path>,
    ) -> LosResult<PathBuf> {
        let vrt_path = outfile
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_vrt_path(raw_path));
        log::info!(
            "Saving VRT {} for {} using grid {}",
            vrt_path.display(),
            raw_path.display(),
            grid_path.display()
        );

        let grid = self.grid_source.grid_info(grid_path)?;
        if grid.spatial_reference.trim().is_empty() {
            return Err(LosError::MissingReferenceData(format!(
                "{} has no spatial reference",
                grid_path.display()
            )));
        }

        let descriptor = self.describe(raw_path, &grid, &vrt_path)?;
        VrtWriter::write(&descriptor, &vrt_path)?;
        Ok(vrt_path)
    }

    /// Raw file name relative to the directory holding the VRT
    fn source_filename(&self, raw_path: &Path, vrt_path: &Path) -> LosResult<String> {
        let raw_abs = fs::canonicalize(raw_path)?;
        let vrt_dir = match vrt_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let vrt_dir_abs = fs::canonicalize(vrt_dir)?;

        let rel = relative_to(&vrt_dir_abs, &raw_abs).ok_or_else(|| {
            LosError::Config(format!(
                "{} cannot be referenced relative to {}",
                raw_abs.display(),
                vrt_dir_abs.display()
            ))
        })?;
        // VRT paths use forward slashes on every platform
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Ok(parts.join("/"))
    }
}
