use crate::core::orbit_window::DEFAULT_HALF_WIDTH_MINUTES;
use crate::types::{LosError, LosResult, PixelType};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings for creating a LOS map.
///
/// Relative paths are resolved against `work_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LosMapConfig {
    /// Target DEM; the LOS rasters match this grid
    pub dem_path: PathBuf,
    /// Final 3-band (east, north, up) raster
    pub outfile: PathBuf,
    /// Timing file handed to the solver
    pub orbtiming_file: PathBuf,
    /// Directory holding `.EOF` orbit files
    pub orbit_dir: PathBuf,
    /// Directory the solver runs in and writes its raw outputs to
    pub work_dir: PathBuf,
    /// LOS solver executable
    pub solver_exe: PathBuf,
    pub half_width_minutes: i64,
    /// Pixel type of the solver outputs
    pub pixel_type: PixelType,
    /// Program used to merge the bands
    pub merge_command: String,
    /// Keep `los_*.bin` and their VRTs after merging
    pub keep_intermediate: bool,
}

impl Default for LosMapConfig {
    fn default() -> Self {
        Self {
            dem_path: PathBuf::from("elevation.dem"),
            outfile: PathBuf::from("los_enu.tif"),
            orbtiming_file: PathBuf::from("out.orbtiming"),
            orbit_dir: PathBuf::from("orbits"),
            work_dir: PathBuf::from("."),
            solver_exe: PathBuf::from("build/create_los_map"),
            half_width_minutes: DEFAULT_HALF_WIDTH_MINUTES,
            pixel_type: PixelType::Float32,
            merge_command: "gdal_merge.py".to_string(),
            keep_intermediate: false,
        }
    }
}

impl LosMapConfig {
    /// Load from JSON; absent keys keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> LosResult<Self> {
        let path = path.as_ref();
        log::info!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| LosError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LosResult<()> {
        if self.half_width_minutes <= 0 {
            return Err(LosError::Config(format!(
                "half_width_minutes must be positive, got {}",
                self.half_width_minutes
            )));
        }
        if self.merge_command.trim().is_empty() {
            return Err(LosError::Config("merge_command is empty".to_string()));
        }
        Ok(())
    }

    pub fn half_width(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.half_width_minutes)
    }

    /// `path` as seen from the process, relative paths taken under `work_dir`
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.work_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LosMapConfig::default();
        assert_eq!(config.half_width(), chrono::Duration::minutes(30));
        assert_eq!(config.outfile, PathBuf::from("los_enu.tif"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"dem_path": "/data/dem.tif", "pixel_type": "Float64"}}"#).unwrap();

        let config = LosMapConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.dem_path, PathBuf::from("/data/dem.tif"));
        assert_eq!(config.pixel_type, PixelType::Float64);
        assert_eq!(config.orbtiming_file, PathBuf::from("out.orbtiming"));
    }

    #[test]
    fn test_invalid_half_width() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"half_width_minutes": 0}}"#).unwrap();
        assert!(matches!(
            LosMapConfig::from_json_file(file.path()),
            Err(LosError::Config(_))
        ));
    }

    #[test]
    fn test_resolve() {
        let config = LosMapConfig {
            work_dir: PathBuf::from("/scratch"),
            ..Default::default()
        };
        assert_eq!(config.resolve("los_east.bin"), PathBuf::from("/scratch/los_east.bin"));
        assert_eq!(config.resolve("/abs/dem.tif"), PathBuf::from("/abs/dem.tif"));
    }
}
