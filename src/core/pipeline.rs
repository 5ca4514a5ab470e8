//! LOS map orchestration: orbit window -> timing file -> solver -> VRTs -> merge

use crate::config::LosMapConfig;
use crate::core::georeference::RawRasterGeoreferencer;
use crate::core::orbit_window::OrbitWindowExtractor;
use crate::io::{find_orbit_file, GdalGridSource, GridSource};
use crate::types::{LosComponent, LosError, LosOutputs, LosResult, SentinelProduct};
use chrono::{DateTime, Utc};
use gdal::{Dataset, DriverManager};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Computes east/north/up LOS rasters for a timing file and reference grid
pub trait LosSolver {
    fn solve(&self, timing_path: &Path, grid_path: &Path) -> LosResult<LosOutputs>;
}

/// Combines single-band rasters into one multi-band raster, in input order
pub trait RasterMerger {
    fn merge(&self, inputs: &[PathBuf], output: &Path) -> LosResult<()>;
}

impl<T: LosSolver + ?Sized> LosSolver for &T {
    fn solve(&self, timing_path: &Path, grid_path: &Path) -> LosResult<LosOutputs> {
        (**self).solve(timing_path, grid_path)
    }
}

impl<T: RasterMerger + ?Sized> RasterMerger for &T {
    fn merge(&self, inputs: &[PathBuf], output: &Path) -> LosResult<()> {
        (**self).merge(inputs, output)
    }
}

fn absolute(path: &Path) -> LosResult<PathBuf> {
    Ok(fs::canonicalize(path)?)
}

fn run_command(cmd: &mut Command) -> LosResult<()> {
    log::info!("Running {:?}", cmd);
    let status = cmd
        .status()
        .map_err(|e| LosError::ExternalTool(format!("failed to start {:?}: {}", cmd.get_program(), e)))?;
    if !status.success() {
        return Err(LosError::ExternalTool(format!(
            "{:?} exited with {}",
            cmd.get_program(),
            status
        )));
    }
    Ok(())
}

/// Runs the compiled LOS solver as `<exe> <timing file> <grid file>`.
///
/// The solver writes `los_east.bin`, `los_north.bin` and `los_up.bin` into
/// its working directory.
#[derive(Debug, Clone)]
pub struct ExternalLosSolver {
    exe: PathBuf,
    work_dir: PathBuf,
}

impl ExternalLosSolver {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(exe: P, work_dir: Q) -> Self {
        Self {
            exe: exe.into(),
            work_dir: work_dir.into(),
        }
    }
}

impl LosSolver for ExternalLosSolver {
    fn solve(&self, timing_path: &Path, grid_path: &Path) -> LosResult<LosOutputs> {
        let timing_path = absolute(timing_path)?;
        let grid_path = absolute(grid_path)?;
        // bare program names are left for PATH lookup
        let exe = absolute(&self.exe).unwrap_or_else(|_| self.exe.clone());

        run_command(
            Command::new(&exe)
                .arg(&timing_path)
                .arg(&grid_path)
                .current_dir(&self.work_dir),
        )?;

        let outputs = LosOutputs::in_dir(&self.work_dir);
        for component in LosComponent::ALL {
            let path = outputs.get(component);
            if !path.is_file() {
                return Err(LosError::ExternalTool(format!(
                    "solver did not produce {} output {}",
                    component,
                    path.display()
                )));
            }
        }
        Ok(outputs)
    }
}

/// Merges through `gdal_merge.py -o <output> -separate <inputs...>`
#[derive(Debug, Clone)]
pub struct GdalMergeCommand {
    program: String,
}

impl Default for GdalMergeCommand {
    fn default() -> Self {
        Self::new("gdal_merge.py")
    }
}

impl GdalMergeCommand {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl RasterMerger for GdalMergeCommand {
    fn merge(&self, inputs: &[PathBuf], output: &Path) -> LosResult<()> {
        if inputs.is_empty() {
            return Err(LosError::Config("no rasters to merge".to_string()));
        }
        run_command(
            Command::new(&self.program)
                .arg("-o")
                .arg(output)
                .arg("-separate")
                .args(inputs),
        )
    }
}

/// Merges in-process with GDAL into a Float32 GeoTIFF, one band per input.
/// Geotransform and projection come from the first input.
#[derive(Debug, Clone, Copy, Default)]
pub struct GdalNativeMerger;

impl GdalNativeMerger {
    fn merge_into(inputs: &[PathBuf], partial: &Path) -> LosResult<()> {
        let first = Dataset::open(&inputs[0])?;
        let (width, height) = first.raster_size();

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut dataset = driver.create_with_band_type::<f32, _>(
            partial,
            width as isize,
            height as isize,
            inputs.len() as isize,
        )?;
        dataset.set_geo_transform(&first.geo_transform()?)?;
        dataset.set_spatial_ref(&first.spatial_ref()?)?;

        for (i, input) in inputs.iter().enumerate() {
            let source = Dataset::open(input)?;
            if source.raster_size() != (width, height) {
                return Err(LosError::MalformedInput(format!(
                    "{} is {:?} pixels, expected {:?} like {}",
                    input.display(),
                    source.raster_size(),
                    (width, height),
                    inputs[0].display()
                )));
            }
            let buffer = source
                .rasterband(1)?
                .read_as::<f32>((0, 0), (width, height), (width, height), None)?;
            let mut band = dataset.rasterband(i as isize + 1)?;
            band.write((0, 0), (width, height), &buffer)?;
            log::debug!("Merged band {} from {}", i + 1, input.display());
        }
        Ok(())
    }
}

impl RasterMerger for GdalNativeMerger {
    fn merge(&self, inputs: &[PathBuf], output: &Path) -> LosResult<()> {
        if inputs.is_empty() {
            return Err(LosError::Config("no rasters to merge".to_string()));
        }
        log::info!("Merging {} rasters into {}", inputs.len(), output.display());

        let mut partial = output.as_os_str().to_owned();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        match Self::merge_into(inputs, &partial) {
            // the GTiff dataset is flushed and closed when merge_into returns
            Ok(()) => {
                fs::rename(&partial, output)?;
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&partial);
                Err(e)
            }
        }
    }
}

/// Full LOS map workflow for one acquisition
pub struct LosMapPipeline<S: LosSolver, M: RasterMerger, G: GridSource = GdalGridSource> {
    config: LosMapConfig,
    solver: S,
    merger: M,
    georeferencer: RawRasterGeoreferencer<G>,
}

impl LosMapPipeline<ExternalLosSolver, GdalMergeCommand, GdalGridSource> {
    /// Pipeline using the external solver and `gdal_merge.py` named in `config`
    pub fn from_config(config: LosMapConfig) -> LosResult<Self> {
        config.validate()?;
        let solver = ExternalLosSolver::new(config.resolve(&config.solver_exe), &config.work_dir);
        let merger = GdalMergeCommand::new(config.merge_command.clone());
        Ok(Self::new(config, solver, merger, GdalGridSource))
    }
}

impl<S: LosSolver, M: RasterMerger, G: GridSource> LosMapPipeline<S, M, G> {
    pub fn new(config: LosMapConfig, solver: S, merger: M, grid_source: G) -> Self {
        let georeferencer =
            RawRasterGeoreferencer::with_grid_source(grid_source).with_pixel_type(config.pixel_type);
        Self {
            config,
            solver,
            merger,
            georeferencer,
        }
    }

    pub fn config(&self) -> &LosMapConfig {
        &self.config
    }

    /// Run for a product, picking its orbit file from `orbit_dir` unless one is given
    pub fn run_for_product(
        &self,
        product: &SentinelProduct,
        orbit_file: Option<&Path>,
    ) -> LosResult<PathBuf> {
        let orbit_file = match orbit_file {
            Some(path) => path.to_path_buf(),
            None => {
                let half_width = self.config.half_width();
                find_orbit_file(
                    self.config.resolve(&self.config.orbit_dir),
                    &product.mission,
                    product.start_time - half_width,
                    product.start_time + half_width,
                )?
                .path
            }
        };
        self.run(product.start_time, &orbit_file)
    }

    /// Create the merged LOS raster for an acquisition starting at
    /// `reference_epoch`. Returns the output path; an existing output is left
    /// untouched.
    pub fn run(&self, reference_epoch: DateTime<Utc>, orbit_file: &Path) -> LosResult<PathBuf> {
        let outfile = self.config.resolve(&self.config.outfile);
        if outfile.exists() {
            log::info!("{} already exists, skipping", outfile.display());
            return Ok(outfile);
        }

        let timing_path = self.config.resolve(&self.config.orbtiming_file);
        let extractor = OrbitWindowExtractor::new(self.config.half_width());
        let window = extractor.create_orbtiming_file(orbit_file, reference_epoch, &timing_path)?;
        log::info!(
            "Timing file {} holds {} state vectors",
            timing_path.display(),
            window.len()
        );

        let dem_path = self.config.resolve(&self.config.dem_path);
        let outputs = self.solver.solve(&timing_path, &dem_path)?;

        log::info!("Saving .vrt files for new binary LOS files");
        let mut vrts = Vec::with_capacity(LosComponent::ALL.len());
        for component in LosComponent::ALL {
            let vrt = self
                .georeferencer
                .save_as_vrt(outputs.get(component), &dem_path, None)?;
            vrts.push(vrt);
        }

        self.merger.merge(&vrts, &outfile)?;

        if !self.config.keep_intermediate {
            Self::clean_up(&outputs, &vrts);
        }
        Ok(outfile)
    }

    fn clean_up(outputs: &LosOutputs, vrts: &[PathBuf]) {
        let raws = LosComponent::ALL.iter().map(|c| outputs.get(*c));
        for path in raws.chain(vrts.iter()) {
            match fs::remove_file(path) {
                Ok(()) => log::debug!("Removed {}", path.display()),
                Err(e) => log::warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }
}
