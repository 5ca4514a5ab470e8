use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::Parser;
use insar_los::core::pipeline::{ExternalLosSolver, GdalNativeMerger, LosSolver, RasterMerger};
use insar_los::io::{find_unique_product, parse_product_name};
use insar_los::{GdalGridSource, LosMapConfig, LosMapPipeline, PixelType};
use std::path::PathBuf;

/// Create a 3-band (east, north, up) line-of-sight map matching a DEM grid
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// JSON configuration file; command line options override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name of final, merged file with 3 bands for east, north, and up LOS vectors
    #[arg(long)]
    outfile: Option<PathBuf>,

    /// Filepath of target DEM. LOS file will match this grid
    #[arg(long)]
    dem: Option<PathBuf>,

    /// Name of .SAFE or .zip Sentinel-1 product to find LOS vectors for
    #[arg(long)]
    sentinel_file: Option<PathBuf>,

    /// Acquisition start time (e.g. 2020-01-03T17:08:15), instead of a product
    #[arg(long, conflicts_with = "sentinel_file", requires = "orbit_file")]
    start_time: Option<String>,

    /// .EOF orbit file for the acquisition; otherwise searched in the orbit directory
    #[arg(long)]
    orbit_file: Option<PathBuf>,

    /// Directory containing .EOF files
    #[arg(long)]
    orbit_save_dir: Option<PathBuf>,

    /// Directory the solver runs in
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// LOS solver executable
    #[arg(long)]
    solver: Option<PathBuf>,

    /// Half-width of the orbit window in minutes
    #[arg(long)]
    half_width_minutes: Option<i64>,

    /// Pixel type of the solver outputs (default float32)
    #[arg(long)]
    dtype: Option<String>,

    /// Merge bands with GDAL in-process instead of gdal_merge.py
    #[arg(long)]
    native_merge: bool,

    /// Keep the raw los_*.bin files and their VRTs
    #[arg(long)]
    keep_intermediate: bool,
}

impl Cli {
    fn build_config(&self) -> Result<LosMapConfig> {
        let mut config = match &self.config {
            Some(path) => LosMapConfig::from_json_file(path)?,
            None => LosMapConfig::default(),
        };
        if let Some(outfile) = &self.outfile {
            config.outfile = outfile.clone();
        }
        if let Some(dem) = &self.dem {
            config.dem_path = dem.clone();
        }
        if let Some(dir) = &self.orbit_save_dir {
            config.orbit_dir = dir.clone();
        }
        if let Some(dir) = &self.work_dir {
            config.work_dir = dir.clone();
        }
        if let Some(solver) = &self.solver {
            config.solver_exe = solver.clone();
        }
        if let Some(minutes) = self.half_width_minutes {
            config.half_width_minutes = minutes;
        }
        if let Some(dtype) = &self.dtype {
            config.pixel_type = dtype.parse::<PixelType>()?;
        }
        config.keep_intermediate |= self.keep_intermediate;
        config.validate()?;
        Ok(config)
    }
}

fn parse_start_time(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y%m%dT%H%M%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }
    bail!("cannot parse start time {:?}", s)
}

fn run<S: LosSolver, M: RasterMerger>(
    pipeline: LosMapPipeline<S, M>,
    cli: &Cli,
) -> Result<PathBuf> {
    if let Some(start) = &cli.start_time {
        let epoch = parse_start_time(start)?;
        let orbit_file = cli
            .orbit_file
            .as_deref()
            .context("--start-time needs --orbit-file")?;
        return Ok(pipeline.run(epoch, orbit_file)?);
    }

    let product = match &cli.sentinel_file {
        Some(path) => parse_product_name(path)?,
        None => {
            let dir = &pipeline.config().work_dir;
            log::info!("No Sentinel-1 file specified. Searching {}", dir.display());
            find_unique_product(dir)?.1
        }
    };
    log::info!("Acquisition {} starts at {}", product.product_id, product.start_time);
    Ok(pipeline.run_for_product(&product, cli.orbit_file.as_deref())?)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.build_config()?;

    let outfile = if cli.native_merge {
        let solver = ExternalLosSolver::new(config.resolve(&config.solver_exe), &config.work_dir);
        run(LosMapPipeline::new(config, solver, GdalNativeMerger, GdalGridSource), &cli)?
    } else {
        run(LosMapPipeline::from_config(config)?, &cli)?
    };

    log::info!("LOS map written to {}", outfile.display());
    Ok(())
}
