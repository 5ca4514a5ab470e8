//! LOS map preparation steps

pub mod orbit_window;
pub mod georeference;
pub mod pipeline;

// Re-export main types
pub use orbit_window::{OrbitWindowExtractor, DEFAULT_HALF_WIDTH_MINUTES};
pub use georeference::{check_geometry, default_vrt_path, single_band_layout, RawRasterGeoreferencer};
pub use pipeline::{
    ExternalLosSolver, GdalMergeCommand, GdalNativeMerger, LosMapPipeline, LosSolver, RasterMerger,
};
