//! insar-los: line-of-sight map preparation for Sentinel-1 InSAR
//!
//! Two steps surround the external LOS solver:
//! - [`core::OrbitWindowExtractor`] reads a precise orbit (EOF) file, keeps the
//!   state vectors around an acquisition and writes the solver's timing file.
//! - [`core::RawRasterGeoreferencer`] wraps each raw east/north/up output in a
//!   VRT carrying the geotransform and projection of the target DEM.
//!
//! [`core::LosMapPipeline`] runs the whole sequence for one acquisition.

pub mod types;
pub mod io;
pub mod core;
pub mod config;

// Re-export main types and functions for easier access
pub use types::{
    ByteOrder, GeoTransform, GridInfo, LosComponent, LosError, LosOutputs, LosResult, OrbitData,
    OrbitWindow, OsvTimestamp, PixelType, RawRasterDescriptor, SentinelProduct, StateVector,
};

pub use config::LosMapConfig;
pub use io::{GdalGridSource, GridSource, OrbitReader, VrtWriter};
pub use crate::core::{LosMapPipeline, OrbitWindowExtractor, RawRasterGeoreferencer};
