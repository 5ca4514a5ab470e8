use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Timestamp of an orbit state vector.
///
/// EOF documents carry full UTC date-times. The timing file consumed by the
/// LOS solver only keeps seconds since midnight, so the date is carried here
/// and dropped at serialization time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OsvTimestamp {
    /// Full UTC date-time
    Absolute(DateTime<Utc>),
    /// Time of day only, no calendar date available
    TimeOfDay(NaiveTime),
}

impl OsvTimestamp {
    /// Absolute timestamp, when a date is known
    pub fn absolute(&self) -> Option<DateTime<Utc>> {
        match self {
            OsvTimestamp::Absolute(dt) => Some(*dt),
            OsvTimestamp::TimeOfDay(_) => None,
        }
    }

    pub fn time_of_day(&self) -> NaiveTime {
        match self {
            OsvTimestamp::Absolute(dt) => dt.time(),
            OsvTimestamp::TimeOfDay(t) => *t,
        }
    }

    /// Seconds elapsed since midnight: `h*3600 + m*60 + s + us/1e6`
    pub fn seconds_of_day(&self) -> f64 {
        let t = self.time_of_day();
        // leap seconds are reported by chrono as nanosecond >= 1e9
        let micros = (t.nanosecond() % 1_000_000_000) / 1_000;
        f64::from(t.hour()) * 3600.0
            + f64::from(t.minute()) * 60.0
            + f64::from(t.second())
            + f64::from(micros) / 1e6
    }
}

impl std::fmt::Display for OsvTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsvTimestamp::Absolute(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.6f")),
            OsvTimestamp::TimeOfDay(t) => write!(f, "{}", t.format("%H:%M:%S%.6f")),
        }
    }
}

/// Orbit state vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    pub timestamp: OsvTimestamp,
    pub position: [f64; 3],     // [x, y, z] in meters
    pub velocity: [f64; 3],     // [vx, vy, vz] in m/s
    pub acceleration: [f64; 3], // reserved, always zero
}

impl StateVector {
    pub fn new(timestamp: OsvTimestamp, position: [f64; 3], velocity: [f64; 3]) -> Self {
        Self {
            timestamp,
            position,
            velocity,
            acceleration: [0.0; 3],
        }
    }

    /// Seconds since midnight, as written to the timing file
    pub fn time(&self) -> f64 {
        self.timestamp.seconds_of_day()
    }
}

/// Header of an Earth Explorer orbit file. All fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EofHeader {
    pub file_name: Option<String>,
    pub mission: Option<String>,
    pub validity_start: Option<DateTime<Utc>>,
    pub validity_stop: Option<DateTime<Utc>>,
}

/// Parsed orbit document: header plus every state vector in document order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitData {
    pub header: EofHeader,
    pub state_vectors: Vec<StateVector>,
}

/// State vectors confined to `[reference_epoch - half_width, reference_epoch + half_width]`
#[derive(Debug, Clone)]
pub struct OrbitWindow {
    pub reference_epoch: DateTime<Utc>,
    pub half_width: chrono::Duration,
    pub state_vectors: Vec<StateVector>,
}

impl OrbitWindow {
    pub fn min_time(&self) -> DateTime<Utc> {
        self.reference_epoch - self.half_width
    }

    pub fn max_time(&self) -> DateTime<Utc> {
        self.reference_epoch + self.half_width
    }

    pub fn len(&self) -> usize {
        self.state_vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state_vectors.is_empty()
    }
}

/// Geospatial transformation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Coefficients in GDAL order
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }
}

impl From<[f64; 6]> for GeoTransform {
    fn from(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }
}

/// Spatial metadata of a reference grid (DEM)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridInfo {
    pub geo_transform: GeoTransform,
    /// Projection as OGC WKT
    pub spatial_reference: String,
    pub rows: usize,
    pub cols: usize,
}

/// Pixel storage type of a raw raster band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelType {
    Byte,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
    CFloat32,
    CFloat64,
}

impl Default for PixelType {
    fn default() -> Self {
        PixelType::Float32
    }
}

impl PixelType {
    /// Size of one pixel in bytes
    pub fn size(&self) -> usize {
        match self {
            PixelType::Byte => 1,
            PixelType::UInt16 | PixelType::Int16 => 2,
            PixelType::UInt32 | PixelType::Int32 | PixelType::Float32 => 4,
            PixelType::Float64 | PixelType::CFloat32 => 8,
            PixelType::CFloat64 => 16,
        }
    }

    /// GDAL data type name, as written in VRT `dataType` attributes
    pub fn gdal_name(&self) -> &'static str {
        match self {
            PixelType::Byte => "Byte",
            PixelType::UInt16 => "UInt16",
            PixelType::Int16 => "Int16",
            PixelType::UInt32 => "UInt32",
            PixelType::Int32 => "Int32",
            PixelType::Float32 => "Float32",
            PixelType::Float64 => "Float64",
            PixelType::CFloat32 => "CFloat32",
            PixelType::CFloat64 => "CFloat64",
        }
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.gdal_name())
    }
}

impl FromStr for PixelType {
    type Err = LosError;

    /// Accepts GDAL names and numpy-style names (`float32`, `complex64`, `uint8`, ...)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "byte" | "uint8" | "u1" => Ok(PixelType::Byte),
            "uint16" | "u2" => Ok(PixelType::UInt16),
            "int16" | "i2" => Ok(PixelType::Int16),
            "uint32" | "u4" => Ok(PixelType::UInt32),
            "int32" | "i4" => Ok(PixelType::Int32),
            "float32" | "f4" => Ok(PixelType::Float32),
            "float64" | "f8" => Ok(PixelType::Float64),
            "cfloat32" | "complex64" | "c8" => Ok(PixelType::CFloat32),
            "cfloat64" | "complex128" | "c16" => Ok(PixelType::CFloat64),
            _ => Err(LosError::Config(format!("Unsupported pixel type: {}", s))),
        }
    }
}

/// Byte order of raw pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Least significant byte first (little endian)
    LSB,
    /// Most significant byte first (big endian)
    MSB,
}

impl ByteOrder {
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::MSB
        } else {
            ByteOrder::LSB
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::native()
    }
}

impl std::fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ByteOrder::LSB => write!(f, "LSB"),
            ByteOrder::MSB => write!(f, "MSB"),
        }
    }
}

/// Layout of a headerless single-band binary raster, georeferenced like a reference grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRasterDescriptor {
    pub rows: usize,
    pub cols: usize,
    pub pixel_type: PixelType,
    pub byte_order: ByteOrder,
    /// Bytes to the first pixel of the band
    pub image_offset: u64,
    /// Bytes from one pixel to the next on the same line
    pub pixel_offset: u64,
    /// Bytes from one line to the next
    pub line_offset: u64,
    pub geo_transform: GeoTransform,
    pub spatial_reference: String,
    /// Raw file name, relative to the directory of the VRT
    pub source_filename: String,
}

impl RawRasterDescriptor {
    /// Byte length a raw file must have to hold this raster
    pub fn expected_byte_length(&self) -> u64 {
        (self.rows as u64) * (self.cols as u64) * (self.pixel_type.size() as u64)
    }
}

/// Line-of-sight vector component produced by the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LosComponent {
    East,
    North,
    Up,
}

impl LosComponent {
    /// Band order of the merged output
    pub const ALL: [LosComponent; 3] = [LosComponent::East, LosComponent::North, LosComponent::Up];

    /// Fixed name of the raw file the solver writes for this component
    pub fn raw_filename(&self) -> &'static str {
        match self {
            LosComponent::East => "los_east.bin",
            LosComponent::North => "los_north.bin",
            LosComponent::Up => "los_up.bin",
        }
    }
}

impl std::fmt::Display for LosComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LosComponent::East => write!(f, "east"),
            LosComponent::North => write!(f, "north"),
            LosComponent::Up => write!(f, "up"),
        }
    }
}

/// Paths of the three raw rasters written by the LOS solver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LosOutputs {
    pub east: PathBuf,
    pub north: PathBuf,
    pub up: PathBuf,
}

impl LosOutputs {
    /// Outputs at their fixed names inside `dir`
    pub fn in_dir<P: AsRef<std::path::Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            east: dir.join(LosComponent::East.raw_filename()),
            north: dir.join(LosComponent::North.raw_filename()),
            up: dir.join(LosComponent::Up.raw_filename()),
        }
    }

    pub fn get(&self, component: LosComponent) -> &PathBuf {
        match component {
            LosComponent::East => &self.east,
            LosComponent::North => &self.north,
            LosComponent::Up => &self.up,
        }
    }
}

/// Sentinel-1 acquisition identified from its product name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentinelProduct {
    pub product_id: String,
    pub mission: String, // S1A, S1B, ...
    pub mode: String,    // IW, EW, SM, WV
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
}

impl SentinelProduct {
    pub fn acquisition_date(&self) -> NaiveDate {
        self.start_time.date_naive()
    }
}

/// Precise or restituted orbit product
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrbitType {
    /// Precise Orbit Ephemerides
    POEORB,
    /// Restituted Orbit Ephemerides
    RESORB,
}

impl std::fmt::Display for OrbitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrbitType::POEORB => write!(f, "POEORB"),
            OrbitType::RESORB => write!(f, "RESORB"),
        }
    }
}

/// Orbit file identified from its name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbitFileInfo {
    pub path: PathBuf,
    pub mission: String,
    pub orbit_type: OrbitType,
    pub created: DateTime<Utc>,
    pub validity_start: DateTime<Utc>,
    pub validity_stop: DateTime<Utc>,
}

impl OrbitFileInfo {
    /// True when the validity period covers `[start, stop]`
    pub fn covers(&self, start: DateTime<Utc>, stop: DateTime<Utc>) -> bool {
        self.validity_start <= start && stop <= self.validity_stop
    }
}

/// Error types for LOS map preparation
#[derive(Debug, thiserror::Error)]
pub enum LosError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error(
        "Inconsistent geometry: rows = byte_length / dtype_size / cols, but \
         {rows} != {byte_length} / {dtype_size} / {cols}"
    )]
    InconsistentGeometry {
        rows: usize,
        cols: usize,
        dtype_size: usize,
        byte_length: u64,
    },

    #[error("Missing reference data: {0}")]
    MissingReferenceData(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("External tool error: {0}")]
    ExternalTool(String),
}

/// Result type for LOS operations
pub type LosResult<T> = Result<T, LosError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_seconds_of_day() {
        let dt = Utc.with_ymd_and_hms(2020, 1, 3, 10, 0, 0).unwrap();
        assert_eq!(OsvTimestamp::Absolute(dt).seconds_of_day(), 36000.0);

        let t = NaiveTime::from_hms_micro_opt(17, 8, 15, 250_000).unwrap();
        assert_eq!(OsvTimestamp::TimeOfDay(t).seconds_of_day(), 61695.25);
    }

    #[test]
    fn test_pixel_type_parsing() {
        assert_eq!("float32".parse::<PixelType>().unwrap(), PixelType::Float32);
        assert_eq!("Float64".parse::<PixelType>().unwrap(), PixelType::Float64);
        assert_eq!("complex64".parse::<PixelType>().unwrap(), PixelType::CFloat32);
        assert!("float16".parse::<PixelType>().is_err());
        assert_eq!(PixelType::default().size(), 4);
        assert_eq!(PixelType::CFloat64.size(), 16);
    }

    #[test]
    fn test_geotransform_array_order() {
        let gt = GeoTransform::from([-104.0, 0.001, 0.0, 32.0, 0.0, -0.001]);
        assert_eq!(gt.top_left_y, 32.0);
        assert_eq!(gt.to_array(), [-104.0, 0.001, 0.0, 32.0, 0.0, -0.001]);
    }

    #[test]
    fn test_los_outputs_fixed_names() {
        let outputs = LosOutputs::in_dir("/work");
        assert!(outputs.get(LosComponent::Up).ends_with("los_up.bin"));
        assert!(outputs.east.ends_with("los_east.bin"));
    }
}
