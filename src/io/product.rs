//! Sentinel-1 product and orbit file naming conventions.
//!
//! Products: `S1A_IW_SLC__1SDV_20200103T170815_20200103T170842_030639_0382D5_DADE.zip`
//! Orbits:   `S1A_OPER_AUX_POEORB_OPOD_20200123T120000_V20200102T225942_20200104T005942.EOF`

use crate::types::{LosError, LosResult, OrbitFileInfo, OrbitType, SentinelProduct};
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

const PRODUCT_PATTERN: &str = r"^(?P<mission>S1[A-D])_(?P<mode>IW|EW|SM|WV|S[1-6])_[A-Z_]{4}_[0-9A-Z_]{4}_(?P<start>\d{8}T\d{6})_(?P<stop>\d{8}T\d{6})_\d{6}_[0-9A-F]{6}_[0-9A-F]{4}";
const ORBIT_PATTERN: &str = r"^(?P<mission>S1[A-D])_OPER_AUX_(?P<type>POEORB|RESORB)_OPOD_(?P<created>\d{8}T\d{6})_V(?P<start>\d{8}T\d{6})_(?P<stop>\d{8}T\d{6})\.EOF$";

fn compile(pattern: &str) -> LosResult<Regex> {
    Regex::new(pattern).map_err(|e| LosError::Config(format!("Regex error: {}", e)))
}

fn parse_compact_time(s: &str) -> LosResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
        .map_err(|e| LosError::MalformedInput(format!("invalid time {:?} in file name: {}", s, e)))
}

fn file_name(path: &Path) -> LosResult<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| LosError::MalformedInput(format!("no file name in {}", path.display())))
}

/// Parse a Sentinel-1 product name (`.SAFE` directory, `.zip` archive or bare id)
pub fn parse_product_name<P: AsRef<Path>>(path: P) -> LosResult<SentinelProduct> {
    let name = file_name(path.as_ref())?;
    let product_id = name
        .trim_end_matches(".zip")
        .trim_end_matches(".SAFE")
        .to_string();

    let re = compile(PRODUCT_PATTERN)?;
    let caps = re.captures(&product_id).ok_or_else(|| {
        LosError::MalformedInput(format!("not a Sentinel-1 product name: {}", name))
    })?;

    Ok(SentinelProduct {
        mission: caps["mission"].to_string(),
        mode: caps["mode"].to_string(),
        start_time: parse_compact_time(&caps["start"])?,
        stop_time: parse_compact_time(&caps["stop"])?,
        product_id,
    })
}

/// Parse an orbit file name into mission, orbit type and validity period
pub fn parse_orbit_filename<P: AsRef<Path>>(path: P) -> LosResult<OrbitFileInfo> {
    let path = path.as_ref();
    let name = file_name(path)?;

    let re = compile(ORBIT_PATTERN)?;
    let caps = re
        .captures(name)
        .ok_or_else(|| LosError::MalformedInput(format!("not an orbit file name: {}", name)))?;

    let orbit_type = match &caps["type"] {
        "POEORB" => OrbitType::POEORB,
        _ => OrbitType::RESORB,
    };

    Ok(OrbitFileInfo {
        path: path.to_path_buf(),
        mission: caps["mission"].to_string(),
        orbit_type,
        created: parse_compact_time(&caps["created"])?,
        validity_start: parse_compact_time(&caps["start"])?,
        validity_stop: parse_compact_time(&caps["stop"])?,
    })
}

/// Pick the orbit file in `orbit_dir` covering `[start, stop]` for `mission`.
///
/// Precise orbits win over restituted ones; among equals the most recently
/// created file is used.
pub fn find_orbit_file<P: AsRef<Path>>(
    orbit_dir: P,
    mission: &str,
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
) -> LosResult<OrbitFileInfo> {
    let orbit_dir = orbit_dir.as_ref();
    log::info!(
        "Searching {} for {} orbit covering {} to {}",
        orbit_dir.display(),
        mission,
        start,
        stop
    );

    let mut candidates = Vec::new();
    for entry in fs::read_dir(orbit_dir)? {
        let path = entry?.path();
        match parse_orbit_filename(&path) {
            Ok(info) if info.mission == mission && info.covers(start, stop) => candidates.push(info),
            Ok(info) => log::debug!("Orbit file {} does not cover the window", info.path.display()),
            Err(_) => continue,
        }
    }

    candidates.sort_by(|a, b| {
        a.orbit_type
            .cmp(&b.orbit_type)
            .then_with(|| b.created.cmp(&a.created))
    });

    let best = candidates.into_iter().next().ok_or_else(|| {
        LosError::Config(format!(
            "no {} orbit file in {} covers {} to {}",
            mission,
            orbit_dir.display(),
            start,
            stop
        ))
    })?;
    log::info!("Selected {} orbit file: {}", best.orbit_type, best.path.display());
    Ok(best)
}

/// Find the single Sentinel-1 product (`.SAFE` or `.zip`) in `search_dir`.
///
/// A `.SAFE` directory and a `.zip` of the same product count once.
pub fn find_unique_product<P: AsRef<Path>>(search_dir: P) -> LosResult<(PathBuf, SentinelProduct)> {
    let search_dir = search_dir.as_ref();
    let mut found: Vec<(PathBuf, SentinelProduct)> = Vec::new();

    for entry in fs::read_dir(search_dir)? {
        let path = entry?.path();
        let is_product = path
            .extension()
            .map(|ext| ext == "SAFE" || ext == "zip")
            .unwrap_or(false);
        if !is_product {
            continue;
        }
        if let Ok(product) = parse_product_name(&path) {
            if !found.iter().any(|(_, p)| p.product_id == product.product_id) {
                found.push((path, product));
            }
        }
    }

    match found.len() {
        1 => Ok(found.remove(0)),
        0 => Err(LosError::Config(format!(
            "no Sentinel-1 product found in {}",
            search_dir.display()
        ))),
        n => Err(LosError::Config(format!(
            "{} Sentinel-1 products found in {}, expected exactly one",
            n,
            search_dir.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_product_name() {
        let product = parse_product_name(
            "/data/S1A_IW_SLC__1SDV_20200103T170815_20200103T170842_030639_0382D5_DADE.zip",
        )
        .unwrap();
        assert_eq!(product.mission, "S1A");
        assert_eq!(product.mode, "IW");
        assert_eq!(
            product.start_time,
            Utc.with_ymd_and_hms(2020, 1, 3, 17, 8, 15).unwrap()
        );
        assert_eq!(
            product.product_id,
            "S1A_IW_SLC__1SDV_20200103T170815_20200103T170842_030639_0382D5_DADE"
        );
        assert!(parse_product_name("elevation.dem").is_err());
    }

    #[test]
    fn test_parse_orbit_filename() {
        let info = parse_orbit_filename(
            "S1B_OPER_AUX_RESORB_OPOD_20200103T200000_V20200103T160000_20200103T191000.EOF",
        )
        .unwrap();
        assert_eq!(info.mission, "S1B");
        assert_eq!(info.orbit_type, OrbitType::RESORB);
        assert!(info.covers(
            Utc.with_ymd_and_hms(2020, 1, 3, 16, 38, 15).unwrap(),
            Utc.with_ymd_and_hms(2020, 1, 3, 17, 38, 15).unwrap(),
        ));
        assert!(!info.covers(
            Utc.with_ymd_and_hms(2020, 1, 3, 18, 38, 15).unwrap(),
            Utc.with_ymd_and_hms(2020, 1, 3, 19, 38, 15).unwrap(),
        ));
    }
}
