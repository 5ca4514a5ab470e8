use crate::types::{EofHeader, LosError, LosResult, OrbitData, OsvTimestamp, StateVector};
use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::fs;
use std::path::Path;

const OSV_START: &str = "<OSV>";
const OSV_END: &str = "</OSV>";

/// Labels of the fields read from every `<OSV>` record
const UTC_LABEL: &str = "<UTC>";
const POSITION_LABELS: [&str; 3] = ["<X unit", "<Y unit", "<Z unit"];
const VELOCITY_LABELS: [&str; 3] = ["<VX unit", "<VY unit", "<VZ unit"];

/// Earth Explorer header, only the fields we use
#[derive(Debug, Deserialize)]
struct EarthExplorerHeader {
    #[serde(rename = "Fixed_Header")]
    fixed_header: Option<FixedHeader>,
}

#[derive(Debug, Deserialize)]
struct FixedHeader {
    #[serde(rename = "File_Name")]
    file_name: Option<String>,
    #[serde(rename = "Mission")]
    mission: Option<String>,
    #[serde(rename = "Validity_Period")]
    validity_period: Option<ValidityPeriod>,
}

#[derive(Debug, Deserialize)]
struct ValidityPeriod {
    #[serde(rename = "Validity_Start")]
    validity_start: Option<String>,
    #[serde(rename = "Validity_Stop")]
    validity_stop: Option<String>,
}

/// Precise orbit file reader for Sentinel-1 (EOF format)
pub struct OrbitReader;

impl OrbitReader {
    /// Read and parse an EOF orbit file
    pub fn read_orbit_file<P: AsRef<Path>>(path: P) -> LosResult<OrbitData> {
        log::info!("Reading orbit file: {}", path.as_ref().display());

        let content = fs::read_to_string(&path)?;
        Self::parse_orbit(&content)
    }

    /// Parse the state vectors of an EOF document, in document order.
    ///
    /// Every `<OSV>` marker must be matched by a `</OSV>` marker, and every
    /// record must carry a UTC time and the six position/velocity fields.
    pub fn parse_orbit(content: &str) -> LosResult<OrbitData> {
        let lines: Vec<&str> = content.lines().collect();
        log::debug!("Parsing EOF orbit document ({} lines)", lines.len());

        let mut osv_starts = Vec::new();
        let mut osv_ends = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            if line.contains(OSV_START) {
                osv_starts.push(i);
            }
            if line.contains(OSV_END) {
                osv_ends.push(i);
            }
        }

        if osv_starts.len() != osv_ends.len() {
            return Err(LosError::MalformedInput(format!(
                "found {} {} markers but {} {} markers",
                osv_starts.len(),
                OSV_START,
                osv_ends.len(),
                OSV_END
            )));
        }

        let mut state_vectors = Vec::with_capacity(osv_starts.len());
        for (record, (&start, &end)) in osv_starts.iter().zip(osv_ends.iter()).enumerate() {
            if end < start {
                return Err(LosError::MalformedInput(format!(
                    "OSV record {} ends on line {} before it starts on line {}",
                    record,
                    end + 1,
                    start + 1
                )));
            }
            if let Some(&next) = osv_starts.get(record + 1) {
                if end >= next {
                    return Err(LosError::MalformedInput(format!(
                        "OSV record {} starting on line {} is not closed before record {} on line {}",
                        record,
                        start + 1,
                        record + 1,
                        next + 1
                    )));
                }
            }
            let osv = &lines[start..=end];
            state_vectors.push(Self::parse_osv(osv, record, start)?);
        }

        let header = Self::parse_header(content);

        if let (Some(first), Some(last)) = (state_vectors.first(), state_vectors.last()) {
            log::info!(
                "Parsed {} state vectors from {} to {}",
                state_vectors.len(),
                first.timestamp,
                last.timestamp
            );
        } else {
            log::warn!("Orbit document contains no state vectors");
        }

        Ok(OrbitData {
            header,
            state_vectors,
        })
    }

    /// Build one state vector from the lines of an `<OSV>` record
    fn parse_osv(osv: &[&str], record: usize, first_line: usize) -> LosResult<StateVector> {
        let utc = Self::osv_field(osv, UTC_LABEL, record, first_line)?;
        let timestamp = Self::parse_utc_string(&utc).map_err(|e| {
            LosError::MalformedInput(format!(
                "OSV record {} (line {}): {}",
                record,
                first_line + 1,
                e
            ))
        })?;

        let mut position = [0.0; 3];
        for (value, label) in position.iter_mut().zip(POSITION_LABELS) {
            *value = Self::osv_number(osv, label, record, first_line)?;
        }
        let mut velocity = [0.0; 3];
        for (value, label) in velocity.iter_mut().zip(VELOCITY_LABELS) {
            *value = Self::osv_number(osv, label, record, first_line)?;
        }

        Ok(StateVector::new(timestamp, position, velocity))
    }

    fn osv_field(osv: &[&str], label: &str, record: usize, first_line: usize) -> LosResult<String> {
        osv.iter()
            .find_map(|line| Self::extract_labeled_value(line, label))
            .map(str::to_string)
            .ok_or_else(|| {
                LosError::MalformedInput(format!(
                    "OSV record {} (line {}) has no `{}` field",
                    record,
                    first_line + 1,
                    label
                ))
            })
    }

    fn osv_number(osv: &[&str], label: &str, record: usize, first_line: usize) -> LosResult<f64> {
        let raw = Self::osv_field(osv, label, record, first_line)?;
        raw.trim().parse::<f64>().map_err(|e| {
            LosError::MalformedInput(format!(
                "OSV record {} (line {}): invalid `{}` value {:?}: {}",
                record,
                first_line + 1,
                label,
                raw,
                e
            ))
        })
    }

    /// Text between the first `>` following `label` and the next `<`
    pub fn extract_labeled_value<'a>(line: &'a str, label: &str) -> Option<&'a str> {
        let start = line.find(label)?;
        let content_start = start + line[start..].find('>')? + 1;
        let len = line[content_start..].find('<')?;
        Some(&line[content_start..content_start + len])
    }

    /// Parse `UTC=2020-01-03T17:00:00.000000` into a timestamp.
    ///
    /// The date part is optional; `UTC=17:00:00.000000` yields a time-of-day
    /// timestamp.
    pub fn parse_utc_string(value: &str) -> Result<OsvTimestamp, String> {
        let time_str = value.trim();
        let time_str = time_str.strip_prefix("UTC=").unwrap_or(time_str);

        if let Ok(naive_dt) = NaiveDateTime::parse_from_str(time_str, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(OsvTimestamp::Absolute(DateTime::from_naive_utc_and_offset(
                naive_dt, Utc,
            )));
        }
        NaiveTime::parse_from_str(time_str, "%H:%M:%S%.f")
            .map(OsvTimestamp::TimeOfDay)
            .map_err(|e| format!("invalid UTC time {:?}: {}", value, e))
    }

    /// Fixed header fields, when the document has an `Earth_Explorer_Header`.
    /// Header problems are logged and never fail the parse.
    fn parse_header(content: &str) -> EofHeader {
        const OPEN: &str = "<Earth_Explorer_Header>";
        const CLOSE: &str = "</Earth_Explorer_Header>";

        let Some(start) = content.find(OPEN) else {
            log::debug!("No Earth_Explorer_Header in orbit document");
            return EofHeader::default();
        };
        let Some(len) = content[start..].find(CLOSE) else {
            log::warn!("Unterminated Earth_Explorer_Header in orbit document");
            return EofHeader::default();
        };
        let xml = &content[start..start + len + CLOSE.len()];

        let parsed: EarthExplorerHeader = match from_str(xml) {
            Ok(h) => h,
            Err(e) => {
                log::warn!("Failed to parse Earth_Explorer_Header: {}", e);
                return EofHeader::default();
            }
        };

        let Some(fixed) = parsed.fixed_header else {
            return EofHeader::default();
        };
        let (validity_start, validity_stop) = match fixed.validity_period {
            Some(period) => (
                period.validity_start.as_deref().and_then(Self::parse_validity_time),
                period.validity_stop.as_deref().and_then(Self::parse_validity_time),
            ),
            None => (None, None),
        };

        EofHeader {
            file_name: fixed.file_name,
            mission: fixed.mission,
            validity_start,
            validity_stop,
        }
    }

    fn parse_validity_time(value: &str) -> Option<DateTime<Utc>> {
        match Self::parse_utc_string(value) {
            Ok(OsvTimestamp::Absolute(dt)) => Some(dt),
            _ => {
                log::warn!("Ignoring unparseable validity time {:?}", value);
                None
            }
        }
    }
}
