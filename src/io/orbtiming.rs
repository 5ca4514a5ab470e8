//! Orbit timing file (`.orbtiming`) consumed by the LOS solver.
//!
//! ```text
//! 0
//! 0
//! 0
//! <count>
//! <time> <x> <y> <z> <vx> <vy> <vz> 0.0 0.0 0.0
//! ```
//!
//! Times are seconds since midnight; the calendar date is not representable.

use crate::io::write_atomic;
use crate::types::{LosError, LosResult, StateVector};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Leading lines expected by the solver ahead of the record count
const HEADER_LINES: [&str; 3] = ["0", "0", "0"];

/// Fields per data line: time, position (3), velocity (3), acceleration (3)
pub const FIELDS_PER_LINE: usize = 10;

/// One data line of a timing file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbTimingRecord {
    pub time: f64,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub acceleration: [f64; 3],
}

/// Render state vectors in timing file layout
pub fn format_orbinfo(state_vectors: &[StateVector]) -> String {
    let mut out = String::with_capacity(64 + state_vectors.len() * 128);
    for line in HEADER_LINES {
        out.push_str(line);
        out.push('\n');
    }
    let _ = writeln!(out, "{}", state_vectors.len());

    for sv in state_vectors {
        let [x, y, z] = sv.position;
        let [vx, vy, vz] = sv.velocity;
        // Debug formatting keeps the trailing `.0` on integral values
        let _ = writeln!(
            out,
            "{:?} {:?} {:?} {:?} {:?} {:?} {:?} 0.0 0.0 0.0",
            sv.time(),
            x,
            y,
            z,
            vx,
            vy,
            vz
        );
    }
    out
}

/// Write state vectors to a timing file. The file is replaced atomically.
pub fn write_orbinfo<P: AsRef<Path>>(state_vectors: &[StateVector], path: P) -> LosResult<()> {
    let path = path.as_ref();
    log::info!(
        "Writing {} state vectors to timing file {}",
        state_vectors.len(),
        path.display()
    );
    write_atomic(path, format_orbinfo(state_vectors).as_bytes())
}

/// Read a timing file back, checking the declared count against the data lines
pub fn read_orbinfo<P: AsRef<Path>>(path: P) -> LosResult<Vec<OrbTimingRecord>> {
    let content = fs::read_to_string(&path)?;
    parse_orbinfo(&content)
}

pub fn parse_orbinfo(content: &str) -> LosResult<Vec<OrbTimingRecord>> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());

    for i in 0..HEADER_LINES.len() {
        let line = lines.next().ok_or_else(|| {
            LosError::MalformedInput(format!("timing file truncated in header line {}", i + 1))
        })?;
        line.trim().parse::<i64>().map_err(|_| {
            LosError::MalformedInput(format!("invalid timing header line {}: {:?}", i + 1, line))
        })?;
    }

    let count_line = lines
        .next()
        .ok_or_else(|| LosError::MalformedInput("timing file has no record count".to_string()))?;
    let count: usize = count_line.trim().parse().map_err(|_| {
        LosError::MalformedInput(format!("invalid timing record count: {:?}", count_line))
    })?;

    let mut records = Vec::with_capacity(count);
    for (i, line) in lines.enumerate() {
        let values = line
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                LosError::MalformedInput(format!("timing record {}: {} in {:?}", i, e, line))
            })?;
        if values.len() != FIELDS_PER_LINE {
            return Err(LosError::MalformedInput(format!(
                "timing record {} has {} fields, expected {}",
                i,
                values.len(),
                FIELDS_PER_LINE
            )));
        }
        records.push(OrbTimingRecord {
            time: values[0],
            position: [values[1], values[2], values[3]],
            velocity: [values[4], values[5], values[6]],
            acceleration: [values[7], values[8], values[9]],
        });
    }

    if records.len() != count {
        return Err(LosError::MalformedInput(format!(
            "timing file declares {} records but contains {}",
            count,
            records.len()
        )));
    }
    Ok(records)
}
