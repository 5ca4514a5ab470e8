use crate::io::{orbtiming, OrbitReader};
use crate::types::{LosResult, OrbitData, OrbitWindow, StateVector};
use chrono::{DateTime, Duration, Utc};
use std::path::Path;

/// Window half-width used for Sentinel-1 acquisitions
pub const DEFAULT_HALF_WIDTH_MINUTES: i64 = 30;

/// Selects the state vectors bracketing an acquisition and writes them as a
/// timing file for the LOS solver.
#[derive(Debug, Clone, Copy)]
pub struct OrbitWindowExtractor {
    half_width: Duration,
}

impl Default for OrbitWindowExtractor {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_HALF_WIDTH_MINUTES))
    }
}

impl OrbitWindowExtractor {
    pub fn new(half_width: Duration) -> Self {
        Self { half_width }
    }

    pub fn half_width(&self) -> Duration {
        self.half_width
    }

    /// Keep the state vectors within `reference_epoch ± half_width`, bounds
    /// inclusive, in document order.
    ///
    /// Records without a calendar date cannot be compared against the window
    /// and are passed through unchanged.
    pub fn select(&self, orbit: &OrbitData, reference_epoch: DateTime<Utc>) -> OrbitWindow {
        let min_time = reference_epoch - self.half_width;
        let max_time = reference_epoch + self.half_width;

        let mut undated = 0usize;
        let state_vectors: Vec<StateVector> = orbit
            .state_vectors
            .iter()
            .filter(|sv| match sv.timestamp.absolute() {
                Some(t) => min_time <= t && t <= max_time,
                None => {
                    undated += 1;
                    true
                }
            })
            .cloned()
            .collect();

        if undated > 0 {
            log::warn!(
                "{} state vectors carry no date; passing them through without window check",
                undated
            );
        }
        log::info!(
            "Kept {} of {} state vectors between {} and {}",
            state_vectors.len(),
            orbit.state_vectors.len(),
            min_time,
            max_time
        );
        if state_vectors.is_empty() {
            log::warn!("Orbit window around {} is empty", reference_epoch);
        }

        OrbitWindow {
            reference_epoch,
            half_width: self.half_width,
            state_vectors,
        }
    }

    /// Parse an orbit document held in memory and window it
    pub fn extract_str(&self, content: &str, reference_epoch: DateTime<Utc>) -> LosResult<OrbitWindow> {
        let orbit = OrbitReader::parse_orbit(content)?;
        Ok(self.select(&orbit, reference_epoch))
    }

    /// Read an orbit file and window it
    pub fn extract<P: AsRef<Path>>(
        &self,
        orbit_path: P,
        reference_epoch: DateTime<Utc>,
    ) -> LosResult<OrbitWindow> {
        let orbit = OrbitReader::read_orbit_file(orbit_path)?;
        Ok(self.select(&orbit, reference_epoch))
    }

    /// Read `orbit_path`, window it around `reference_epoch` and write the
    /// timing file. Nothing is written when the orbit file is malformed.
    pub fn create_orbtiming_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        orbit_path: P,
        reference_epoch: DateTime<Utc>,
        timing_path: Q,
    ) -> LosResult<OrbitWindow> {
        let window = self.extract(orbit_path, reference_epoch)?;
        orbtiming::write_orbinfo(&window.state_vectors, timing_path)?;
        Ok(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EofHeader, OsvTimestamp};
    use chrono::{NaiveTime, TimeZone};

    fn orbit(timestamps: Vec<OsvTimestamp>) -> OrbitData {
        OrbitData {
            header: EofHeader::default(),
            state_vectors: timestamps
                .into_iter()
                .map(|t| StateVector::new(t, [7.0e6, 0.0, 0.0], [0.0, 7.5e3, 0.0]))
                .collect(),
        }
    }

    #[test]
    fn test_window_bounds_inclusive() {
        let epoch = Utc.with_ymd_and_hms(2020, 1, 3, 10, 10, 0).unwrap();
        let data = orbit(vec![
            OsvTimestamp::Absolute(Utc.with_ymd_and_hms(2020, 1, 3, 9, 39, 59).unwrap()),
            OsvTimestamp::Absolute(Utc.with_ymd_and_hms(2020, 1, 3, 9, 40, 0).unwrap()),
            OsvTimestamp::Absolute(Utc.with_ymd_and_hms(2020, 1, 3, 10, 40, 0).unwrap()),
            OsvTimestamp::Absolute(Utc.with_ymd_and_hms(2020, 1, 3, 10, 40, 1).unwrap()),
        ]);

        let window = OrbitWindowExtractor::default().select(&data, epoch);
        assert_eq!(window.len(), 2);
        assert_eq!(window.state_vectors[0].time(), 9.0 * 3600.0 + 40.0 * 60.0);
        assert_eq!(window.min_time(), Utc.with_ymd_and_hms(2020, 1, 3, 9, 40, 0).unwrap());
    }

    #[test]
    fn test_same_time_of_day_on_other_day_is_excluded() {
        let epoch = Utc.with_ymd_and_hms(2020, 1, 3, 10, 0, 0).unwrap();
        let data = orbit(vec![
            OsvTimestamp::Absolute(Utc.with_ymd_and_hms(2020, 1, 2, 10, 0, 0).unwrap()),
            OsvTimestamp::Absolute(Utc.with_ymd_and_hms(2020, 1, 3, 10, 0, 0).unwrap()),
        ]);

        let window = OrbitWindowExtractor::default().select(&data, epoch);
        assert_eq!(window.len(), 1);
        assert_eq!(
            window.state_vectors[0].timestamp.absolute(),
            Some(Utc.with_ymd_and_hms(2020, 1, 3, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_undated_records_pass_through() {
        let epoch = Utc.with_ymd_and_hms(2020, 1, 3, 10, 0, 0).unwrap();
        let data = orbit(vec![
            OsvTimestamp::TimeOfDay(NaiveTime::from_hms_opt(3, 0, 0).unwrap()),
            OsvTimestamp::TimeOfDay(NaiveTime::from_hms_opt(23, 0, 0).unwrap()),
        ]);

        let window = OrbitWindowExtractor::new(Duration::minutes(5)).select(&data, epoch);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_custom_half_width() {
        let epoch = Utc.with_ymd_and_hms(2020, 1, 3, 10, 0, 0).unwrap();
        let data = orbit(
            (0..10)
                .map(|i| {
                    OsvTimestamp::Absolute(
                        Utc.with_ymd_and_hms(2020, 1, 3, 9, 55, 0).unwrap() + Duration::seconds(i * 60),
                    )
                })
                .collect(),
        );

        let window = OrbitWindowExtractor::new(Duration::minutes(2)).select(&data, epoch);
        assert_eq!(window.len(), 5);
        assert!(window.state_vectors.windows(2).all(|w| w[0].time() < w[1].time()));
    }
}
