use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use super::loader::{StationTable, find_station_file, load_station_table};
use super::model::{Measurement, Parameter, TimeRange};

/// Failure of a single data-source request.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no data for station '{0}'")]
    UnknownStation(String),

    #[error("station '{station}' has no '{parameter}' data")]
    UnknownParameter { station: String, parameter: String },

    #[error("failed to load data for station '{station}'")]
    Load {
        station: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// The remote (or local) measurement service, treated as a black box.
///
/// Calls block; callers run them off the UI thread.
pub trait DataSource: Send + Sync {
    /// Distinct depths at which `parameter` has data within `range`.
    fn get_depth(
        &self,
        station: &str,
        parameter: &Parameter,
        range: &TimeRange,
    ) -> Result<Vec<f64>, SourceError>;

    /// Samples of `parameter` at `depth` within `range`, in source order.
    fn get_measurements(
        &self,
        station: &str,
        parameter: &Parameter,
        depth: f64,
        range: &TimeRange,
    ) -> Result<Vec<Measurement>, SourceError>;
}

// ---------------------------------------------------------------------------
// LocalErddapSource – a directory of tabledap exports
// ---------------------------------------------------------------------------

/// One station's cache entry. Its lock is held while the file is parsed, so
/// concurrent first requests for a station wait for a single load.
type TableSlot = Arc<Mutex<Option<Arc<StationTable>>>>;

/// Serves requests from `<dir>/<station>.{parquet,csv,json}`.
///
/// Each station file is parsed once and shared between requests.
pub struct LocalErddapSource {
    dir: PathBuf,
    tables: Mutex<HashMap<String, TableSlot>>,
}

impl LocalErddapSource {
    pub fn new(dir: &Path) -> Self {
        LocalErddapSource {
            dir: dir.to_path_buf(),
            tables: Mutex::new(HashMap::new()),
        }
    }

    fn table(&self, station: &str) -> Result<Arc<StationTable>, SourceError> {
        let slot = Arc::clone(self.lock_tables().entry(station.to_string()).or_default());
        // A panic while holding a lock leaves the cached value itself consistent.
        let mut cached = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(table) = cached.as_ref() {
            return Ok(Arc::clone(table));
        }

        let path = find_station_file(&self.dir, station)
            .ok_or_else(|| SourceError::UnknownStation(station.to_string()))?;
        let table = load_station_table(&path).map_err(|e| SourceError::Load {
            station: station.to_string(),
            source: e.into(),
        })?;
        log::info!(
            "Loaded {} rows for station {station} from {}",
            table.len(),
            path.display()
        );

        let table = Arc::new(table);
        *cached = Some(Arc::clone(&table));
        Ok(table)
    }

    fn lock_tables(&self) -> std::sync::MutexGuard<'_, HashMap<String, TableSlot>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn table_with(&self, station: &str, parameter: &Parameter) -> Result<Arc<StationTable>, SourceError> {
        let table = self.table(station)?;
        if !table.has_parameter(&parameter.name) {
            return Err(SourceError::UnknownParameter {
                station: station.to_string(),
                parameter: parameter.name.clone(),
            });
        }
        Ok(table)
    }
}

impl DataSource for LocalErddapSource {
    fn get_depth(
        &self,
        station: &str,
        parameter: &Parameter,
        range: &TimeRange,
    ) -> Result<Vec<f64>, SourceError> {
        Ok(self.table_with(station, parameter)?.depths(&parameter.name, range))
    }

    fn get_measurements(
        &self,
        station: &str,
        parameter: &Parameter,
        depth: f64,
        range: &TimeRange,
    ) -> Result<Vec<Measurement>, SourceError> {
        Ok(self
            .table_with(station, parameter)?
            .measurements(&parameter.name, depth, range))
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::data::model::Timestamp;

    /// Canned responses keyed by parameter code; records every call.
    #[derive(Default)]
    pub struct StubSource {
        pub depths: HashMap<String, Vec<f64>>,
        pub measurements: HashMap<String, Vec<Measurement>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl StubSource {
        pub fn with_depths(mut self, parameter: &str, depths: &[f64]) -> Self {
            self.depths.insert(parameter.to_string(), depths.to_vec());
            self
        }

        /// Every depth of `parameter` returns these `(epoch millis, value)` samples.
        pub fn with_samples(mut self, parameter: &str, samples: &[(i64, f64)]) -> Self {
            let list = samples
                .iter()
                .map(|&(ms, v)| Measurement {
                    timestamp: Timestamp::EpochMillis(ms),
                    measurement: v,
                })
                .collect();
            self.measurements.insert(parameter.to_string(), list);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn missing(station: &str, parameter: &Parameter) -> SourceError {
            SourceError::UnknownParameter {
                station: station.to_string(),
                parameter: parameter.name.clone(),
            }
        }
    }

    impl DataSource for StubSource {
        fn get_depth(
            &self,
            station: &str,
            parameter: &Parameter,
            _range: &TimeRange,
        ) -> Result<Vec<f64>, SourceError> {
            self.record(format!("depth {station} {}", parameter.name));
            self.depths
                .get(&parameter.name)
                .cloned()
                .ok_or_else(|| Self::missing(station, parameter))
        }

        fn get_measurements(
            &self,
            station: &str,
            parameter: &Parameter,
            depth: f64,
            _range: &TimeRange,
        ) -> Result<Vec<Measurement>, SourceError> {
            self.record(format!("measurements {station} {}{depth}", parameter.name));
            self.measurements
                .get(&parameter.name)
                .cloned()
                .ok_or_else(|| Self::missing(station, parameter))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::TimeRange;
    use chrono::DateTime;

    fn range() -> TimeRange {
        TimeRange::since(DateTime::from_timestamp_millis(0).unwrap())
    }

    #[test]
    fn local_source_serves_csv_station() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("S1.csv"),
            "time,depth,TEMP\n2024-01-01T00:00:00Z,0,12\n2024-01-01T00:00:00Z,10,11\n",
        )
        .unwrap();
        let source = LocalErddapSource::new(dir.path());
        let temp = Parameter::time_series("TEMP");

        assert_eq!(source.get_depth("S1", &temp, &range()).unwrap(), vec![0.0, 10.0]);
        let samples = source.get_measurements("S1", &temp, 10.0, &range()).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].measurement, 11.0);
    }

    #[test]
    fn local_source_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("S1.csv"), "time,depth,TEMP\n").unwrap();
        std::fs::write(dir.path().join("BAD.csv"), "depth,TEMP\n0,1\n").unwrap();
        let source = LocalErddapSource::new(dir.path());

        let err = source
            .get_depth("S1", &Parameter::time_series("PSAL"), &range())
            .unwrap_err();
        assert!(matches!(err, SourceError::UnknownParameter { .. }));

        let err = source
            .get_depth("S9", &Parameter::time_series("TEMP"), &range())
            .unwrap_err();
        assert!(matches!(err, SourceError::UnknownStation(_)));

        let err = source
            .get_depth("BAD", &Parameter::time_series("TEMP"), &range())
            .unwrap_err();
        assert!(matches!(err, SourceError::Load { .. }));
    }

    #[test]
    fn concurrent_first_requests_share_one_table() {
        use std::fmt::Write as _;
        use std::sync::Barrier;

        let dir = tempfile::tempdir().unwrap();
        let mut csv = String::from("time,depth,TEMP\n");
        for i in 0..20_000 {
            writeln!(csv, "{},{},{}", 1_704_067_200 + i * 60, i % 4, i).unwrap();
        }
        std::fs::write(dir.path().join("S1.csv"), csv).unwrap();
        let source = LocalErddapSource::new(dir.path());
        let barrier = Barrier::new(6);

        let tables: Vec<Arc<StationTable>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..6)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        source.table("S1").unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(tables[0].len(), 20_000);
        assert!(tables.iter().all(|t| Arc::ptr_eq(t, &tables[0])));
        assert!(Arc::ptr_eq(&source.table("S1").unwrap(), &tables[0]));
    }

    #[test]
    fn failed_load_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalErddapSource::new(dir.path());
        assert!(matches!(source.table("S1"), Err(SourceError::UnknownStation(_))));

        std::fs::write(dir.path().join("S1.csv"), "time,TEMP\n1704067200,1\n").unwrap();
        assert_eq!(source.table("S1").unwrap().len(), 1);
    }
}
