use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, Float64Array, StringArray, TimestampMillisecondArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, TimeUnit};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::model::{Measurement, Station, TimeRange, Timestamp};

/// File listing the stations of a data directory.
pub const STATIONS_FILE: &str = "stations.json";

/// Extensions tried, in order, when looking up a station's table.
const TABLE_EXTENSIONS: [&str; 3] = ["parquet", "csv", "json"];

// ---------------------------------------------------------------------------
// StationTable – one ERDDAP tabledap export
// ---------------------------------------------------------------------------

/// Column-oriented copy of a station's tabledap export.
///
/// `time` and `depth` are row keys; every other numeric column is a
/// parameter, with missing cells stored as `None`.
#[derive(Debug, Clone, Default)]
pub struct StationTable {
    pub time: Vec<Timestamp>,
    pub depth: Vec<f64>,
    pub columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl StationTable {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Rows of `parameter` holding a value inside `range`, as (row, value).
    fn rows_in_range<'a>(
        &'a self,
        parameter: &str,
        range: &'a TimeRange,
    ) -> impl Iterator<Item = (usize, f64)> + 'a {
        let values = self.columns.get(parameter);
        values
            .into_iter()
            .flat_map(|v| v.iter().enumerate())
            .filter_map(|(row, v)| v.filter(|x| x.is_finite()).map(|x| (row, x)))
            .filter(move |(row, _)| {
                self.time[*row]
                    .epoch_millis()
                    .is_some_and(|ms| range.contains_millis(ms))
            })
    }

    /// Distinct depths, ascending, at which `parameter` has data in `range`.
    pub fn depths(&self, parameter: &str, range: &TimeRange) -> Vec<f64> {
        let mut depths: Vec<f64> = self
            .rows_in_range(parameter, range)
            .map(|(row, _)| self.depth[row])
            .collect();
        depths.sort_by(f64::total_cmp);
        depths.dedup();
        depths
    }

    /// Samples of `parameter` at `depth` within `range`, in file order.
    pub fn measurements(&self, parameter: &str, depth: f64, range: &TimeRange) -> Vec<Measurement> {
        self.rows_in_range(parameter, range)
            .filter(|(row, _)| self.depth[*row] == depth)
            .map(|(row, measurement)| Measurement {
                timestamp: self.time[row].clone(),
                measurement,
            })
            .collect()
    }
}

/// Accumulates rows while parsing, keeping every column the same length.
///
/// Rows without a usable time or depth are dropped and counted, so one bad
/// row does not cost the whole station.
struct TableBuilder {
    table: StationTable,
    parameters: Vec<String>,
    skipped: usize,
}

impl TableBuilder {
    fn new(parameters: Vec<String>) -> Self {
        let columns = parameters.iter().map(|p| (p.clone(), Vec::new())).collect();
        TableBuilder {
            table: StationTable {
                columns,
                ..Default::default()
            },
            parameters,
            skipped: 0,
        }
    }

    fn push(&mut self, time: Option<Timestamp>, depth: Option<f64>, values: Vec<Option<f64>>) {
        let time = time.filter(|t| t.epoch_millis().is_some());
        let (Some(time), Some(depth)) = (time, depth) else {
            self.skipped += 1;
            return;
        };
        self.table.time.push(time);
        self.table.depth.push(depth);
        for (name, value) in self.parameters.iter().zip(values) {
            if let Some(col) = self.table.columns.get_mut(name) {
                col.push(value);
            }
        }
    }

    fn finish(self, path: &Path) -> StationTable {
        if self.skipped > 0 {
            log::warn!(
                "{}: skipped {} row(s) without a readable time or depth",
                path.display(),
                self.skipped
            );
        }
        self.table
    }
}

/// Header cell → column name: ERDDAP `.csvp` headers carry `name (unit)`.
fn column_name(header: &str) -> String {
    header
        .split(" (")
        .next()
        .unwrap_or(header)
        .trim()
        .to_string()
}

/// Split header names into (time index, depth index, parameter columns).
fn classify_columns(names: &[String]) -> Result<(usize, Option<usize>, Vec<(usize, String)>)> {
    let time_idx = names
        .iter()
        .position(|h| h == "time")
        .context("table missing 'time' column")?;
    let depth_idx = names.iter().position(|h| h == "depth");
    let params = names
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != time_idx && Some(*i) != depth_idx)
        .filter(|(_, name)| !matches!(name.as_str(), "latitude" | "longitude" | "station"))
        .map(|(i, name)| (i, name.clone()))
        .collect();
    Ok((time_idx, depth_idx, params))
}

/// `None` for NaN or infinite input, which would otherwise saturate to a bogus instant.
fn epoch_seconds(seconds: f64) -> Option<Timestamp> {
    seconds
        .is_finite()
        .then(|| Timestamp::EpochMillis((seconds * 1000.0).round() as i64))
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Read `stations.json` from a data directory.
pub fn load_stations(dir: &Path) -> Result<Vec<Station>> {
    let path = dir.join(STATIONS_FILE);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Locate the export for `station` in `dir`, preferring Parquet.
pub fn find_station_file(dir: &Path, station: &str) -> Option<PathBuf> {
    TABLE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{station}.{ext}")))
        .find(|p| p.is_file())
}

/// Load a tabledap export.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – `time` as text, epoch seconds or Arrow timestamp
/// * `.csv`     – ERDDAP `.csv` (units row) or `.csvp` (`name (unit)` headers)
/// * `.json`    – ERDDAP `{"table": {"columnNames": [...], "rows": [...]}}`
pub fn load_station_table(path: &Path) -> Result<StationTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn parse_csv_time(s: &str) -> Option<Timestamp> {
    let time = match s.trim().parse::<f64>() {
        Ok(seconds) => epoch_seconds(seconds)?,
        Err(_) => Timestamp::Text(s.trim().to_string()),
    };
    time.epoch_millis().is_some().then_some(time)
}

fn parse_csv_value(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn load_csv(path: &Path) -> Result<StationTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let names: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(column_name)
        .collect();
    let (time_idx, depth_idx, params) = classify_columns(&names)?;
    let mut builder = TableBuilder::new(params.iter().map(|(_, n)| n.clone()).collect());

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let time = parse_csv_time(record.get(time_idx).unwrap_or(""));

        // ERDDAP `.csv` puts units ("UTC", "m", ...) on the first row.
        if time.is_none() && row_no == 0 {
            continue;
        }

        let depth = match depth_idx {
            Some(i) => parse_csv_value(record.get(i).unwrap_or("")),
            None => Some(0.0),
        };
        let values = params
            .iter()
            .map(|(i, _)| record.get(*i).and_then(parse_csv_value))
            .collect();
        builder.push(time, depth, values);
    }

    Ok(builder.finish(path))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ErddapJson {
    table: ErddapJsonTable,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErddapJsonTable {
    column_names: Vec<String>,
    rows: Vec<Vec<JsonValue>>,
}

fn load_json(path: &Path) -> Result<StationTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: ErddapJson = serde_json::from_str(&text).context("parsing ERDDAP JSON table")?;
    let names: Vec<String> = root.table.column_names.iter().map(|h| column_name(h)).collect();
    let (time_idx, depth_idx, params) = classify_columns(&names)?;
    let mut builder = TableBuilder::new(params.iter().map(|(_, n)| n.clone()).collect());

    for row in &root.table.rows {
        let time = match row.get(time_idx) {
            Some(JsonValue::String(s)) => Some(Timestamp::Text(s.clone())),
            Some(JsonValue::Number(n)) => n.as_f64().and_then(epoch_seconds),
            _ => None,
        };
        let depth = match depth_idx {
            Some(d) => row.get(d).and_then(JsonValue::as_f64).filter(|v| v.is_finite()),
            None => Some(0.0),
        };
        let values = params
            .iter()
            .map(|(c, _)| row.get(*c).and_then(JsonValue::as_f64).filter(|v| v.is_finite()))
            .collect();
        builder.push(time, depth, values);
    }

    Ok(builder.finish(path))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet export.
///
/// Expected schema:
/// - `time`: Utf8 (ISO-8601), any Arrow timestamp, or a number of epoch seconds
/// - `depth`: any numeric type (optional, defaults to 0)
/// - Any other numeric column is a parameter; non-numeric columns are skipped
fn load_parquet(path: &Path) -> Result<StationTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let schema = builder.schema().clone();
    let reader = builder.build().context("building parquet reader")?;

    let names: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
    let (time_idx, depth_idx, params) = classify_columns(&names)?;
    let params: Vec<(usize, String)> = params
        .into_iter()
        .filter(|(i, _)| schema.field(*i).data_type().is_numeric())
        .collect();
    let mut table = TableBuilder::new(params.iter().map(|(_, n)| n.clone()).collect());

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let times = extract_times(batch.column(time_idx))?;
        let depths = match depth_idx {
            Some(i) => extract_f64(batch.column(i)).context("reading 'depth'")?,
            None => vec![Some(0.0); batch.num_rows()],
        };
        let columns: Vec<Vec<Option<f64>>> = params
            .iter()
            .map(|(i, name)| {
                extract_f64(batch.column(*i)).with_context(|| format!("reading '{name}'"))
            })
            .collect::<Result<_>>()?;

        for (row, time) in times.into_iter().enumerate() {
            let values = columns.iter().map(|c| c[row]).collect();
            table.push(time, depths[row], values);
        }
    }

    Ok(table.finish(path))
}

// -- Parquet / Arrow helpers --

fn extract_f64(col: &Arc<dyn Array>) -> Result<Vec<Option<f64>>> {
    let cast_col = cast(col, &DataType::Float64).context("casting to Float64")?;
    let arr = cast_col
        .as_any()
        .downcast_ref::<Float64Array>()
        .context("expected Float64Array")?;
    Ok(arr.iter().map(|v| v.filter(|x| x.is_finite())).collect())
}

/// Per-row times; nulls and non-finite numbers come back as `None`.
fn extract_times(col: &Arc<dyn Array>) -> Result<Vec<Option<Timestamp>>> {
    match col.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 => {
            let cast_col = cast(col, &DataType::Utf8).context("casting time to Utf8")?;
            let arr = cast_col
                .as_any()
                .downcast_ref::<StringArray>()
                .context("expected StringArray")?;
            Ok(arr.iter().map(|v| v.map(|s| Timestamp::Text(s.to_string()))).collect())
        }
        DataType::Timestamp(_, _) => {
            let target = DataType::Timestamp(TimeUnit::Millisecond, None);
            let cast_col = cast(col, &target).context("casting time to milliseconds")?;
            let arr = cast_col
                .as_any()
                .downcast_ref::<TimestampMillisecondArray>()
                .context("expected TimestampMillisecondArray")?;
            Ok(arr.iter().map(|v| v.map(Timestamp::EpochMillis)).collect())
        }
        dt if dt.is_numeric() => Ok(extract_f64(col)?
            .into_iter()
            .map(|v| v.and_then(epoch_seconds))
            .collect()),
        other => bail!("Unsupported time column type {other:?}"),
    }
}
