use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ---------------------------------------------------------------------------
// Station – one selectable observation point
// ---------------------------------------------------------------------------

/// A fixed observation point (buoy, platform) as listed in `stations.json`.
///
/// Only `name` and `dialog_par` are interpreted; every other attribute is
/// kept verbatim so the UI can show it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    /// Comma-separated parameter codes to offer for this station.
    #[serde(default)]
    pub dialog_par: String,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, JsonValue>,
}

impl Station {
    pub fn new(name: &str, dialog_par: &str) -> Self {
        Station {
            name: name.to_string(),
            dialog_par: dialog_par.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    /// Attribute accessor by name, rendering non-string values as JSON text.
    pub fn get(&self, attribute: &str) -> Option<String> {
        match attribute {
            "name" => Some(self.name.clone()),
            "dialog_par" => Some(self.dialog_par.clone()),
            other => self.attributes.get(other).map(|v| match v {
                JsonValue::String(s) => s.clone(),
                v => v.to_string(),
            }),
        }
    }

    /// Parameter codes from `dialog_par`, in declaration order.
    /// Blank entries (`"TEMP,,PSAL"`, trailing commas) are skipped.
    pub fn parameter_codes(&self) -> Vec<String> {
        self.dialog_par
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Parameter
// ---------------------------------------------------------------------------

/// How a parameter is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    TimeSeries,
}

/// A measured quantity identified by its short code (e.g. `TEMP`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub data_type: DataType,
}

impl Parameter {
    pub fn time_series(name: &str) -> Self {
        Parameter {
            name: name.to_string(),
            data_type: DataType::TimeSeries,
        }
    }
}

// ---------------------------------------------------------------------------
// Selection model entries
// ---------------------------------------------------------------------------

/// One measurement depth of a parameter plus its user selection flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthSeries {
    pub depth: f64,
    pub selected: bool,
}

/// Selection state of one parameter across all its depths.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub parameter: Parameter,
    pub series: Vec<DepthSeries>,
}

impl TimeSeries {
    /// New entry with every depth unselected.
    pub fn unselected(parameter: Parameter, depths: &[f64]) -> Self {
        TimeSeries {
            parameter,
            series: depths
                .iter()
                .map(|&depth| DepthSeries {
                    depth,
                    selected: false,
                })
                .collect(),
        }
    }

    pub fn all_selected(&self) -> bool {
        !self.series.is_empty() && self.series.iter().all(|s| s.selected)
    }

    /// At least one, but not every, depth is selected.
    pub fn some_selected(&self) -> bool {
        self.series.iter().any(|s| s.selected) && !self.all_selected()
    }

    pub fn selected_count(&self) -> usize {
        self.series.iter().filter(|s| s.selected).count()
    }

    pub fn select_all(&mut self, selected: bool) {
        for s in &mut self.series {
            s.selected = selected;
        }
    }
}

// ---------------------------------------------------------------------------
// SeriesKey – chart identity of a (parameter, depth) pair
// ---------------------------------------------------------------------------

/// Chart series id: parameter code immediately followed by the depth
/// (`TEMP` at 0 m → `TEMP0`, `TEMP` at 1.5 m → `TEMP1.5`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey(String);

impl SeriesKey {
    pub fn new(parameter: &str, depth: f64) -> Self {
        // `-0.0 + 0.0` is `+0.0`, so a negative zero depth still reads `TEMP0`.
        let depth = depth + 0.0;
        SeriesKey(format!("{parameter}{depth}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Measurement
// ---------------------------------------------------------------------------

/// Sample timestamp as delivered by the source: ISO-8601 text or epoch millis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    EpochMillis(i64),
    Text(String),
}

impl Timestamp {
    /// Milliseconds since the Unix epoch. Text without an offset is read as UTC.
    pub fn epoch_millis(&self) -> Option<i64> {
        match self {
            Timestamp::EpochMillis(ms) => Some(*ms),
            Timestamp::Text(s) => parse_time_text(s),
        }
    }
}

fn parse_time_text(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// A single sample returned by a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub timestamp: Timestamp,
    pub measurement: f64,
}

// ---------------------------------------------------------------------------
// TimeRange – query window
// ---------------------------------------------------------------------------

/// Query window `[start, end]`; an open end means "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn since(start: DateTime<Utc>) -> Self {
        TimeRange { start, end: None }
    }

    pub fn end_or_now(&self) -> DateTime<Utc> {
        self.end.unwrap_or_else(Utc::now)
    }

    pub fn contains_millis(&self, ms: i64) -> bool {
        ms >= self.start.timestamp_millis() && ms <= self.end_or_now().timestamp_millis()
    }
}

/// Local midnight of `day`, expressed in UTC.
pub fn local_midnight_utc(day: chrono::NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(chrono::NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_codes_split_and_trim() {
        let station = Station::new("S1", "TEMP, PSAL,,VHM0,");
        assert_eq!(station.parameter_codes(), vec!["TEMP", "PSAL", "VHM0"]);
        assert!(Station::new("S2", "").parameter_codes().is_empty());
    }

    #[test]
    fn station_attributes_from_json() {
        let station: Station = serde_json::from_str(
            r#"{"name": "S1", "dialog_par": "TEMP", "latitude": 45.5, "label": "Buoy"}"#,
        )
        .unwrap();
        assert_eq!(station.get("name").as_deref(), Some("S1"));
        assert_eq!(station.get("dialog_par").as_deref(), Some("TEMP"));
        assert_eq!(station.get("label").as_deref(), Some("Buoy"));
        assert_eq!(station.get("latitude").as_deref(), Some("45.5"));
        assert_eq!(station.get("missing"), None);
    }

    #[test]
    fn series_key_uses_shortest_depth_text() {
        assert_eq!(SeriesKey::new("TEMP", 0.0).as_str(), "TEMP0");
        assert_eq!(SeriesKey::new("TEMP", 10.0).as_str(), "TEMP10");
        assert_eq!(SeriesKey::new("PSAL", 1.5).as_str(), "PSAL1.5");
        assert_eq!(SeriesKey::new("TEMP", -0.0).as_str(), "TEMP0");
        assert_eq!(SeriesKey::new("TEMP", -0.0), SeriesKey::new("TEMP", 0.0));
    }

    #[test]
    fn selection_helpers() {
        let mut ts = TimeSeries::unselected(Parameter::time_series("TEMP"), &[0.0, 10.0]);
        assert!(!ts.all_selected());
        assert!(!ts.some_selected());

        ts.series[0].selected = true;
        assert!(ts.some_selected());
        assert_eq!(ts.selected_count(), 1);

        ts.select_all(true);
        assert!(ts.all_selected());
        assert!(!ts.some_selected());

        let empty = TimeSeries::unselected(Parameter::time_series("X"), &[]);
        assert!(!empty.all_selected());
    }

    #[test]
    fn timestamps_to_epoch_millis() {
        assert_eq!(Timestamp::EpochMillis(42).epoch_millis(), Some(42));
        assert_eq!(
            Timestamp::Text("1970-01-01T00:00:01Z".into()).epoch_millis(),
            Some(1000)
        );
        assert_eq!(
            Timestamp::Text("1970-01-01T00:00:02".into()).epoch_millis(),
            Some(2000)
        );
        assert_eq!(
            Timestamp::Text("1970-01-01T01:00:00+01:00".into()).epoch_millis(),
            Some(0)
        );
        assert_eq!(Timestamp::Text("yesterday".into()).epoch_millis(), None);
    }

    #[test]
    fn measurement_timestamp_deserializes_either_form() {
        let m: Vec<Measurement> = serde_json::from_str(
            r#"[{"timestamp": 5, "measurement": 1.0},
                {"timestamp": "2024-01-01T00:00:00Z", "measurement": 2.0}]"#,
        )
        .unwrap();
        assert_eq!(m[0].timestamp, Timestamp::EpochMillis(5));
        assert!(matches!(m[1].timestamp, Timestamp::Text(_)));
    }

    #[test]
    fn time_range_containment() {
        let start = DateTime::from_timestamp_millis(1_000).unwrap();
        let end = DateTime::from_timestamp_millis(2_000).unwrap();
        let range = TimeRange { start, end: Some(end) };
        assert!(range.contains_millis(1_000));
        assert!(range.contains_millis(2_000));
        assert!(!range.contains_millis(999));
        assert!(!range.contains_millis(2_001));

        let today = Local::now().date_naive();
        let open = TimeRange::since(local_midnight_utc(today));
        assert!(open.end.is_none());
        assert!(open.contains_millis(Utc::now().timestamp_millis() - 1));
    }
}
