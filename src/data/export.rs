use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat};

use crate::chart::Chart;

/// Write every visible chart series as long-format CSV:
/// `series,name,unit,time,value`.
pub fn write_visible_series<W: Write>(chart: &Chart, out: W) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["series", "name", "unit", "time", "value"])?;

    let mut rows = 0;
    for series in chart.visible_series() {
        let unit = series.axis.as_deref().unwrap_or("");
        for [x, y] in &series.points {
            let time = DateTime::from_timestamp_millis(*x as i64)
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default();
            writer.write_record([
                series.id.as_str(),
                series.name.as_str(),
                unit,
                time.as_str(),
                y.to_string().as_str(),
            ])?;
            rows += 1;
        }
    }
    writer.flush()?;
    Ok(rows)
}

pub fn export_csv(chart: &Chart, path: &Path) -> Result<usize> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    write_visible_series(chart, file).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{ChartSurface, SeriesConfig, TooltipFormat};
    use crate::data::model::SeriesKey;

    fn add(chart: &mut Chart, code: &str, axis: Option<&str>) {
        chart.add_series(SeriesConfig {
            id: SeriesKey::new(code, 0.0),
            name: format!("{code} name"),
            axis: axis.map(str::to_string),
            points: vec![[0.0, 1.5], [60_000.0, 2.0]],
            tooltip: TooltipFormat {
                value_decimals: 2,
                value_suffix: String::new(),
            },
        });
    }

    #[test]
    fn exports_only_visible_series() {
        let mut chart = Chart::default();
        add(&mut chart, "TEMP", Some("°C"));
        add(&mut chart, "PSAL", None);
        chart.hide_series(&SeriesKey::new("PSAL", 0.0));

        let mut buf = Vec::new();
        let rows = write_visible_series(&chart, &mut buf).unwrap();
        assert_eq!(rows, 2);

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "series,name,unit,time,value");
        assert_eq!(lines[1], "TEMP0,TEMP name,°C,1970-01-01T00:00:00Z,1.5");
        assert_eq!(lines[2], "TEMP0,TEMP name,°C,1970-01-01T00:01:00Z,2");
    }

    #[test]
    fn export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut chart = Chart::default();
        add(&mut chart, "VHM0", Some("m"));
        assert_eq!(export_csv(&chart, &path).unwrap(), 2);
        assert!(std::fs::read_to_string(&path).unwrap().contains("VHM0"));
    }
}
