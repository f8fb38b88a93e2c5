//! Writes a demo data directory: `stations.json`, one Parquet export and one
//! ERDDAP-style CSV export with synthetic but plausible signals.
//!
//! Usage: `generate_sample [OUTPUT_DIR]` (default `sample_data`).

use std::f64::consts::PI;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Duration, DurationRound, SecondsFormat, Utc};
use parquet::arrow::ArrowWriter;
use serde_json::json;

const DAYS: i64 = 30;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        mean + std_dev * z
    }
}

/// Hourly timestamps covering the last `DAYS` days.
fn hours(now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let start = now - Duration::days(DAYS);
    (0..DAYS * 24).map(|h| start + Duration::hours(h)).collect()
}

/// Daily cycle (period 24 h) plus a slow drift and noise.
fn signal(rng: &mut SimpleRng, hour: i64, mean: f64, daily: f64, drift: f64, noise: f64) -> f64 {
    let t = hour as f64;
    mean + daily * (2.0 * PI * t / 24.0).sin() + drift * (2.0 * PI * t / (24.0 * 9.0)).sin()
        + rng.gauss(0.0, noise)
}

fn iso(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Surface buoy: waves and wind at 0 m, temperature and salinity at 0 and 10 m.
fn write_buoy(dir: &Path, times: &[DateTime<Utc>], rng: &mut SimpleRng) -> Result<usize> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("time", DataType::Utf8, false),
        Field::new("depth", DataType::Float64, false),
        Field::new("VHM0", DataType::Float64, true),
        Field::new("VTPK", DataType::Float64, true),
        Field::new("WSPD", DataType::Float64, true),
        Field::new("TEMP", DataType::Float64, true),
        Field::new("PSAL", DataType::Float64, true),
    ]));

    let mut time = StringBuilder::new();
    let mut depth = Float64Builder::new();
    let mut vhm0 = Float64Builder::new();
    let mut vtpk = Float64Builder::new();
    let mut wspd = Float64Builder::new();
    let mut temp = Float64Builder::new();
    let mut psal = Float64Builder::new();
    let mut rows = 0;

    for (h, t) in times.iter().enumerate() {
        let h = h as i64;
        for d in [0.0, 10.0] {
            time.append_value(iso(t));
            depth.append_value(d);
            if d == 0.0 {
                let wind = signal(rng, h, 6.0, 2.0, 3.0, 0.8).max(0.0);
                wspd.append_value(wind);
                vhm0.append_value((0.15 * wind + rng.gauss(0.0, 0.05)).max(0.05));
                vtpk.append_value(signal(rng, h, 6.5, 0.3, 1.0, 0.3));
            } else {
                wspd.append_null();
                vhm0.append_null();
                vtpk.append_null();
            }
            temp.append_value(signal(rng, h, 18.0 - 0.2 * d, 0.6 - 0.05 * d, 1.5, 0.1));
            // Salinity probe drops out for a day at 10 m.
            if d == 10.0 && (240..264).contains(&h) {
                psal.append_null();
            } else {
                psal.append_value(signal(rng, h, 38.0, 0.05, 0.2, 0.02));
            }
            rows += 1;
        }
    }

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(time.finish()),
            Arc::new(depth.finish()),
            Arc::new(vhm0.finish()),
            Arc::new(vtpk.finish()),
            Arc::new(wspd.finish()),
            Arc::new(temp.finish()),
            Arc::new(psal.finish()),
        ],
    )
    .context("building record batch")?;

    let path = dir.join("E1.parquet");
    let file = std::fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(rows)
}

/// Mooring with a CTD chain at three depths, as an ERDDAP `.csv` (units row).
fn write_mooring(dir: &Path, times: &[DateTime<Utc>], rng: &mut SimpleRng) -> Result<usize> {
    let path = dir.join("M1.csv");
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["time", "depth", "TEMP", "PSAL", "CPHL", "DOXY"])?;
    writer.write_record(["UTC", "m", "degree_C", "PSU", "mg m-3", "mmol m-3"])?;

    let mut rows = 0;
    for (h, t) in times.iter().enumerate() {
        let h = h as i64;
        for d in [5.0, 30.0, 80.0] {
            let temp = signal(rng, h, 19.0 - 0.08 * d, 0.4 / (1.0 + d / 10.0), 0.8, 0.05);
            let psal = signal(rng, h, 37.8 + 0.005 * d, 0.02, 0.1, 0.01);
            let cphl = signal(rng, h, 0.3 + 0.01 * d, 0.05, 0.1, 0.02).max(0.0);
            let doxy = signal(rng, h, 240.0 - 0.5 * d, 4.0, 6.0, 1.5);
            writer.write_record([
                iso(t),
                d.to_string(),
                format!("{temp:.3}"),
                format!("{psal:.3}"),
                format!("{cphl:.3}"),
                format!("{doxy:.1}"),
            ])?;
            rows += 1;
        }
    }
    writer.flush()?;
    Ok(rows)
}

fn main() -> Result<()> {
    let out = std::env::args().nth(1).unwrap_or_else(|| "sample_data".to_string());
    let dir = Path::new(&out);
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let now = Utc::now().duration_trunc(Duration::hours(1))?;
    let times = hours(now);

    let stations = json!([
        {
            "name": "E1",
            "label": "Offshore wave buoy",
            "dialog_par": "VHM0,VTPK,WSPD,TEMP,PSAL",
            "latitude": 43.75,
            "longitude": 13.20
        },
        {
            "name": "M1",
            "label": "CTD mooring",
            "dialog_par": "TEMP,PSAL,CPHL,DOXY",
            "latitude": 45.55,
            "longitude": 13.55
        },
        {
            "name": "X9",
            "label": "Decommissioned",
            "dialog_par": "TEMP",
            "latitude": 44.10,
            "longitude": 12.60
        }
    ]);
    std::fs::write(dir.join("stations.json"), serde_json::to_string_pretty(&stations)?)?;

    let buoy_rows = write_buoy(dir, &times, &mut rng)?;
    let mooring_rows = write_mooring(dir, &times, &mut rng)?;

    println!(
        "Wrote {buoy_rows} buoy rows and {mooring_rows} mooring rows to {}",
        dir.display()
    );
    Ok(())
}
