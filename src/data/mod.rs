/// Data layer: core types, station exports, vocabulary and the data source.
///
/// Architecture:
/// ```text
///  stations.json      <station>.parquet / .csv / .json
///        │                       │
///        ▼                       ▼
///   ┌──────────┐         ┌──────────────┐
///   │  loader   │         │ StationTable  │  time, depth, parameter columns
///   └──────────┘         └──────────────┘
///        │                       │
///        ▼                       ▼
///   Vec<Station>         ┌──────────────┐
///                        │   source      │  DataSource: depths / measurements
///                        └──────────────┘
///
///   vocab   – parameter code → localized name, unit
///   export  – visible chart series → CSV
/// ```

pub mod export;
pub mod loader;
pub mod model;
pub mod source;
pub mod vocab;
