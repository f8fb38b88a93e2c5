use std::sync::Arc;

use crate::chart::{AxisConfig, ChartSurface, SeriesConfig, TooltipFormat};
use crate::data::model::{Measurement, Parameter, SeriesKey};
use crate::data::source::SourceError;
use crate::data::vocab::Vocabulary;
use crate::selection::SelectionModel;
use crate::tasks::RequestQueue;

const LOADING_MESSAGE: &str = "Loading...";

/// Calls issued by one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub requested: usize,
    pub shown: usize,
    pub hidden: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        *self == ReconcileReport::default()
    }
}

// ---------------------------------------------------------------------------
// SeriesSynchronizer
// ---------------------------------------------------------------------------

/// Brings chart series visibility into agreement with the selection flags.
///
/// Series are created lazily (fetching their samples first), then only shown
/// or hidden; point data is never discarded.
pub struct SeriesSynchronizer {
    vocab: Arc<Vocabulary>,
    locale: String,
}

impl SeriesSynchronizer {
    pub fn new(vocab: Arc<Vocabulary>, locale: &str) -> Self {
        SeriesSynchronizer {
            vocab,
            locale: locale.to_string(),
        }
    }

    pub fn display_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.vocab.display_name(code, &self.locale)
    }

    /// Walk every (parameter, depth) of `model` in order:
    ///
    /// | selected | series on chart | action                      |
    /// |----------|-----------------|-----------------------------|
    /// | yes      | no              | fetch samples (once)        |
    /// | yes      | yes             | show if hidden              |
    /// | no       | yes             | hide if shown               |
    /// | no       | no              | nothing                     |
    pub fn reconcile<C: ChartSurface + ?Sized>(
        &self,
        model: &SelectionModel,
        chart: &mut C,
        queue: &mut RequestQueue,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let station = &model.station().name;

        for entry in model.entries() {
            for depth in &entry.series {
                let key = SeriesKey::new(&entry.parameter.name, depth.depth);
                let visible = chart.find_series(&key).map(|s| s.visible);

                match (depth.selected, visible) {
                    (true, None) => {
                        if !queue.is_fetching(&key) {
                            queue.fetch_measurements(
                                station,
                                entry.parameter.clone(),
                                depth.depth,
                                model.range(),
                            );
                            chart.show_loading(LOADING_MESSAGE);
                            report.requested += 1;
                        }
                    }
                    (true, Some(false)) => {
                        chart.show_series(&key);
                        report.shown += 1;
                    }
                    (false, Some(true)) => {
                        chart.hide_series(&key);
                        report.hidden += 1;
                    }
                    (true, Some(true)) | (false, Some(false)) | (false, None) => {}
                }
            }
        }

        if !report.is_noop() {
            log::debug!("Reconciled {station}: {report:?}");
        }
        report
    }

    /// Turn a finished sample fetch into a chart series.
    ///
    /// Returns whether a series was added. Failures leave no trace on the
    /// chart, so the next reconciliation fetches again.
    pub fn apply_measurements<C: ChartSurface + ?Sized>(
        &self,
        chart: &mut C,
        parameter: &Parameter,
        depth: f64,
        result: Result<Vec<Measurement>, SourceError>,
    ) -> bool {
        chart.hide_loading();
        let key = SeriesKey::new(&parameter.name, depth);

        let measurements = match result {
            Ok(m) => m,
            Err(e) => {
                log::warn!("Fetching {key} failed: {e}");
                return false;
            }
        };
        if chart.find_series(&key).is_some() {
            return false;
        }

        let points: Vec<[f64; 2]> = measurements
            .iter()
            .filter_map(|m| {
                let ms = m.timestamp.epoch_millis();
                if ms.is_none() {
                    log::warn!("{key}: skipping sample with unreadable time {:?}", m.timestamp);
                }
                ms.map(|ms| [ms as f64, m.measurement])
            })
            .collect();

        let unit = self.vocab.measurement_unit(&parameter.name);
        if let Some(unit) = unit {
            if !chart.has_axis(unit) {
                chart.add_axis(AxisConfig::for_unit(unit));
            }
        }

        log::info!("Adding series {key} with {} points", points.len());
        chart.add_series(SeriesConfig {
            id: key,
            name: self.display_name(&parameter.name).to_string(),
            axis: unit.map(str::to_string),
            points,
            tooltip: TooltipFormat {
                value_decimals: 2,
                value_suffix: unit.unwrap_or_default().to_string(),
            },
        });
        true
    }
}
