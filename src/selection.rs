use crate::data::model::{Parameter, Station, TimeRange, TimeSeries};
use crate::data::source::SourceError;
use crate::tasks::RequestQueue;

// ---------------------------------------------------------------------------
// SelectionModel – parameter → depths → selected
// ---------------------------------------------------------------------------

/// Selection state of one station: one [`TimeSeries`] per parameter whose
/// depths resolved, in completion order.
///
/// Entries are only ever appended. Building again for another (or the same)
/// station produces a fresh model instead of appending duplicates.
#[derive(Debug, Clone)]
pub struct SelectionModel {
    station: Station,
    range: TimeRange,
    entries: Vec<TimeSeries>,
    requested: usize,
    failures: usize,
    ready: bool,
}

impl SelectionModel {
    /// Empty model for `station`; issues one depth request per parameter code.
    pub fn build(station: Station, range: TimeRange, queue: &mut RequestQueue) -> Self {
        let codes = station.parameter_codes();
        for code in &codes {
            queue.fetch_depths(&station.name, Parameter::time_series(code), range);
        }
        log::info!(
            "Resolving depths of {} parameters for station {}",
            codes.len(),
            station.name
        );
        SelectionModel {
            station,
            range,
            entries: Vec::new(),
            requested: codes.len(),
            failures: 0,
            ready: false,
        }
    }

    /// Record the outcome of one depth request.
    pub fn apply_depths(&mut self, parameter: Parameter, result: Result<Vec<f64>, SourceError>) {
        match result {
            Ok(depths) => {
                log::debug!("{}: depths {depths:?}", parameter.name);
                self.entries.push(TimeSeries::unselected(parameter, &depths));
                self.ready = true;
            }
            Err(e) => {
                log::warn!("Depth lookup for {} failed: {e}", parameter.name);
                self.failures += 1;
            }
        }
    }

    pub fn station(&self) -> &Station {
        &self.station
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }

    pub fn entries(&self) -> &[TimeSeries] {
        &self.entries
    }

    /// True once any parameter resolved: the model is usable, not complete.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Parameters requested by [`SelectionModel::build`].
    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Set the flag of (`parameter`, `depth`) in every matching entry.
    /// Returns whether any flag changed.
    pub fn set_selected(&mut self, parameter: &str, depth: f64, selected: bool) -> bool {
        let mut changed = false;
        for entry in self.entries.iter_mut().filter(|e| e.parameter.name == parameter) {
            for s in entry.series.iter_mut().filter(|s| s.depth == depth) {
                changed |= s.selected != selected;
                s.selected = selected;
            }
        }
        changed
    }

    pub fn select_all(&mut self, parameter: &str, selected: bool) {
        for entry in self.entries.iter_mut().filter(|e| e.parameter.name == parameter) {
            entry.select_all(selected);
        }
    }

    pub fn is_selected(&self, parameter: &str, depth: f64) -> bool {
        self.entries
            .iter()
            .filter(|e| e.parameter.name == parameter)
            .flat_map(|e| e.series.iter())
            .any(|s| s.depth == depth && s.selected)
    }
}
