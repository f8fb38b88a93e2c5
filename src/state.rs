use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::{Days, Local, NaiveDate};

use crate::chart::{Chart, ChartSurface};
use crate::config::ViewerConfig;
use crate::data::export;
use crate::data::loader::load_stations;
use crate::data::model::{SeriesKey, Station, TimeRange, local_midnight_utc};
use crate::data::source::{DataSource, LocalErddapSource};
use crate::data::vocab::Vocabulary;
use crate::selection::SelectionModel;
use crate::sync::SeriesSynchronizer;
use crate::tasks::{Outcome, Request, RequestQueue};

// ---------------------------------------------------------------------------
// View window (range selector)
// ---------------------------------------------------------------------------

/// Width of the visible time window, ending at the latest sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewWindow {
    Hour,
    SixHours,
    Day,
    Week,
    Month,
    All,
}

impl ViewWindow {
    pub const ALL: [ViewWindow; 6] = [
        ViewWindow::Hour,
        ViewWindow::SixHours,
        ViewWindow::Day,
        ViewWindow::Week,
        ViewWindow::Month,
        ViewWindow::All,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ViewWindow::Hour => "1h",
            ViewWindow::SixHours => "6h",
            ViewWindow::Day => "1d",
            ViewWindow::Week => "1w",
            ViewWindow::Month => "1m",
            ViewWindow::All => "6m",
        }
    }

    /// Window length in milliseconds; `None` shows everything.
    pub fn millis(self) -> Option<f64> {
        const HOUR: f64 = 3_600_000.0;
        match self {
            ViewWindow::Hour => Some(HOUR),
            ViewWindow::SixHours => Some(6.0 * HOUR),
            ViewWindow::Day => Some(24.0 * HOUR),
            ViewWindow::Week => Some(7.0 * 24.0 * HOUR),
            ViewWindow::Month => Some(30.0 * 24.0 * HOUR),
            ViewWindow::All => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

type Waker = Arc<dyn Fn() + Send + Sync>;

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: ViewerConfig,

    /// Directory the stations were loaded from.
    pub data_dir: Option<PathBuf>,

    pub stations: Vec<Station>,

    /// Index into `stations` of the station being charted.
    pub selected_station: Option<usize>,

    /// First day of the query window.
    pub start_date: NaiveDate,

    /// Selection model of the selected station (None until one is picked).
    pub model: Option<SelectionModel>,

    /// Chart of the selected station; replaced on every station change.
    pub chart: Chart,

    pub view_window: ViewWindow,

    /// Plot bounds must be recomputed (window changed or series arrived).
    pub view_changed: bool,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    synchronizer: SeriesSynchronizer,
    queue: Option<RequestQueue>,
    waker: Option<Waker>,
}

impl AppState {
    pub fn new(config: ViewerConfig, vocab: Vocabulary) -> Self {
        let today = Local::now().date_naive();
        let start_date = today
            .checked_sub_days(Days::new(u64::from(config.history_days)))
            .unwrap_or(today);
        let synchronizer = SeriesSynchronizer::new(Arc::new(vocab), &config.locale);
        Self {
            config,
            data_dir: None,
            stations: Vec::new(),
            selected_station: None,
            start_date,
            model: None,
            chart: Chart::default(),
            view_window: ViewWindow::Day,
            view_changed: false,
            status_message: None,
            synchronizer,
            queue: None,
            waker: None,
        }
    }

    /// Callback run on a worker thread whenever a request completes.
    pub fn set_waker(&mut self, waker: impl Fn() + Send + Sync + 'static) {
        let waker: Waker = Arc::new(waker);
        if let Some(queue) = &mut self.queue {
            let w = Arc::clone(&waker);
            queue.set_waker(move || w());
        }
        self.waker = Some(waker);
    }

    pub fn synchronizer(&self) -> &SeriesSynchronizer {
        &self.synchronizer
    }

    /// Load `stations.json` and serve requests from the directory's exports.
    pub fn open_data_dir(&mut self, dir: &Path) -> Result<()> {
        let stations = load_stations(dir)?;
        log::info!("Loaded {} stations from {}", stations.len(), dir.display());
        self.open_source(Arc::new(LocalErddapSource::new(dir)), stations);
        self.data_dir = Some(dir.to_path_buf());
        Ok(())
    }

    /// Switch to another data source, dropping the current selection.
    pub fn open_source(&mut self, source: Arc<dyn DataSource>, stations: Vec<Station>) {
        let mut queue = RequestQueue::new(source);
        if let Some(waker) = &self.waker {
            let w = Arc::clone(waker);
            queue.set_waker(move || w());
        }
        self.queue = Some(queue);
        self.stations = stations;
        self.selected_station = None;
        self.model = None;
        self.chart = Chart::default();
        self.status_message = None;
    }

    pub fn time_range(&self) -> TimeRange {
        TimeRange::since(local_midnight_utc(self.start_date))
    }

    /// Chart `stations[index]`: fresh chart, fresh model, and every request
    /// still in flight for the previous station is ignored from now on.
    pub fn select_station(&mut self, index: usize) {
        let Some(station) = self.stations.get(index).cloned() else {
            return;
        };
        let range = self.time_range();
        let Some(queue) = self.queue.as_mut() else {
            return;
        };
        queue.advance_generation();
        log::info!("Selected station {}", station.name);

        self.selected_station = Some(index);
        self.chart = Chart::default();
        self.model = Some(SelectionModel::build(station, range, queue));
        self.view_changed = true;
    }

    /// Move the start of the query window and rebuild the current station.
    pub fn set_start_date(&mut self, date: NaiveDate) {
        self.start_date = date;
        if let Some(index) = self.selected_station {
            self.select_station(index);
        }
    }

    pub fn set_view_window(&mut self, window: ViewWindow) {
        self.view_window = window;
        self.view_changed = true;
    }

    /// Outstanding requests for the current station.
    pub fn pending(&self) -> usize {
        self.queue.as_ref().map_or(0, RequestQueue::pending)
    }

    /// Apply every completion that has arrived. Returns how many were applied.
    pub fn poll(&mut self) -> usize {
        let Some(queue) = self.queue.as_mut() else {
            return 0;
        };
        let mut applied = 0;

        while let Some(completion) = queue.try_next() {
            applied += 1;
            match (completion.request, completion.outcome) {
                (Request::Depths { parameter, .. }, Outcome::Depths(result)) => {
                    if let Some(model) = self.model.as_mut() {
                        model.apply_depths(parameter, result);
                    }
                }
                (Request::Measurements { parameter, depth, .. }, Outcome::Measurements(result)) => {
                    let created = self.synchronizer.apply_measurements(
                        &mut self.chart,
                        &parameter,
                        depth,
                        result,
                    );
                    // Deselected while the samples were on their way.
                    let selected = self
                        .model
                        .as_ref()
                        .is_some_and(|m| m.is_selected(&parameter.name, depth));
                    if created && !selected {
                        self.chart.hide_series(&SeriesKey::new(&parameter.name, depth));
                    }
                    self.view_changed = true;
                }
                (request, outcome) => {
                    log::error!("Completion {outcome:?} does not answer {request:?}");
                }
            }
        }
        applied
    }

    /// Bring the chart in line with the selection flags.
    pub fn reconcile(&mut self) {
        if let (Some(model), Some(queue)) = (&self.model, self.queue.as_mut()) {
            self.synchronizer.reconcile(model, &mut self.chart, queue);
        }
    }

    pub fn set_selected(&mut self, parameter: &str, depth: f64, selected: bool) {
        if let Some(model) = self.model.as_mut() {
            model.set_selected(parameter, depth, selected);
        }
        self.reconcile();
    }

    pub fn select_all(&mut self, parameter: &str, selected: bool) {
        if let Some(model) = self.model.as_mut() {
            model.select_all(parameter, selected);
        }
        self.reconcile();
    }

    /// Plot bounds `(min, max)` for the current view window over visible data.
    pub fn view_bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        let latest = self.chart.latest_x()?;
        let earliest = self
            .chart
            .visible_series()
            .flat_map(|s| s.points.iter().map(|p| p[0]))
            .fold(latest, f64::min);
        let start = match self.view_window.millis() {
            Some(width) => (latest - width).max(earliest),
            None => earliest,
        };

        let (lo, hi) = self
            .chart
            .visible_series()
            .flat_map(|s| s.points.iter())
            .filter(|p| p[0] >= start && p[0] <= latest)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p[1]), hi.max(p[1]))
            });
        if !lo.is_finite() {
            return None;
        }
        let pad = ((hi - lo) * 0.05).max(0.5);
        Some(([start, lo - pad], [latest.max(start + 1.0), hi + pad]))
    }

    pub fn export_csv(&mut self, path: &Path) {
        match export::export_csv(&self.chart, path) {
            Ok(rows) => {
                log::info!("Exported {rows} rows to {}", path.display());
                self.status_message = None;
            }
            Err(e) => {
                log::error!("Export failed: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}
