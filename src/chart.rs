use eframe::egui::Color32;

use crate::color::series_color;
use crate::data::model::SeriesKey;

/// Overlay shown on a fresh chart until the first series arrives.
pub const SELECT_PROMPT: &str = "Select a series...";

// ---------------------------------------------------------------------------
// Configuration passed to the chart surface
// ---------------------------------------------------------------------------

/// A shared linear y axis, one per measurement unit.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisConfig {
    pub id: String,
    pub label_suffix: String,
}

impl AxisConfig {
    pub fn for_unit(unit: &str) -> Self {
        AxisConfig {
            id: unit.to_string(),
            label_suffix: unit.to_string(),
        }
    }

    /// Tick label; grid values are rounded to hide float noise (0.30000000000000004).
    pub fn format_label(&self, value: f64) -> String {
        let value = (value * 1e6).round() / 1e6;
        format!("{value} {}", self.label_suffix)
    }
}

/// How a point's value is rendered in the hover tooltip.
#[derive(Debug, Clone, PartialEq)]
pub struct TooltipFormat {
    pub value_decimals: usize,
    pub value_suffix: String,
}

impl TooltipFormat {
    pub fn format(&self, value: f64) -> String {
        format!("{value:.prec$}{}", self.value_suffix, prec = self.value_decimals)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesConfig {
    pub id: SeriesKey,
    pub name: String,
    /// Axis id; `None` attaches the series to the default axis.
    pub axis: Option<String>,
    /// `[epoch millis, value]` pairs.
    pub points: Vec<[f64; 2]>,
    pub tooltip: TooltipFormat,
}

// ---------------------------------------------------------------------------
// ChartSurface – what the synchronizer may do to a chart
// ---------------------------------------------------------------------------

/// Mutable chart object graph, handed explicitly to whoever edits it.
pub trait ChartSurface {
    fn find_series(&self, id: &SeriesKey) -> Option<&ChartSeries>;
    fn has_axis(&self, id: &str) -> bool;
    fn add_axis(&mut self, axis: AxisConfig);
    fn add_series(&mut self, series: SeriesConfig);
    fn show_series(&mut self, id: &SeriesKey);
    fn hide_series(&mut self, id: &SeriesKey);
    fn show_loading(&mut self, message: &str);
    fn hide_loading(&mut self);
}

// ---------------------------------------------------------------------------
// Chart – in-memory implementation rendered by `ui::plot`
// ---------------------------------------------------------------------------

/// A plotted line. Once added it stays for the chart's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub id: SeriesKey,
    pub name: String,
    pub axis: Option<String>,
    pub points: Vec<[f64; 2]>,
    pub tooltip: TooltipFormat,
    pub color: Color32,
    pub visible: bool,
}

#[derive(Debug, Clone)]
pub struct Chart {
    axes: Vec<AxisConfig>,
    series: Vec<ChartSeries>,
    loading: Option<String>,
}

impl Default for Chart {
    fn default() -> Self {
        Self {
            axes: Vec::new(),
            series: Vec::new(),
            loading: Some(SELECT_PROMPT.to_string()),
        }
    }
}

impl Chart {
    pub fn series(&self) -> &[ChartSeries] {
        &self.series
    }

    pub fn visible_series(&self) -> impl Iterator<Item = &ChartSeries> {
        self.series.iter().filter(|s| s.visible)
    }

    pub fn axes(&self) -> &[AxisConfig] {
        &self.axes
    }

    /// Axes with at least one visible series; empty axes are not drawn.
    pub fn visible_axes(&self) -> Vec<&AxisConfig> {
        self.axes
            .iter()
            .filter(|a| {
                self.visible_series()
                    .any(|s| s.axis.as_deref() == Some(a.id.as_str()))
            })
            .collect()
    }

    pub fn axis(&self, id: &str) -> Option<&AxisConfig> {
        self.axes.iter().find(|a| a.id == id)
    }

    pub fn loading_message(&self) -> Option<&str> {
        self.loading.as_deref()
    }

    /// Latest x (epoch millis) over visible series.
    pub fn latest_x(&self) -> Option<f64> {
        self.visible_series()
            .flat_map(|s| s.points.iter().map(|p| p[0]))
            .reduce(f64::max)
    }

    fn series_mut(&mut self, id: &SeriesKey) -> Option<&mut ChartSeries> {
        self.series.iter_mut().find(|s| s.id == *id)
    }
}

impl ChartSurface for Chart {
    fn find_series(&self, id: &SeriesKey) -> Option<&ChartSeries> {
        self.series.iter().find(|s| s.id == *id)
    }

    fn has_axis(&self, id: &str) -> bool {
        self.axis(id).is_some()
    }

    fn add_axis(&mut self, axis: AxisConfig) {
        if !self.has_axis(&axis.id) {
            self.axes.push(axis);
        }
    }

    fn add_series(&mut self, config: SeriesConfig) {
        if self.find_series(&config.id).is_some() {
            log::warn!("Series {} already on chart, ignoring", config.id);
            return;
        }
        let color = series_color(self.series.len());
        self.series.push(ChartSeries {
            id: config.id,
            name: config.name,
            axis: config.axis,
            points: config.points,
            tooltip: config.tooltip,
            color,
            visible: true,
        });
    }

    fn show_series(&mut self, id: &SeriesKey) {
        if let Some(s) = self.series_mut(id) {
            s.visible = true;
        }
    }

    fn hide_series(&mut self, id: &SeriesKey) {
        if let Some(s) = self.series_mut(id) {
            s.visible = false;
        }
    }

    fn show_loading(&mut self, message: &str) {
        self.loading = Some(message.to_string());
    }

    fn hide_loading(&mut self) {
        self.loading = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: &str, axis: Option<&str>) -> SeriesConfig {
        SeriesConfig {
            id: SeriesKey::new(id, 0.0),
            name: id.to_string(),
            axis: axis.map(str::to_string),
            points: vec![[1.0, 2.0], [3.0, 4.0]],
            tooltip: TooltipFormat {
                value_decimals: 2,
                value_suffix: "m".into(),
            },
        }
    }

    #[test]
    fn new_chart_prompts_for_selection() {
        let mut chart = Chart::default();
        assert_eq!(chart.loading_message(), Some(SELECT_PROMPT));
        chart.hide_loading();
        assert_eq!(chart.loading_message(), None);
    }

    #[test]
    fn axes_hide_without_visible_series() {
        let mut chart = Chart::default();
        chart.add_axis(AxisConfig::for_unit("m"));
        chart.add_axis(AxisConfig::for_unit("m"));
        assert_eq!(chart.axes().len(), 1);
        assert!(chart.visible_axes().is_empty());

        chart.add_series(config("VHM0", Some("m")));
        assert_eq!(chart.visible_axes().len(), 1);

        let id = SeriesKey::new("VHM0", 0.0);
        chart.hide_series(&id);
        assert!(chart.visible_axes().is_empty());
        assert_eq!(chart.find_series(&id).unwrap().points.len(), 2);

        chart.show_series(&id);
        assert!(chart.find_series(&id).unwrap().visible);
    }

    #[test]
    fn duplicate_series_is_ignored() {
        let mut chart = Chart::default();
        chart.add_series(config("TEMP", None));
        chart.add_series(config("TEMP", Some("°C")));
        assert_eq!(chart.series().len(), 1);
        assert_eq!(chart.series()[0].axis, None);
    }

    #[test]
    fn latest_x_ignores_hidden_series() {
        let mut chart = Chart::default();
        assert_eq!(chart.latest_x(), None);
        chart.add_series(config("TEMP", None));
        let mut late = config("PSAL", None);
        late.points.push([10.0, 0.0]);
        chart.add_series(late);
        assert_eq!(chart.latest_x(), Some(10.0));

        chart.hide_series(&SeriesKey::new("PSAL", 0.0));
        assert_eq!(chart.latest_x(), Some(3.0));
    }

    #[test]
    fn value_formatting() {
        let tooltip = TooltipFormat {
            value_decimals: 2,
            value_suffix: "°C".into(),
        };
        assert_eq!(tooltip.format(12.346), "12.35°C");
        assert_eq!(AxisConfig::for_unit("m").format_label(1.5), "1.5 m");
        assert_eq!(AxisConfig::for_unit("m").format_label(0.1 + 0.2), "0.3 m");
    }
}
