use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::format::NumberFormat;
use crate::threshold::Thresholds;
use crate::tooltip::{TooltipFormatter, TooltipParam, TooltipTable};

/// Caller-owned legend visibility: series name -> visible.
pub type LegendState = BTreeMap<String, bool>;

// =============================================================================
// Series model
// =============================================================================

/// Everything the rendering target needs to draw one histogram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesModel {
    pub x_axis: XAxis,
    pub y_axis: YAxis,
    pub series: Vec<Series>,
    pub legend: Legend,
    #[serde(skip)]
    pub tooltip: TooltipFormatter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XAxis {
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YAxis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub format: NumberFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub show: bool,
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdKind {
    Min,
    Max,
}

impl ThresholdKind {
    pub fn title(&self) -> &'static str {
        match self {
            ThresholdKind::Min => "Min",
            ThresholdKind::Max => "Max",
        }
    }

    /// Substring looked for in key names when the column is unknown.
    pub fn key_hint(&self) -> &'static str {
        match self {
            ThresholdKind::Min => "min",
            ThresholdKind::Max => "max",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            ThresholdKind::Min => "green",
            ThresholdKind::Max => "red",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "threshold", rename_all = "snake_case")]
pub enum SeriesKind {
    /// One group's frequencies.
    Bar,
    /// Zero-valued series hosting a threshold marker.
    Reference(ThresholdKind),
}

/// A vertical marker positioned on the category axis, in bin-index units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkLine {
    pub position: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub kind: SeriesKind,
    pub data: Vec<f64>,
    pub color: String,
    pub label_visible: bool,
    /// Excluded from hover highlighting.
    pub silent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark_line: Option<MarkLine>,
}

impl Series {
    pub fn is_reference(&self) -> bool {
        matches!(self.kind, SeriesKind::Reference(_))
    }
}

impl SeriesModel {
    pub fn empty(format: NumberFormat, show_legend: bool) -> Self {
        Self {
            x_axis: XAxis { labels: Vec::new(), title: None },
            y_axis: YAxis { title: None, format },
            series: Vec::new(),
            legend: Legend { show: show_legend, keys: Vec::new() },
            tooltip: TooltipFormatter::default(),
        }
    }

    pub fn bar_series(&self) -> impl Iterator<Item = &Series> {
        self.series.iter().filter(|s| !s.is_reference())
    }

    pub fn reference_series(&self) -> impl Iterator<Item = &Series> {
        self.series.iter().filter(|s| s.is_reference())
    }

    /// Tooltip params for every series shown in the legend at x index `index`.
    /// Series missing from the legend state count as visible.
    pub fn tooltip_params(&self, index: usize, legend_state: &LegendState) -> Vec<TooltipParam> {
        self.series
            .iter()
            .filter(|s| legend_state.get(&s.name).copied().unwrap_or(true))
            .filter_map(|s| {
                s.data.get(index).map(|&value| TooltipParam {
                    series_name: s.name.clone(),
                    kind: s.kind,
                    value,
                    color: s.color.clone(),
                })
            })
            .collect()
    }

    /// Tooltip for the category at x index `index`, or `None` past the axis.
    pub fn tooltip_at(&self, index: usize, legend_state: &LegendState) -> Option<TooltipTable> {
        let title = self.x_axis.labels.get(index)?;
        Some(self.tooltip.format(title, &self.tooltip_params(index, legend_state)))
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A configured column could not be found or held no usable number.
    MissingField,
    /// A threshold value falls outside every bin.
    OutOfRange,
    /// A bin key is not two numbers around a dash.
    MalformedBinLabel,
    /// The main result set had no rows.
    EmptyResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::warn!(kind = ?kind, "{}", message);
        Self { kind, message }
    }
}

/// Result of one transform invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformOutput {
    pub model: SeriesModel,
    pub legend_state: LegendState,
    pub thresholds: Thresholds,
    pub warnings: Vec<Diagnostic>,
}

impl TransformOutput {
    pub fn has_warning(&self, kind: DiagnosticKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }
}
