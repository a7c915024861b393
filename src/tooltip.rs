use serde::Serialize;

use crate::format::{format_threshold, NumberFormat};
use crate::ir::{SeriesKind, ThresholdKind};

/// One series value at the hovered x position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TooltipParam {
    pub series_name: String,
    pub kind: SeriesKind,
    pub value: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TooltipRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub cells: Vec<String>,
}

/// Rendered tooltip: a title and rows of display cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TooltipTable {
    pub title: String,
    pub rows: Vec<TooltipRow>,
    /// Row highlighted because its series has hover focus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focused: Option<usize>,
}

/// Builds tooltip rows for the series active at one x position.
///
/// Reference series show their threshold instead of their (zero) value.
/// With grouping a `Total` row is appended; raw counts additionally get a
/// share-of-total column. Totals only add up ordinary series.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TooltipFormatter {
    pub format: NumberFormat,
    pub normalize: bool,
    pub grouped: bool,
    pub min_threshold: Option<f64>,
    pub max_threshold: Option<f64>,
    focused_series: Option<usize>,
}

impl TooltipFormatter {
    pub fn new(normalize: bool, grouped: bool) -> Self {
        Self {
            format: NumberFormat::for_values(normalize),
            normalize,
            grouped,
            ..Default::default()
        }
    }

    pub fn with_thresholds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_threshold = min;
        self.max_threshold = max;
        self
    }

    /// Focus-tracking callback: the renderer reports which series is hovered.
    pub fn on_focused_series(&mut self, index: Option<usize>) {
        self.focused_series = index;
    }

    pub fn focused_series(&self) -> Option<usize> {
        self.focused_series
    }

    fn threshold_label(&self, kind: ThresholdKind) -> String {
        let value = match kind {
            ThresholdKind::Min => self.min_threshold,
            ThresholdKind::Max => self.max_threshold,
        };
        let shown = value.map(format_threshold).unwrap_or_else(|| "N/A".to_string());
        format!("{} Spec: {}", kind.title(), shown)
    }

    pub fn format(&self, title: &str, params: &[TooltipParam]) -> TooltipTable {
        let formatter = self.format;
        let percent = NumberFormat::Percent2Point;

        let total: f64 = params
            .iter()
            .filter(|p| matches!(p.kind, SeriesKind::Bar) && p.value.is_finite())
            .map(|p| p.value)
            .sum();
        let with_share = self.grouped && !self.normalize;

        let mut rows: Vec<TooltipRow> = params
            .iter()
            .map(|param| {
                let mut cells = vec![param.series_name.clone()];
                match param.kind {
                    SeriesKind::Reference(kind) => cells.push(self.threshold_label(kind)),
                    SeriesKind::Bar => {
                        cells.push(formatter.format(param.value));
                        if with_share {
                            let denom = if total == 0.0 { 1.0 } else { total };
                            cells.push(percent.format(param.value / denom));
                        }
                    }
                }
                TooltipRow {
                    color: Some(param.color.clone()),
                    cells,
                }
            })
            .collect();

        if self.grouped {
            let mut cells = vec!["Total".to_string(), formatter.format(total)];
            if !self.normalize {
                cells.push(percent.format(1.0));
            }
            rows.push(TooltipRow { color: None, cells });
        }

        TooltipTable {
            title: title.to_string(),
            rows,
            focused: self.focused_series.filter(|&i| i < params.len()),
        }
    }
}

impl TooltipTable {
    /// Render as a small HTML table; the focused row is bold.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        html.push_str(&format!("<div><b>{}</b></div><table>", escape_html(&self.title)));
        for (i, row) in self.rows.iter().enumerate() {
            let weight = if self.focused == Some(i) { "700" } else { "400" };
            html.push_str(&format!(r#"<tr style="font-weight: {}">"#, weight));
            for (j, cell) in row.cells.iter().enumerate() {
                html.push_str("<td>");
                if j == 0 {
                    if let Some(color) = &row.color {
                        html.push_str(&format!(
                            r#"<span style="display:inline-block;margin-right:4px;border-radius:10px;width:10px;height:10px;background-color:{};"></span>"#,
                            escape_html(color)
                        ));
                    }
                }
                html.push_str(&escape_html(cell));
                html.push_str("</td>");
            }
            html.push_str("</tr>");
        }
        html.push_str("</table>");
        html
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
