// Library exports for spechist

pub mod bins;
pub mod column;
pub mod csv_reader;
pub mod data;
pub mod format;
pub mod graph;
pub mod ir;
pub mod palette;
pub mod query;
pub mod threshold;
pub mod tooltip;
pub mod transform;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use crate::data::QueriesData;
use crate::ir::{LegendState, TransformOutput};
use crate::palette::ColorPalette;
use crate::query::QueryRequest;

/// Presentation toggles. They change labels and colors, never bin math.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChartOptions {
    #[serde(default, alias = "colorScheme")]
    pub color_scheme: Option<String>,
    #[serde(default = "default_true", alias = "showLegend")]
    pub show_legend: bool,
    #[serde(default, alias = "showValue")]
    pub show_value: bool,
    #[serde(default, alias = "xAxisTitle")]
    pub x_axis_title: Option<String>,
    #[serde(default, alias = "yAxisTitle")]
    pub y_axis_title: Option<String>,
}

fn default_true() -> bool { true }

/// The full chart form: query fields plus presentation toggles.
#[derive(Debug, Clone, PartialEq)]
pub struct FormData {
    pub query: QueryRequest,
    pub options: ChartOptions,
}

impl FormData {
    /// Both halves read the same flat JSON object; unknown keys are ignored.
    pub fn from_json(value: &Value) -> Result<Self> {
        let query = QueryRequest::deserialize(value).context("Invalid query fields in form data")?;
        let options = ChartOptions::deserialize(value).context("Invalid chart options in form data")?;
        Ok(Self { query, options })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read form data {}", path.display()))?;
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse form data {}", path.display()))?;
        Self::from_json(&value)
    }
}

/// Run the transform with the palette named by the form's color scheme.
pub fn transform_chart(
    form: &FormData,
    queries: &QueriesData,
    legend_state: LegendState,
) -> TransformOutput {
    let mut palette = ColorPalette::from_scheme(form.options.color_scheme.as_deref());
    transform::transform_props(queries, &form.query, &form.options, &mut palette, legend_state)
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Default)]
pub enum OutputFormat {
    #[serde(rename = "json")]
    #[default]
    Json,
    #[serde(rename = "png")]
    Png,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, rename = "type")]
    pub format: OutputFormat,
}

fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            format: OutputFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_form_data_from_json() {
        let value = json!({
            "column": "diameter",
            "spec_min_column": {"label": "lsl"},
            "spec_max_column": "usl",
            "groupby": ["machine"],
            "normalize": true,
            "colorScheme": "d3Category10",
            "show_value": true,
            "x_axis_title": "Diameter (mm)",
            "viz_type": "histogram_v2"
        });
        let form = FormData::from_json(&value).unwrap();
        assert_eq!(form.query.primary_name(), "diameter");
        assert_eq!(form.query.min_name(), "lsl");
        assert!(form.query.normalize);
        assert_eq!(form.options.color_scheme.as_deref(), Some("d3Category10"));
        assert!(form.options.show_legend);
        assert!(form.options.show_value);
        assert_eq!(form.options.x_axis_title.as_deref(), Some("Diameter (mm)"));
    }

    #[test]
    fn test_form_data_requires_primary_column() {
        assert!(FormData::from_json(&json!({"groupby": []})).is_err());
    }

    #[test]
    fn test_render_options_defaults() {
        let opts: RenderOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.width, 800);
        assert_eq!(opts.height, 600);
        assert_eq!(opts.format, OutputFormat::Json);
    }
}
