use serde_json::Value;

use crate::bins::{extract_bins, Bin};
use crate::data::{QueriesData, ResultRow};
use crate::format::{format_threshold, NumberFormat};
use crate::ir::{
    Diagnostic, DiagnosticKind, LegendState, MarkLine, Series, SeriesKind, SeriesModel,
    TransformOutput, ThresholdKind,
};
use crate::palette::ColorScale;
use crate::query::QueryRequest;
use crate::threshold::{lookup_threshold, numeric_value, place_thresholds, ThresholdLookup, Thresholds};
use crate::tooltip::TooltipFormatter;
use crate::ChartOptions;

/// Main entry point: turn fetched result sets into a renderable series model.
///
/// Never fails. Anything that cannot be placed or parsed is reported in
/// `TransformOutput::warnings` and left out of the model. The legend state is
/// seeded with every series name when empty and returned untouched otherwise.
pub fn transform_props(
    queries: &QueriesData,
    request: &QueryRequest,
    options: &ChartOptions,
    colors: &mut dyn ColorScale,
    legend_state: LegendState,
) -> TransformOutput {
    let mut warnings = Vec::new();
    let value_format = NumberFormat::for_values(request.normalize);
    let group_names = request.group_names();

    // 1. Threshold lookup (keys first, bins depend on them)
    let (min_lookup, max_lookup) = lookup_thresholds(queries, request, &group_names, &mut warnings);

    // 2. Bin extraction
    let bins = match queries.main.first() {
        Some(first) => {
            let excluded = bin_exclusions(queries, request, &group_names, &min_lookup, &max_lookup);
            extract_bins(first, &excluded)
        }
        None => {
            warnings.push(Diagnostic::new(
                DiagnosticKind::EmptyResult,
                "main result set has no rows",
            ));
            Vec::new()
        }
    };
    for bin in bins.iter().filter(|b| b.range.is_none()) {
        warnings.push(Diagnostic::new(
            DiagnosticKind::MalformedBinLabel,
            format!("bin label '{}' is not a numeric range", bin.raw_label),
        ));
    }

    // 3. Place thresholds on the bin axis
    let thresholds = place_thresholds(&min_lookup, &max_lookup, &bins, &mut warnings);
    tracing::debug!(
        bins = bins.len(),
        min_bin = ?thresholds.min.as_ref().and_then(|t| t.bin_index),
        max_bin = ?thresholds.max.as_ref().and_then(|t| t.bin_index),
        "thresholds placed"
    );

    // 4. One bar series per main row
    let primary = request.primary_name();
    let mut series: Vec<Series> = queries
        .main
        .rows
        .iter()
        .map(|row| {
            let name = series_name(row, &group_names, &primary);
            let color = colors.color_for(&name);
            Series {
                data: bin_values(row, &bins),
                name,
                kind: SeriesKind::Bar,
                color,
                label_visible: options.show_value,
                silent: false,
                mark_line: None,
            }
        })
        .collect();

    // 5. Reference series for every placed threshold
    series.extend(reference_series(&thresholds, bins.len()));

    // 6. Legend
    let mut legend_keys: Vec<String> = Vec::new();
    for s in &series {
        if !legend_keys.contains(&s.name) {
            legend_keys.push(s.name.clone());
        }
    }
    let mut legend_state = legend_state;
    if legend_state.is_empty() {
        for key in &legend_keys {
            legend_state.insert(key.clone(), true);
        }
    }

    let mut model = SeriesModel::empty(value_format, options.show_legend);
    model.x_axis.labels = bins.iter().map(|b| b.label.clone()).collect();
    model.x_axis.title = non_empty(&options.x_axis_title);
    model.y_axis.title = non_empty(&options.y_axis_title);
    model.series = series;
    model.legend.keys = legend_keys;
    model.tooltip = TooltipFormatter::new(request.normalize, !group_names.is_empty())
        .with_thresholds(
            thresholds.value(ThresholdKind::Min),
            thresholds.value(ThresholdKind::Max),
        );

    TransformOutput {
        model,
        legend_state,
        thresholds,
        warnings,
    }
}

fn lookup_thresholds(
    queries: &QueriesData,
    request: &QueryRequest,
    group_names: &[String],
    warnings: &mut Vec<Diagnostic>,
) -> (ThresholdLookup, ThresholdLookup) {
    let Some(row) = queries.threshold_row() else {
        if queries.has_spec() {
            warnings.push(Diagnostic::new(
                DiagnosticKind::MissingField,
                "threshold result set has no rows",
            ));
        }
        return (ThresholdLookup::default(), ThresholdLookup::default());
    };

    // Group columns only share a row with thresholds on the fallback path
    let mut excluded: Vec<String> = if queries.has_spec() {
        Vec::new()
    } else {
        group_names.to_vec()
    };

    let min = lookup_threshold(row, &request.min_name(), ThresholdKind::Min, &excluded, warnings);
    if let Some(key) = &min.key {
        excluded.push(key.clone());
    }
    let max = lookup_threshold(row, &request.max_name(), ThresholdKind::Max, &excluded, warnings);

    (min, max)
}

/// Keys of the first main row that are not bins: group columns, configured
/// threshold columns, and threshold keys matched in the main row itself.
fn bin_exclusions(
    queries: &QueriesData,
    request: &QueryRequest,
    group_names: &[String],
    min: &ThresholdLookup,
    max: &ThresholdLookup,
) -> Vec<String> {
    let mut excluded = group_names.to_vec();
    excluded.extend(
        [request.min_name(), request.max_name()]
            .into_iter()
            .filter(|name| !name.is_empty()),
    );
    if !queries.has_spec() {
        excluded.extend(min.key.iter().chain(max.key.iter()).cloned());
    }
    excluded
}

fn series_name(row: &ResultRow, group_names: &[String], primary: &str) -> String {
    if group_names.is_empty() {
        return primary.to_string();
    }
    group_names
        .iter()
        .map(|g| display_value(row.get(g)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        // whole floats drop the fraction so `1.0` and `1` name the same group
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if n.is_f64() => f.to_string(),
            _ => n.to_string(),
        },
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Per-bin frequencies of one row, in bin order. Missing or non-numeric
/// cells count as zero.
fn bin_values(row: &ResultRow, bins: &[Bin]) -> Vec<f64> {
    bins.iter()
        .map(|bin| {
            row.get_nth(&bin.raw_label, bin.occurrence)
                .and_then(numeric_value)
                .unwrap_or(0.0)
        })
        .collect()
}

fn reference_series(thresholds: &Thresholds, bin_count: usize) -> Vec<Series> {
    thresholds
        .iter()
        .filter_map(|t| {
            let position = t.position?;
            let shown = format_threshold(t.value);
            Some(Series {
                name: format!("{} Spec ({})", t.kind.title(), shown),
                kind: SeriesKind::Reference(t.kind),
                data: vec![0.0; bin_count],
                color: t.kind.color().to_string(),
                label_visible: true,
                silent: true,
                mark_line: Some(MarkLine {
                    position,
                    label: format!("{}: {}", t.kind.title(), shown),
                }),
            })
        })
        .collect()
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnRef;
    use crate::data::ResultSet;
    use crate::palette::ColorPalette;

    fn make_request(groups: &[&str]) -> QueryRequest {
        let mut request = QueryRequest::new("diameter");
        request.min_column = Some(ColumnRef::name("lsl"));
        request.max_column = Some(ColumnRef::name("usl"));
        request.group_by = groups.iter().map(|g| ColumnRef::name(*g)).collect();
        request
    }

    fn make_queries(main: Vec<ResultRow>, min: f64, max: f64) -> QueriesData {
        let spec = ResultRow::new().with("lsl", min).with("usl", max);
        QueriesData::new(ResultSet::new(main), Some(ResultSet::new(vec![spec])))
    }

    fn make_grouped_rows() -> Vec<ResultRow> {
        vec![
            ResultRow::new()
                .with("machine", "M1")
                .with("0 - 10", 3)
                .with("10 - 20", 5)
                .with("20 - 30", 2),
            ResultRow::new()
                .with("machine", "M2")
                .with("0 - 10", 1)
                .with("10 - 20", 4)
                .with("20 - 30", 6),
        ]
    }

    fn run(queries: &QueriesData, request: &QueryRequest, legend: LegendState) -> TransformOutput {
        let mut palette = ColorPalette::category10();
        transform_props(queries, request, &ChartOptions::default(), &mut palette, legend)
    }

    #[test]
    fn test_transform_grouped_series() {
        let queries = make_queries(make_grouped_rows(), 10.0, 30.0);
        let out = run(&queries, &make_request(&["machine"]), LegendState::new());

        assert_eq!(out.model.x_axis.labels, vec!["0 - 10", "10 - 20", "20 - 30"]);
        let bars: Vec<&Series> = out.model.bar_series().collect();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].name, "M1");
        assert_eq!(bars[0].data, vec![3.0, 5.0, 2.0]);
        assert_eq!(bars[1].name, "M2");
        assert_eq!(bars[1].color, "#ff7f0e");
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
    }

    #[test]
    fn test_transform_reference_series() {
        let queries = make_queries(make_grouped_rows(), 10.0, 30.0);
        let out = run(&queries, &make_request(&["machine"]), LegendState::new());

        let refs: Vec<&Series> = out.model.reference_series().collect();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].name, "Min Spec (10.00)");
        assert_eq!(refs[0].data, vec![0.0, 0.0, 0.0]);
        assert!(refs[0].silent);
        let mark = refs[0].mark_line.as_ref().unwrap();
        assert_eq!(mark.position, 1.0);
        assert_eq!(mark.label, "Min: 10.00");
        assert_eq!(refs[1].mark_line.as_ref().unwrap().position, 2.0);
        assert_eq!(refs[1].color, "red");
    }

    #[test]
    fn test_transform_ungrouped_uses_primary_name() {
        let rows = vec![ResultRow::new().with("0 - 10", 7).with("10 - 20", 1)];
        let queries = make_queries(rows, 5.0, 5.0);
        let out = run(&queries, &make_request(&[]), LegendState::new());
        assert_eq!(out.model.series[0].name, "diameter");
        let positions: Vec<f64> = out
            .model
            .reference_series()
            .map(|s| s.mark_line.as_ref().unwrap().position)
            .collect();
        assert_eq!(positions.len(), 2);
        assert!((positions[0] + 0.2).abs() < 1e-12);
        assert!((positions[1] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_transform_out_of_range_omits_overlay() {
        let queries = make_queries(make_grouped_rows(), 999.0, 25.0);
        let out = run(&queries, &make_request(&["machine"]), LegendState::new());
        let refs: Vec<&Series> = out.model.reference_series().collect();
        assert_eq!(refs.len(), 1);
        assert!(refs[0].name.starts_with("Max Spec"));
        assert!(out.has_warning(DiagnosticKind::OutOfRange));
        assert!(!out.thresholds.min.as_ref().unwrap().is_resolved());
    }

    #[test]
    fn test_transform_data_length_matches_bins() {
        let rows = vec![
            ResultRow::new().with("g", "a").with("0 - 1", 1).with("1 - 2", 2),
            // second row is missing a bin
            ResultRow::new().with("g", "b").with("0 - 1", 4),
        ];
        let queries = make_queries(rows, 0.5, 1.5);
        let out = run(&queries, &make_request(&["g"]), LegendState::new());
        for s in &out.model.series {
            assert_eq!(s.data.len(), out.model.x_axis.labels.len());
        }
        assert_eq!(out.model.series[1].data, vec![4.0, 0.0]);
    }

    #[test]
    fn test_transform_duplicate_bins() {
        let row: ResultRow =
            serde_json::from_str(r#"{"0 - 10": 1, "10 - 20": 2, "0 - 10": 3}"#).unwrap();
        let queries = make_queries(vec![row], 1.0, 2.0);
        let out = run(&queries, &make_request(&[]), LegendState::new());
        assert_eq!(out.model.x_axis.labels, vec!["0 - 10", "10 - 20", "0 - 10 (2)"]);
        assert_eq!(out.model.series[0].data, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_transform_legend_seeding_and_idempotence() {
        let queries = make_queries(make_grouped_rows(), 10.0, 30.0);
        let request = make_request(&["machine"]);
        let first = run(&queries, &request, LegendState::new());
        assert_eq!(first.legend_state.len(), 4);
        assert!(first.legend_state.values().all(|v| *v));

        let mut toggled = first.legend_state.clone();
        toggled.insert("M1".to_string(), false);
        let second = run(&queries, &request, toggled.clone());
        assert_eq!(second.legend_state, toggled);
        assert_eq!(second.model, first.model);

        let third = run(&queries, &request, second.legend_state.clone());
        assert_eq!(third.legend_state, second.legend_state);
        assert_eq!(third.model, second.model);
    }

    #[test]
    fn test_transform_fallback_keys_in_main_row() {
        let rows = vec![ResultRow::new()
            .with("spec_min", 12)
            .with("spec_max", 18)
            .with("10 - 15", 4)
            .with("15 - 20", 6)];
        let queries = QueriesData::new(ResultSet::new(rows), None);
        let request = QueryRequest::new("diameter");
        let out = run(&queries, &request, LegendState::new());
        assert_eq!(out.model.x_axis.labels, vec!["10 - 15", "15 - 20"]);
        assert_eq!(out.thresholds.min.as_ref().unwrap().bin_index, Some(0));
        assert_eq!(out.thresholds.max.as_ref().unwrap().bin_index, Some(1));
        assert!(!out.has_warning(DiagnosticKind::MalformedBinLabel));
    }

    #[test]
    fn test_transform_missing_thresholds_never_fabricated() {
        let rows = vec![ResultRow::new().with("0 - 10", 4)];
        let queries = QueriesData::new(ResultSet::new(rows), None);
        let out = run(&queries, &QueryRequest::new("v"), LegendState::new());
        assert_eq!(out.model.reference_series().count(), 0);
        assert!(out.thresholds.min.is_none());
        assert!(out.thresholds.max.is_none());
        assert!(out.has_warning(DiagnosticKind::MissingField));
    }

    #[test]
    fn test_transform_empty_result() {
        let queries = make_queries(Vec::new(), 1.0, 2.0);
        let out = run(&queries, &make_request(&[]), LegendState::new());
        assert!(out.model.series.is_empty());
        assert!(out.model.x_axis.labels.is_empty());
        assert!(out.legend_state.is_empty());
        assert!(out.has_warning(DiagnosticKind::EmptyResult));
    }

    #[test]
    fn test_transform_malformed_bin_label_warning() {
        let rows = vec![ResultRow::new().with("0 - 10", 1).with("count", 9)];
        let queries = make_queries(rows, 5.0, 6.0);
        let out = run(&queries, &make_request(&[]), LegendState::new());
        assert!(out.has_warning(DiagnosticKind::MalformedBinLabel));
        assert_eq!(out.thresholds.min.as_ref().unwrap().bin_index, Some(0));
    }

    #[test]
    fn test_transform_trailing_malformed_key_keeps_top_edge() {
        let rows = vec![ResultRow::new()
            .with("0 - 10", 1)
            .with("10 - 20", 2)
            .with("count", 9)];
        let queries = make_queries(rows, 0.0, 20.0);
        let out = run(&queries, &make_request(&[]), LegendState::new());

        let max = out.thresholds.max.as_ref().unwrap();
        assert_eq!(max.bin_label.as_deref(), Some("10 - 20"));
        assert_eq!(max.bin_index, Some(1));
        assert!(!out.has_warning(DiagnosticKind::OutOfRange));
        assert!(out.has_warning(DiagnosticKind::MalformedBinLabel));
    }

    #[test]
    fn test_transform_same_column_for_both_thresholds() {
        let mut request = make_request(&[]);
        request.min_column = Some(ColumnRef::name("limit"));
        request.max_column = Some(ColumnRef::name("limit"));
        let main = vec![ResultRow::new().with("0 - 10", 1).with("10 - 20", 2)];
        let spec = ResultRow::new().with("limit", 5);
        let queries = QueriesData::new(ResultSet::new(main), Some(ResultSet::new(vec![spec])));
        let out = run(&queries, &request, LegendState::new());

        assert_eq!(out.thresholds.value(ThresholdKind::Min), Some(5.0));
        assert_eq!(out.thresholds.value(ThresholdKind::Max), Some(5.0));
        assert!(!out.has_warning(DiagnosticKind::MissingField), "{:?}", out.warnings);
    }

    #[test]
    fn test_series_name_numeric_groups() {
        let groups = vec!["lot".to_string(), "shift".to_string()];
        let whole = ResultRow::new().with("lot", 1.0).with("shift", 2);
        let frac = ResultRow::new().with("lot", 1.5).with("shift", Value::Null);
        assert_eq!(series_name(&whole, &groups, "x"), "1, 2");
        assert_eq!(series_name(&frac, &groups, "x"), "1.5, ");
    }

    #[test]
    fn test_transform_tooltip_normalized() {
        let rows = vec![
            ResultRow::new().with("machine", "M1").with("0 - 1", 0.3),
            ResultRow::new().with("machine", "M2").with("0 - 1", 0.7),
        ];
        let queries = make_queries(rows, 0.5, 0.5);
        let mut request = make_request(&["machine"]);
        request.normalize = true;
        let out = run(&queries, &request, LegendState::new());

        let params = out.model.tooltip_params(0, &out.legend_state);
        let table = out.model.tooltip.format("0 - 1", &params);
        let total = table.rows.last().unwrap();
        assert_eq!(total.cells, vec!["Total", "1.00"]);
        assert_eq!(table.rows[0].cells.len(), 2);
    }

    #[test]
    fn test_transform_tooltip_respects_legend() {
        let queries = make_queries(make_grouped_rows(), 10.0, 30.0);
        let request = make_request(&["machine"]);
        let first = run(&queries, &request, LegendState::new());
        let mut legend = first.legend_state.clone();
        legend.insert("M2".to_string(), false);

        let params = first.model.tooltip_params(1, &legend);
        let names: Vec<&str> = params.iter().map(|p| p.series_name.as_str()).collect();
        assert_eq!(names, vec!["M1", "Min Spec (10.00)", "Max Spec (30.00)"]);
        let table = first.model.tooltip.format("10 - 20", &params);
        assert_eq!(table.rows[0].cells, vec!["M1", "5", "100.00%"]);
        assert_eq!(table.rows[1].cells[1], "Min Spec: 10.00");
    }
}
