use serde::{Deserialize, Serialize};
use crate::column::{resolve_optional, ColumnRef};

/// The query-relevant part of the chart form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(alias = "column")]
    pub primary_column: ColumnRef,
    #[serde(default, alias = "spec_min_column")]
    pub min_column: Option<ColumnRef>,
    #[serde(default, alias = "spec_max_column")]
    pub max_column: Option<ColumnRef>,
    #[serde(default, alias = "groupby")]
    pub group_by: Vec<ColumnRef>,
    #[serde(default = "default_row_limit")]
    pub row_limit: usize,
    #[serde(default = "default_bin_count", alias = "bins")]
    pub bin_count: usize,
    #[serde(default)]
    pub normalize: bool,
    #[serde(default)]
    pub cumulative: bool,
}

fn default_row_limit() -> usize { 10000 }
fn default_bin_count() -> usize { 10 }

impl QueryRequest {
    pub fn new(primary_column: impl Into<ColumnRef>) -> Self {
        Self {
            primary_column: primary_column.into(),
            min_column: None,
            max_column: None,
            group_by: Vec::new(),
            row_limit: default_row_limit(),
            bin_count: default_bin_count(),
            normalize: false,
            cumulative: false,
        }
    }

    pub fn primary_name(&self) -> String {
        self.primary_column.resolve()
    }

    pub fn min_name(&self) -> String {
        resolve_optional(self.min_column.as_ref())
    }

    pub fn max_name(&self) -> String {
        resolve_optional(self.max_column.as_ref())
    }

    /// Resolved, non-empty group-by column names in form order.
    pub fn group_names(&self) -> Vec<String> {
        self.group_by
            .iter()
            .map(ColumnRef::resolve)
            .filter(|name| !name.is_empty())
            .collect()
    }
}

// =============================================================================
// Query objects
// =============================================================================

/// Post-processing step applied by the data layer after the raw fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "options", rename_all = "snake_case")]
pub enum PostProcessing {
    Histogram {
        column: String,
        groupby: Vec<String>,
        bins: usize,
        cumulative: bool,
        normalize: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryObject {
    pub columns: Vec<String>,
    pub row_limit: usize,
    #[serde(default)]
    pub post_processing: Vec<PostProcessing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<String>>,
}

/// One or two fetch specifications. The first is always the binned main
/// query; the second, when present, returns the two threshold scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    pub queries: Vec<QueryObject>,
}

impl QueryContext {
    pub fn main_query(&self) -> Option<&QueryObject> {
        self.queries.first()
    }

    pub fn spec_query(&self) -> Option<&QueryObject> {
        self.queries.get(1)
    }

    pub fn has_spec_query(&self) -> bool {
        self.queries.len() > 1
    }
}

/// Decide which columns to fetch and whether the thresholds need their own
/// single-row query.
///
/// The histogram post-processing step consumes every requested column, so
/// threshold columns requested alongside the primary column would come back
/// bucketed. When both threshold columns are known they are fetched
/// separately with a row limit of one.
pub fn build_query(request: &QueryRequest) -> QueryContext {
    let primary = request.primary_name();
    let groupby = request.group_names();

    let mut columns: Vec<String> = Vec::new();
    for name in groupby.iter().chain(std::iter::once(&primary)) {
        if !name.is_empty() && !columns.contains(name) {
            columns.push(name.clone());
        }
    }

    let main = QueryObject {
        columns,
        row_limit: request.row_limit,
        post_processing: vec![PostProcessing::Histogram {
            column: primary,
            groupby,
            bins: request.bin_count,
            cumulative: request.cumulative,
            normalize: request.normalize,
        }],
        metrics: None,
    };

    let mut queries = vec![main];

    let (min_name, max_name) = (request.min_name(), request.max_name());
    if !min_name.is_empty() && !max_name.is_empty() {
        queries.push(QueryObject {
            columns: vec![min_name, max_name],
            row_limit: 1,
            post_processing: Vec::new(),
            metrics: None,
        });
    } else {
        tracing::debug!(
            min = %min_name,
            max = %max_name,
            "threshold columns incomplete, thresholds will be matched from the main result"
        );
    }

    QueryContext { queries }
}
