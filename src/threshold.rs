use serde::Serialize;
use serde_json::Value;

use crate::bins::{find_bin, Bin};
use crate::data::ResultRow;
use crate::ir::{Diagnostic, DiagnosticKind, ThresholdKind};

/// Offset, in bin-index units, applied to each marker when both thresholds
/// fall in the same bin.
pub const COLLISION_OFFSET: f64 = 0.2;

/// Ways of finding a threshold's key in a row, tried in order.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyStrategy<'a> {
    /// The configured column name, verbatim.
    ExactKey(&'a str),
    /// The configured column name, ignoring ASCII case.
    CaseInsensitiveKey(&'a str),
    /// First key whose lowercase form contains the hint (`min` / `max`).
    KeySubstring(&'static str),
}

impl<'a> KeyStrategy<'a> {
    pub fn chain(column: &'a str, kind: ThresholdKind) -> Vec<KeyStrategy<'a>> {
        let mut strategies = Vec::new();
        if !column.is_empty() {
            strategies.push(KeyStrategy::ExactKey(column));
            strategies.push(KeyStrategy::CaseInsensitiveKey(column));
        }
        strategies.push(KeyStrategy::KeySubstring(kind.key_hint()));
        strategies
    }

    fn matches(&self, key: &str) -> bool {
        match self {
            KeyStrategy::ExactKey(name) => key == *name,
            KeyStrategy::CaseInsensitiveKey(name) => key.eq_ignore_ascii_case(name),
            KeyStrategy::KeySubstring(hint) => key.to_lowercase().contains(hint),
        }
    }
}

/// Outcome of looking a threshold up in a row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThresholdLookup {
    /// Key the value was read from, if any strategy matched.
    pub key: Option<String>,
    /// The value, only when it is a finite number.
    pub value: Option<f64>,
}

/// A threshold placed on the bin axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Threshold {
    pub kind: ThresholdKind,
    pub value: f64,
    pub source_key: String,
    pub bin_label: Option<String>,
    pub bin_index: Option<usize>,
    /// Marker position in bin-index units; offset on collision.
    pub position: Option<f64>,
}

impl Threshold {
    pub fn is_resolved(&self) -> bool {
        self.bin_index.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Thresholds {
    pub min: Option<Threshold>,
    pub max: Option<Threshold>,
}

impl Thresholds {
    pub fn iter(&self) -> impl Iterator<Item = &Threshold> {
        self.min.iter().chain(self.max.iter())
    }

    pub fn value(&self, kind: ThresholdKind) -> Option<f64> {
        let threshold = match kind {
            ThresholdKind::Min => &self.min,
            ThresholdKind::Max => &self.max,
        };
        threshold.as_ref().map(|t| t.value)
    }
}

/// Interpret a cell as a finite number. Numeric strings are accepted.
pub fn numeric_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Find a threshold in `row`.
///
/// The configured name is matched against every key. `excluded` keys (group
/// columns and keys already claimed by the other threshold) are only skipped
/// by the substring fallback.
pub fn lookup_threshold(
    row: &ResultRow,
    column: &str,
    kind: ThresholdKind,
    excluded: &[String],
    diagnostics: &mut Vec<Diagnostic>,
) -> ThresholdLookup {
    let all_keys: Vec<&str> = row.keys().collect();
    let unclaimed: Vec<&str> = all_keys
        .iter()
        .copied()
        .filter(|k| !excluded.iter().any(|e| e == k))
        .collect();

    let key = KeyStrategy::chain(column, kind).iter().find_map(|strategy| {
        let candidates = match strategy {
            KeyStrategy::KeySubstring(_) => &unclaimed,
            _ => &all_keys,
        };
        candidates.iter().find(|k| strategy.matches(k)).copied()
    });

    let Some(key) = key else {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::MissingField,
            format!(
                "{} threshold column '{}' not found in result",
                kind.title(),
                column
            ),
        ));
        return ThresholdLookup::default();
    };

    if column.is_empty() || key != column {
        tracing::debug!(kind = ?kind, column, key, "threshold matched by fallback key");
    }

    let value = row.get(key).and_then(numeric_value);
    if value.is_none() {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::MissingField,
            format!("{} threshold '{}' is not a finite number", kind.title(), key),
        ));
    }

    ThresholdLookup {
        key: Some(key.to_string()),
        value,
    }
}

/// Locate both thresholds on the bin axis.
///
/// A threshold outside every bin keeps `bin_index == None` and yields an
/// out-of-range diagnostic. When both land in one bin their positions are
/// pushed apart by [`COLLISION_OFFSET`] each.
pub fn place_thresholds(
    min: &ThresholdLookup,
    max: &ThresholdLookup,
    bins: &[Bin],
    diagnostics: &mut Vec<Diagnostic>,
) -> Thresholds {
    let mut placed = Thresholds {
        min: place_one(ThresholdKind::Min, min, bins, diagnostics),
        max: place_one(ThresholdKind::Max, max, bins, diagnostics),
    };

    if let (Some(lo), Some(hi)) = (placed.min.as_mut(), placed.max.as_mut()) {
        if let (Some(a), Some(b)) = (lo.bin_index, hi.bin_index) {
            if a == b {
                lo.position = Some(a as f64 - COLLISION_OFFSET);
                hi.position = Some(b as f64 + COLLISION_OFFSET);
            }
        }
    }

    placed
}

fn place_one(
    kind: ThresholdKind,
    lookup: &ThresholdLookup,
    bins: &[Bin],
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Threshold> {
    let value = lookup.value?;
    let bin_index = find_bin(value, bins);

    if bin_index.is_none() {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::OutOfRange,
            format!(
                "{} threshold ({}) does not fall within any bin range",
                kind.title(),
                value
            ),
        ));
    }

    Some(Threshold {
        kind,
        value,
        source_key: lookup.key.clone().unwrap_or_default(),
        bin_label: bin_index.map(|i| bins[i].label.clone()),
        bin_index,
        position: bin_index.map(|i| i as f64),
    })
}
