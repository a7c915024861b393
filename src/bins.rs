use nom::{
    character::complete::{char, space0},
    combinator::all_consuming,
    number::complete::double,
    sequence::{delimited, separated_pair},
    IResult,
};
use std::collections::HashMap;

use crate::data::ResultRow;

/// A histogram bin decoded from a result-set key.
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    /// Unique label used as the x-axis category and series key.
    pub label: String,
    /// Key as it appears in the result row.
    pub raw_label: String,
    /// Zero-based repeat count of `raw_label` among the bins.
    pub occurrence: usize,
    /// Parsed `(low, high)` bounds, `None` when the label is malformed.
    pub range: Option<(f64, f64)>,
}

/// Parse a bin label of the form `<low> - <high>`
pub fn parse_bin_label(input: &str) -> IResult<&str, (f64, f64)> {
    all_consuming(delimited(
        space0,
        separated_pair(double, delimited(space0, char('-'), space0), double),
        space0,
    ))(input)
}

/// Parsed bounds of a label, or `None` for anything that is not two finite
/// numbers around a dash.
pub fn bin_range(label: &str) -> Option<(f64, f64)> {
    match parse_bin_label(label) {
        Ok((_, (low, high))) if low.is_finite() && high.is_finite() => Some((low, high)),
        _ => None,
    }
}

/// Decode the bins of a main result row.
///
/// Every key not listed in `excluded` is a bin, in encounter order. A label
/// seen before gets a ` (n)` suffix so that no two bins share a key.
pub fn extract_bins(row: &ResultRow, excluded: &[String]) -> Vec<Bin> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut bins = Vec::new();

    for key in row.keys() {
        if excluded.iter().any(|e| e == key) {
            continue;
        }
        let count = seen.entry(key).or_insert(0);
        *count += 1;
        let label = if *count == 1 {
            key.to_string()
        } else {
            format!("{} ({})", key, count)
        };
        bins.push(Bin {
            label,
            raw_label: key.to_string(),
            occurrence: *count - 1,
            range: bin_range(key),
        });
    }

    bins
}

/// Locate the bin holding `value`.
///
/// Bins are `[low, high)` except the last well-formed one, which is
/// `[low, high]`. The scan is left to right and the first match wins;
/// malformed bins never match and never count as the last bin.
pub fn find_bin(value: f64, bins: &[Bin]) -> Option<usize> {
    if !value.is_finite() {
        return None;
    }
    let last = bins.iter().rposition(|b| b.range.is_some())?;
    bins.iter().enumerate().position(|(i, bin)| match bin.range {
        Some((low, high)) if i == last => value >= low && value <= high,
        Some((low, high)) => value >= low && value < high,
        None => false,
    })
}
