use serde::{Deserialize, Serialize};

/// Number formats used for bar labels, axis ticks and tooltips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NumberFormat {
    /// Rounded to an integer with thousands separators: `1,235`
    #[default]
    Integer,
    /// Two decimals with thousands separators: `1,234.57`
    #[serde(rename = "FLOAT_2_POINT")]
    Float2Point,
    /// Ratio as a percentage with two decimals: `12.34%`
    #[serde(rename = "PERCENT_2_POINT")]
    Percent2Point,
}

impl NumberFormat {
    /// Format used for frequencies.
    pub fn for_values(normalize: bool) -> Self {
        if normalize {
            NumberFormat::Float2Point
        } else {
            NumberFormat::Integer
        }
    }

    pub fn format(&self, value: f64) -> String {
        if !value.is_finite() {
            return value.to_string();
        }
        match self {
            NumberFormat::Integer => group_thousands(&format!("{:.0}", value)),
            NumberFormat::Float2Point => group_thousands(&format!("{:.2}", value)),
            NumberFormat::Percent2Point => format!("{}%", group_thousands(&format!("{:.2}", value * 100.0))),
        }
    }
}

/// Threshold values always use two decimals, whatever the frequency format.
pub fn format_threshold(value: f64) -> String {
    NumberFormat::Float2Point.format(value)
}

fn group_thousands(plain: &str) -> String {
    let (sign, unsigned) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    // "-0" and "-0.00" read as zero
    let is_zero = unsigned.chars().all(|c| c == '0' || c == '.');
    let sign = if is_zero { "" } else { sign };

    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}
