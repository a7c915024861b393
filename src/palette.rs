use plotters::style::RGBColor;
use std::collections::HashMap;

/// Maps series names to colors. Implementations must return the same color
/// for the same name for as long as the scale lives.
pub trait ColorScale {
    fn color_for(&mut self, series: &str) -> String;
}

/// Categorical palette that hands out colors in first-request order and
/// remembers every assignment.
#[derive(Debug, Clone)]
pub struct ColorPalette {
    colors: Vec<String>,
    assigned: HashMap<String, String>,
}

const SUPERSET_COLORS: [&str; 13] = [
    "#1FA8C9", "#454E7C", "#5AC189", "#FF7F44", "#666666", "#E04355", "#FCC700",
    "#A868B7", "#3CCCCB", "#A38F79", "#8FD3E4", "#A1A6BD", "#ACE1C4",
];

const CATEGORY10: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd",
    "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22", "#17becf",
];

const TABLEAU10: [&str; 10] = [
    "#4e79a7", "#f28e2c", "#e15759", "#76b7b2", "#59a14f",
    "#edc949", "#af7aa1", "#ff9da7", "#9c755f", "#bab0ab",
];

impl ColorPalette {
    pub fn new(colors: Vec<String>) -> Self {
        Self {
            colors,
            assigned: HashMap::new(),
        }
    }

    pub fn category10() -> Self {
        Self::new(CATEGORY10.iter().map(|c| c.to_string()).collect())
    }

    pub fn superset() -> Self {
        Self::new(SUPERSET_COLORS.iter().map(|c| c.to_string()).collect())
    }

    pub fn tableau10() -> Self {
        Self::new(TABLEAU10.iter().map(|c| c.to_string()).collect())
    }

    /// Look up a scheme by name, falling back to the default scheme.
    pub fn from_scheme(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_lowercase()).as_deref() {
            Some("d3category10") | Some("category10") => Self::category10(),
            Some("tableau10") => Self::tableau10(),
            Some("supersetcolors") | Some("superset") | None | Some("") => Self::superset(),
            Some(other) => {
                tracing::debug!(scheme = other, "unknown color scheme, using default");
                Self::superset()
            }
        }
    }
}

impl ColorScale for ColorPalette {
    fn color_for(&mut self, series: &str) -> String {
        if let Some(color) = self.assigned.get(series) {
            return color.clone();
        }
        let color = match self.colors.len() {
            0 => "#1FA8C9".to_string(),
            n => self.colors[self.assigned.len() % n].clone(),
        };
        self.assigned.insert(series.to_string(), color.clone());
        color
    }
}

/// Parse a color string into RGBColor, supporting hex (#RRGGBB, #RGB) and named colors
pub fn parse_color(color_str: &str) -> Option<RGBColor> {
    let color_str = color_str.trim();

    if color_str.starts_with('#') {
        return parse_hex_color(color_str);
    }

    match color_str.to_lowercase().as_str() {
        "white" => Some(RGBColor(255, 255, 255)),
        "black" => Some(RGBColor(0, 0, 0)),
        "red" => Some(RGBColor(255, 0, 0)),
        "green" => Some(RGBColor(0, 128, 0)),
        "blue" => Some(RGBColor(0, 0, 255)),
        "orange" => Some(RGBColor(255, 165, 0)),
        "purple" => Some(RGBColor(128, 0, 128)),
        "gray" | "grey" => Some(RGBColor(128, 128, 128)),
        _ => None,
    }
}

/// Parse hex color (#RRGGBB or #RGB)
fn parse_hex_color(hex: &str) -> Option<RGBColor> {
    let hex = hex.trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(RGBColor(r, g, b))
        }
        3 => {
            let r = u8::from_str_radix(&hex[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&hex[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&hex[2..3], 16).ok()? * 17;
            Some(RGBColor(r, g, b))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_is_stable() {
        let mut palette = ColorPalette::category10();
        let a = palette.color_for("A");
        let b = palette.color_for("B");
        assert_eq!(a, "#1f77b4");
        assert_eq!(b, "#ff7f0e");
        assert_eq!(palette.color_for("A"), a);
    }

    #[test]
    fn test_palette_wraps() {
        let mut palette = ColorPalette::new(vec!["#000000".to_string(), "#ffffff".to_string()]);
        palette.color_for("a");
        palette.color_for("b");
        assert_eq!(palette.color_for("c"), "#000000");
    }

    #[test]
    fn test_from_scheme() {
        let mut palette = ColorPalette::from_scheme(Some("d3Category10"));
        assert_eq!(palette.color_for("x"), "#1f77b4");
        let mut fallback = ColorPalette::from_scheme(Some("no-such-scheme"));
        assert_eq!(fallback.color_for("x"), "#1FA8C9");
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#FF0000"), Some(RGBColor(255, 0, 0)));
        assert_eq!(parse_color("#F00"), Some(RGBColor(255, 0, 0)));
        assert_eq!(parse_color("green"), Some(RGBColor(0, 128, 0)));
        assert_eq!(parse_color("#GG0000"), None);
        assert_eq!(parse_color("chartreuse-ish"), None);
    }
}
