use serde::{Deserialize, Serialize};

/// A column identifier as it arrives from form state.
///
/// Either a bare column name or a structured descriptor carrying one of
/// several naming fields (adhoc columns, dataset column records, select
/// options).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Name(String),
    Descriptor(ColumnDescriptor),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "columnName", skip_serializing_if = "Option::is_none")]
    pub column_name_camel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ColumnDescriptor {
    /// Naming fields in resolution priority order.
    fn candidates(&self) -> [Option<&str>; 5] {
        [
            self.label.as_deref(),
            self.name.as_deref(),
            self.column_name_camel.as_deref(),
            self.column_name.as_deref(),
            self.value.as_deref(),
        ]
    }
}

impl ColumnRef {
    pub fn name(name: impl Into<String>) -> Self {
        ColumnRef::Name(name.into())
    }

    /// Resolve to a single column name. An empty string means "absent".
    pub fn resolve(&self) -> String {
        match self {
            ColumnRef::Name(name) => name.trim().to_string(),
            ColumnRef::Descriptor(desc) => desc
                .candidates()
                .into_iter()
                .flatten()
                .map(str::trim)
                .find(|s| !s.is_empty())
                .unwrap_or_default()
                .to_string(),
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        ColumnRef::Name(name.to_string())
    }
}

impl From<String> for ColumnRef {
    fn from(name: String) -> Self {
        ColumnRef::Name(name)
    }
}

/// Resolve an optional column reference, treating `None` as absent.
pub fn resolve_optional(column: Option<&ColumnRef>) -> String {
    column.map(ColumnRef::resolve).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_plain_name() {
        assert_eq!(ColumnRef::name("height").resolve(), "height");
        assert_eq!(ColumnRef::name("  ").resolve(), "");
    }

    #[test]
    fn test_resolve_priority_order() {
        let desc = ColumnDescriptor {
            label: None,
            name: Some("by_name".to_string()),
            column_name_camel: Some("by_camel".to_string()),
            column_name: None,
            value: Some("by_value".to_string()),
        };
        assert_eq!(ColumnRef::Descriptor(desc).resolve(), "by_name");
    }

    #[test]
    fn test_resolve_skips_empty_fields() {
        let desc = ColumnDescriptor {
            label: Some("".to_string()),
            value: Some("weight".to_string()),
            ..Default::default()
        };
        assert_eq!(ColumnRef::Descriptor(desc).resolve(), "weight");
    }

    #[test]
    fn test_resolve_empty_descriptor() {
        assert_eq!(ColumnRef::Descriptor(ColumnDescriptor::default()).resolve(), "");
        assert_eq!(resolve_optional(None), "");
    }

    #[test]
    fn test_deserialize_untagged() {
        let plain: ColumnRef = serde_json::from_str(r#""temp""#).unwrap();
        assert_eq!(plain.resolve(), "temp");

        let obj: ColumnRef =
            serde_json::from_str(r#"{"column_name": "spec_min", "label": "Spec Min"}"#).unwrap();
        assert_eq!(obj.resolve(), "Spec Min");

        let camel: ColumnRef = serde_json::from_str(r#"{"columnName": "lsl"}"#).unwrap();
        assert_eq!(camel.resolve(), "lsl");
    }
}
