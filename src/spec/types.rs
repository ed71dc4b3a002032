//! Raw form spec types matching the JSON document written by the spec generator.

use serde::{Deserialize, Serialize};

/// Control kind of a field or table column (`"type"` in the document).
/// Kinds this crate does not map are kept verbatim in `Other`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldKind {
    #[default]
    Text,
    Password,
    Dropdown,
    Radio,
    Checkbox,
    Table,
    Calculated,
    Other(String),
}

impl FieldKind {
    /// Kinds that become one TEXT column on the main table.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            FieldKind::Text | FieldKind::Password | FieldKind::Dropdown | FieldKind::Radio | FieldKind::Checkbox
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Password => "password",
            FieldKind::Dropdown => "dropdown",
            FieldKind::Radio => "radio",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Table => "table",
            FieldKind::Calculated => "calculated",
            FieldKind::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for FieldKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "text" => FieldKind::Text,
            "password" => FieldKind::Password,
            "dropdown" => FieldKind::Dropdown,
            "radio" => FieldKind::Radio,
            "checkbox" => FieldKind::Checkbox,
            "table" => FieldKind::Table,
            "calculated" => FieldKind::Calculated,
            _ => FieldKind::Other(s),
        }
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        kind.as_str().to_string()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TableColumn {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub header: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Field {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Option<Vec<serde_json::Value>>,
    /// Only meaningful for `table` fields.
    #[serde(default)]
    pub columns: Vec<TableColumn>,
}

impl Field {
    /// Name if present and non-empty.
    pub fn field_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormSpec {
    #[serde(rename = "formName", default)]
    pub form_name: String,
    #[serde(default)]
    pub sections: Vec<Section>,
    /// Cache of "tables exist in the store". `dbTableCreated` is the legacy key.
    #[serde(default, alias = "dbTableCreated")]
    pub provisioned: bool,
}

impl FormSpec {
    /// All fields across sections, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }
}
