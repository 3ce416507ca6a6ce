//! Form field model and the backend seam used to read and write AcroForm widgets

use crate::error::{Error, Result};
use crate::values::FieldValueMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::path::Path;

// ============================================================================
// Field types
// ============================================================================

/// Declared type of a form widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Checkbox,
    RadioButton,
    ComboBox,
    ListBox,
    PushButton,
    Signature,
    Unknown,
}

impl FieldKind {
    /// Push buttons carry no data and never receive values
    pub fn is_fillable(self) -> bool {
        self != FieldKind::PushButton
    }
}

/// A single named widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    /// Exact field name; the join key for synthesis and filling
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Current value ("" when unset; "Yes"/"Off" for toggles)
    pub value: String,
    /// Page index (0-based)
    pub page: u32,
}

/// Value reported for a toggle widget
pub fn toggle_value(checked: bool) -> &'static str {
    if checked {
        "Yes"
    } else {
        "Off"
    }
}

// ============================================================================
// Writing
// ============================================================================

/// What a backend should do to one widget given its kind and the requested value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldWrite {
    Text(String),
    Checked(bool),
    Unsupported(&'static str),
}

/// Whether a requested value means "checked" for a checkbox or radio button
pub fn is_checked_value(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "on" | "true" | "1" | "x" | "checked"
    )
}

/// Decide how `value` is applied to a widget of `kind`
pub fn plan_write(kind: FieldKind, value: &str) -> FieldWrite {
    match kind {
        FieldKind::Text | FieldKind::Unknown => FieldWrite::Text(value.to_string()),
        FieldKind::Checkbox | FieldKind::RadioButton => FieldWrite::Checked(is_checked_value(value)),
        FieldKind::ComboBox | FieldKind::ListBox => {
            FieldWrite::Unsupported("Choice field selection is not supported")
        }
        FieldKind::PushButton => FieldWrite::Unsupported("Push buttons hold no value"),
        FieldKind::Signature => FieldWrite::Unsupported("Signature fields cannot be filled"),
    }
}

/// A field that matched by name but could not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedField {
    pub name: String,
    pub reason: String,
}

/// Output of [`FormBackend::write_fields`]
#[derive(Debug, Clone)]
pub struct WrittenForm {
    /// Serialized document
    pub data: Vec<u8>,
    /// Widgets whose value was overwritten
    pub fields_filled: u32,
    pub fields_skipped: Vec<SkippedField>,
}

/// PDF capability: enumerate widgets and overwrite their values.
///
/// Both operations walk pages in order and widgets in page order.
pub trait FormBackend: Send + Sync {
    /// Every named widget, in document order (names may repeat)
    fn read_fields(&self, data: &[u8]) -> Result<Vec<FormField>>;

    /// Overwrite every widget whose exact name is a key of `values`.
    /// Widgets absent from `values` are left untouched.
    fn write_fields(&self, data: &[u8], values: &FieldValueMap) -> Result<WrittenForm>;
}

// ============================================================================
// Inspection
// ============================================================================

/// Form fields of one document, keyed by name
#[derive(Debug, Clone)]
pub struct FieldInventory {
    filepath: String,
    fields: Vec<FormField>,
}

impl FieldInventory {
    /// Collapse widgets by name. A repeated name keeps its first position but
    /// takes the type, value and page of its last occurrence.
    pub fn from_widgets(filepath: impl Into<String>, widgets: Vec<FormField>) -> Self {
        let mut fields: Vec<FormField> = Vec::with_capacity(widgets.len());
        let mut index: HashMap<String, usize> = HashMap::new();

        for widget in widgets {
            match index.get(&widget.name) {
                Some(&i) => fields[i] = widget,
                None => {
                    index.insert(widget.name.clone(), fields.len());
                    fields.push(widget);
                }
            }
        }

        Self {
            filepath: filepath.into(),
            fields,
        }
    }

    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    /// Names to request values for: fillable fields not listed in `exclude`
    pub fn synthesis_candidates(&self, exclude: &[&str]) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.kind.is_fillable() && !exclude.contains(&f.name.as_str()))
            .map(|f| f.name.clone())
            .collect()
    }
}

#[derive(Serialize)]
struct FieldEntry<'a> {
    #[serde(rename = "type")]
    kind: FieldKind,
    value: &'a str,
    page: u32,
}

struct FieldsByName<'a>(&'a [FormField]);

impl Serialize for FieldsByName<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for f in self.0 {
            map.serialize_entry(
                &f.name,
                &FieldEntry {
                    kind: f.kind,
                    value: &f.value,
                    page: f.page,
                },
            )?;
        }
        map.end()
    }
}

impl Serialize for FieldInventory {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("filepath", &self.filepath)?;
        map.serialize_entry("num_fields", &self.fields.len())?;
        map.serialize_entry("fields", &FieldsByName(&self.fields))?;
        map.end()
    }
}

/// Read a document from disk
pub fn read_document(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::PdfNotFound {
            path: path.display().to_string(),
        },
        _ => Error::InvalidPdf {
            reason: format!("Failed to read {}: {}", path.display(), e),
        },
    })
}

/// Enumerate the fillable fields of the document at `path`
pub fn inspect(path: &Path, backend: &dyn FormBackend) -> Result<FieldInventory> {
    let data = read_document(path)?;
    let widgets = backend.read_fields(&data)?;
    let inventory = FieldInventory::from_widgets(path.display().to_string(), widgets);

    tracing::debug!(path = %path.display(), fields = inventory.num_fields(), "inspected form");
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn field(name: &str, kind: FieldKind, value: &str, page: u32) -> FormField {
        FormField {
            name: name.to_string(),
            kind,
            value: value.to_string(),
            page,
        }
    }

    #[test]
    fn test_repeated_names_last_occurrence_wins() {
        let inventory = FieldInventory::from_widgets(
            "/tmp/a.pdf",
            vec![
                field("Name", FieldKind::Text, "", 0),
                field("Agree", FieldKind::Checkbox, "Off", 0),
                field("Name", FieldKind::Text, "Jane", 2),
            ],
        );

        assert_eq!(inventory.num_fields(), 2);
        assert_eq!(inventory.fields()[0].name, "Name");
        assert_eq!(inventory.get("Name").unwrap().page, 2);
        assert_eq!(inventory.get("Name").unwrap().value, "Jane");
    }

    #[test]
    fn test_synthesis_candidates_skip_buttons_and_exclusions() {
        let inventory = FieldInventory::from_widgets(
            "/tmp/a.pdf",
            vec![
                field("Name", FieldKind::Text, "", 0),
                field("Reset", FieldKind::PushButton, "", 0),
                field("Year-1", FieldKind::Text, "", 0),
                field("Agree", FieldKind::Checkbox, "Off", 1),
            ],
        );

        assert_eq!(
            inventory.synthesis_candidates(&["Year-1"]),
            vec!["Name".to_string(), "Agree".to_string()]
        );
    }

    #[test]
    fn test_inventory_serializes_as_name_map() {
        let inventory = FieldInventory::from_widgets(
            "/tmp/a.pdf",
            vec![field("Buyer zip", FieldKind::Text, "", 1)],
        );
        let json = serde_json::to_value(&inventory).unwrap();

        assert_eq!(json["num_fields"], 1);
        assert_eq!(json["filepath"], "/tmp/a.pdf");
        assert_eq!(json["fields"]["Buyer zip"]["type"], "text");
        assert_eq!(json["fields"]["Buyer zip"]["page"], 1);
    }

    #[rstest]
    #[case(FieldKind::Text, "CA", FieldWrite::Text("CA".to_string()))]
    #[case(FieldKind::Unknown, "", FieldWrite::Text(String::new()))]
    #[case(FieldKind::Checkbox, "Yes", FieldWrite::Checked(true))]
    #[case(FieldKind::Checkbox, " TRUE ", FieldWrite::Checked(true))]
    #[case(FieldKind::Checkbox, "Off", FieldWrite::Checked(false))]
    #[case(FieldKind::RadioButton, "x", FieldWrite::Checked(true))]
    #[case(FieldKind::RadioButton, "", FieldWrite::Checked(false))]
    fn test_plan_write(#[case] kind: FieldKind, #[case] value: &str, #[case] expected: FieldWrite) {
        assert_eq!(plan_write(kind, value), expected);
    }

    #[test]
    fn test_plan_write_unsupported() {
        for kind in [
            FieldKind::ComboBox,
            FieldKind::ListBox,
            FieldKind::PushButton,
            FieldKind::Signature,
        ] {
            assert!(matches!(plan_write(kind, "a"), FieldWrite::Unsupported(_)));
        }
    }

    #[test]
    fn test_read_document_missing() {
        let result = read_document(Path::new("/nonexistent/path/file.pdf"));
        assert!(matches!(result, Err(Error::PdfNotFound { .. })));
    }
}
