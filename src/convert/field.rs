//! Field definition conversion

use super::kind::FieldKind;
use crate::lark::FieldDef;
use crate::types::{JsonObject, JsonValue};

/// Property keys that reference the source Base and are rejected on create
const SOURCE_BOUND_PROPERTIES: &[&str] = &[
    "table_id",
    "table_name",
    "back_field_id",
    "back_field_name",
    "formula_expression",
    "filter_info",
];

/// Option keys kept on select fields
const OPTION_KEYS: &[&str] = &["name", "color"];

/// A source field paired with the definition to create in the target
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedField {
    /// Kind of the source field
    pub source_kind: FieldKind,
    /// Kind of the created field
    pub target_kind: FieldKind,
    /// Definition sent to the create-table endpoint
    pub definition: FieldDef,
}

impl ConvertedField {
    /// Whether the field changed type
    pub fn is_converted(&self) -> bool {
        self.source_kind != self.target_kind
    }
}

/// Kind of a fetched field definition
pub fn field_kind(field: &FieldDef) -> FieldKind {
    FieldKind::from_parts(field.ui_type.as_deref(), field.type_code)
}

/// Convert one source field into its static equivalent
///
/// Static fields keep their type and a cleaned property; everything else becomes a
/// bare Text or Number field with the same name.
pub fn convert_field(field: &FieldDef, preserve_attachments: bool) -> ConvertedField {
    let source_kind = field_kind(field);
    let target_kind = source_kind.target(preserve_attachments);

    let property = if target_kind == source_kind {
        field.property.as_ref().and_then(clean_property)
    } else {
        None
    };

    ConvertedField {
        source_kind,
        target_kind,
        definition: FieldDef::new(
            field.field_name.clone(),
            target_kind.code(),
            target_kind.ui_name(),
        )
        .with_property(property),
    }
}

/// Convert a table's fields, preserving their order
pub fn convert_fields(fields: &[FieldDef], preserve_attachments: bool) -> Vec<ConvertedField> {
    fields
        .iter()
        .map(|field| convert_field(field, preserve_attachments))
        .collect()
}

/// Strip source-bound keys and option ids; `None` if nothing is left
fn clean_property(property: &JsonValue) -> Option<JsonValue> {
    let JsonValue::Object(map) = property else {
        return None;
    };

    let mut cleaned = JsonObject::new();
    for (key, value) in map {
        if SOURCE_BOUND_PROPERTIES.contains(&key.as_str()) || value.is_null() {
            continue;
        }
        if key == "options" {
            cleaned.insert(key.clone(), clean_options(value));
        } else {
            cleaned.insert(key.clone(), value.clone());
        }
    }

    (!cleaned.is_empty()).then_some(JsonValue::Object(cleaned))
}

fn clean_options(options: &JsonValue) -> JsonValue {
    let Some(options) = options.as_array() else {
        return options.clone();
    };

    options
        .iter()
        .map(|option| match option {
            JsonValue::Object(map) => JsonValue::Object(
                map.iter()
                    .filter(|(key, _)| OPTION_KEYS.contains(&key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
            other => other.clone(),
        })
        .collect()
}
