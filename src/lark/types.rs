//! Wire types for the bitable, drive and wiki endpoints

use crate::types::{JsonObject, JsonValue};
use serde::{Deserialize, Serialize};

/// A Base (bitable app)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub app_token: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_table_id: Option<String>,
}

/// `data` of the get-app and create-app endpoints
#[derive(Debug, Deserialize)]
pub(crate) struct AppEnvelope {
    pub app: AppInfo,
}

/// A table inside a Base
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub table_id: String,
    #[serde(default)]
    pub name: String,
}

/// `data` of the create-table endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct CreatedTable {
    pub table_id: String,
}

/// A field (column) definition
///
/// Source definitions carry a `field_id`; converted definitions sent to the
/// create-table endpoint do not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    pub field_name: String,
    #[serde(rename = "type")]
    pub type_code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<JsonValue>,
    #[serde(default, skip_serializing)]
    pub is_primary: bool,
}

impl FieldDef {
    /// Build a definition to send to the create-table endpoint
    pub fn new(field_name: impl Into<String>, type_code: i64, ui_type: &str) -> Self {
        Self {
            field_id: None,
            field_name: field_name.into(),
            type_code,
            ui_type: Some(ui_type.to_string()),
            property: None,
            is_primary: false,
        }
    }

    /// Attach a property bag
    #[must_use]
    pub fn with_property(mut self, property: Option<JsonValue>) -> Self {
        self.property = property;
        self
    }
}

/// A record as returned by the list endpoint; values are keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub record_id: String,
    #[serde(default)]
    pub fields: JsonObject,
}

/// One page of a list endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct Page<T> {
    pub items: Option<Vec<T>>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub page_token: Option<String>,
}

/// A Wiki node; Bases embedded in Wiki have `obj_type == "bitable"`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WikiNode {
    #[serde(default)]
    pub node_token: String,
    #[serde(default)]
    pub obj_token: String,
    #[serde(default)]
    pub obj_type: String,
    #[serde(default)]
    pub title: String,
}

impl WikiNode {
    /// Whether the node wraps a Base
    pub fn is_bitable(&self) -> bool {
        self.obj_type == "bitable" && !self.obj_token.is_empty()
    }
}

/// `data` of the get-node endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct WikiNodeEnvelope {
    pub node: WikiNode,
}

/// `data` of the upload endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct UploadedMedia {
    pub file_token: String,
}

/// An attachment cell entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AttachmentRef {
    #[serde(default)]
    pub file_token: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Collaborator permission levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    View,
    Edit,
    FullAccess,
}
