//! Cell value conversion
//!
//! Dynamic values are flattened to display text using ordered key lists: the first
//! non-empty key wins. Numeric values are re-parsed and dropped when not finite.

use super::kind::FieldKind;
use crate::types::JsonValue;
use chrono::DateTime;

/// Separator between the parts of a flattened list
pub const LIST_SEPARATOR: &str = ", ";

/// Display keys of user references
const USER_KEYS: &[&str] = &["name", "en_name", "id"];
/// Display keys of link references
const LINK_KEYS: &[&str] = &["text", "record_id"];
/// Display keys of attachment references
const ATTACHMENT_KEYS: &[&str] = &["name", "file_token"];
/// Display keys of location values
const LOCATION_KEYS: &[&str] = &["full_address", "address", "name", "location"];
/// Keys tried by generic extraction before `value`
const TEXT_KEYS: &[&str] = &["text"];
/// Keys tried by generic extraction after `value`
const NAME_KEYS: &[&str] = &["name", "en_name"];

/// Format of flattened created/modified timestamps (UTC)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Convert a source value for a field of `source` kind created as `target`
///
/// `None` means the value is omitted from the written record.
pub fn convert_value(
    source: FieldKind,
    target: FieldKind,
    value: &JsonValue,
) -> Option<JsonValue> {
    if value.is_null() {
        return None;
    }
    if target.is_numeric() {
        return sanitize_number(value);
    }
    if target == source {
        return Some(value.clone());
    }

    let text = flatten(source, value);
    (!text.is_empty()).then_some(JsonValue::String(text))
}

/// Flatten a value to display text according to its field kind
///
/// Formula numbers come out as their string form because the target column is Text.
pub fn flatten(kind: FieldKind, value: &JsonValue) -> String {
    match kind {
        FieldKind::User
        | FieldKind::CreatedUser
        | FieldKind::ModifiedUser
        | FieldKind::GroupChat => join_each(value, |item| display_by(item, USER_KEYS)),
        FieldKind::SingleLink | FieldKind::DuplexLink => link_text(value),
        FieldKind::Attachment => join_each(value, |item| display_by(item, ATTACHMENT_KEYS)),
        FieldKind::Location => join_each(value, |item| display_by(item, LOCATION_KEYS)),
        FieldKind::CreatedTime | FieldKind::ModifiedTime => timestamp_text(value),
        FieldKind::Lookup
        | FieldKind::Formula
        | FieldKind::AutoNumber
        | FieldKind::Text
        | FieldKind::Email
        | FieldKind::Barcode
        | FieldKind::Number
        | FieldKind::Progress
        | FieldKind::Currency
        | FieldKind::Rating
        | FieldKind::SingleSelect
        | FieldKind::MultiSelect
        | FieldKind::DateTime
        | FieldKind::Checkbox
        | FieldKind::Phone
        | FieldKind::Url
        | FieldKind::Unknown(_) => extract_text(value),
    }
}

/// Generic display text of any value
///
/// Objects yield the first non-empty of `text`, a recursively extracted `value`,
/// `name` and `en_name`, falling back to their JSON form. Arrays are joined.
pub fn extract_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(_) => number_text(value),
        JsonValue::Array(items) => join_texts(items.iter().map(extract_text)),
        JsonValue::Object(map) => first_str(value, TEXT_KEYS)
            .or_else(|| {
                map.get("value")
                    .map(extract_text)
                    .filter(|text| !text.is_empty())
            })
            .or_else(|| first_str(value, NAME_KEYS))
            .unwrap_or_else(|| value.to_string()),
    }
}

/// Re-parse a numeric cell; `None` unless the result is a finite number
pub fn sanitize_number(value: &JsonValue) -> Option<JsonValue> {
    let number = match value {
        JsonValue::Number(n) => n.as_f64()?,
        JsonValue::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    match value {
        JsonValue::Number(_) => Some(value.clone()),
        _ => serde_json::Number::from_f64(number).map(JsonValue::Number),
    }
}

/// Format a millisecond timestamp as UTC text; other shapes use generic extraction
pub fn timestamp_text(value: &JsonValue) -> String {
    let millis = match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    millis
        .and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| extract_text(value))
}

/// Display text of link references
///
/// Elements are `{record_id, text?}`; newer responses group ids as `record_ids` or
/// `link_record_ids` instead.
fn link_text(value: &JsonValue) -> String {
    join_each(value, |item| {
        let text = display_by(item, LINK_KEYS);
        if !text.is_empty() {
            return text;
        }
        ["record_ids", "link_record_ids"]
            .iter()
            .find_map(|key| item.get(key).and_then(JsonValue::as_array))
            .map(|ids| join_texts(ids.iter().map(extract_text)))
            .unwrap_or_default()
    })
}

/// First non-empty string among `keys` of an object; other shapes use generic extraction
fn display_by(value: &JsonValue, keys: &[&str]) -> String {
    match value {
        JsonValue::Object(_) => first_str(value, keys).unwrap_or_default(),
        other => extract_text(other),
    }
}

fn first_str(value: &JsonValue, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(key))
        .find_map(|v| match v {
            JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
            JsonValue::Number(_) => Some(number_text(v)),
            _ => None,
        })
}

/// Apply `f` to each element of an array (or to a single value) and join the results
fn join_each(value: &JsonValue, f: impl Fn(&JsonValue) -> String) -> String {
    match value {
        JsonValue::Array(items) => join_texts(items.iter().map(f)),
        JsonValue::Null => String::new(),
        single => f(single),
    }
}

/// Join non-empty parts with [`LIST_SEPARATOR`]
fn join_texts(parts: impl Iterator<Item = String>) -> String {
    parts
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// Integral floats print without a fractional part
fn number_text(value: &JsonValue) -> String {
    match value.as_i64() {
        Some(i) => i.to_string(),
        None => match value.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            Some(f) => f.to_string(),
            None => value.to_string(),
        },
    }
}
