//! Static conversion of fields and records
//!
//! # Overview
//!
//! Every source field is classified by [`FieldKind`]. Static kinds are copied as-is
//! (minus properties that point into the source Base); dynamic and unsupported kinds
//! are recreated as Text or Number fields and their values flattened accordingly.

mod field;
mod kind;
mod record;
mod value;

pub use field::{convert_field, convert_fields, field_kind, ConvertedField};
pub use kind::{FieldClass, FieldKind};
pub use record::{ConvertedRecord, PendingAttachments, RecordConverter};
pub use value::{
    convert_value, extract_text, flatten, sanitize_number, timestamp_text, LIST_SEPARATOR,
    TIMESTAMP_FORMAT,
};
