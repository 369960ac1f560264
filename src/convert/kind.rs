//! Field kinds and their static equivalents

/// How a field kind is treated when copied into a static Base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldClass {
    /// Copied with its type and (cleaned) property intact
    Static,
    /// Computed or referencing other data; flattened to text
    Dynamic,
    /// Cannot be created through the API; rewritten to text or number
    Unsupported,
}

/// Field type, keyed by the vendor's UI tag
///
/// Several tags share one numeric code (Email, Barcode and Text are all `1`), so the tag
/// is authoritative and the code is only consulted when the tag is missing or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Email,
    Barcode,
    Number,
    Progress,
    Currency,
    Rating,
    SingleSelect,
    MultiSelect,
    DateTime,
    Checkbox,
    User,
    Phone,
    Url,
    Attachment,
    SingleLink,
    Lookup,
    Formula,
    DuplexLink,
    Location,
    GroupChat,
    CreatedTime,
    ModifiedTime,
    CreatedUser,
    ModifiedUser,
    AutoNumber,
    Unknown(i64),
}

impl FieldKind {
    /// Resolve a kind from a field's UI tag and numeric type code
    pub fn from_parts(ui_type: Option<&str>, code: i64) -> Self {
        ui_type
            .and_then(Self::from_ui_type)
            .unwrap_or_else(|| Self::from_code(code))
    }

    /// Kind for a known UI tag
    pub fn from_ui_type(tag: &str) -> Option<Self> {
        let kind = match tag {
            "Text" => Self::Text,
            "Email" => Self::Email,
            "Barcode" => Self::Barcode,
            "Number" => Self::Number,
            "Progress" => Self::Progress,
            "Currency" => Self::Currency,
            "Rating" => Self::Rating,
            "SingleSelect" => Self::SingleSelect,
            "MultiSelect" => Self::MultiSelect,
            "DateTime" => Self::DateTime,
            "Checkbox" => Self::Checkbox,
            "User" => Self::User,
            "Phone" => Self::Phone,
            "Url" => Self::Url,
            "Attachment" => Self::Attachment,
            "SingleLink" => Self::SingleLink,
            "Lookup" => Self::Lookup,
            "Formula" => Self::Formula,
            "DuplexLink" => Self::DuplexLink,
            "Location" => Self::Location,
            "GroupChat" => Self::GroupChat,
            "CreatedTime" => Self::CreatedTime,
            "ModifiedTime" => Self::ModifiedTime,
            "CreatedUser" => Self::CreatedUser,
            "ModifiedUser" => Self::ModifiedUser,
            "AutoNumber" => Self::AutoNumber,
            _ => return None,
        };
        Some(kind)
    }

    /// Kind for a bare type code
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Text,
            2 => Self::Number,
            3 => Self::SingleSelect,
            4 => Self::MultiSelect,
            5 => Self::DateTime,
            7 => Self::Checkbox,
            11 => Self::User,
            13 => Self::Phone,
            15 => Self::Url,
            17 => Self::Attachment,
            18 => Self::SingleLink,
            19 => Self::Lookup,
            20 => Self::Formula,
            21 => Self::DuplexLink,
            22 => Self::Location,
            23 => Self::GroupChat,
            1001 => Self::CreatedTime,
            1002 => Self::ModifiedTime,
            1003 => Self::CreatedUser,
            1004 => Self::ModifiedUser,
            1005 => Self::AutoNumber,
            other => Self::Unknown(other),
        }
    }

    /// The vendor's numeric type code
    pub fn code(&self) -> i64 {
        match self {
            Self::Text | Self::Email | Self::Barcode => 1,
            Self::Number | Self::Progress | Self::Currency | Self::Rating => 2,
            Self::SingleSelect => 3,
            Self::MultiSelect => 4,
            Self::DateTime => 5,
            Self::Checkbox => 7,
            Self::User => 11,
            Self::Phone => 13,
            Self::Url => 15,
            Self::Attachment => 17,
            Self::SingleLink => 18,
            Self::Lookup => 19,
            Self::Formula => 20,
            Self::DuplexLink => 21,
            Self::Location => 22,
            Self::GroupChat => 23,
            Self::CreatedTime => 1001,
            Self::ModifiedTime => 1002,
            Self::CreatedUser => 1003,
            Self::ModifiedUser => 1004,
            Self::AutoNumber => 1005,
            Self::Unknown(code) => *code,
        }
    }

    /// The vendor's UI tag (`"Unknown"` for unrecognized kinds)
    pub fn ui_name(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Email => "Email",
            Self::Barcode => "Barcode",
            Self::Number => "Number",
            Self::Progress => "Progress",
            Self::Currency => "Currency",
            Self::Rating => "Rating",
            Self::SingleSelect => "SingleSelect",
            Self::MultiSelect => "MultiSelect",
            Self::DateTime => "DateTime",
            Self::Checkbox => "Checkbox",
            Self::User => "User",
            Self::Phone => "Phone",
            Self::Url => "Url",
            Self::Attachment => "Attachment",
            Self::SingleLink => "SingleLink",
            Self::Lookup => "Lookup",
            Self::Formula => "Formula",
            Self::DuplexLink => "DuplexLink",
            Self::Location => "Location",
            Self::GroupChat => "GroupChat",
            Self::CreatedTime => "CreatedTime",
            Self::ModifiedTime => "ModifiedTime",
            Self::CreatedUser => "CreatedUser",
            Self::ModifiedUser => "ModifiedUser",
            Self::AutoNumber => "AutoNumber",
            Self::Unknown(_) => "Unknown",
        }
    }

    pub fn class(&self) -> FieldClass {
        match self {
            Self::Text
            | Self::Email
            | Self::Barcode
            | Self::Number
            | Self::SingleSelect
            | Self::MultiSelect
            | Self::DateTime
            | Self::Checkbox
            | Self::Phone
            | Self::Url => FieldClass::Static,
            Self::User
            | Self::Attachment
            | Self::SingleLink
            | Self::Lookup
            | Self::Formula
            | Self::DuplexLink
            | Self::CreatedUser
            | Self::ModifiedUser => FieldClass::Dynamic,
            Self::Progress
            | Self::Currency
            | Self::Rating
            | Self::Location
            | Self::GroupChat
            | Self::CreatedTime
            | Self::ModifiedTime
            | Self::AutoNumber
            | Self::Unknown(_) => FieldClass::Unsupported,
        }
    }

    /// Whether the field is dynamic
    pub fn is_dynamic(&self) -> bool {
        self.class() == FieldClass::Dynamic
    }

    /// Whether the field's values are numbers
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Number | Self::Progress | Self::Currency | Self::Rating
        )
    }

    /// Kind of the field created in the target Base
    pub fn target(&self, preserve_attachments: bool) -> FieldKind {
        match self {
            Self::Attachment if preserve_attachments => Self::Attachment,
            kind if kind.class() == FieldClass::Static => *kind,
            kind if kind.is_numeric() => Self::Number,
            _ => Self::Text,
        }
    }

    /// Whether copying this field changes its type
    pub fn needs_conversion(&self, preserve_attachments: bool) -> bool {
        self.target(preserve_attachments) != *self
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "Unknown({code})"),
            kind => f.write_str(kind.ui_name()),
        }
    }
}
