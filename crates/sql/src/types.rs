use std::fmt;

/// A value crossing the boundary between the ORM and a backend, either as a
/// bound parameter or as a column of a fetched row.
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    /// 64-bit signed integer.
    Int(i64),
    /// Double precision float.
    Double(f64),
    /// UTF-8 text.
    Str(String),
    /// Raw bytes.
    Binary(Vec<u8>),
    /// SQL `NULL`.
    Null,
}

impl DataType {
    /// The single-character bind tag for this value (`i`, `d`, `s` or `b`).
    ///
    /// `NULL` carries the string tag; backends send it as `NULL` regardless
    /// of the declared tag.
    #[must_use]
    pub const fn tag(&self) -> char {
        match self {
            Self::Int(_) => 'i',
            Self::Double(_) => 'd',
            Self::Str(_) | Self::Null => 's',
            Self::Binary(_) => 'b',
        }
    }

    /// Whether a value with this tag may be bound under `tag`.
    #[must_use]
    pub const fn accepts(&self, tag: char) -> bool {
        matches!(self, Self::Null) || self.tag() == tag
    }

    /// Short type name used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "integer",
            Self::Double(_) => "double",
            Self::Str(_) => "string",
            Self::Binary(_) => "binary",
            Self::Null => "null",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "'{v}'"),
            Self::Binary(v) => write!(f, "<{} bytes>", v.len()),
            Self::Null => f.write_str("NULL"),
        }
    }
}

/// A named column value within a [`Row`].
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Column name as reported by the backend.
    pub name: String,
    /// Column value.
    pub value: DataType,
}

/// One row of a result set, columns in select-list order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// The row's columns.
    pub fields: Vec<Field>,
}

impl Row {
    /// Looks up a column by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DataType> {
        self.fields.iter().find(|field| field.name == name).map(|field| &field.value)
    }
}
