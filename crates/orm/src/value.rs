use rowbind_sql::DataType;
use sea_query::Value;

use crate::error::{Error, Result};

/// A typed statement parameter or column value.
///
/// Entity accessors produce these directly, so the bind tag of every value
/// is known when the statement is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// Integer column (`i`).
    Int(i64),
    /// Text column (`s`).
    Str(String),
    /// SQL `NULL`.
    Null,
}

impl Param {
    /// Short type name used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "integer",
            Self::Str(_) => "string",
            Self::Null => "null",
        }
    }

    /// Convert a fetched column into a parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedType`] for doubles and binary values.
    pub fn from_column(column: &str, value: DataType) -> Result<Self> {
        match value {
            DataType::Int(v) => Ok(Self::Int(v)),
            DataType::Str(v) => Ok(Self::Str(v)),
            DataType::Null => Ok(Self::Null),
            other @ (DataType::Double(_) | DataType::Binary(_)) => Err(Error::UnsupportedType {
                column: column.to_string(),
                expected: "integer, string or null",
                found: other.kind(),
            }),
        }
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Param {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl<T: Into<Self>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<Param> for DataType {
    fn from(param: Param) -> Self {
        match param {
            Param::Int(v) => Self::Int(v),
            Param::Str(v) => Self::Str(v),
            Param::Null => Self::Null,
        }
    }
}

impl From<Param> for Value {
    fn from(param: Param) -> Self {
        match param {
            Param::Int(v) => Self::BigInt(Some(v)),
            Param::Str(v) => Self::String(Some(Box::new(v))),
            Param::Null => Self::String(None),
        }
    }
}

/// Trait for field types that can be populated from a [`Param`].
pub trait FromParam: Sized {
    /// Convert `param`, read from `column`, into `Self`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedType`] if the value has the wrong type.
    fn from_param(param: Param, column: &str) -> Result<Self>;
}

fn mismatch(column: &str, expected: &'static str, found: &Param) -> Error {
    Error::UnsupportedType {
        column: column.to_string(),
        expected,
        found: found.kind(),
    }
}

impl FromParam for i64 {
    fn from_param(param: Param, column: &str) -> Result<Self> {
        match param {
            Param::Int(v) => Ok(v),
            other => Err(mismatch(column, "integer", &other)),
        }
    }
}

impl FromParam for i32 {
    fn from_param(param: Param, column: &str) -> Result<Self> {
        match param {
            Param::Int(v) => Self::try_from(v).map_err(|_e| Error::UnsupportedType {
                column: column.to_string(),
                expected: "32-bit integer",
                found: "out-of-range integer",
            }),
            other => Err(mismatch(column, "integer", &other)),
        }
    }
}

impl FromParam for String {
    fn from_param(param: Param, column: &str) -> Result<Self> {
        match param {
            Param::Str(v) => Ok(v),
            other => Err(mismatch(column, "string", &other)),
        }
    }
}

impl<T: FromParam> FromParam for Option<T> {
    fn from_param(param: Param, column: &str) -> Result<Self> {
        match param {
            Param::Null => Ok(None),
            other => Ok(Some(T::from_param(other, column)?)),
        }
    }
}

// Outbound conversion of values collected by the statement writer
pub(crate) fn values_to_datatypes(values: sea_query::Values) -> Result<Vec<DataType>> {
    values.into_iter().map(value_to_datatype).collect()
}

fn value_to_datatype(value: Value) -> Result<DataType> {
    let data_type = match value {
        Value::TinyInt(v) => v.map_or(DataType::Null, |v| DataType::Int(i64::from(v))),
        Value::SmallInt(v) => v.map_or(DataType::Null, |v| DataType::Int(i64::from(v))),
        Value::Int(v) => v.map_or(DataType::Null, |v| DataType::Int(i64::from(v))),
        Value::BigInt(v) => v.map_or(DataType::Null, DataType::Int),
        Value::String(v) => v.map_or(DataType::Null, |v| DataType::Str(*v)),
        other => {
            return Err(Error::UnsupportedType {
                column: "<parameter>".to_string(),
                expected: "integer, string or null",
                found: value_kind(&other),
            });
        }
    };
    Ok(data_type)
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "boolean",
        Value::Float(_) | Value::Double(_) => "float",
        Value::Bytes(_) => "binary",
        Value::Char(_) => "char",
        _ => "unsupported value",
    }
}
