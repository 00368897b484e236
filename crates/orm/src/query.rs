use rowbind_sql::DataType;
use sea_query::{MysqlQueryBuilder, Values};

use crate::error::{Error, Result};
use crate::value::values_to_datatypes;

/// A generated statement and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// SQL text with `?` placeholders.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<DataType>,
}

impl Query {
    /// The bind signature: one tag per parameter, in parameter order.
    #[must_use]
    pub fn type_tags(&self) -> String {
        self.params.iter().map(DataType::tag).collect()
    }

    /// Number of `?` placeholders in the SQL text.
    #[must_use]
    pub fn placeholders(&self) -> usize {
        self.sql.matches('?').count()
    }

    /// Split into the pieces handed to a statement's bind call, checking
    /// that placeholders, tags and values agree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Binding`] on any disagreement.
    pub fn bindings(&self) -> Result<(String, Vec<DataType>)> {
        let types = self.type_tags();
        let (placeholders, tags, values) =
            (self.placeholders(), types.chars().count(), self.params.len());

        if placeholders != values || tags != values {
            return Err(Error::Binding {
                placeholders,
                tags,
                values,
            });
        }
        Ok((types, self.params.clone()))
    }
}

/// Statement writer for the generated dialect: back-quoted identifiers and
/// positional `?` placeholders.
pub(crate) const fn writer() -> MysqlQueryBuilder {
    MysqlQueryBuilder
}

pub(crate) fn from_parts(sql: String, values: Values) -> Result<Query> {
    Ok(Query {
        sql,
        params: values_to_datatypes(values)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_follow_parameters() {
        let query = Query {
            sql: "UPDATE `forum` SET `name` = ?, `position` = ? WHERE `id` = ?".to_string(),
            params: vec![DataType::Str("a".to_string()), DataType::Int(1), DataType::Int(7)],
        };

        assert_eq!(query.type_tags(), "sii");
        let (types, values) = query.bindings().unwrap();
        assert_eq!(types, "sii");
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn misaligned_query_is_a_binding_error() {
        let query = Query {
            sql: "SELECT `id` FROM `forum` WHERE `id` = ? AND `name` = ?".to_string(),
            params: vec![DataType::Int(1)],
        };

        let err = query.bindings().unwrap_err();
        assert!(matches!(err, Error::Binding { placeholders: 2, tags: 1, values: 1 }));
    }
}
