use sea_query::{Alias, SimpleExpr, Value};

use crate::error::{Error, Result};
use crate::query::{self, Query};
use crate::value::Param;

/// Builder for constructing INSERT queries.
pub struct InsertBuilder<'a> {
    table: &'a str,
    values: Vec<(&'a str, Param)>,
}

impl<'a> InsertBuilder<'a> {
    /// Creates a new INSERT query builder for `table`.
    #[must_use]
    pub const fn new(table: &'a str) -> Self {
        Self {
            table,
            values: Vec::new(),
        }
    }

    /// Sets a column value for the insert.
    #[must_use]
    pub fn set(mut self, column: &'a str, value: impl Into<Param>) -> Self {
        self.values.push((column, value.into()));
        self
    }

    /// Sets column values in order.
    #[must_use]
    pub fn values(mut self, values: impl IntoIterator<Item = (&'a str, Param)>) -> Self {
        self.values.extend(values);
        self
    }

    /// Build the INSERT query.
    ///
    /// # Errors
    ///
    /// Returns an error if no values were set or values cannot be converted
    /// to bind values.
    pub fn build(self) -> Result<Query> {
        let mut statement = sea_query::Query::insert();
        statement.into_table(Alias::new(self.table));

        let columns: Vec<_> = self.values.iter().map(|(column, _)| Alias::new(*column)).collect();
        let row: Vec<SimpleExpr> = self
            .values
            .into_iter()
            .map(|(_, value)| SimpleExpr::Value(Value::from(value)))
            .collect();

        statement.columns(columns);
        statement
            .values(row)
            .map_err(|e| Error::mapping(self.table, format!("cannot build insert: {e}")))?;

        let (sql, values) = statement.build(query::writer());
        let query = query::from_parts(sql, values)?;

        tracing::debug!(
            table = self.table,
            sql = %query.sql,
            param_count = query.params.len(),
            "InsertBuilder generated SQL"
        );

        Ok(query)
    }
}
