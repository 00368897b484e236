use sea_query::{Alias, Expr, ExprTrait, SimpleExpr, Value};

use crate::error::Result;
use crate::query::{self, Query};
use crate::value::Param;

/// Builder for constructing UPDATE queries keyed by primary key.
pub struct UpdateBuilder<'a> {
    table: &'a str,
    set_clauses: Vec<(&'a str, Param)>,
    id: Option<i64>,
}

impl<'a> UpdateBuilder<'a> {
    /// Creates a new UPDATE query builder for `table`.
    #[must_use]
    pub const fn new(table: &'a str) -> Self {
        Self {
            table,
            set_clauses: Vec::new(),
            id: None,
        }
    }

    /// Sets a column to a new value.
    #[must_use]
    pub fn set(mut self, column: &'a str, value: impl Into<Param>) -> Self {
        self.set_clauses.push((column, value.into()));
        self
    }

    /// Sets columns in order.
    #[must_use]
    pub fn values(mut self, values: impl IntoIterator<Item = (&'a str, Param)>) -> Self {
        self.set_clauses.extend(values);
        self
    }

    /// Restricts the update to the row with primary key `id`. The id is
    /// bound after every SET value.
    #[must_use]
    pub const fn by_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Build the UPDATE query.
    ///
    /// # Errors
    ///
    /// Returns an error if query values cannot be converted to bind values.
    pub fn build(self) -> Result<Query> {
        let mut statement = sea_query::Query::update();
        statement.table(Alias::new(self.table));

        for (column, value) in self.set_clauses {
            statement.value(Alias::new(column), Value::from(value));
        }

        if let Some(id) = self.id {
            let column: SimpleExpr = Expr::col(Alias::new("id")).into();
            statement.and_where(column.eq(id));
        }

        let (sql, values) = statement.build(query::writer());
        let query = query::from_parts(sql, values)?;

        tracing::debug!(
            table = self.table,
            sql = %query.sql,
            param_count = query.params.len(),
            "UpdateBuilder generated SQL"
        );

        Ok(query)
    }
}
