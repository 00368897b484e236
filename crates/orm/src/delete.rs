use sea_query::{Alias, Expr, ExprTrait, SimpleExpr};

use crate::error::Result;
use crate::query::{self, Query};

/// Builder for constructing DELETE queries keyed by primary key.
pub struct DeleteBuilder<'a> {
    table: &'a str,
    id: Option<i64>,
}

impl<'a> DeleteBuilder<'a> {
    /// Creates a new DELETE query builder for `table`.
    #[must_use]
    pub const fn new(table: &'a str) -> Self {
        Self { table, id: None }
    }

    /// Restricts the delete to the row with primary key `id`.
    #[must_use]
    pub const fn by_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Build the DELETE query.
    ///
    /// # Errors
    ///
    /// Returns an error if query values cannot be converted to bind values.
    pub fn build(self) -> Result<Query> {
        let mut statement = sea_query::Query::delete();
        statement.from_table(Alias::new(self.table));

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
            "DeleteBuilder generated SQL"
        );

        Ok(query)
    }
}
