use sea_query::{Alias, Expr, ExprTrait, SimpleExpr};

use crate::entity::is_identifier;
use crate::error::{Error, Result};
use crate::predicate::{Predicate, compile_where};
use crate::query::{self, Query};
use crate::value::Param;

enum Selection<'a> {
    All,
    Id(i64),
    Matching(&'a [Predicate]),
}

/// Builder for constructing SELECT queries.
pub struct SelectBuilder<'a> {
    table: &'a str,
    columns: Vec<&'a str>,
    selection: Selection<'a>,
    page: Option<(u32, u32)>,
}

impl<'a> SelectBuilder<'a> {
    /// Creates a new SELECT query builder for `table`.
    #[must_use]
    pub const fn new(table: &'a str) -> Self {
        Self {
            table,
            columns: Vec::new(),
            selection: Selection::All,
            page: None,
        }
    }

    /// Adds a column to the select list.
    #[must_use]
    pub fn column(mut self, column: &'a str) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds columns to the select list, in order.
    #[must_use]
    pub fn columns(mut self, columns: impl IntoIterator<Item = &'a str>) -> Self {
        self.columns.extend(columns);
        self
    }

    /// Restricts the select to the row with primary key `id`.
    #[must_use]
    pub const fn by_id(mut self, id: i64) -> Self {
        self.selection = Selection::Id(id);
        self
    }

    /// Restricts the select with a predicate list.
    #[must_use]
    pub const fn matching(mut self, predicates: &'a [Predicate]) -> Self {
        self.selection = Selection::Matching(predicates);
        self
    }

    /// Appends `LIMIT ?, ?` with `offset` bound first.
    #[must_use]
    pub const fn page(mut self, offset: u32, limit: u32) -> Self {
        self.page = Some((offset, limit));
        self
    }

    /// Build the SELECT query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownColumn`] if a predicate key is not a plain
    /// identifier, or an error if query values cannot be converted to bind
    /// values.
    pub fn build(self) -> Result<Query> {
        if let Selection::Matching(predicates) = self.selection
            && let Some(bad) = predicates.iter().find(|p| !is_identifier(p.key()))
        {
            return Err(Error::UnknownColumn {
                entity: self.table.to_string(),
                column: bad.key().to_string(),
            });
        }

        let mut statement = sea_query::Query::select();

        for column in &self.columns {
            statement.column(Alias::new(*column));
        }
        statement.from(Alias::new(self.table));

        if let Selection::Id(id) = self.selection {
            let column: SimpleExpr = Expr::col(Alias::new("id")).into();
            statement.and_where(column.eq(id));
        }

        let (mut sql, values) = statement.build(query::writer());
        let mut extra = Vec::new();

        if let Selection::Matching(predicates) = self.selection
            && !predicates.is_empty()
        {
            let (clause, params) = compile_where(predicates);
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
            extra.extend(params);
        }

        if let Some((offset, limit)) = self.page {
            sql.push_str(" LIMIT ?, ?");
            extra.push(Param::Int(i64::from(offset)));
            extra.push(Param::Int(i64::from(limit)));
        }

        let mut query = query::from_parts(sql, values)?;
        query.params.extend(extra.into_iter().map(Into::into));

        tracing::debug!(
            table = self.table,
            sql = %query.sql,
            param_count = query.params.len(),
            "SelectBuilder generated SQL"
        );

        Ok(query)
    }
}
