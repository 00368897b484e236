//! Default `SQLite` implementation of the SQL capability.
//!
//! This is a lightweight implementation for development and test use.

#![allow(clippy::significant_drop_tightening)]

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use fromenv::FromEnv;
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection as SqliteConnection, params_from_iter};
use tracing::instrument;

use crate::resource::{Connection, Deadline, Statement};
use crate::types::{DataType, Field, Row};

/// Options used to connect to the SQL database.
///
/// This struct is used to load connection options from environment variables.
#[derive(Debug, Clone, FromEnv)]
pub struct ConnectOptions {
    /// Database path or URI.
    #[env(from = "SQL_DATABASE", default = ":memory:")]
    pub database: String,
}

impl ConnectOptions {
    /// Load options from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but malformed.
    pub fn load() -> Result<Self> {
        Self::from_env().finalize().context("issue loading connection options")
    }
}

/// Default `SQLite` backend.
#[derive(Debug, Clone)]
pub struct SqlDefault {
    // Mutex is necessary since rusqlite::Connection isn't `Sync`
    conn: Arc<Mutex<SqliteConnection>>,
}

impl SqlDefault {
    /// Connect using options read from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the options cannot be loaded or the database
    /// cannot be opened.
    pub fn connect() -> Result<Self> {
        Self::connect_with(ConnectOptions::load()?)
    }

    /// Connect with explicit options.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    #[instrument]
    pub fn connect_with(options: ConnectOptions) -> Result<Self> {
        tracing::debug!("initializing SQLite connection to: {}", options.database);

        let conn =
            SqliteConnection::open(&options.database).context("failed to open SQLite database")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run one or more semicolon-separated statements without parameters,
    /// typically schema setup.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        tracing::debug!("executing batch: {sql}");
        self.conn.lock().execute_batch(sql).context("failed to execute batch")
    }
}

impl Connection for SqlDefault {
    fn prepare(&self, sql: &str, deadline: Deadline) -> Result<Box<dyn Statement>> {
        tracing::debug!("preparing statement: {sql}");
        deadline.check()?;

        // surface syntax and schema errors at prepare time
        self.conn.lock().prepare(sql).context("failed to prepare statement")?;

        Ok(Box::new(SqliteStatement {
            conn: Arc::clone(&self.conn),
            sql: sql.to_string(),
            deadline,
            params: Vec::new(),
            rows: VecDeque::new(),
            row_count: 0,
            insert_id: None,
            executed: false,
        }))
    }
}

#[derive(Debug)]
struct SqliteStatement {
    conn: Arc<Mutex<SqliteConnection>>,
    sql: String,
    deadline: Deadline,
    params: Vec<DataType>,
    rows: VecDeque<Row>,
    row_count: usize,
    insert_id: Option<i64>,
    executed: bool,
}

impl SqliteStatement {
    fn is_insert(&self) -> bool {
        self.sql.trim_start().get(..6).is_some_and(|verb| verb.eq_ignore_ascii_case("insert"))
    }
}

impl Statement for SqliteStatement {
    fn bind(&mut self, types: &str, values: Vec<DataType>) -> Result<()> {
        let tags: Vec<char> = types.chars().collect();
        if tags.len() != values.len() {
            bail!("bind signature has {} tags for {} values", tags.len(), values.len());
        }
        for (pos, (tag, value)) in tags.iter().zip(&values).enumerate() {
            if !value.accepts(*tag) {
                bail!("parameter {pos} is {} but was tagged '{tag}'", value.kind());
            }
        }

        self.params = values;
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        tracing::debug!("executing statement: {}", self.sql);
        self.deadline.check()?;

        let conn = Arc::clone(&self.conn);
        let conn = conn.lock();
        let mut stmt = conn.prepare(&self.sql).context("failed to prepare statement")?;

        let sqlite_params: Vec<_> = self.params.iter().map(datatype_to_rusqlite_value).collect();

        if stmt.column_count() == 0 {
            let affected = stmt
                .execute(params_from_iter(sqlite_params.iter()))
                .context("failed to execute statement")?;

            self.row_count = affected;
            self.insert_id = (self.is_insert() && affected > 0).then(|| conn.last_insert_rowid());
        } else {
            let column_names: Vec<String> =
                stmt.column_names().iter().map(ToString::to_string).collect();

            let mut rows = stmt
                .query(params_from_iter(sqlite_params.iter()))
                .context("failed to execute query")?;

            let mut buffered = VecDeque::new();
            while let Some(row) = rows.next().context("failed to fetch row")? {
                let mut fields = Vec::with_capacity(column_names.len());
                for (i, name) in column_names.iter().enumerate() {
                    let value = row.get_ref(i).context("failed to get column value")?;
                    fields.push(Field {
                        name: name.clone(),
                        value: rusqlite_value_to_datatype(value)?,
                    });
                }
                buffered.push_back(Row { fields });
            }

            self.row_count = buffered.len();
            self.rows = buffered;
        }

        self.executed = true;
        Ok(())
    }

    fn fetch_row(&mut self) -> Result<Option<Row>> {
        if !self.executed {
            bail!("statement has not been executed");
        }
        Ok(self.rows.pop_front())
    }

    fn row_count(&self) -> usize {
        self.row_count
    }

    fn insert_id(&self) -> Option<i64> {
        self.insert_id
    }
}

fn datatype_to_rusqlite_value(dt: &DataType) -> rusqlite::types::Value {
    match dt {
        DataType::Int(i) => rusqlite::types::Value::Integer(*i),
        DataType::Double(f) => rusqlite::types::Value::Real(*f),
        DataType::Str(s) => rusqlite::types::Value::Text(s.clone()),
        DataType::Binary(b) => rusqlite::types::Value::Blob(b.clone()),
        DataType::Null => rusqlite::types::Value::Null,
    }
}

fn rusqlite_value_to_datatype(value: ValueRef) -> Result<DataType> {
    match value {
        ValueRef::Null => Ok(DataType::Null),
        ValueRef::Integer(i) => Ok(DataType::Int(i)),
        ValueRef::Real(f) => Ok(DataType::Double(f)),
        ValueRef::Text(t) => {
            let s = std::str::from_utf8(t).context("invalid UTF-8 in text value")?;
            Ok(DataType::Str(s.to_string()))
        }
        ValueRef::Blob(b) => Ok(DataType::Binary(b.to_vec())),
    }
}
