//! Common test helpers shared across integration tests.
#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use anyhow::{Result, bail};
use parking_lot::Mutex;
use rowbind_orm::{Connection, DataType, Deadline, Field, Row, Statement, entity};

// Common test entities used across multiple test files

entity! {
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Forum {
        pub name: String,
        pub description: Option<String>,
    }
}

entity! {
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Topic {
        pub forum_id: i64,
        pub title: String,
        pub views: i32,
    }
}

entity! {
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct T {
        pub name: String,
        pub description: String,
    }
}

/// Install a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn forum(name: &str, description: Option<&str>) -> Forum {
    Forum {
        name: name.to_string(),
        description: description.map(ToString::to_string),
        ..Forum::default()
    }
}

pub fn row(fields: &[(&str, DataType)]) -> Row {
    Row {
        fields: fields
            .iter()
            .map(|(name, value)| Field {
                name: (*name).to_string(),
                value: value.clone(),
            })
            .collect(),
    }
}

/// A statement as seen by the database.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub sql: String,
    pub types: String,
    pub values: Vec<DataType>,
}

#[derive(Debug, Default)]
struct Inner {
    log: Vec<Executed>,
    existing: HashSet<(String, i64)>,
    next_id: i64,
    queued: VecDeque<Vec<Row>>,
    fail_on: Vec<String>,
    stale_writes: bool,
    open: usize,
    max_open: usize,
}

/// In-memory stand-in for a database. Existence checks, inserts and deletes
/// are answered from a set of `(table, id)` keys; other selects return queued
/// row sets.
#[derive(Debug, Clone, Default)]
pub struct RecordingConnection {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingConnection {
    pub fn new() -> Self {
        let conn = Self::default();
        conn.inner.lock().next_id = 1;
        conn
    }

    /// Pretend a row with `id` exists in `table`.
    pub fn with_row(self, table: &str, id: i64) -> Self {
        self.inner.lock().existing.insert((table.to_string(), id));
        self
    }

    /// Fail every statement whose SQL contains `fragment`.
    pub fn fail_on(self, fragment: &str) -> Self {
        self.inner.lock().fail_on.push(fragment.to_string());
        self
    }

    /// Existence checks still see rows, but updates and deletes match none,
    /// as if another client removed the row in between.
    pub fn stale_writes(self) -> Self {
        self.inner.lock().stale_writes = true;
        self
    }

    /// Rows returned by the next data select.
    pub fn queue_rows(&self, rows: Vec<Row>) {
        self.inner.lock().queued.push_back(rows);
    }

    pub fn log(&self) -> Vec<Executed> {
        self.inner.lock().log.clone()
    }

    pub fn exists(&self, table: &str, id: i64) -> bool {
        self.inner.lock().existing.contains(&(table.to_string(), id))
    }

    pub fn max_open(&self) -> usize {
        self.inner.lock().max_open
    }

    pub fn open(&self) -> usize {
        self.inner.lock().open
    }
}

impl Connection for RecordingConnection {
    fn prepare(&self, sql: &str, deadline: Deadline) -> Result<Box<dyn Statement>> {
        deadline.check()?;

        let mut inner = self.inner.lock();
        if inner.fail_on.iter().any(|fragment| sql.contains(fragment.as_str())) {
            bail!("simulated failure preparing {sql}");
        }
        inner.open += 1;
        inner.max_open = inner.max_open.max(inner.open);
        drop(inner);

        Ok(Box::new(RecordingStatement {
            inner: Arc::clone(&self.inner),
            sql: sql.to_string(),
            deadline,
            values: Vec::new(),
            rows: VecDeque::new(),
            row_count: 0,
            insert_id: None,
        }))
    }
}

#[derive(Debug)]
struct RecordingStatement {
    inner: Arc<Mutex<Inner>>,
    sql: String,
    deadline: Deadline,
    values: Vec<DataType>,
    rows: VecDeque<Row>,
    row_count: usize,
    insert_id: Option<i64>,
}

fn table_of(sql: &str) -> String {
    for marker in ["INTO `", "UPDATE `", "FROM `"] {
        if let Some(start) = sql.find(marker) {
            let rest = &sql[start + marker.len()..];
            return rest.split('`').next().unwrap_or_default().to_string();
        }
    }
    String::new()
}

fn last_int(values: &[DataType]) -> Option<i64> {
    match values.last() {
        Some(DataType::Int(id)) => Some(*id),
        _ => None,
    }
}

impl Statement for RecordingStatement {
    fn bind(&mut self, types: &str, values: Vec<DataType>) -> Result<()> {
        if types.chars().count() != values.len() {
            bail!("signature/value mismatch");
        }
        self.inner.lock().log.push(Executed {
            sql: self.sql.clone(),
            types: types.to_string(),
            values: values.clone(),
        });
        self.values = values;
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        self.deadline.check()?;

        let mut inner = self.inner.lock();
        let table = table_of(&self.sql);

        if self.sql.starts_with("INSERT") {
            let id = inner.next_id;
            inner.next_id += 1;
            inner.existing.insert((table, id));
            self.row_count = 1;
            self.insert_id = Some(id);
        } else if self.sql.starts_with("UPDATE") {
            let id = last_int(&self.values).unwrap_or_default();
            let found = !inner.stale_writes && inner.existing.contains(&(table, id));
            self.row_count = usize::from(found);
        } else if self.sql.starts_with("DELETE") {
            let id = last_int(&self.values).unwrap_or_default();
            let found = !inner.stale_writes && inner.existing.remove(&(table, id));
            self.row_count = usize::from(found);
        } else if self.sql.starts_with("SELECT `id` FROM") {
            let id = last_int(&self.values).unwrap_or_default();
            self.row_count = usize::from(inner.existing.contains(&(table, id)));
        } else {
            self.rows = inner.queued.pop_front().unwrap_or_default().into();
            self.row_count = self.rows.len();
        }
        drop(inner);
        Ok(())
    }

    fn fetch_row(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.pop_front())
    }

    fn row_count(&self) -> usize {
        self.row_count
    }

    fn insert_id(&self) -> Option<i64> {
        self.insert_id
    }
}

impl Drop for RecordingStatement {
    fn drop(&mut self) {
        self.inner.lock().open -= 1;
    }
}

/// Normalize SQL by collapsing whitespace.
fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonicalize SQL for comparison by removing identifier quotes and normalizing whitespace.
/// Preserves quotes inside string literals.
pub fn canonicalize_sql(sql: &str) -> String {
    let mut cleaned = String::with_capacity(sql.len());
    let mut in_single_quote = false;

    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_single_quote = !in_single_quote;
                cleaned.push(ch);
            }
            '`' if !in_single_quote => {
                // Strip identifier quoting to avoid brittle comparisons.
            }
            _ => cleaned.push(ch),
        }
    }

    normalize_sql(&cleaned)
}

/// Assert that SQL contains all expected fragments in order.
///
/// Strips identifier quotes, normalizes whitespace, and checks that fragments
/// appear sequentially in the generated SQL.
#[allow(clippy::missing_panics_doc)]
pub fn assert_sql_contains(actual: &str, fragments: &[&str]) {
    let actual_canonical = canonicalize_sql(actual);
    let mut search_start = 0usize;

    for fragment in fragments {
        let fragment_canonical = canonicalize_sql(fragment);
        if fragment_canonical.is_empty() {
            continue;
        }

        if let Some(pos) = actual_canonical[search_start..].find(&fragment_canonical) {
            search_start += pos + fragment_canonical.len();
        } else {
            panic!(
                "expected SQL fragment `{fragment_canonical}` not found in `{actual_canonical}`"
            );
        }
    }
}
