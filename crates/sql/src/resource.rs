use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Result, bail};

use crate::types::{DataType, Row};

/// SQL providers implement the [`Connection`] trait to hand out prepared
/// statements against a backend (`SQLite`, `MySQL`, etc).
pub trait Connection: Debug + Send + Sync + 'static {
    /// Prepare `sql` for a single bind/execute/fetch cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the statement or `deadline`
    /// has already passed.
    fn prepare(&self, sql: &str, deadline: Deadline) -> Result<Box<dyn Statement>>;
}

/// A prepared statement. Dropping it releases any backend resources.
pub trait Statement: Debug + Send {
    /// Bind positional parameters. `types` carries one tag per value.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag and value sequences disagree.
    fn bind(&mut self, types: &str, values: Vec<DataType>) -> Result<()>;

    /// Execute the statement with the bound parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if execution fails or the deadline has passed.
    fn execute(&mut self) -> Result<()>;

    /// Fetch the next result row, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement has not been executed.
    fn fetch_row(&mut self) -> Result<Option<Row>>;

    /// Number of rows produced by a read, or affected by a write.
    fn row_count(&self) -> usize;

    /// The key generated by the last `INSERT`, when the backend reports one.
    fn insert_id(&self) -> Option<i64>;

    /// Release the statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to release the statement.
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Cooperative cancellation flag shared between a caller and the statements
/// it runs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every statement observing this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether [`CancelToken::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Point in time (and/or cancellation token) after which a statement must
/// not start work.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    at: Option<Instant>,
    cancel: Option<CancelToken>,
}

impl Deadline {
    /// No deadline.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Expires at `at`.
    #[must_use]
    pub fn at(at: Instant) -> Self {
        Self {
            at: Some(at),
            cancel: None,
        }
    }

    /// Expires `timeout` from now.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    /// Also expire when `token` is cancelled.
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Fails once the deadline has passed or the token was cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error describing why work must stop.
    pub fn check(&self) -> Result<()> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            bail!("statement cancelled");
        }
        if self.at.is_some_and(|at| Instant::now() >= at) {
            bail!("statement deadline exceeded");
        }
        Ok(())
    }
}
