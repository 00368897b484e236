//! # Entity manager
//!
//! Tracks entities pending a write and flushes them one statement cycle at a
//! time through a [`Connection`]. Reads hydrate fresh entities from rows.
//!
//! Callers must not hold an entity's lock while calling [`EntityManager::flush`]
//! or [`EntityManager::remove`]; both lock tracked entities briefly.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rowbind_sql::{CancelToken, Connection, DataType, Deadline, Row, Statement};
use tracing::instrument;

use crate::delete::DeleteBuilder;
use crate::entity::{Entity, EntityRef, Mapping};
use crate::error::{Error, Result};
use crate::insert::InsertBuilder;
use crate::predicate::Predicate;
use crate::query::Query;
use crate::select::SelectBuilder;
use crate::update::UpdateBuilder;
use crate::value::{FromParam, Param};

/// Rows skipped by [`EntityManager::get_entities`] when no offset is given.
pub const DEFAULT_OFFSET: u32 = 0;

/// Rows returned by [`EntityManager::get_entities`] when no limit is given.
pub const DEFAULT_LIMIT: u32 = 10;

/// What a flush did with one tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// A new row was written. `id` is the key reported by the store.
    Inserted { id: Option<i64> },
    /// The existing row was updated.
    Updated,
    /// The existing row was deleted.
    Deleted,
    /// Nothing written: no row was behind a pending delete, or the row
    /// disappeared before its update or delete ran.
    Skipped,
}

/// Flush result for one tracked entity.
#[derive(Debug)]
pub struct Flushed {
    /// Table the entity maps to.
    pub table: String,
    /// Primary key after the flush.
    pub id: Option<i64>,
    /// The write performed, or why it failed.
    pub result: Result<Action>,
}

/// Per-entity results of one flush pass, in tracking order.
#[derive(Debug, Default)]
pub struct FlushReport {
    entries: Vec<Flushed>,
}

impl FlushReport {
    /// All entries.
    #[must_use]
    pub fn entries(&self) -> &[Flushed] {
        &self.entries
    }

    /// Number of entities processed.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was processed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose write failed.
    pub fn failures(&self) -> impl Iterator<Item = &Flushed> {
        self.entries.iter().filter(|entry| entry.result.is_err())
    }

    /// Whether every write succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// The actions taken, or the first failure.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failed entry.
    pub fn into_result(self) -> Result<Vec<Action>> {
        self.entries.into_iter().map(|entry| entry.result).collect()
    }
}

// Field values copied out of a tracked entity at the start of its write.
struct Snapshot {
    table: String,
    id: Option<i64>,
    pending_delete: bool,
    values: Vec<(&'static str, Param)>,
}

// Type-erased view of a tracked entity.
trait Pending: Send + Sync {
    fn addr(&self) -> *const ();
    fn snapshot(&self) -> Option<Snapshot>;
    fn assign_id(&self, id: i64);
}

struct Tracked<E: Entity> {
    entity: Weak<Mutex<E>>,
    mapping: Arc<Mapping<E>>,
}

impl<E: Entity> Pending for Tracked<E> {
    fn addr(&self) -> *const () {
        self.entity.as_ptr().cast()
    }

    fn snapshot(&self) -> Option<Snapshot> {
        let entity = self.entity.upgrade()?;
        let entity = entity.lock();
        Some(Snapshot {
            table: self.mapping.table.clone(),
            id: entity.id(),
            pending_delete: entity.pending_delete(),
            values: self.mapping.values(&entity),
        })
    }

    fn assign_id(&self, id: i64) {
        if let Some(entity) = self.entity.upgrade() {
            entity.lock().set_id(id);
        }
    }
}

#[derive(Clone, Copy)]
enum Fetch {
    Nothing,
    One,
    All,
}

struct Outcome {
    rows: Vec<Row>,
    row_count: usize,
    insert_id: Option<i64>,
}

/// Unit of work over a database [`Connection`].
pub struct EntityManager {
    conn: Arc<dyn Connection>,
    tracked: Mutex<Vec<Box<dyn Pending>>>,
    mappings: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    // serialises prepare/bind/execute/fetch/close cycles
    cycle: Mutex<()>,
    timeout: Option<Duration>,
    cancel: Option<CancelToken>,
}

impl fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityManager")
            .field("conn", &self.conn)
            .field("tracked", &self.tracked.lock().len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl EntityManager {
    /// Creates a manager over `conn` with an empty tracked set.
    #[must_use]
    pub fn new(conn: Arc<dyn Connection>) -> Self {
        Self {
            conn,
            tracked: Mutex::new(Vec::new()),
            mappings: Mutex::new(HashMap::new()),
            cycle: Mutex::new(()),
            timeout: None,
            cancel: None,
        }
    }

    /// Fail any statement that has not started within `timeout` of being
    /// prepared.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fail statements once `token` is cancelled.
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Validate and cache the mapping for `E`.
    ///
    /// Registration also happens implicitly on first use of a type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mapping`] if the entity's fields and accessors
    /// disagree.
    pub fn register<E: Entity>(&self) -> Result<()> {
        self.mapping::<E>().map(|_| ())
    }

    /// Track `entity` for the next flush. Tracking the same handle twice has
    /// no effect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mapping`] if `E` cannot be mapped.
    pub fn persist<E: Entity>(&self, entity: &EntityRef<E>) -> Result<()> {
        let mapping = self.mapping::<E>()?;
        let addr = Arc::as_ptr(entity).cast::<()>();

        let mut tracked = self.tracked.lock();
        if tracked.iter().any(|pending| std::ptr::eq(pending.addr(), addr)) {
            return Ok(());
        }
        tracked.push(Box::new(Tracked {
            entity: Arc::downgrade(entity),
            mapping,
        }));
        drop(tracked);
        Ok(())
    }

    /// Mark `entity` for deletion and track it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mapping`] if `E` cannot be mapped.
    pub fn remove<E: Entity>(&self, entity: &EntityRef<E>) -> Result<()> {
        entity.lock().set_pending_delete(true);
        self.persist(entity)
    }

    /// Number of entities awaiting the next flush.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.tracked.lock().len()
    }

    /// Write every tracked entity and clear the tracked set.
    ///
    /// Each entity is processed independently: a failed statement is recorded
    /// in the report and the pass moves on to the next entity.
    #[instrument(skip(self))]
    pub fn flush(&self) -> FlushReport {
        let pending = std::mem::take(&mut *self.tracked.lock());
        let mut entries = Vec::with_capacity(pending.len());

        for tracked in pending {
            let Some(snapshot) = tracked.snapshot() else {
                tracing::debug!("skipping entity dropped before flush");
                continue;
            };

            let result = self.write(tracked.as_ref(), &snapshot);
            let id = match &result {
                Ok(Action::Inserted { id: Some(id) }) => Some(*id),
                _ => snapshot.id,
            };
            if let Err(err) = &result {
                tracing::warn!(table = %snapshot.table, id = ?snapshot.id, "flush failed: {err}");
            }

            entries.push(Flushed {
                table: snapshot.table,
                id,
                result,
            });
        }

        FlushReport { entries }
    }

    /// Fetch the `E` with primary key `id`, or `None` if there is no such row.
    ///
    /// # Errors
    ///
    /// Returns an error if `E` cannot be mapped, the statement fails, or a
    /// column cannot be converted.
    #[instrument(skip(self))]
    pub fn get_entity<E: Entity>(&self, id: i64) -> Result<Option<E>> {
        let mapping = self.mapping::<E>()?;
        let query = SelectBuilder::new(&mapping.table).columns(mapping.columns()).by_id(id).build()?;

        let outcome = self.run(&query, Fetch::One)?;
        outcome.rows.into_iter().next().map(|row| hydrate(&mapping, row)).transpose()
    }

    /// Fetch the `E` with primary key `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if there is no such row, otherwise as
    /// [`EntityManager::get_entity`].
    pub fn find<E: Entity>(&self, id: i64) -> Result<E> {
        self.get_entity::<E>(id)?.ok_or_else(|| Error::NotFound {
            entity: E::table_name(),
            id,
        })
    }

    /// Fetch the page of `E` rows matching `predicates`, in the order the
    /// database produces them. `offset` and `limit` default to
    /// [`DEFAULT_OFFSET`] and [`DEFAULT_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownColumn`] if a predicate names an unmapped
    /// column, otherwise as [`EntityManager::get_entity`].
    #[instrument(skip(self, predicates), fields(predicates = predicates.len()))]
    pub fn get_entities<E: Entity>(
        &self, predicates: &[Predicate], offset: Option<u32>, limit: Option<u32>,
    ) -> Result<Vec<E>> {
        let mapping = self.mapping::<E>()?;

        if let Some(unknown) = predicates.iter().find(|p| !mapping.has_column(p.key())) {
            return Err(Error::UnknownColumn {
                entity: mapping.table.clone(),
                column: unknown.key().to_string(),
            });
        }

        let query = SelectBuilder::new(&mapping.table)
            .columns(mapping.columns())
            .matching(predicates)
            .page(offset.unwrap_or(DEFAULT_OFFSET), limit.unwrap_or(DEFAULT_LIMIT))
            .build()?;

        let outcome = self.run(&query, Fetch::All)?;
        outcome.rows.into_iter().map(|row| hydrate(&mapping, row)).collect()
    }

    fn mapping<E: Entity>(&self) -> Result<Arc<Mapping<E>>> {
        let mut cache = self.mappings.lock();
        if let Some(cached) = cache.get(&TypeId::of::<E>())
            && let Ok(mapping) = Arc::clone(cached).downcast::<Mapping<E>>()
        {
            return Ok(mapping);
        }

        let mapping = Arc::new(Mapping::<E>::build()?);
        tracing::debug!(table = %mapping.table, fields = mapping.accessors.len(), "registered entity");
        cache.insert(TypeId::of::<E>(), Arc::clone(&mapping) as Arc<dyn Any + Send + Sync>);
        drop(cache);
        Ok(mapping)
    }

    fn write(&self, tracked: &dyn Pending, snapshot: &Snapshot) -> Result<Action> {
        let table = snapshot.table.as_str();

        let existing = match snapshot.id {
            Some(id) if self.row_exists(table, id)? => Some(id),
            _ => None,
        };

        match (existing, snapshot.pending_delete) {
            (Some(id), true) => {
                let query = DeleteBuilder::new(table).by_id(id).build()?;
                let outcome = self.run(&query, Fetch::Nothing)?;
                Ok(affected(table, id, &outcome, Action::Deleted))
            }
            (Some(id), false) => {
                let query = UpdateBuilder::new(table)
                    .values(snapshot.values.iter().cloned())
                    .by_id(id)
                    .build()?;
                let outcome = self.run(&query, Fetch::Nothing)?;
                Ok(affected(table, id, &outcome, Action::Updated))
            }
            (None, true) => {
                tracing::debug!(table, id = ?snapshot.id, "no row to delete");
                Ok(Action::Skipped)
            }
            (None, false) => {
                let query = InsertBuilder::new(table).values(snapshot.values.iter().cloned()).build()?;
                let outcome = self.run(&query, Fetch::Nothing)?;
                if let Some(id) = outcome.insert_id {
                    tracked.assign_id(id);
                }
                Ok(Action::Inserted {
                    id: outcome.insert_id,
                })
            }
        }
    }

    fn row_exists(&self, table: &str, id: i64) -> Result<bool> {
        let query = SelectBuilder::new(table).column("id").by_id(id).build()?;
        Ok(self.run(&query, Fetch::Nothing)?.row_count > 0)
    }

    fn deadline(&self) -> Deadline {
        let deadline = self.timeout.map_or_else(Deadline::none, Deadline::after);
        match &self.cancel {
            Some(token) => deadline.with_cancel(token.clone()),
            None => deadline,
        }
    }

    // One prepare/bind/execute/fetch/close cycle.
    fn run(&self, query: &Query, fetch: Fetch) -> Result<Outcome> {
        let (types, values) = query.bindings()?;
        let sql = query.sql.as_str();

        let _cycle = self.cycle.lock();
        let mut stmt =
            self.conn.prepare(sql, self.deadline()).map_err(|e| Error::statement(sql, e))?;

        let outcome = drive(stmt.as_mut(), &types, values, fetch);
        let closed = stmt.close();

        let outcome = outcome.map_err(|e| Error::statement(sql, e))?;
        closed.map_err(|e| Error::statement(sql, e))?;
        Ok(outcome)
    }
}

fn drive(
    stmt: &mut dyn Statement, types: &str, values: Vec<DataType>, fetch: Fetch,
) -> anyhow::Result<Outcome> {
    stmt.bind(types, values)?;
    stmt.execute()?;

    let mut rows = Vec::new();
    match fetch {
        Fetch::Nothing => {}
        Fetch::One => rows.extend(stmt.fetch_row()?),
        Fetch::All => {
            while let Some(row) = stmt.fetch_row()? {
                rows.push(row);
            }
        }
    }

    Ok(Outcome {
        rows,
        row_count: stmt.row_count(),
        insert_id: stmt.insert_id(),
    })
}

// A row can vanish between the existence check and the write.
fn affected(table: &str, id: i64, outcome: &Outcome, action: Action) -> Action {
    if outcome.row_count == 0 {
        tracing::debug!(table, id, ?action, "write matched no row");
        return Action::Skipped;
    }
    action
}

fn take_column(table: &str, row: &mut Row, column: &str) -> Result<DataType> {
    let pos = row
        .fields
        .iter()
        .position(|field| field.name == column)
        .ok_or_else(|| Error::mapping(table, format!("row is missing column `{column}`")))?;
    Ok(row.fields.swap_remove(pos).value)
}

fn hydrate<E: Entity>(mapping: &Mapping<E>, mut row: Row) -> Result<E> {
    let mut entity = E::default();

    let id = take_column(&mapping.table, &mut row, "id")?;
    entity.set_id(i64::from_param(Param::from_column("id", id)?, "id")?);

    for accessor in &mapping.accessors {
        let value = take_column(&mapping.table, &mut row, accessor.field)?;
        (accessor.set)(&mut entity, Param::from_column(accessor.field, value)?)?;
    }

    Ok(entity)
}
