//! Unit-of-work ORM layer for SQL databases.
//!
//! Maps entities to rows, generates parameterised statements from entity
//! field metadata and predicate lists, and flushes pending changes through a
//! [`rowbind_sql::Connection`].
//!
//! # Quick Start
//!
//! ## Define an Entity
//!
//! ```ignore
//! entity! {
//!     #[derive(Debug, Clone, Default)]
//!     pub struct Forum {
//!         pub name: String,
//!         pub description: Option<String>,
//!     }
//! }
//! ```
//!
//! The macro adds an `id: Option<i64>` primary key and a `pending_delete`
//! flag. The table is named after the type: `forum`.
//!
//! ## Persist, Remove, Flush
//!
//! ```ignore
//! let manager = EntityManager::new(Arc::new(SqlDefault::connect()?));
//!
//! let forum = entity_ref(Forum { name: "General".into(), ..Forum::default() });
//! manager.persist(&forum)?;
//! manager.flush().into_result()?;   // INSERT INTO `forum` (`name`, `description`) VALUES (?, ?)
//!
//! forum.lock().description = Some("Anything goes".into());
//! manager.persist(&forum)?;
//! manager.flush().into_result()?;   // UPDATE `forum` SET `name` = ?, `description` = ? WHERE `id` = ?
//!
//! manager.remove(&forum)?;
//! manager.flush().into_result()?;   // DELETE FROM `forum` WHERE `id` = ?
//! ```
//!
//! ## Read
//!
//! ```ignore
//! let forum: Option<Forum> = manager.get_entity(1)?;
//!
//! let forums: Vec<Forum> = manager.get_entities(
//!     &[
//!         Predicate::create("name", "General"),
//!         Predicate::new("description", "%news%", Comparison::Like, Logic::Or),
//!     ],
//!     Some(0),
//!     Some(20),
//! )?;
//! // SELECT `id`, `name`, `description` FROM `forum`
//! //     WHERE `name` = ? OR `description` LIKE ? LIMIT ?, ?
//! ```

mod delete;
mod entity;
mod error;
mod insert;
mod manager;
mod predicate;
mod query;
mod select;
mod update;
mod value;

pub use delete::DeleteBuilder;
pub use entity::{Accessor, Entity, EntityRef, Getter, Setter, entity_ref, real_entity_name};
pub use error::{Error, Result};
pub use insert::InsertBuilder;
pub use manager::{
    Action, DEFAULT_LIMIT, DEFAULT_OFFSET, EntityManager, FlushReport, Flushed,
};
pub use predicate::{Comparison, Logic, Predicate};
pub use query::Query;
// Re-export SQL capability types used in entity and test code.
pub use rowbind_sql::{CancelToken, Connection, DataType, Deadline, Field, Row, Statement};
pub use select::SelectBuilder;
pub use update::UpdateBuilder;
pub use value::{FromParam, Param};
