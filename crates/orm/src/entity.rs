use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::value::Param;

/// Shared handle to an entity. The manager only ever keeps weak references
/// to it, so the caller decides how long the entity lives.
pub type EntityRef<E> = Arc<Mutex<E>>;

/// Wrap an entity in an [`EntityRef`].
#[must_use]
pub fn entity_ref<E: Entity>(entity: E) -> EntityRef<E> {
    Arc::new(Mutex::new(entity))
}

/// Reads a field value from an entity.
pub type Getter<E> = fn(&E) -> Param;

/// Writes a fetched column value onto an entity.
pub type Setter<E> = fn(&mut E, Param) -> Result<()>;

/// The accessor pair for one persisted field.
pub struct Accessor<E> {
    /// Field (and column) name.
    pub field: &'static str,
    /// Reads the field.
    pub get: Getter<E>,
    /// Writes the field.
    pub set: Setter<E>,
}

impl<E> Accessor<E> {
    /// Creates an accessor for `field`.
    #[must_use]
    pub const fn new(field: &'static str, get: Getter<E>, set: Setter<E>) -> Self {
        Self { field, get, set }
    }
}

impl<E> Clone for Accessor<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Accessor<E> {}

/// Declares an ORM entity with automatic `Entity` trait implementation.
///
/// The generated struct gains an `id: Option<i64>` primary key and a
/// `pending_delete` flag ahead of the declared fields. Derives must include
/// `Default`.
///
/// # Examples
///
/// ```ignore
/// entity! {
///     #[derive(Debug, Clone, Default)]
///     pub struct Forum {
///         pub name: String,
///         pub description: Option<String>,
///     }
/// }
/// ```
#[macro_export]
macro_rules! entity {
    (
        $(#[$meta:meta])*
        pub struct $struct_name:ident {
            $(
                $(#[$field_meta:meta])*
                pub $field_name:ident : $field_type:ty
            ),* $(,)?
        }
    ) => {
        #[allow(missing_docs)]
        $(#[$meta])*
        pub struct $struct_name {
            pub id: ::core::option::Option<i64>,
            pub pending_delete: bool,
            $(
                $(#[$field_meta])*
                pub $field_name : $field_type
            ),*
        }

        impl $crate::Entity for $struct_name {
            fn fields() -> &'static [&'static str] {
                &[ $( stringify!($field_name) ),* ]
            }

            fn accessors() -> ::std::vec::Vec<$crate::Accessor<Self>> {
                ::std::vec![
                    $(
                        $crate::Accessor::new(
                            stringify!($field_name),
                            |entity: &Self| $crate::Param::from(entity.$field_name.clone()),
                            |entity: &mut Self, value: $crate::Param| {
                                entity.$field_name = <$field_type as $crate::FromParam>::from_param(
                                    value,
                                    stringify!($field_name),
                                )?;
                                ::core::result::Result::Ok(())
                            },
                        ),
                    )*
                ]
            }

            fn id(&self) -> ::core::option::Option<i64> {
                self.id
            }

            fn set_id(&mut self, id: i64) {
                self.id = ::core::option::Option::Some(id);
            }

            fn pending_delete(&self) -> bool {
                self.pending_delete
            }

            fn set_pending_delete(&mut self, pending: bool) {
                self.pending_delete = pending;
            }
        }
    };
}

/// Trait for database entities with metadata for statement building.
///
/// Typically implemented via the `entity!` macro rather than manually.
pub trait Entity: Default + Send + 'static {
    /// Persisted field names in column order, excluding `id`.
    fn fields() -> &'static [&'static str];

    /// Accessor table, one entry per persisted field.
    fn accessors() -> Vec<Accessor<Self>>;

    /// Primary key, absent until the row is first written.
    fn id(&self) -> Option<i64>;

    /// Assign the primary key.
    fn set_id(&mut self, id: i64);

    /// Whether the next flush deletes the row.
    fn pending_delete(&self) -> bool;

    /// Mark (or unmark) the row for deletion.
    fn set_pending_delete(&mut self, pending: bool);

    /// Table name. Defaults to the real entity name.
    #[must_use]
    fn table_name() -> String {
        real_entity_name::<Self>()
    }
}

/// The lower-cased type name of `E` with module path and generic arguments
/// stripped.
#[must_use]
pub fn real_entity_name<E: ?Sized>() -> String {
    let full = std::any::type_name::<E>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_lowercase()
}

/// Validated column layout of one entity type.
pub(crate) struct Mapping<E> {
    pub table: String,
    pub accessors: Vec<Accessor<E>>,
}

impl<E: Entity> Mapping<E> {
    /// Checks the declared fields against the accessor table and orders the
    /// accessors by field declaration.
    pub fn build() -> Result<Self> {
        let table = E::table_name();
        let fields = E::fields();

        if !is_identifier(&table) {
            return Err(Error::mapping(&table, "table name is not a plain identifier"));
        }
        if fields.is_empty() {
            return Err(Error::mapping(&table, "no persisted fields declared"));
        }

        let mut available = E::accessors();
        let mut seen = HashSet::new();
        let mut accessors = Vec::with_capacity(fields.len());

        for field in fields {
            if *field == "id" {
                return Err(Error::mapping(&table, "`id` must not be listed as a field"));
            }
            if !is_identifier(field) {
                return Err(Error::mapping(&table, format!("field `{field}` is not an identifier")));
            }
            if !seen.insert(*field) {
                return Err(Error::mapping(&table, format!("field `{field}` is declared twice")));
            }
            let Some(pos) = available.iter().position(|accessor| accessor.field == *field) else {
                return Err(Error::mapping(&table, format!("no accessor for field `{field}`")));
            };
            accessors.push(available.swap_remove(pos));
        }

        Ok(Self { table, accessors })
    }

    /// Column names in select order: `id` followed by the fields.
    pub fn columns(&self) -> Vec<&'static str> {
        std::iter::once("id").chain(self.accessors.iter().map(|accessor| accessor.field)).collect()
    }

    /// Whether `column` is mapped.
    pub fn has_column(&self, column: &str) -> bool {
        column == "id" || self.accessors.iter().any(|accessor| accessor.field == column)
    }

    /// Field values read through the accessors, in column order.
    pub fn values(&self, entity: &E) -> Vec<(&'static str, Param)> {
        self.accessors.iter().map(|accessor| (accessor.field, (accessor.get)(entity))).collect()
    }
}

/// Whether `name` is a plain `[A-Za-z_][A-Za-z0-9_]*` identifier.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FromParam;

    mod forum {
        crate::entity! {
            #[derive(Debug, Clone, Default, PartialEq, Eq)]
            pub struct Forum {
                pub name: String,
                pub description: Option<String>,
                pub position: i32,
            }
        }
    }

    use forum::Forum;

    #[derive(Default)]
    struct Orphaned {
        id: Option<i64>,
        title: String,
    }

    impl Entity for Orphaned {
        fn fields() -> &'static [&'static str] {
            &["title", "subtitle"]
        }

        fn accessors() -> Vec<Accessor<Self>> {
            vec![Accessor::new(
                "title",
                |entity: &Self| Param::from(entity.title.clone()),
                |entity: &mut Self, value: Param| {
                    entity.title = String::from_param(value, "title")?;
                    Ok(())
                },
            )]
        }

        fn id(&self) -> Option<i64> {
            self.id
        }

        fn set_id(&mut self, id: i64) {
            self.id = Some(id);
        }

        fn pending_delete(&self) -> bool {
            false
        }

        fn set_pending_delete(&mut self, _pending: bool) {}
    }

    #[derive(Default)]
    struct Keyed;

    impl Entity for Keyed {
        fn fields() -> &'static [&'static str] {
            &["id", "name"]
        }

        fn accessors() -> Vec<Accessor<Self>> {
            Vec::new()
        }

        fn id(&self) -> Option<i64> {
            None
        }

        fn set_id(&mut self, _id: i64) {}

        fn pending_delete(&self) -> bool {
            false
        }

        fn set_pending_delete(&mut self, _pending: bool) {}

        fn table_name() -> String {
            "keyed".to_string()
        }
    }

    #[test]
    fn real_name_strips_path() {
        assert_eq!(Forum::table_name(), "forum");
        assert_eq!(real_entity_name::<Orphaned>(), "orphaned");
        assert_eq!(real_entity_name::<Vec<Forum>>(), "vec");
    }

    #[test]
    fn macro_declares_fields_in_order() {
        assert_eq!(Forum::fields(), &["name", "description", "position"]);

        let forum = Forum {
            name: "General".to_string(),
            description: None,
            position: 2,
            ..Forum::default()
        };
        assert_eq!(forum.id(), None);
        assert!(!forum.pending_delete());

        let mapping = Mapping::<Forum>::build().unwrap();
        assert_eq!(mapping.table, "forum");
        assert_eq!(mapping.columns(), vec!["id", "name", "description", "position"]);
        assert_eq!(
            mapping.values(&forum),
            vec![
                ("name", Param::Str("General".to_string())),
                ("description", Param::Null),
                ("position", Param::Int(2)),
            ]
        );
    }

    #[test]
    fn setters_write_typed_values() {
        let mapping = Mapping::<Forum>::build().unwrap();
        let mut forum = Forum::default();

        for accessor in &mapping.accessors {
            let value = match accessor.field {
                "name" => Param::from("News"),
                "description" => Param::from("Announcements"),
                _ => Param::from(4_i64),
            };
            (accessor.set)(&mut forum, value).unwrap();
        }

        assert_eq!(forum.name, "News");
        assert_eq!(forum.description.as_deref(), Some("Announcements"));
        assert_eq!(forum.position, 4);

        let name = &mapping.accessors[0];
        let err = (name.set)(&mut forum, Param::Int(1)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType { ref column, .. } if column == "name"));
    }

    #[test]
    fn missing_accessor_is_a_mapping_error() {
        let Err(err) = Mapping::<Orphaned>::build() else {
            panic!("expected mapping error");
        };
        assert!(matches!(err, Error::Mapping { .. }));
        assert!(err.to_string().contains("no accessor for field `subtitle`"));
    }

    #[test]
    fn id_field_is_rejected() {
        let Err(err) = Mapping::<Keyed>::build() else {
            panic!("expected mapping error");
        };
        assert!(err.to_string().contains("`id` must not be listed"));
    }

    #[test]
    fn identifiers_are_plain() {
        assert!(is_identifier("forum_post"));
        assert!(is_identifier("_hidden1"));
        assert!(!is_identifier("1st"));
        assert!(!is_identifier("na`me"));
        assert!(!is_identifier(""));
    }
}
