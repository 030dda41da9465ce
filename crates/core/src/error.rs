//! Error types for Lumen.

use crate::value::Value;
use alloc::string::String;
use core::fmt;

/// Result type alias for Lumen operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for store, index and cache-cell operations.
///
/// Every error is raised synchronously at the point of violation. None of them
/// undo effects that were already applied before the violation was detected.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A unique index already holds a different entity under this key.
    UniqueKeyViolation {
        key: Value,
        property: String,
        index: String,
    },
    /// A cell read its own value while evaluating.
    SelfReferentialCycle {
        cell: String,
    },
    /// A cell's invalidation callback ran more often than the cycle threshold
    /// within one drain pass.
    InvalidationCycle {
        cell: String,
        threshold: usize,
    },
    /// A removed cell was read.
    CellRemoved {
        cell: String,
    },
    /// A removed entity was mutated.
    EntityRemoved {
        id: String,
    },
    /// A mutation was attempted while no transaction was active.
    MutationOutsideTransaction,
    /// An entity with this id already exists in the collection.
    DuplicateEntity {
        collection: String,
        id: String,
    },
    /// No entity with this id exists in the collection.
    EntityNotFound {
        collection: String,
        id: String,
    },
    /// Invalid index schema definition.
    InvalidSchema {
        message: String,
    },
    /// Invalid operation.
    InvalidOperation {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UniqueKeyViolation {
                key,
                property,
                index,
            } => {
                write!(
                    f,
                    "Unique key violation: attempt to add multiple entities with key {} from property \"{}\" in index \"{}\"",
                    key, property, index
                )
            }
            Error::SelfReferentialCycle { cell } => {
                write!(f, "Cycle detected: query \"{}\" read its own value while evaluating", cell)
            }
            Error::InvalidationCycle { cell, threshold } => {
                write!(
                    f,
                    "Cycle detected: query \"{}\" was invalidated more than {} times in one flush",
                    cell, threshold
                )
            }
            Error::CellRemoved { cell } => {
                write!(f, "Query \"{}\" has been removed", cell)
            }
            Error::EntityRemoved { id } => {
                write!(f, "Entity \"{}\" has been removed and can no longer be mutated", id)
            }
            Error::MutationOutsideTransaction => {
                f.write_str("Mutations are only allowed inside a transaction")
            }
            Error::DuplicateEntity { collection, id } => {
                write!(f, "Entity \"{}\" already exists in collection \"{}\"", id, collection)
            }
            Error::EntityNotFound { collection, id } => {
                write!(f, "Entity \"{}\" not found in collection \"{}\"", id, collection)
            }
            Error::InvalidSchema { message } => {
                write!(f, "Invalid schema: {}", message)
            }
            Error::InvalidOperation { message } => {
                write!(f, "Invalid operation: {}", message)
            }
        }
    }
}

impl Error {
    /// Creates a unique key violation error.
    pub fn unique_key_violation(
        key: Value,
        property: impl Into<String>,
        index: impl Into<String>,
    ) -> Self {
        Error::UniqueKeyViolation {
            key,
            property: property.into(),
            index: index.into(),
        }
    }

    /// Creates a self-referential cycle error.
    pub fn self_referential_cycle(cell: impl Into<String>) -> Self {
        Error::SelfReferentialCycle { cell: cell.into() }
    }

    /// Creates an invalidation cycle error.
    pub fn invalidation_cycle(cell: impl Into<String>, threshold: usize) -> Self {
        Error::InvalidationCycle {
            cell: cell.into(),
            threshold,
        }
    }

    /// Creates a cell removed error.
    pub fn cell_removed(cell: impl Into<String>) -> Self {
        Error::CellRemoved { cell: cell.into() }
    }

    /// Creates an entity removed error.
    pub fn entity_removed(id: impl Into<String>) -> Self {
        Error::EntityRemoved { id: id.into() }
    }

    /// Creates a duplicate entity error.
    pub fn duplicate_entity(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Error::DuplicateEntity {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Creates an entity not found error.
    pub fn entity_not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Error::EntityNotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for either kind of cycle error.
    pub fn is_cycle(&self) -> bool {
        matches!(
            self,
            Error::SelfReferentialCycle { .. } | Error::InvalidationCycle { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_unique_key_violation_message() {
        let err = Error::unique_key_violation(Value::from("kim"), "name", "index1");
        assert_eq!(
            err.to_string(),
            "Unique key violation: attempt to add multiple entities with key \"kim\" from property \"name\" in index \"index1\""
        );

        let err = Error::unique_key_violation(Value::from(7i64), "badge", "badges");
        assert!(err.to_string().contains("with key 7 from"));
    }

    #[test]
    fn test_error_display() {
        let err = Error::self_referential_cycle("q");
        assert!(err.to_string().contains("\"q\""));

        let err = Error::invalidation_cycle("a", 20);
        assert!(err.to_string().contains("20"));

        let err = Error::MutationOutsideTransaction;
        assert!(err.to_string().contains("transaction"));

        let err = Error::entity_not_found("people", "p1");
        assert!(err.to_string().contains("p1"));
        assert!(err.to_string().contains("people"));
    }

    #[test]
    fn test_error_constructors() {
        let err = Error::duplicate_entity("people", "p1");
        match err {
            Error::DuplicateEntity { collection, id } => {
                assert_eq!(collection, "people");
                assert_eq!(id, "p1");
            }
            _ => panic!("Wrong error type"),
        }
        assert!(Error::invalidation_cycle("a", 3).is_cycle());
        assert!(!Error::cell_removed("a").is_cycle());
    }
}
