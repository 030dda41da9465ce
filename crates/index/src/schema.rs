//! Index schemas.
//!
//! A schema is a path of hash levels optionally terminating in a sort level:
//!
//! - `UniqueHash(property)`: key to a single entity, always a leaf
//! - `ManyHash(property, child)`: key to a nested bucket shaped by `child`
//! - `Sort(directives)`: ordered list, always a leaf
//!
//! Schemas are written as directive terms: `=prop` for a hash level, `+prop`
//! and `-prop` for ascending and descending sort levels.

use crate::comparator::Order;
use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use lumen_core::{Error, Result};

/// The property every sort level falls back to.
pub const ID_PROPERTY: &str = "id";

/// One level of a sort.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SortDirective {
    pub property: String,
    pub order: Order,
}

impl SortDirective {
    /// Creates an ascending directive.
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            order: Order::Asc,
        }
    }

    /// Creates a descending directive.
    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            order: Order::Desc,
        }
    }
}

/// The kind of one schema level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexKind {
    UniqueHash,
    ManyHash,
    Sort,
}

/// Declarative shape of an index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexSchema {
    UniqueHash {
        property: String,
    },
    ManyHash {
        property: String,
        child: Box<IndexSchema>,
    },
    Sort {
        directives: Vec<SortDirective>,
    },
}

impl IndexSchema {
    /// Creates a unique hash level.
    pub fn unique(property: impl Into<String>) -> Self {
        IndexSchema::UniqueHash {
            property: property.into(),
        }
    }

    /// Creates a many hash level over `child`.
    pub fn many(property: impl Into<String>, child: IndexSchema) -> Self {
        IndexSchema::ManyHash {
            property: property.into(),
            child: Box::new(child),
        }
    }

    /// Creates a sort level.
    pub fn sort(directives: Vec<SortDirective>) -> Self {
        IndexSchema::Sort { directives }
    }

    /// Parses directive terms.
    ///
    /// Leading `=` terms become hash levels and trailing `+`/`-` terms form
    /// the terminal sort level. With `unique`, the last hash level is a
    /// `UniqueHash` and no sort terms are allowed. Without it, the hash path
    /// always ends in a sort level, empty meaning id order.
    ///
    /// ```rust
    /// use lumen_index::{IndexSchema, SortDirective};
    ///
    /// let schema = IndexSchema::parse(&["=owner", "-age"], false).unwrap();
    /// assert_eq!(
    ///     schema,
    ///     IndexSchema::many("owner", IndexSchema::sort(vec![SortDirective::desc("age")]))
    /// );
    /// assert!(IndexSchema::parse(&["=name", "+age"], true).is_err());
    /// ```
    pub fn parse(terms: &[&str], unique: bool) -> Result<Self> {
        let mut hashes: Vec<String> = Vec::new();
        let mut directives: Vec<SortDirective> = Vec::new();

        for term in terms {
            let mut chars = term.chars();
            let prefix = chars.next();
            let property = chars.as_str();
            if property.is_empty() {
                return Err(Error::invalid_schema(format!("malformed index term {:?}", term)));
            }
            match prefix {
                Some('=') if directives.is_empty() => hashes.push(property.to_string()),
                Some('=') => {
                    return Err(Error::invalid_schema(format!(
                        "hash term {:?} follows a sort term",
                        term
                    )))
                }
                Some('+') => directives.push(SortDirective::asc(property)),
                Some('-') => directives.push(SortDirective::desc(property)),
                _ => {
                    return Err(Error::invalid_schema(format!(
                        "index term {:?} must start with '=', '+' or '-'",
                        term
                    )))
                }
            }
        }

        let mut schema = if unique {
            if !directives.is_empty() {
                return Err(Error::invalid_schema("a unique index cannot be sorted"));
            }
            match hashes.pop() {
                Some(property) => IndexSchema::unique(property),
                None => return Err(Error::invalid_schema("a unique index needs a hash term")),
            }
        } else {
            IndexSchema::sort(directives)
        };

        while let Some(property) = hashes.pop() {
            schema = IndexSchema::many(property, schema);
        }
        Ok(schema)
    }

    /// Returns the kind of this level.
    pub fn kind(&self) -> IndexKind {
        match self {
            IndexSchema::UniqueHash { .. } => IndexKind::UniqueHash,
            IndexSchema::ManyHash { .. } => IndexKind::ManyHash,
            IndexSchema::Sort { .. } => IndexKind::Sort,
        }
    }

    /// Returns the number of levels, counting a sort as one.
    pub fn depth(&self) -> usize {
        match self {
            IndexSchema::ManyHash { child, .. } => 1 + child.depth(),
            _ => 1,
        }
    }

    /// Returns true if the index reads `property` anywhere along its path.
    pub fn depends_on(&self, property: &str) -> bool {
        match self {
            IndexSchema::UniqueHash { property: p } => p == property,
            IndexSchema::ManyHash { property: p, child } => p == property || child.depends_on(property),
            IndexSchema::Sort { directives } => directives.iter().any(|d| d.property == property),
        }
    }

    /// Returns true if `self` and `other` describe the same index.
    ///
    /// The match is exact, not a compatibility check: an index over a
    /// superset of the properties, or with extra sort levels, does not match.
    /// Hash paths must agree property by property and sort levels directive
    /// by directive. The only normalization is that a trailing `+id` equals
    /// no directive, since id is always the final ascending tiebreaker.
    pub fn matches(&self, other: &IndexSchema) -> bool {
        match (self, other) {
            (IndexSchema::UniqueHash { property: a }, IndexSchema::UniqueHash { property: b }) => a == b,
            (
                IndexSchema::ManyHash {
                    property: a,
                    child: ca,
                },
                IndexSchema::ManyHash {
                    property: b,
                    child: cb,
                },
            ) => a == b && ca.matches(cb),
            (IndexSchema::Sort { directives: a }, IndexSchema::Sort { directives: b }) => {
                effective_directives(a) == effective_directives(b)
            }
            _ => false,
        }
    }
}

fn effective_directives(directives: &[SortDirective]) -> &[SortDirective] {
    match directives.split_last() {
        Some((last, rest)) if last.property == ID_PROPERTY && last.order == Order::Asc => rest,
        _ => directives,
    }
}

impl fmt::Display for IndexSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexSchema::UniqueHash { property } => write!(f, "={} (unique)", property),
            IndexSchema::ManyHash { property, child } => write!(f, "={} {}", property, child),
            IndexSchema::Sort { directives } if directives.is_empty() => f.write_str("+id"),
            IndexSchema::Sort { directives } => {
                for (i, d) in directives.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}{}", d.order.prefix(), d.property)?;
                }
                Ok(())
            }
        }
    }
}
