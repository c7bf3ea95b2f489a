//! Protected resource identifiers.
//!
//! Every lock set protects exactly one resource. Resources form a
//! coarse-to-fine hierarchy (database, table, page, row) so that intention
//! locks taken on a coarse resource can announce the finer-grained locks a
//! transaction is about to take below it.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Granularity level of a resource, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Granularity {
    /// Resource with no place in the hierarchy.
    Opaque,
    /// Whole database or resource manager.
    Database,
    /// A table (or any named collection).
    Table,
    /// A page inside a table.
    Page,
    /// A single row inside a table.
    Row,
}

/// The identity of a resource protected by a lock set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceId {
    /// An anonymous resource, numbered by the lock set factory.
    Anonymous(u64),
    /// A resource identified by an opaque name.
    Named(Bytes),
    /// A whole database (resource manager) lock.
    Database(u64),
    /// A table-level lock.
    Table(u64),
    /// A page-level lock (table_id, page_id).
    Page(u64, u64),
    /// A row-level lock (table_id, row_key).
    Row(u64, Bytes),
}

impl ResourceId {
    /// Creates an anonymous resource ID.
    #[must_use]
    pub fn anonymous(seq: u64) -> Self {
        ResourceId::Anonymous(seq)
    }

    /// Creates a named resource ID.
    #[must_use]
    pub fn named(name: impl Into<Bytes>) -> Self {
        ResourceId::Named(name.into())
    }

    /// Creates a database resource ID.
    #[must_use]
    pub fn database(db_id: u64) -> Self {
        ResourceId::Database(db_id)
    }

    /// Creates a table resource ID.
    #[must_use]
    pub fn table(table_id: u64) -> Self {
        ResourceId::Table(table_id)
    }

    /// Creates a page resource ID.
    #[must_use]
    pub fn page(table_id: u64, page_id: u64) -> Self {
        ResourceId::Page(table_id, page_id)
    }

    /// Creates a row resource ID.
    #[must_use]
    pub fn row(table_id: u64, key: impl Into<Bytes>) -> Self {
        ResourceId::Row(table_id, key.into())
    }

    /// Returns the table ID for table, page and row resources.
    #[must_use]
    pub fn table_id(&self) -> Option<u64> {
        match self {
            ResourceId::Table(id) | ResourceId::Page(id, _) | ResourceId::Row(id, _) => Some(*id),
            _ => None,
        }
    }

    /// Returns the granularity of this resource.
    #[must_use]
    pub fn granularity(&self) -> Granularity {
        match self {
            ResourceId::Anonymous(_) | ResourceId::Named(_) => Granularity::Opaque,
            ResourceId::Database(_) => Granularity::Database,
            ResourceId::Table(_) => Granularity::Table,
            ResourceId::Page(..) => Granularity::Page,
            ResourceId::Row(..) => Granularity::Row,
        }
    }

    /// Returns the enclosing resource one level up, if the hierarchy
    /// defines one.
    ///
    /// Rows and pages belong to their table. Tables have no known parent
    /// because the table ID alone does not name its database.
    #[must_use]
    pub fn parent(&self) -> Option<ResourceId> {
        match self {
            ResourceId::Page(table, _) | ResourceId::Row(table, _) => {
                Some(ResourceId::Table(*table))
            }
            _ => None,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Anonymous(seq) => write!(f, "Anonymous({})", seq),
            ResourceId::Named(name) => match std::str::from_utf8(name) {
                Ok(s) => write!(f, "Named({})", s),
                Err(_) => write!(f, "Named({:?})", name),
            },
            ResourceId::Database(id) => write!(f, "Database({})", id),
            ResourceId::Table(id) => write!(f, "Table({})", id),
            ResourceId::Page(table, page) => write!(f, "Page({}, {})", table, page),
            ResourceId::Row(table, key) => write!(f, "Row({}, {:?})", table, key),
        }
    }
}
