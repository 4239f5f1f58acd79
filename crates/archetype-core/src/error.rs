//! Error types for archetype-core.

use thiserror::Error;

use crate::ids::ItemId;
use crate::index::Index;
use crate::path::ObjectPath;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The index or key has no corresponding item.
    #[error("no item at index {0}")]
    IndexNotFound(Index),
    /// Add into a keyed container whose key is already taken.
    #[error("key `{0}` already exists")]
    DuplicateKey(String),
    /// Explicit id already bound to a live item of the container.
    #[error("item id {0} is already bound")]
    DuplicateItem(ItemId),
    /// The id belonged to an item that has been removed.
    #[error("item id {0} has been retired")]
    IdentityRetired(ItemId),
    #[error("item id {0} is not registered")]
    UnknownItem(ItemId),
    #[error("malformed delta: {0}")]
    MalformedDelta(String),
    #[error("structural mismatch at {path}: {reason}")]
    StructuralMismatch { path: ObjectPath, reason: String },
    #[error("type mismatch at {path}: expected {expected}")]
    TypeMismatch { path: ObjectPath, expected: String },
    #[error("type `{type_name}` has no member `{member}`")]
    UnknownMember { type_name: String, member: String },
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("null reference at {0}")]
    NullReference(ObjectPath),
    #[error("{0} is sealed by the base asset")]
    Sealed(ObjectPath),
    #[error("index {index} is not valid for {path}")]
    InvalidIndex { path: ObjectPath, index: Index },
}

impl Error {
    pub fn mismatch(path: &ObjectPath, reason: impl Into<String>) -> Self {
        Error::StructuralMismatch { path: path.clone(), reason: reason.into() }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedDelta(reason.into())
    }
}
