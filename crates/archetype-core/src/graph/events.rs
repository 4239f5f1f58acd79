use crate::ids::ItemId;
use crate::index::Index;
use crate::overrides::OverrideType;
use crate::path::ObjectPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Update,
    Add,
    Remove,
    Move,
    Rekey,
    Reset,
    Override,
}

/// Delivered synchronously after a mutation, once classification is final.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Path of the node the operation was invoked on.
    pub path: ObjectPath,
    pub index: Index,
    pub item: Option<ItemId>,
    /// Whether a value existed at the target before the call.
    pub had_value: bool,
    /// Classification of the touched node or item after the call.
    pub override_type: OverrideType,
}
