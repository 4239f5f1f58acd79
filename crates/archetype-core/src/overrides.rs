//! Override classification of nodes and container items.

use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use crate::path::ObjectPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverrideType {
    /// No base to inherit from.
    None,
    /// Inherited unchanged from the base.
    Base,
    /// Locally added or changed.
    New,
    /// Locked against override by derived assets.
    Sealed,
}

impl OverrideType {
    pub fn is_new(self) -> bool {
        self == OverrideType::New
    }

    /// Key suffix used by the text format.
    pub fn marker(self) -> &'static str {
        match self {
            OverrideType::New => "*",
            OverrideType::Sealed => "!",
            OverrideType::None | OverrideType::Base => "",
        }
    }

    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            '*' => Some(OverrideType::New),
            '!' => Some(OverrideType::Sealed),
            _ => None,
        }
    }
}

/// Explicit classifications keyed by structural path.
///
/// Only `New` and `Sealed` are stored; `Base`/`None` are implied by absence.
/// Descendants of a path sort right after it, which keeps subtree removal a
/// single range scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideMap {
    entries: BTreeMap<ObjectPath, OverrideType>,
}

impl OverrideMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &ObjectPath) -> Option<OverrideType> {
        self.entries.get(path).copied()
    }

    pub fn set(&mut self, path: ObjectPath, ty: OverrideType) {
        match ty {
            OverrideType::New | OverrideType::Sealed => {
                self.entries.insert(path, ty);
            }
            OverrideType::None | OverrideType::Base => {
                self.entries.remove(&path);
            }
        }
    }

    /// `true` when some proper ancestor of `path` is classified New.
    pub fn has_new_ancestor(&self, path: &ObjectPath) -> bool {
        path.ancestors().any(|p| self.get(&p) == Some(OverrideType::New))
    }

    fn descendant_keys(&self, prefix: &ObjectPath, inclusive: bool) -> Vec<ObjectPath> {
        let lower = if inclusive { Bound::Included(prefix) } else { Bound::Excluded(prefix) };
        self.entries
            .range::<ObjectPath, _>((lower, Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Removes `prefix` and everything below it.
    pub fn remove_subtree(&mut self, prefix: &ObjectPath) -> usize {
        let keys = self.descendant_keys(prefix, true);
        for key in &keys {
            self.entries.remove(key);
        }
        keys.len()
    }

    /// Removes everything strictly below `prefix`.
    pub fn remove_descendants(&mut self, prefix: &ObjectPath) -> usize {
        let keys = self.descendant_keys(prefix, false);
        for key in &keys {
            self.entries.remove(key);
        }
        keys.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectPath, OverrideType)> {
        self.entries.iter().map(|(k, v)| (k, *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ItemId;

    #[test]
    fn base_is_implied_by_absence() {
        let mut map = OverrideMap::new();
        let p = ObjectPath::root().member("A");
        map.set(p.clone(), OverrideType::New);
        assert_eq!(map.get(&p), Some(OverrideType::New));
        map.set(p.clone(), OverrideType::Base);
        assert_eq!(map.get(&p), None);
        assert!(map.is_empty());
    }

    #[test]
    fn subtree_removal_leaves_siblings() {
        let mut map = OverrideMap::new();
        let list = ObjectPath::root().member("List");
        let a = list.item(ItemId::from_bytes([1; 16]));
        let b = list.item(ItemId::from_bytes([2; 16]));
        map.set(list.clone(), OverrideType::Sealed);
        map.set(a.member("Value"), OverrideType::New);
        map.set(a.clone(), OverrideType::New);
        map.set(b.clone(), OverrideType::New);
        map.set(ObjectPath::root().member("ListB"), OverrideType::New);

        assert_eq!(map.remove_subtree(&a), 2);
        assert_eq!(map.get(&b), Some(OverrideType::New));
        assert_eq!(map.remove_descendants(&list), 1);
        assert_eq!(map.get(&list), Some(OverrideType::Sealed));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn new_ancestor_lookup() {
        let mut map = OverrideMap::new();
        let item = ObjectPath::root().member("List").item(ItemId::from_bytes([3; 16]));
        map.set(item.clone(), OverrideType::New);
        assert!(map.has_new_ancestor(&item.member("Value")));
        assert!(!map.has_new_ancestor(&item));
    }
}
