//! Per-container identity table mapping current [`Index`] to [`ItemId`].
//!
//! Ordered containers keep the sequence of ids as the canonical record of
//! item order, so reordering is a pure table update. Keyed containers map
//! key to id in key order. Removed ids are retired and can never be bound
//! again within the lifetime of the table.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::{Error, Result};
use crate::ids::ItemId;
use crate::index::Index;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Ordered,
    Keyed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionItemIds {
    kind: ContainerKind,
    order: Vec<ItemId>,
    /// Position of each id in `order`.
    slots: HashMap<ItemId, usize>,
    keys: BTreeMap<String, ItemId>,
    key_of: HashMap<ItemId, String>,
    retired: HashSet<ItemId>,
    /// Retired ids that were inherited from a base; persisted so the base
    /// item is not reintroduced.
    deleted: BTreeSet<ItemId>,
}

impl CollectionItemIds {
    pub fn new(kind: ContainerKind) -> Self {
        Self {
            kind,
            order: Vec::new(),
            slots: HashMap::new(),
            keys: BTreeMap::new(),
            key_of: HashMap::new(),
            retired: HashSet::new(),
            deleted: BTreeSet::new(),
        }
    }

    pub fn ordered() -> Self {
        Self::new(ContainerKind::Ordered)
    }

    pub fn keyed() -> Self {
        Self::new(ContainerKind::Keyed)
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        match self.kind {
            ContainerKind::Ordered => self.order.len(),
            ContainerKind::Keyed => self.keys.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: ItemId) -> bool {
        match self.kind {
            ContainerKind::Ordered => self.slots.contains_key(&id),
            ContainerKind::Keyed => self.key_of.contains_key(&id),
        }
    }

    pub fn is_retired(&self, id: ItemId) -> bool {
        self.retired.contains(&id)
    }

    /// Id of the item currently at `index`.
    pub fn resolve(&self, index: &Index) -> Result<ItemId> {
        let found = match (self.kind, index) {
            (ContainerKind::Ordered, Index::Position(p)) => self.order.get(*p).copied(),
            (ContainerKind::Keyed, Index::Key(k)) => self.keys.get(k).copied(),
            _ => None,
        };
        found.ok_or_else(|| Error::IndexNotFound(index.clone()))
    }

    /// Current index of the item carrying `id`.
    pub fn locate(&self, id: ItemId) -> Result<Index> {
        if self.retired.contains(&id) {
            return Err(Error::IdentityRetired(id));
        }
        let found = match self.kind {
            ContainerKind::Ordered => self.slots.get(&id).copied().map(Index::Position),
            ContainerKind::Keyed => self.key_of.get(&id).cloned().map(Index::Key),
        };
        found.ok_or(Error::UnknownItem(id))
    }

    /// Binds an explicit id at `index`.
    ///
    /// For ordered containers `Index::Empty` appends and `Position(p)` inserts
    /// before the item currently at `p`. Keyed containers require a free key.
    pub fn bind(&mut self, index: &Index, id: ItemId) -> Result<()> {
        if self.retired.contains(&id) {
            return Err(Error::IdentityRetired(id));
        }
        if self.contains(id) {
            return Err(Error::DuplicateItem(id));
        }
        match (self.kind, index) {
            (ContainerKind::Ordered, Index::Empty) => {
                self.slots.insert(id, self.order.len());
                self.order.push(id);
            }
            (ContainerKind::Ordered, Index::Position(p)) if *p <= self.order.len() => {
                self.order.insert(*p, id);
                self.reindex(*p);
            }
            (ContainerKind::Keyed, Index::Key(k)) => {
                if self.keys.contains_key(k) {
                    return Err(Error::DuplicateKey(k.clone()));
                }
                self.keys.insert(k.clone(), id);
                self.key_of.insert(id, k.clone());
            }
            _ => return Err(Error::IndexNotFound(index.clone())),
        }
        Ok(())
    }

    /// Binds a freshly generated id at `index`.
    pub fn insert(&mut self, index: &Index) -> Result<ItemId> {
        let id = ItemId::generate();
        self.bind(index, id)?;
        Ok(id)
    }

    /// Drops the entry at `index` and retires its id.
    pub fn remove(&mut self, index: &Index) -> Result<ItemId> {
        let id = self.resolve(index)?;
        match index {
            Index::Position(p) => {
                self.order.remove(*p);
                self.slots.remove(&id);
                self.reindex(*p);
            }
            Index::Key(k) => {
                self.keys.remove(k);
                self.key_of.remove(&id);
            }
            Index::Empty => return Err(Error::IndexNotFound(Index::Empty)),
        }
        self.retired.insert(id);
        Ok(id)
    }

    /// Moves the id at `from` so that it ends up at position `to`.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<ItemId> {
        if self.kind != ContainerKind::Ordered || from >= self.order.len() {
            return Err(Error::IndexNotFound(Index::Position(from)));
        }
        if to >= self.order.len() {
            return Err(Error::IndexNotFound(Index::Position(to)));
        }
        let id = self.order.remove(from);
        self.order.insert(to, id);
        self.reindex(from.min(to));
        Ok(id)
    }

    /// Moves the id bound to `old` under `new`, keeping the id.
    pub fn rekey(&mut self, old: &str, new: &str) -> Result<ItemId> {
        if self.kind != ContainerKind::Keyed {
            return Err(Error::IndexNotFound(Index::Key(old.to_string())));
        }
        if old != new && self.keys.contains_key(new) {
            return Err(Error::DuplicateKey(new.to_string()));
        }
        let id = self
            .keys
            .remove(old)
            .ok_or_else(|| Error::IndexNotFound(Index::Key(old.to_string())))?;
        self.keys.insert(new.to_string(), id);
        self.key_of.insert(id, new.to_string());
        Ok(id)
    }

    /// Entries in canonical order: sequence order for ordered containers,
    /// key order for keyed ones.
    pub fn entries(&self) -> Vec<(Index, ItemId)> {
        match self.kind {
            ContainerKind::Ordered => self
                .order
                .iter()
                .enumerate()
                .map(|(i, id)| (Index::Position(i), *id))
                .collect(),
            ContainerKind::Keyed => {
                self.keys.iter().map(|(k, id)| (Index::Key(k.clone()), *id)).collect()
            }
        }
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.entries().into_iter().map(|(_, id)| id).collect()
    }

    /// Records that an inherited item was removed locally.
    pub fn mark_deleted(&mut self, id: ItemId) {
        self.retired.insert(id);
        self.deleted.insert(id);
    }

    pub fn unmark_deleted(&mut self, id: ItemId) -> bool {
        if self.deleted.remove(&id) {
            self.retired.remove(&id);
            true
        } else {
            false
        }
    }

    pub fn is_deleted(&self, id: ItemId) -> bool {
        self.deleted.contains(&id)
    }

    pub fn deleted(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.deleted.iter().copied()
    }

    /// Takes over the retired ids of a table this one replaces, except those
    /// that are live again here.
    pub fn carry_retired(&mut self, previous: &CollectionItemIds) {
        let carried: Vec<ItemId> =
            previous.retired.iter().copied().filter(|id| !self.contains(*id)).collect();
        self.retired.extend(carried);
    }

    fn reindex(&mut self, from: usize) {
        for (i, id) in self.order.iter().enumerate().skip(from) {
            self.slots.insert(*id, i);
        }
    }

    /// Same live ids in the same order, with a fresh retirement history.
    pub fn live_copy(&self) -> Self {
        Self {
            kind: self.kind,
            order: self.order.clone(),
            slots: self.slots.clone(),
            keys: self.keys.clone(),
            key_of: self.key_of.clone(),
            retired: HashSet::new(),
            deleted: BTreeSet::new(),
        }
    }
}
