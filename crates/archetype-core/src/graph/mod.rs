//! Addressable property graph.
//!
//! One node per property or container, stored in an arena and owned strictly
//! root to leaves. Parents are plain lookups. Container items are addressed by
//! [`Index`], always resolved through the container's [`CollectionItemIds`].
//!
//! Every mutation updates the override classification before it returns and
//! then notifies listeners registered with [`PropertyGraph::on_change`].

mod events;
mod handles;
mod node;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::ids::ItemId;
use crate::index::Index;
use crate::overrides::{OverrideMap, OverrideType};
use crate::path::{ObjectPath, PathStep};
use crate::registry::CollectionItemIds;
use crate::schema::{normalize_scalar, Schema, Shape};

pub use events::{ChangeEvent, ChangeKind};
pub use handles::{NodeMut, NodeRef};
pub use node::{NodeId, NodeKindTag};
pub(crate) use node::{Arena, Node, NodeKind};

type Listener = Box<dyn FnMut(&ChangeEvent) + Send + Sync>;

pub struct PropertyGraph {
    schema: Arc<Schema>,
    type_name: String,
    arena: Arena,
    root: NodeId,
    overrides: OverrideMap,
    /// Set when the owning asset has a base to inherit from.
    inherits: bool,
    next_listener_id: u64,
    listeners: BTreeMap<u64, Listener>,
}

impl Clone for PropertyGraph {
    /// Listeners are not cloned.
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            type_name: self.type_name.clone(),
            arena: self.arena.clone(),
            root: self.root,
            overrides: self.overrides.clone(),
            inherits: self.inherits,
            next_listener_id: 1,
            listeners: BTreeMap::new(),
        }
    }
}

impl fmt::Debug for PropertyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyGraph")
            .field("type_name", &self.type_name)
            .field("nodes", &self.arena.len())
            .field("overrides", &self.overrides)
            .field("inherits", &self.inherits)
            .finish()
    }
}

impl PropertyGraph {
    /// Graph of `type_name` filled with default values.
    pub fn new(schema: Arc<Schema>, type_name: &str) -> Result<Self> {
        let value = schema.default_instance(type_name)?;
        Self::from_value(schema, type_name, &value)
    }

    /// Graph of `type_name` built from `value`; missing members get defaults
    /// and every container item gets a fresh [`ItemId`].
    pub fn from_value(schema: Arc<Schema>, type_name: &str, value: &Value) -> Result<Self> {
        let shape = Shape::Struct(type_name.to_string());
        schema.check(&shape, value, &ObjectPath::root())?;
        let mut graph = Self {
            schema,
            type_name: type_name.to_string(),
            arena: Arena::default(),
            root: NodeId(0),
            overrides: OverrideMap::new(),
            inherits: false,
            next_listener_id: 1,
            listeners: BTreeMap::new(),
        };
        graph.root = graph.build(&shape, value, None, &ObjectPath::root())?;
        Ok(graph)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef::new(self, self.root)
    }

    /// Mutable root handle without a base; writes are compared against nothing.
    pub fn root_mut(&mut self) -> NodeMut<'_> {
        let root = self.root;
        NodeMut::new(self, None, root)
    }

    pub fn node_at(&self, path: &ObjectPath) -> Option<NodeRef<'_>> {
        self.resolve_path(path).map(|id| NodeRef::new(self, id))
    }

    /// Effective values, regardless of where they were authored.
    pub fn view(&self) -> Value {
        self.view_node(self.root)
    }

    pub fn overrides(&self) -> &OverrideMap {
        &self.overrides
    }

    pub fn inherits(&self) -> bool {
        self.inherits
    }

    /// Effective classification of `path`: the explicit entry, else New
    /// under a New ancestor, else Base when inheriting and None otherwise.
    pub fn classification(&self, path: &ObjectPath) -> OverrideType {
        if let Some(ty) = self.overrides.get(path) {
            return ty;
        }
        if self.overrides.has_new_ancestor(path) {
            return OverrideType::New;
        }
        if self.inherits {
            OverrideType::Base
        } else {
            OverrideType::None
        }
    }

    pub fn on_change<F>(&mut self, listener: F) -> u64
    where
        F: FnMut(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = self.next_listener_id;
        self.next_listener_id = self.next_listener_id.saturating_add(1);
        self.listeners.insert(id, Box::new(listener));
        id
    }

    pub fn off_change(&mut self, listener_id: u64) -> bool {
        self.listeners.remove(&listener_id).is_some()
    }

    // ── crate-internal plumbing ──────────────────────────────────────────

    pub(crate) fn root_id(&self) -> NodeId {
        self.root
    }

    pub(crate) fn kind(&self, id: NodeId) -> &NodeKind {
        &self.arena[id].kind
    }

    pub(crate) fn set_inherits(&mut self, inherits: bool) {
        self.inherits = inherits;
    }

    /// Copy for a freshly derived asset: same values and item ids, no
    /// classification history, inheriting from the source.
    pub(crate) fn derived_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.overrides = OverrideMap::new();
        copy.inherits = true;
        for node in copy.arena.values_mut() {
            if let NodeKind::List { ids, .. } | NodeKind::Map { ids, .. } = &mut node.kind {
                *ids = ids.live_copy();
            }
        }
        copy
    }

    fn emit(&mut self, event: ChangeEvent) {
        trace!(kind = ?event.kind, path = %event.path, index = %event.index, "graph change");
        for listener in self.listeners.values_mut() {
            listener(&event);
        }
    }

    fn build(
        &mut self,
        shape: &Shape,
        value: &Value,
        parent: Option<NodeId>,
        path: &ObjectPath,
    ) -> Result<NodeId> {
        let id = self.arena.alloc_id();
        let kind = self.build_kind(shape, value, id, path)?;
        self.arena.insert(id, Node { parent, step: path.last().cloned(), kind });
        Ok(id)
    }

    fn build_kind(
        &mut self,
        shape: &Shape,
        value: &Value,
        owner: NodeId,
        path: &ObjectPath,
    ) -> Result<NodeKind> {
        let mismatch = || Error::TypeMismatch { path: path.clone(), expected: shape.describe() };
        Ok(match shape {
            Shape::Scalar(kind) => NodeKind::Scalar {
                kind: *kind,
                value: normalize_scalar(*kind, value).ok_or_else(mismatch)?,
            },
            Shape::Struct(t) => NodeKind::Struct {
                type_name: t.clone(),
                members: self.build_members(t, value, owner, path)?,
            },
            Shape::Object(t) => {
                let target = if value.is_null() {
                    None
                } else {
                    let target = self.arena.alloc_id();
                    let members = self.build_members(t, value, target, path)?;
                    let kind = NodeKind::Struct { type_name: t.clone(), members };
                    self.arena.insert(target, Node { parent: Some(owner), step: None, kind });
                    Some(target)
                };
                NodeKind::Object { type_name: t.clone(), target }
            }
            Shape::List(item) => {
                let values = value.as_array().ok_or_else(mismatch)?;
                let mut ids = CollectionItemIds::ordered();
                let mut items = Vec::with_capacity(values.len());
                for v in values {
                    let id = ids.insert(&Index::Empty)?;
                    items.push(self.build(item, v, Some(owner), &path.item(id))?);
                }
                NodeKind::List { item: (**item).clone(), items, ids }
            }
            Shape::Map(item) => {
                let entries = value.as_object().ok_or_else(mismatch)?;
                let mut ids = CollectionItemIds::keyed();
                let mut items = BTreeMap::new();
                for (key, v) in entries {
                    let id = ids.insert(&Index::Key(key.clone()))?;
                    items.insert(key.clone(), self.build(item, v, Some(owner), &path.item(id))?);
                }
                NodeKind::Map { item: (**item).clone(), items, ids }
            }
        })
    }

    fn build_members(
        &mut self,
        type_name: &str,
        value: &Value,
        owner: NodeId,
        path: &ObjectPath,
    ) -> Result<IndexMap<String, NodeId>> {
        let schema = Arc::clone(&self.schema);
        let def = schema.get(type_name)?;
        let mut members = IndexMap::with_capacity(def.members.len());
        for m in &def.members {
            let child = match value.get(m.name.as_str()) {
                Some(v) => self.build(&m.shape, v, Some(owner), &path.member(m.name.as_str()))?,
                None => {
                    let v = schema.default_value(&m.shape)?;
                    self.build(&m.shape, &v, Some(owner), &path.member(m.name.as_str()))?
                }
            };
            members.insert(m.name.clone(), child);
        }
        Ok(members)
    }

    /// Mirrors `source_id` of `source` into this arena, item ids included.
    pub(crate) fn import(
        &mut self,
        source: &PropertyGraph,
        source_id: NodeId,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = self.arena.alloc_id();
        let kind = self.import_kind(source, source_id, id);
        let step = source.arena[source_id].step.clone();
        self.arena.insert(id, Node { parent, step, kind });
        id
    }

    fn import_kind(&mut self, source: &PropertyGraph, source_id: NodeId, owner: NodeId) -> NodeKind {
        match source.kind(source_id) {
            NodeKind::Scalar { kind, value } => NodeKind::Scalar { kind: *kind, value: value.clone() },
            NodeKind::Struct { type_name, members } => NodeKind::Struct {
                type_name: type_name.clone(),
                members: members
                    .iter()
                    .map(|(name, child)| (name.clone(), self.import(source, *child, Some(owner))))
                    .collect(),
            },
            NodeKind::Object { type_name, target } => {
                let target = target.map(|t| {
                    let id = self.arena.alloc_id();
                    let kind = self.import_kind(source, t, id);
                    self.arena.insert(id, Node { parent: Some(owner), step: None, kind });
                    id
                });
                NodeKind::Object { type_name: type_name.clone(), target }
            }
            NodeKind::List { item, items, ids } => NodeKind::List {
                item: item.clone(),
                items: items.iter().map(|c| self.import(source, *c, Some(owner))).collect(),
                ids: ids.live_copy(),
            },
            NodeKind::Map { item, items, ids } => NodeKind::Map {
                item: item.clone(),
                items: items
                    .iter()
                    .map(|(k, c)| (k.clone(), self.import(source, *c, Some(owner))))
                    .collect(),
                ids: ids.live_copy(),
            },
        }
    }

    fn free(&mut self, id: NodeId) {
        if let Some(node) = self.arena.remove(id) {
            for child in node.kind.children() {
                self.free(child);
            }
        }
    }

    /// Swaps the content of `target` for `kind`, freeing the old children.
    /// A replaced container keeps its retired ids.
    fn replace_kind(&mut self, target: NodeId, mut kind: NodeKind) {
        if let (Some(new), Some(old)) = (kind.ids_mut(), self.arena[target].kind.ids()) {
            new.carry_retired(old);
        }
        let old = std::mem::replace(&mut self.arena[target].kind, kind);
        for child in old.children() {
            self.free(child);
        }
    }

    pub(crate) fn replace_with_import(&mut self, target: NodeId, source: &PropertyGraph, source_id: NodeId) {
        let kind = self.import_kind(source, source_id, target);
        self.replace_kind(target, kind);
    }

    pub(crate) fn set_scalar(&mut self, target: NodeId, value: Value) {
        if let NodeKind::Scalar { value: slot, .. } = &mut self.arena[target].kind {
            *slot = value;
        }
    }

    pub(crate) fn view_node(&self, id: NodeId) -> Value {
        match self.kind(id) {
            NodeKind::Scalar { value, .. } => value.clone(),
            NodeKind::Struct { members, .. } => Value::Object(
                members.iter().map(|(k, c)| (k.clone(), self.view_node(*c))).collect::<Map<_, _>>(),
            ),
            NodeKind::Object { target, .. } => match target {
                Some(t) => self.view_node(*t),
                None => Value::Null,
            },
            NodeKind::List { items, .. } => {
                Value::Array(items.iter().map(|c| self.view_node(*c)).collect())
            }
            NodeKind::Map { items, .. } => Value::Object(
                items.iter().map(|(k, c)| (k.clone(), self.view_node(*c))).collect::<Map<_, _>>(),
            ),
        }
    }

    /// Structural path of a node; object targets share their object's path.
    pub(crate) fn path_of(&self, id: NodeId) -> ObjectPath {
        let mut steps = Vec::new();
        let mut cur = Some(id);
        while let Some(node) = cur.map(|c| &self.arena[c]) {
            if let Some(step) = &node.step {
                steps.push(step.clone());
            }
            cur = node.parent;
        }
        steps.reverse();
        ObjectPath::from_steps(steps)
    }

    pub(crate) fn resolve_path(&self, path: &ObjectPath) -> Option<NodeId> {
        let mut cur = self.root;
        for step in path.steps() {
            cur = match step {
                PathStep::Member(name) => self.member_of(cur, name)?,
                PathStep::Item(id) => self.item_by_id(cur, *id)?,
            };
        }
        Some(cur)
    }

    pub(crate) fn member_of(&self, id: NodeId, name: &str) -> Option<NodeId> {
        match self.kind(id) {
            NodeKind::Struct { members, .. } => members.get(name).copied(),
            NodeKind::Object { target: Some(t), .. } => self.member_of(*t, name),
            _ => None,
        }
    }

    /// Members in declared order; empty for null objects and non-structs.
    pub(crate) fn member_list(&self, id: NodeId) -> Vec<(String, NodeId)> {
        match self.kind(id) {
            NodeKind::Struct { members, .. } => {
                members.iter().map(|(k, c)| (k.clone(), *c)).collect()
            }
            NodeKind::Object { target: Some(t), .. } => self.member_list(*t),
            _ => Vec::new(),
        }
    }

    pub(crate) fn object_target(&self, id: NodeId) -> Option<NodeId> {
        match self.kind(id) {
            NodeKind::Object { target, .. } => *target,
            _ => None,
        }
    }

    pub(crate) fn child_of(&self, id: NodeId, name: &str) -> Result<NodeId> {
        if let Some(child) = self.member_of(id, name) {
            return Ok(child);
        }
        match self.kind(id) {
            NodeKind::Object { target: None, .. } => Err(Error::NullReference(self.path_of(id))),
            NodeKind::Struct { type_name, .. } | NodeKind::Object { type_name, .. } => {
                Err(Error::UnknownMember { type_name: type_name.clone(), member: name.to_string() })
            }
            other => Err(Error::UnknownMember {
                type_name: other.shape().describe(),
                member: name.to_string(),
            }),
        }
    }

    pub(crate) fn ids(&self, id: NodeId) -> Option<&CollectionItemIds> {
        self.kind(id).ids()
    }

    fn ids_mut(&mut self, id: NodeId) -> Option<&mut CollectionItemIds> {
        self.arena[id].kind.ids_mut()
    }

    pub(crate) fn item_by_id(&self, id: NodeId, item: ItemId) -> Option<NodeId> {
        match (self.kind(id), self.ids(id)?.locate(item).ok()?) {
            (NodeKind::List { items, .. }, Index::Position(p)) => items.get(p).copied(),
            (NodeKind::Map { items, .. }, Index::Key(k)) => items.get(&k).copied(),
            _ => None,
        }
    }

    pub(crate) fn item_at(&self, id: NodeId, index: &Index) -> Result<(NodeId, ItemId)> {
        let found = match (self.kind(id), index) {
            (NodeKind::List { items, ids, .. }, Index::Position(p)) => {
                ids.resolve(index).ok().and_then(|item| items.get(*p).map(|c| (*c, item)))
            }
            (NodeKind::Map { items, ids, .. }, Index::Key(k)) => {
                ids.resolve(index).ok().and_then(|item| items.get(k).map(|c| (*c, item)))
            }
            (NodeKind::List { .. } | NodeKind::Map { .. }, _) => None,
            _ => {
                return Err(Error::InvalidIndex { path: self.path_of(id), index: index.clone() })
            }
        };
        found.ok_or_else(|| Error::IndexNotFound(index.clone()))
    }

    /// Items in canonical order.
    pub(crate) fn item_entries(&self, id: NodeId) -> Vec<(Index, ItemId, NodeId)> {
        match self.kind(id) {
            NodeKind::List { items, ids, .. } => ids
                .entries()
                .into_iter()
                .zip(items.iter())
                .map(|((index, item), child)| (index, item, *child))
                .collect(),
            NodeKind::Map { items, ids, .. } => ids
                .entries()
                .into_iter()
                .filter_map(|(index, item)| {
                    let child = items.get(index.key()?)?;
                    Some((index, item, *child))
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The node itself for `Index::Empty`, else the addressed item.
    fn target(&self, id: NodeId, index: &Index) -> Result<(NodeId, Option<ItemId>)> {
        if index.is_empty() {
            Ok((id, None))
        } else {
            self.item_at(id, index).map(|(child, item)| (child, Some(item)))
        }
    }

    fn target_path(&self, id: NodeId, index: &Index) -> Option<ObjectPath> {
        if index.is_empty() {
            return Some(self.path_of(id));
        }
        let item = self.ids(id)?.resolve(index).ok()?;
        Some(self.path_of(id).item(item))
    }

    fn ensure_not_sealed(&self, path: &ObjectPath, base: Option<&PropertyGraph>) -> Result<()> {
        let Some(base) = base else { return Ok(()) };
        let sealed = std::iter::once(path.clone())
            .chain(path.ancestors())
            .any(|p| base.overrides.get(&p) == Some(OverrideType::Sealed));
        if sealed {
            Err(Error::Sealed(path.clone()))
        } else {
            Ok(())
        }
    }

    pub(crate) fn mark_new(&mut self, path: &ObjectPath) -> OverrideType {
        self.overrides.set(path.clone(), OverrideType::New);
        self.overrides.remove_descendants(path);
        debug!(path = %path, "classified as new");
        OverrideType::New
    }

    /// Binds `item` at `index` and stores `child` there; frees `child` when
    /// the binding is refused.
    fn attach_item(&mut self, node: NodeId, index: &Index, item: ItemId, child: NodeId) -> Result<()> {
        self.arena[child].step = Some(PathStep::Item(item));
        let bound = match &mut self.arena[node].kind {
            NodeKind::List { items, ids, .. } => ids.bind(index, item).map(|()| match index {
                Index::Position(p) => items.insert(*p, child),
                _ => items.push(child),
            }),
            NodeKind::Map { items, ids, .. } => ids.bind(index, item).map(|()| {
                if let Index::Key(k) = index {
                    items.insert(k.clone(), child);
                }
            }),
            _ => Err(Error::InvalidIndex { path: ObjectPath::root(), index: index.clone() }),
        };
        if bound.is_err() {
            self.free(child);
        }
        bound
    }

    /// Unbinds the item at `index`, frees it and drops its classification.
    fn detach_item(&mut self, node: NodeId, index: &Index, record_deletion: bool) -> Result<ItemId> {
        let (child, item) = self.item_at(node, index)?;
        let path = self.path_of(node).item(item);
        match &mut self.arena[node].kind {
            NodeKind::List { items, ids, .. } => {
                ids.remove(index)?;
                if let Index::Position(p) = index {
                    items.remove(*p);
                }
                if record_deletion {
                    ids.mark_deleted(item);
                }
            }
            NodeKind::Map { items, ids, .. } => {
                ids.remove(index)?;
                if let Index::Key(k) = index {
                    items.remove(k);
                }
                if record_deletion {
                    ids.mark_deleted(item);
                }
            }
            _ => {}
        }
        self.free(child);
        self.overrides.remove_subtree(&path);
        Ok(item)
    }

    // ── mutations (entered through NodeMut) ──────────────────────────────

    pub(crate) fn update(
        &mut self,
        node: NodeId,
        value: Value,
        index: &Index,
        base: Option<&PropertyGraph>,
    ) -> Result<()> {
        let (target, item) = self.target(node, index)?;
        let path = self.path_of(target);
        self.ensure_not_sealed(&path, base)?;
        let shape = self.kind(target).shape();
        self.schema.check(&shape, &value, &path)?;

        if let Shape::Scalar(kind) = shape {
            let stored = normalize_scalar(kind, &value)
                .ok_or_else(|| Error::TypeMismatch { path: path.clone(), expected: shape.describe() })?;
            self.set_scalar(target, stored);
        } else {
            let kind = self.build_kind(&shape, &value, target, &path)?;
            self.replace_kind(target, kind);
        }

        let override_type = if !self.inherits || self.classification(&path).is_new() {
            self.classification(&path)
        } else {
            let same_as_base = base
                .and_then(|b| b.resolve_path(&path).map(|n| (b, n)))
                .filter(|(b, n)| b.view_node(*n) == self.view_node(target));
            match same_as_base {
                Some((b, n)) => {
                    if !matches!(shape, Shape::Scalar(_)) {
                        // Rebuilt items got fresh ids; take the base ones back.
                        self.replace_with_import(target, b, n);
                        self.overrides.remove_descendants(&path);
                    }
                    self.classification(&path)
                }
                None => self.mark_new(&path),
            }
        };

        let event_path = self.path_of(node);
        self.emit(ChangeEvent {
            kind: ChangeKind::Update,
            path: event_path,
            index: index.clone(),
            item,
            had_value: true,
            override_type,
        });
        Ok(())
    }

    pub(crate) fn add(
        &mut self,
        node: NodeId,
        value: Value,
        index: &Index,
        explicit: Option<ItemId>,
        base: Option<&PropertyGraph>,
    ) -> Result<ItemId> {
        let path = self.path_of(node);
        let item_shape = match self.kind(node) {
            NodeKind::List { item, .. } | NodeKind::Map { item, .. } => item.clone(),
            _ => return Err(Error::InvalidIndex { path, index: index.clone() }),
        };
        self.ensure_not_sealed(&path, base)?;
        let item = explicit.unwrap_or_else(ItemId::generate);
        let item_path = path.item(item);
        self.schema.check(&item_shape, &value, &item_path)?;
        let child = self.build(&item_shape, &value, Some(node), &item_path)?;
        self.attach_item(node, index, item, child)?;

        if self.inherits && !self.classification(&path).is_new() {
            self.overrides.set(item_path.clone(), OverrideType::New);
        }
        let override_type = self.classification(&item_path);
        debug!(container = %path, item = %item, "item added");
        self.emit(ChangeEvent {
            kind: ChangeKind::Add,
            path,
            index: index.clone(),
            item: Some(item),
            had_value: false,
            override_type,
        });
        Ok(item)
    }

    pub(crate) fn remove(
        &mut self,
        node: NodeId,
        index: &Index,
        base: Option<&PropertyGraph>,
    ) -> Result<ItemId> {
        let path = self.path_of(node);
        let (_, item) = self.item_at(node, index)?;
        let item_path = path.item(item);
        self.ensure_not_sealed(&item_path, base)?;
        let inherited = self.inherits
            && !self.classification(&path).is_new()
            && base.is_some_and(|b| b.resolve_path(&item_path).is_some());
        self.detach_item(node, index, inherited)?;
        debug!(container = %path, item = %item, inherited, "item removed");
        let override_type = self.classification(&path);
        self.emit(ChangeEvent {
            kind: ChangeKind::Remove,
            path,
            index: index.clone(),
            item: Some(item),
            had_value: true,
            override_type,
        });
        Ok(item)
    }

    pub(crate) fn move_item(&mut self, node: NodeId, from: usize, to: usize) -> Result<ItemId> {
        let path = self.path_of(node);
        let item = match &mut self.arena[node].kind {
            NodeKind::List { items, ids, .. } => {
                let item = ids.move_item(from, to)?;
                let child = items.remove(from);
                items.insert(to, child);
                item
            }
            _ => return Err(Error::InvalidIndex { path, index: Index::Position(from) }),
        };
        debug!(container = %path, item = %item, from, to, "item moved");
        let override_type = self.classification(&path.item(item));
        self.emit(ChangeEvent {
            kind: ChangeKind::Move,
            path,
            index: Index::Position(to),
            item: Some(item),
            had_value: true,
            override_type,
        });
        Ok(item)
    }

    pub(crate) fn rekey(
        &mut self,
        node: NodeId,
        old: &str,
        new: &str,
        base: Option<&PropertyGraph>,
    ) -> Result<ItemId> {
        let path = self.path_of(node);
        let (_, item) = self.item_at(node, &Index::Key(old.to_string()))?;
        let item_path = path.item(item);
        self.ensure_not_sealed(&item_path, base)?;
        if let NodeKind::Map { items, ids, .. } = &mut self.arena[node].kind {
            ids.rekey(old, new)?;
            if let Some(child) = items.remove(old) {
                items.insert(new.to_string(), child);
            }
        }
        let override_type = if self.inherits && !self.classification(&item_path).is_new() {
            self.mark_new(&item_path)
        } else {
            self.classification(&item_path)
        };
        debug!(container = %path, item = %item, old, new, "item rekeyed");
        self.emit(ChangeEvent {
            kind: ChangeKind::Rekey,
            path,
            index: Index::Key(new.to_string()),
            item: Some(item),
            had_value: true,
            override_type,
        });
        Ok(item)
    }

    pub(crate) fn reset_to_base(
        &mut self,
        node: NodeId,
        index: &Index,
        base: Option<&PropertyGraph>,
    ) -> Result<()> {
        let (target, item) = self.target(node, index)?;
        let path = self.path_of(target);
        self.ensure_not_sealed(&path, base)?;
        let base = base.ok_or_else(|| Error::mismatch(&path, "asset has no base"))?;
        let source = base
            .resolve_path(&path)
            .ok_or_else(|| Error::mismatch(&path, "no base value at this path"))?;
        if base.kind(source).shape() != self.kind(target).shape() {
            return Err(Error::mismatch(&path, "base value has a different shape"));
        }
        self.replace_with_import(target, base, source);
        self.overrides.remove_subtree(&path);
        debug!(path = %path, "reset to base");
        let override_type = self.classification(&path);
        let event_path = self.path_of(node);
        self.emit(ChangeEvent {
            kind: ChangeKind::Reset,
            path: event_path,
            index: index.clone(),
            item,
            had_value: true,
            override_type,
        });
        Ok(())
    }

    pub(crate) fn set_override(&mut self, node: NodeId, index: &Index, ty: OverrideType) -> Result<()> {
        let (target, item) = self.target(node, index)?;
        let path = self.path_of(target);
        self.overrides.set(path.clone(), ty);
        let override_type = self.classification(&path);
        let event_path = self.path_of(node);
        self.emit(ChangeEvent {
            kind: ChangeKind::Override,
            path: event_path,
            index: index.clone(),
            item,
            had_value: true,
            override_type,
        });
        Ok(())
    }

    pub(crate) fn record_deletion(&mut self, node: NodeId, item: ItemId) -> Result<()> {
        let path = self.path_of(node);
        let ids = self
            .ids_mut(node)
            .ok_or_else(|| Error::InvalidIndex { path, index: Index::Empty })?;
        if ids.contains(item) {
            return Err(Error::DuplicateItem(item));
        }
        ids.mark_deleted(item);
        Ok(())
    }

    /// Binds a copy of `source_id` at `index` under the given id, unclassified.
    pub(crate) fn insert_imported(
        &mut self,
        node: NodeId,
        index: &Index,
        item: ItemId,
        source: &PropertyGraph,
        source_id: NodeId,
    ) -> Result<()> {
        let child = self.import(source, source_id, Some(node));
        self.attach_item(node, index, item, child)
    }

    pub(crate) fn drop_item(&mut self, node: NodeId, item: ItemId) -> Result<()> {
        let index = self
            .ids(node)
            .ok_or_else(|| Error::UnknownItem(item))?
            .locate(item)?;
        self.detach_item(node, &index, false).map(|_| ())
    }

    pub(crate) fn forget_deletion(&mut self, node: NodeId, item: ItemId) {
        if let Some(ids) = self.ids_mut(node) {
            ids.unmark_deleted(item);
        }
    }

    pub(crate) fn rekey_item(&mut self, node: NodeId, old: &str, new: &str) -> Result<()> {
        if let NodeKind::Map { items, ids, .. } = &mut self.arena[node].kind {
            ids.rekey(old, new)?;
            if let Some(child) = items.remove(old) {
                items.insert(new.to_string(), child);
            }
        }
        Ok(())
    }

    pub(crate) fn explicit_override(&self, node: NodeId, index: &Index) -> Option<OverrideType> {
        self.target_path(node, index).and_then(|p| self.overrides.get(&p))
    }

    pub(crate) fn override_at(&self, node: NodeId, index: &Index) -> OverrideType {
        match self.target_path(node, index) {
            Some(path) => self.classification(&path),
            None if self.inherits => OverrideType::Base,
            None => OverrideType::None,
        }
    }
}
