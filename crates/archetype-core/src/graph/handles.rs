use serde_json::Value;

use super::{NodeId, NodeKind, NodeKindTag, PropertyGraph};
use crate::error::{Error, Result};
use crate::ids::ItemId;
use crate::index::Index;
use crate::overrides::OverrideType;
use crate::path::ObjectPath;
use crate::registry::CollectionItemIds;
use crate::schema::Shape;

/// Read-only cursor on one node.
#[derive(Clone, Copy, Debug)]
pub struct NodeRef<'a> {
    graph: &'a PropertyGraph,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub(crate) fn new(graph: &'a PropertyGraph, id: NodeId) -> Self {
        Self { graph, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tag(&self) -> NodeKindTag {
        self.graph.kind(self.id).tag()
    }

    pub fn shape(&self) -> Shape {
        self.graph.kind(self.id).shape()
    }

    pub fn path(&self) -> ObjectPath {
        self.graph.path_of(self.id)
    }

    /// Owning node. Members of a referenced object report the object node.
    pub fn parent(&self) -> Option<NodeRef<'a>> {
        let parent = self.graph.arena[self.id].parent?;
        let owner = match self.graph.arena[parent].parent {
            Some(grand) if self.graph.object_target(grand) == Some(parent) => grand,
            _ => parent,
        };
        Some(NodeRef::new(self.graph, owner))
    }

    pub fn child(&self, name: &str) -> Result<NodeRef<'a>> {
        self.graph.child_of(self.id, name).map(|id| NodeRef::new(self.graph, id))
    }

    pub fn item(&self, index: &Index) -> Result<NodeRef<'a>> {
        self.graph.item_at(self.id, index).map(|(id, _)| NodeRef::new(self.graph, id))
    }

    pub fn item_by_id(&self, item: ItemId) -> Result<NodeRef<'a>> {
        let ids = self.item_ids().ok_or(Error::UnknownItem(item))?;
        ids.locate(item)?;
        self.graph
            .item_by_id(self.id, item)
            .map(|id| NodeRef::new(self.graph, id))
            .ok_or(Error::UnknownItem(item))
    }

    /// Value of the node (`Index::Empty`) or of one of its items.
    pub fn retrieve(&self, index: &Index) -> Result<Value> {
        if index.is_empty() {
            Ok(self.graph.view_node(self.id))
        } else {
            self.item(index).map(|item| item.value())
        }
    }

    pub fn value(&self) -> Value {
        self.graph.view_node(self.id)
    }

    /// Effective classification of the node or of one of its items.
    /// Unknown indices report the graph default rather than failing.
    pub fn get_override(&self, index: &Index) -> OverrideType {
        self.graph.override_at(self.id, index)
    }

    /// Classification recorded for the node or item, if any.
    pub fn explicit_override(&self, index: &Index) -> Option<OverrideType> {
        self.graph.explicit_override(self.id, index)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.graph.kind(self.id), NodeKind::Object { target: None, .. })
    }

    /// Members in declared order; empty for scalars, containers and null objects.
    pub fn members(&self) -> Vec<(String, NodeRef<'a>)> {
        self.graph
            .member_list(self.id)
            .into_iter()
            .map(|(name, id)| (name, NodeRef::new(self.graph, id)))
            .collect()
    }

    /// Container items in canonical order.
    pub fn items(&self) -> Vec<(Index, ItemId, NodeRef<'a>)> {
        self.graph
            .item_entries(self.id)
            .into_iter()
            .map(|(index, item, id)| (index, item, NodeRef::new(self.graph, id)))
            .collect()
    }

    pub fn item_ids(&self) -> Option<&'a CollectionItemIds> {
        self.graph.ids(self.id)
    }

    pub fn len(&self) -> usize {
        self.item_ids().map_or(0, CollectionItemIds::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn item_id(&self, index: &Index) -> Result<ItemId> {
        self.graph.item_at(self.id, index).map(|(_, item)| item)
    }

    pub fn index_of(&self, item: ItemId) -> Result<Index> {
        self.item_ids().ok_or(Error::UnknownItem(item))?.locate(item)
    }
}

/// Mutable cursor on one node. Navigation consumes the handle.
///
/// Handles obtained through an asset carry the base graph, which decides
/// whether a write reproduces the inherited value and whether the target is
/// sealed.
pub struct NodeMut<'a> {
    graph: &'a mut PropertyGraph,
    base: Option<&'a PropertyGraph>,
    id: NodeId,
}

impl<'a> NodeMut<'a> {
    pub(crate) fn new(graph: &'a mut PropertyGraph, base: Option<&'a PropertyGraph>, id: NodeId) -> Self {
        Self { graph, base, id }
    }

    pub fn child(self, name: &str) -> Result<NodeMut<'a>> {
        let id = self.graph.child_of(self.id, name)?;
        Ok(NodeMut { id, ..self })
    }

    pub fn item(self, index: &Index) -> Result<NodeMut<'a>> {
        let (id, _) = self.graph.item_at(self.id, index)?;
        Ok(NodeMut { id, ..self })
    }

    pub fn item_by_id(self, item: ItemId) -> Result<NodeMut<'a>> {
        let id = self.as_node().item_by_id(item)?.id();
        Ok(NodeMut { id, ..self })
    }

    /// Shorter-lived handle on the same node.
    pub fn reborrow(&mut self) -> NodeMut<'_> {
        NodeMut { graph: &mut *self.graph, base: self.base, id: self.id }
    }

    pub fn as_node(&self) -> NodeRef<'_> {
        NodeRef::new(self.graph, self.id)
    }

    pub fn path(&self) -> ObjectPath {
        self.graph.path_of(self.id)
    }

    pub fn shape(&self) -> Shape {
        self.graph.kind(self.id).shape()
    }

    pub fn len(&self) -> usize {
        self.as_node().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn retrieve(&self, index: &Index) -> Result<Value> {
        self.as_node().retrieve(index)
    }

    pub fn get_override(&self, index: &Index) -> OverrideType {
        self.as_node().get_override(index)
    }

    /// Replaces the node value (`Index::Empty`) or the item at `index`.
    pub fn update(&mut self, value: Value, index: &Index) -> Result<()> {
        self.graph.update(self.id, value, index, self.base)
    }

    /// Adds an item under a fresh id and returns it.
    pub fn add(&mut self, value: Value, index: Index) -> Result<ItemId> {
        self.graph.add(self.id, value, &index, None, self.base)
    }

    /// Adds an item under a caller-chosen id, e.g. one read back from a file.
    pub fn add_with_id(&mut self, value: Value, index: Index, item: ItemId) -> Result<ItemId> {
        self.graph.add(self.id, value, &index, Some(item), self.base)
    }

    pub fn remove(&mut self, index: &Index) -> Result<ItemId> {
        self.graph.remove(self.id, index, self.base)
    }

    pub fn move_item(&mut self, from: usize, to: usize) -> Result<ItemId> {
        self.graph.move_item(self.id, from, to)
    }

    pub fn rekey(&mut self, old: &str, new: &str) -> Result<ItemId> {
        self.graph.rekey(self.id, old, new, self.base)
    }

    /// Drops local changes below the node or item and takes the base value.
    pub fn reset_to_base(&mut self, index: &Index) -> Result<()> {
        self.graph.reset_to_base(self.id, index, self.base)
    }

    /// Forces a classification without touching the value.
    pub fn set_override(&mut self, index: &Index, ty: OverrideType) -> Result<()> {
        self.graph.set_override(self.id, index, ty)
    }

    /// Records that the inherited item `item` was removed from this container.
    pub fn record_deletion(&mut self, item: ItemId) -> Result<()> {
        self.graph.record_deletion(self.id, item)
    }
}
