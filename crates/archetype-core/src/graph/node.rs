use std::collections::{BTreeMap, HashMap};
use std::ops::{Index, IndexMut};

use indexmap::IndexMap;
use serde_json::Value;

use crate::path::PathStep;
use crate::registry::CollectionItemIds;
use crate::schema::{ScalarKind, Shape};

/// Arena key of a node inside one graph. Not stable across graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

#[derive(Debug, Clone)]
pub(crate) struct Node {
    /// Owning node; lookup only.
    pub parent: Option<NodeId>,
    /// Last step of the node's path. `None` for the root and object targets.
    pub step: Option<PathStep>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Scalar {
        kind: ScalarKind,
        value: Value,
    },
    Struct {
        type_name: String,
        members: IndexMap<String, NodeId>,
    },
    /// Reference to a struct node stored in the arena. The target is
    /// transparent for paths: its members hang directly off the object path.
    Object {
        type_name: String,
        target: Option<NodeId>,
    },
    List {
        item: Shape,
        items: Vec<NodeId>,
        ids: CollectionItemIds,
    },
    Map {
        item: Shape,
        items: BTreeMap<String, NodeId>,
        ids: CollectionItemIds,
    },
}

/// Public discriminant of a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKindTag {
    Scalar,
    Struct,
    Object,
    List,
    Map,
}

impl NodeKind {
    pub fn tag(&self) -> NodeKindTag {
        match self {
            NodeKind::Scalar { .. } => NodeKindTag::Scalar,
            NodeKind::Struct { .. } => NodeKindTag::Struct,
            NodeKind::Object { .. } => NodeKindTag::Object,
            NodeKind::List { .. } => NodeKindTag::List,
            NodeKind::Map { .. } => NodeKindTag::Map,
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            NodeKind::Scalar { kind, .. } => Shape::Scalar(*kind),
            NodeKind::Struct { type_name, .. } => Shape::Struct(type_name.clone()),
            NodeKind::Object { type_name, .. } => Shape::Object(type_name.clone()),
            NodeKind::List { item, .. } => Shape::List(Box::new(item.clone())),
            NodeKind::Map { item, .. } => Shape::Map(Box::new(item.clone())),
        }
    }

    pub fn ids(&self) -> Option<&CollectionItemIds> {
        match self {
            NodeKind::List { ids, .. } | NodeKind::Map { ids, .. } => Some(ids),
            _ => None,
        }
    }

    pub fn ids_mut(&mut self) -> Option<&mut CollectionItemIds> {
        match self {
            NodeKind::List { ids, .. } | NodeKind::Map { ids, .. } => Some(ids),
            _ => None,
        }
    }

    /// Owned children, in canonical order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Scalar { .. } => Vec::new(),
            NodeKind::Struct { members, .. } => members.values().copied().collect(),
            NodeKind::Object { target, .. } => target.iter().copied().collect(),
            NodeKind::List { items, .. } => items.clone(),
            NodeKind::Map { items, .. } => items.values().copied().collect(),
        }
    }
}

/// Node storage of one graph, keyed by [`NodeId`].
///
/// Indexing with an id that does not belong to this arena panics, like any
/// out-of-bounds index.
#[derive(Debug, Clone, Default)]
pub(crate) struct Arena {
    nodes: HashMap<NodeId, Node>,
    next: u32,
}

impl Arena {
    pub fn alloc_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    pub fn insert(&mut self, id: NodeId, node: Node) {
        self.nodes.insert(id, node);
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }
}

impl Index<NodeId> for Arena {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[&id]
    }
}

impl IndexMut<NodeId> for Arena {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        match self.nodes.get_mut(&id) {
            Some(node) => node,
            None => panic!("{id:?} does not belong to this graph"),
        }
    }
}
