//! Assets and their base link.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::{ChangeEvent, NodeMut, NodeRef, PropertyGraph};
use crate::ids::AssetId;
use crate::overrides::OverrideType;
use crate::path::ObjectPath;
use crate::reconcile::{self, ReconcileReport};
use crate::schema::Schema;

/// Read-only snapshot of the asset a derived asset inherits from.
#[derive(Debug, Clone)]
pub struct AssetBase {
    /// Where the base lives, as the loading layer names it.
    pub location: String,
    pub asset: Arc<Asset>,
}

#[derive(Debug, Clone)]
pub struct Asset {
    id: AssetId,
    graph: PropertyGraph,
    base: Option<AssetBase>,
}

impl Asset {
    pub fn new(schema: Arc<Schema>, type_name: &str) -> Result<Self> {
        Ok(Self::from_parts(AssetId::new(), PropertyGraph::new(schema, type_name)?, None))
    }

    pub fn from_value(schema: Arc<Schema>, type_name: &str, value: &Value) -> Result<Self> {
        let graph = PropertyGraph::from_value(schema, type_name, value)?;
        Ok(Self::from_parts(AssetId::new(), graph, None))
    }

    /// Assembles an asset from an already classified graph.
    pub fn from_parts(id: AssetId, mut graph: PropertyGraph, base: Option<AssetBase>) -> Self {
        graph.set_inherits(base.is_some());
        Self { id, graph, base }
    }

    /// New asset inheriting everything from `base`. Values and item ids are
    /// copied, every node starts out Base.
    pub fn derive(base: &Arc<Asset>, location: impl Into<String>) -> Self {
        let location = location.into();
        debug!(base = %base.id, location = %location, "deriving asset");
        Self {
            id: AssetId::new(),
            graph: base.graph.derived_copy(),
            base: Some(AssetBase { location, asset: Arc::clone(base) }),
        }
    }

    pub fn id(&self) -> AssetId {
        self.id
    }

    pub fn set_id(&mut self, id: AssetId) {
        self.id = id;
    }

    pub fn type_name(&self) -> &str {
        self.graph.type_name()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.graph.schema()
    }

    pub fn graph(&self) -> &PropertyGraph {
        &self.graph
    }

    pub fn base(&self) -> Option<&AssetBase> {
        self.base.as_ref()
    }

    pub fn root(&self) -> NodeRef<'_> {
        self.graph.root()
    }

    /// Mutable root handle; edits are classified against the base.
    pub fn root_mut(&mut self) -> NodeMut<'_> {
        let base = self.base.as_ref().map(|b| &b.asset.graph);
        let root = self.graph.root_id();
        NodeMut::new(&mut self.graph, base, root)
    }

    pub fn node(&self, path: &ObjectPath) -> Option<NodeRef<'_>> {
        self.graph.node_at(path)
    }

    pub fn node_mut(&mut self, path: &ObjectPath) -> Option<NodeMut<'_>> {
        let id = self.graph.resolve_path(path)?;
        let base = self.base.as_ref().map(|b| &b.asset.graph);
        Some(NodeMut::new(&mut self.graph, base, id))
    }

    pub fn get_override(&self, path: &ObjectPath) -> OverrideType {
        self.graph.classification(path)
    }

    /// Recomputes classification against the base. No-op without a base.
    pub fn reconcile(&mut self) -> ReconcileReport {
        match &self.base {
            Some(base) => reconcile::reconcile(&mut self.graph, &base.asset.graph),
            None => ReconcileReport::default(),
        }
    }

    /// Takes the base values for everything still classified Base.
    pub fn adopt_base_values(&mut self) -> Result<()> {
        match &self.base {
            Some(base) => reconcile::adopt_base_values(&mut self.graph, &base.asset.graph),
            None => Ok(()),
        }
    }

    /// Switches to `new_base`, carrying its values into inherited nodes and
    /// keeping local overrides. The location defaults to the current one.
    pub fn rebase(&mut self, new_base: Arc<Asset>, location: Option<String>) -> Result<ReconcileReport> {
        if new_base.type_name() != self.type_name() {
            return Err(Error::mismatch(
                &ObjectPath::root(),
                format!("cannot rebase {} onto {}", self.type_name(), new_base.type_name()),
            ));
        }
        let location = location
            .or_else(|| self.base.as_ref().map(|b| b.location.clone()))
            .unwrap_or_else(|| new_base.id.to_string());
        debug!(asset = %self.id, base = %new_base.id, location = %location, "rebasing asset");
        self.graph.set_inherits(true);
        let mut report = reconcile::propagate(&mut self.graph, &new_base.graph);
        report.merge(reconcile::reconcile(&mut self.graph, &new_base.graph));
        self.base = Some(AssetBase { location, asset: new_base });
        Ok(report)
    }

    /// Effective values, regardless of override origin.
    pub fn flatten(&self) -> Value {
        self.graph.view()
    }

    /// Explicit classifications in path order.
    pub fn overrides(&self) -> Vec<(ObjectPath, OverrideType)> {
        self.graph.overrides().iter().map(|(p, t)| (p.clone(), t)).collect()
    }

    pub fn on_change<F>(&mut self, listener: F) -> u64
    where
        F: FnMut(&ChangeEvent) + Send + Sync + 'static,
    {
        self.graph.on_change(listener)
    }

    pub fn off_change(&mut self, listener_id: u64) -> bool {
        self.graph.off_change(listener_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Index;
    use crate::schema::{Shape, TypeDef};
    use serde_json::json;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new().with(
            TypeDef::new("Doc")
                .member("Name", Shape::string())
                .member("Tags", Shape::list_of(Shape::string())),
        ))
    }

    #[test]
    fn derived_asset_starts_as_base() {
        let base = Arc::new(Asset::from_value(schema(), "Doc", &json!({"Name": "n", "Tags": ["a"]})).unwrap());
        let derived = Asset::derive(&base, "base.txt");
        assert_ne!(derived.id(), base.id());
        assert_eq!(derived.flatten(), base.flatten());
        assert_eq!(derived.get_override(&ObjectPath::root().member("Name")), OverrideType::Base);
        assert_eq!(base.get_override(&ObjectPath::root().member("Name")), OverrideType::None);
        assert!(derived.overrides().is_empty());
    }

    #[test]
    fn writing_the_base_value_keeps_base() {
        let base = Arc::new(Asset::from_value(schema(), "Doc", &json!({"Name": "n"})).unwrap());
        let mut derived = Asset::derive(&base, "base.txt");
        let mut name = derived.root_mut().child("Name").unwrap();
        name.update(json!("n"), &Index::Empty).unwrap();
        assert_eq!(name.get_override(&Index::Empty), OverrideType::Base);
        name.update(json!("m"), &Index::Empty).unwrap();
        assert_eq!(name.get_override(&Index::Empty), OverrideType::New);
        // Equality does not demote an explicit New.
        name.update(json!("n"), &Index::Empty).unwrap();
        assert_eq!(name.get_override(&Index::Empty), OverrideType::New);
        name.reset_to_base(&Index::Empty).unwrap();
        assert_eq!(name.get_override(&Index::Empty), OverrideType::Base);
    }

    #[test]
    fn rebase_rejects_other_types() {
        let other = Arc::new(
            Asset::new(Arc::new(Schema::new().with(TypeDef::new("Other"))), "Other").unwrap(),
        );
        let base = Arc::new(Asset::new(schema(), "Doc").unwrap());
        let mut derived = Asset::derive(&base, "base.txt");
        assert!(matches!(derived.rebase(other, None), Err(Error::StructuralMismatch { .. })));
        assert_eq!(derived.base().map(|b| b.location.as_str()), Some("base.txt"));
    }
}
