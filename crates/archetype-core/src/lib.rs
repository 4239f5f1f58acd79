//! Core primitives for archetype assets.
//!
//! An [`Asset`] owns a [`PropertyGraph`]: a node-per-property tree built from a
//! declared [`Schema`]. Derived assets keep a read-only snapshot of the asset
//! they inherit from and classify every node and container item as inherited
//! ([`OverrideType::Base`]) or locally authored ([`OverrideType::New`]).
//!
//! Container entries are addressed through [`CollectionItemIds`], which hands
//! out stable [`ItemId`]s that survive reordering and rekeying, so overrides
//! stay attached to the right logical item.

pub mod asset;
pub mod error;
pub mod graph;
pub mod ids;
pub mod index;
pub mod overrides;
pub mod path;
pub mod reconcile;
pub mod registry;
pub mod schema;

pub use asset::{Asset, AssetBase};
pub use error::{Error, Result};
pub use graph::{ChangeEvent, ChangeKind, NodeKindTag, NodeMut, NodeRef, PropertyGraph};
pub use ids::{AssetId, ItemId};
pub use index::Index;
pub use overrides::{OverrideMap, OverrideType};
pub use path::{ObjectPath, PathStep};
pub use reconcile::{Mismatch, ReconcileReport};
pub use registry::{CollectionItemIds, ContainerKind};
pub use schema::{MemberDef, ScalarKind, Schema, Shape, TypeDef};
