#![allow(dead_code)]

use std::sync::Arc;

use archetype_core::{Asset, AssetId, Index, ItemId, Schema, Shape, TypeDef};
use serde_json::Value;

pub const NIL: &str = "00000000-0000-0000-0000-000000000000";

/// Deterministic id: the little-endian bytes of `index`, repeated four times.
pub fn id(index: u32) -> ItemId {
    let mut bytes = [0u8; 16];
    for chunk in bytes.chunks_mut(4) {
        chunk.copy_from_slice(&index.to_le_bytes());
    }
    ItemId::from_bytes(bytes)
}

pub fn schema() -> Arc<Schema> {
    Arc::new(
        Schema::new()
            .with(TypeDef::new("MyAsset1").member("MyString", Shape::string()))
            .with(TypeDef::new("MyStruct").member("MyStrings", Shape::list_of(Shape::string())))
            .with(
                TypeDef::new("MyAsset2")
                    .member("Struct", Shape::Struct("MyStruct".into()))
                    .member("MyStrings", Shape::list_of(Shape::string())),
            )
            .with(TypeDef::new("MyAsset3").member("MyDictionary", Shape::map_of(Shape::string())))
            .with(TypeDef::new("SomeObject").member("Value", Shape::string()))
            .with(
                TypeDef::new("MyAsset4")
                    .member("MyObjects", Shape::list_of(Shape::Object("SomeObject".into()))),
            ),
    )
}

/// Base asset with a nil id whose `member` container holds `items` under
/// fixed ids, in order.
pub fn base_with_items(type_name: &str, member: &str, items: &[(u32, Index, Value)]) -> Arc<Asset> {
    let mut asset = Asset::new(schema(), type_name).unwrap();
    asset.set_id(AssetId::nil());
    {
        let mut container = asset.root_mut().child(member).unwrap();
        for (n, index, value) in items {
            container.add_with_id(value.clone(), index.clone(), id(*n)).unwrap();
        }
    }
    Arc::new(asset)
}

/// Derives from `base` at location `MyAsset`, with a nil id.
pub fn derive(base: &Arc<Asset>) -> Asset {
    let mut derived = Asset::derive(base, "MyAsset");
    derived.set_id(AssetId::nil());
    derived
}
