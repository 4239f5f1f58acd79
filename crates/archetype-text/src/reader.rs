//! Delta reader.
//!
//! The embedded `~Base` block is loaded first, recursively. The body is then
//! replayed into a fresh graph with the ids found in the text, markers become
//! explicit classifications, and every unmarked node finally takes its value
//! from the loaded base.

use std::io::Read;
use std::sync::Arc;

use archetype_core::{
    Asset, AssetBase, AssetId, Index, ItemId, NodeMut, OverrideType, PropertyGraph, ScalarKind, Schema,
    Shape,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Result, TextError};
use crate::keys::{parse_item_key, parse_member_key};
use crate::parser::{parse, Entry, TextValue};
use crate::scalar::{parse_scalar, DELETED, NULL};
use crate::writer::{ASSET_KEY, BASE_KEY, ID_KEY, LOCATION_KEY};

pub fn deserialize(text: &str, schema: &Arc<Schema>) -> Result<Asset> {
    let doc = parse(text)?;
    load(&doc.tag, &doc.entries, schema, 0)
}

pub fn read_from<R: Read>(mut input: R, schema: &Arc<Schema>) -> Result<Asset> {
    let mut text = String::new();
    input.read_to_string(&mut text)?;
    deserialize(&text, schema)
}

fn load(tag: &str, entries: &[Entry], schema: &Arc<Schema>, depth: usize) -> Result<Asset> {
    let mut id = None;
    let mut base = None;
    let mut body = Vec::new();
    for entry in entries {
        match entry.key.as_str() {
            ID_KEY => id = Some(asset_id(entry)?),
            BASE_KEY => base = Some(load_base(entry, schema, depth)?),
            _ => body.push(entry),
        }
    }

    let mut graph = PropertyGraph::new(Arc::clone(schema), tag)?;
    let filler = Filler { schema, has_base: base.is_some() };
    filler.members(graph.root_mut(), &body)?;

    let mut asset = Asset::from_parts(id.unwrap_or_default(), graph, base);
    asset.adopt_base_values()?;
    debug!(asset = %asset.id(), type_name = tag, depth, "asset loaded");
    Ok(asset)
}

fn asset_id(entry: &Entry) -> Result<AssetId> {
    match &entry.value {
        TextValue::Scalar(raw) => raw
            .parse()
            .map_err(|_| TextError::malformed(entry.line, format!("invalid asset id `{raw}`"))),
        _ => Err(TextError::malformed(entry.line, "asset id must be a scalar")),
    }
}

fn load_base(entry: &Entry, schema: &Arc<Schema>, depth: usize) -> Result<AssetBase> {
    let TextValue::Block { tag: None, entries } = &entry.value else {
        return Err(TextError::malformed(entry.line, "`~Base` must be a block"));
    };
    let mut location = None;
    let mut asset = None;
    for e in entries {
        match (e.key.as_str(), &e.value) {
            (LOCATION_KEY, TextValue::Scalar(raw)) => {
                location = parse_scalar(ScalarKind::String, raw)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string));
            }
            (ASSET_KEY, TextValue::Block { tag: Some(tag), entries }) => {
                asset = Some(load(tag, entries, schema, depth + 1)?);
            }
            _ => return Err(TextError::malformed(e.line, format!("unexpected `{}` in `~Base`", e.key))),
        }
    }
    match (location, asset) {
        (Some(location), Some(asset)) => Ok(AssetBase { location, asset: Arc::new(asset) }),
        (None, _) => Err(TextError::malformed(entry.line, "`~Base` has no location")),
        (_, None) => Err(TextError::malformed(entry.line, "`~Base` has no asset")),
    }
}

struct Filler<'s> {
    schema: &'s Arc<Schema>,
    has_base: bool,
}

impl Filler<'_> {
    fn check_marker(&self, line: usize, marker: Option<OverrideType>) -> Result<()> {
        if marker == Some(OverrideType::New) && !self.has_base {
            return Err(TextError::malformed(line, "override marker in an asset without a base"));
        }
        Ok(())
    }

    fn members(&self, mut node: NodeMut<'_>, entries: &[&Entry]) -> Result<()> {
        for entry in entries {
            let (name, marker) = parse_member_key(&entry.key).map_err(|r| TextError::syntax(entry.line, r))?;
            self.check_marker(entry.line, marker)?;
            let mut child = node.reborrow().child(&name)?;
            self.value(child.reborrow(), entry)?;
            if let Some(ty) = marker {
                child.set_override(&Index::Empty, ty)?;
            }
        }
        Ok(())
    }

    fn value(&self, mut node: NodeMut<'_>, entry: &Entry) -> Result<()> {
        let line = entry.line;
        let mismatch = |expected: &str| TextError::malformed(line, format!("expected {expected}"));
        match (node.shape(), &entry.value) {
            (Shape::Scalar(kind), TextValue::Scalar(raw)) => {
                let v = parse_scalar(kind, raw).map_err(|r| TextError::malformed(line, r))?;
                node.update(v, &Index::Empty)?;
            }
            (Shape::Scalar(_), _) => return Err(mismatch("a scalar value")),
            (Shape::Struct(_), TextValue::Empty) => {}
            (Shape::Struct(_), TextValue::Block { tag: None, entries }) => {
                self.members(node, &entries.iter().collect::<Vec<_>>())?;
            }
            (Shape::Object(_), TextValue::Scalar(raw)) if raw == NULL => {
                node.update(Value::Null, &Index::Empty)?;
            }
            (Shape::Object(_), TextValue::Empty) => node.update(json!({}), &Index::Empty)?,
            (Shape::Object(_), TextValue::Block { tag: None, entries }) => {
                node.update(json!({}), &Index::Empty)?;
                self.members(node, &entries.iter().collect::<Vec<_>>())?;
            }
            (Shape::Struct(t) | Shape::Object(t), _) => return Err(mismatch(&format!("members of `{t}`"))),
            (Shape::List(_) | Shape::Map(_), TextValue::Empty) => {}
            (Shape::List(item) | Shape::Map(item), TextValue::Block { tag: None, entries }) => {
                let keyed = matches!(node.shape(), Shape::Map(_));
                self.items(node, &item, keyed, entries)?;
            }
            (Shape::List(_) | Shape::Map(_), _) => return Err(mismatch("container items")),
        }
        Ok(())
    }

    fn items(&self, mut node: NodeMut<'_>, item: &Shape, keyed: bool, entries: &[Entry]) -> Result<()> {
        let mut deleted: Vec<(usize, ItemId)> = Vec::new();
        for entry in entries {
            let key = parse_item_key(&entry.key).map_err(|r| TextError::syntax(entry.line, r))?;
            if matches!(&entry.value, TextValue::Scalar(raw) if raw == DELETED) {
                deleted.push((entry.line, key.id));
                continue;
            }
            self.check_marker(entry.line, key.marker)?;
            let index = match (keyed, key.key) {
                (true, Some(k)) => Index::Key(k),
                (false, None) => Index::Empty,
                (true, None) => return Err(TextError::malformed(entry.line, "keyed item without a key")),
                (false, Some(_)) => return Err(TextError::malformed(entry.line, "list item with a key")),
            };
            let placeholder = self.schema.default_value(item)?;
            node.add_with_id(placeholder, index, key.id)?;
            self.value(node.reborrow().item_by_id(key.id)?, entry)?;
            if let Some(ty) = key.marker {
                let index = node.as_node().index_of(key.id)?;
                node.set_override(&index, ty)?;
            }
        }
        if !deleted.is_empty() && !self.has_base {
            let (line, _) = deleted[0];
            return Err(TextError::malformed(line, "deletion record in an asset without a base"));
        }
        for (line, id) in deleted {
            node.record_deletion(id)
                .map_err(|e| TextError::malformed(line, format!("deletion record {id}: {e}")))?;
        }
        Ok(())
    }
}
