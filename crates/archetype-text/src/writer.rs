//! Delta writer.
//!
//! Members come out in declared order and container items in registry order.
//! A key carries a marker only when its classification was recorded
//! explicitly; everything else reads as inherited. The base asset, if any, is
//! embedded after the body under `~Base`.

use std::io::Write;

use archetype_core::{Asset, Index, NodeKindTag, NodeRef, OverrideType};
use tracing::trace;

use crate::error::Result;
use crate::keys::{format_item_key, format_member_key};
use crate::scalar::{format_scalar, DELETED, NULL};
use crate::settings::Settings;

pub(crate) const BASE_KEY: &str = "~Base";
pub(crate) const ID_KEY: &str = "Id";
pub(crate) const LOCATION_KEY: &str = "Location";
pub(crate) const ASSET_KEY: &str = "Asset";

pub fn serialize(asset: &Asset, settings: &Settings) -> String {
    let mut w = Writer { out: String::new(), indent: settings.indent.max(1) };
    w.out.push('!');
    w.out.push_str(asset.type_name());
    w.out.push('\n');
    w.asset_body(asset, 0);
    w.out
}

pub fn write_to<W: Write>(asset: &Asset, settings: &Settings, mut out: W) -> Result<()> {
    out.write_all(serialize(asset, settings).as_bytes())?;
    out.flush()?;
    Ok(())
}

struct Writer {
    out: String,
    indent: usize,
}

impl Writer {
    fn line(&mut self, level: usize, key: &str, value: Option<&str>) {
        self.out.extend(std::iter::repeat(' ').take(level * self.indent));
        self.out.push_str(key);
        self.out.push(':');
        if let Some(v) = value {
            self.out.push(' ');
            self.out.push_str(v);
        }
        self.out.push('\n');
    }

    fn asset_body(&mut self, asset: &Asset, level: usize) {
        self.line(level, ID_KEY, Some(&asset.id().to_string()));
        self.members(asset.root(), level);
        if let Some(base) = asset.base() {
            trace!(location = %base.location, "embedding base");
            self.line(level, BASE_KEY, None);
            self.line(level + 1, LOCATION_KEY, Some(&format_scalar(&base.location.clone().into())));
            let tag = format!("!{}", base.asset.type_name());
            self.line(level + 1, ASSET_KEY, Some(&tag));
            self.asset_body(&base.asset, level + 2);
        }
    }

    fn members(&mut self, node: NodeRef<'_>, level: usize) {
        for (name, child) in node.members() {
            let key = format_member_key(&name, marker(child.explicit_override(&Index::Empty)));
            self.value(&key, child, level);
        }
    }

    fn value(&mut self, key: &str, node: NodeRef<'_>, level: usize) {
        match node.tag() {
            NodeKindTag::Scalar => self.line(level, key, Some(&format_scalar(&node.value()))),
            NodeKindTag::Object if node.is_null() => self.line(level, key, Some(NULL)),
            NodeKindTag::Struct | NodeKindTag::Object => {
                if node.members().is_empty() {
                    self.line(level, key, Some("{}"));
                } else {
                    self.line(level, key, None);
                    self.members(node, level + 1);
                }
            }
            NodeKindTag::List | NodeKindTag::Map => self.items(key, node, level),
        }
    }

    fn items(&mut self, key: &str, node: NodeRef<'_>, level: usize) {
        let deleted: Vec<_> = node.item_ids().map(|ids| ids.deleted().collect()).unwrap_or_default();
        let items = node.items();
        if items.is_empty() && deleted.is_empty() {
            self.line(level, key, Some("{}"));
            return;
        }
        self.line(level, key, None);
        for (index, item, child) in items {
            let ty = marker(node.explicit_override(&index));
            let item_key = format_item_key(item, index.key(), ty);
            self.value(&item_key, child, level + 1);
        }
        for item in deleted {
            self.line(level + 1, &item.to_string(), Some(DELETED));
        }
    }
}

/// Only explicit New and Sealed entries produce a marker.
fn marker(ty: Option<OverrideType>) -> Option<OverrideType> {
    ty.filter(|t| matches!(t, OverrideType::New | OverrideType::Sealed))
}
