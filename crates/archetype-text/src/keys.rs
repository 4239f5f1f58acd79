//! Entry keys: `Member[*|!]` and `<item id>[~<key>][*|!]`.

use archetype_core::{ItemId, OverrideType};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ItemKey {
    pub id: ItemId,
    pub key: Option<String>,
    pub marker: Option<OverrideType>,
}

fn split_marker(raw: &str) -> (&str, Option<OverrideType>) {
    match raw.chars().last().and_then(OverrideType::from_marker) {
        Some(ty) => (&raw[..raw.len() - 1], Some(ty)),
        None => (raw, None),
    }
}

fn marker(ty: Option<OverrideType>) -> &'static str {
    ty.map_or("", OverrideType::marker)
}

pub(crate) fn parse_member_key(raw: &str) -> Result<(String, Option<OverrideType>), String> {
    let (name, ty) = split_marker(raw);
    if name.is_empty() {
        return Err(format!("empty member name in `{raw}`"));
    }
    Ok((name.to_string(), ty))
}

pub(crate) fn format_member_key(name: &str, ty: Option<OverrideType>) -> String {
    format!("{name}{}", marker(ty))
}

pub(crate) fn parse_item_key(raw: &str) -> Result<ItemKey, String> {
    let (hex, rest) = match (raw.get(..32), raw.get(32..)) {
        (Some(hex), Some(rest)) => (hex, rest),
        _ => return Err(format!("`{raw}` does not start with a 32-digit item id")),
    };
    let id: ItemId = hex.parse().map_err(|_| format!("invalid item id `{hex}`"))?;
    let (rest, ty) = split_marker(rest);
    let key = match rest.strip_prefix('~') {
        None if rest.is_empty() => None,
        None => return Err(format!("unexpected `{rest}` after item id")),
        Some(k) if k.starts_with('"') => Some(
            serde_json::from_str::<String>(k).map_err(|e| format!("invalid quoted key {k}: {e}"))?,
        ),
        Some(k) if k.is_empty() => return Err("empty key after `~`".to_string()),
        Some(k) => Some(k.to_string()),
    };
    Ok(ItemKey { id, key, marker: ty })
}

fn plain_key(key: &str) -> bool {
    !key.is_empty()
        && key.trim() == key
        && !key.ends_with(['*', '!'])
        && !key.contains([':', '"', '\\', '\n', '\r', '\t'])
}

pub(crate) fn format_item_key(id: ItemId, key: Option<&str>, ty: Option<OverrideType>) -> String {
    match key {
        None => format!("{id}{}", marker(ty)),
        Some(k) if plain_key(k) => format!("{id}~{k}{}", marker(ty)),
        Some(k) => format!("{id}~{}{}", Value::String(k.to_string()), marker(ty)),
    }
}
