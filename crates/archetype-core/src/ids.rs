//! Identifiers for assets and container items.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Stable 128-bit identity of one entry of an ordered or keyed container.
///
/// Renders as 32 lowercase hex characters, one byte after the other.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId([u8; 16]);

impl ItemId {
    pub const EMPTY: ItemId = ItemId([0; 16]);

    /// Generates a random, non-empty id.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        loop {
            let bytes: [u8; 16] = rng.gen();
            if bytes != [0; 16] {
                return ItemId(bytes);
            }
        }
    }

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        ItemId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == [0; 16]
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({self})")
    }
}

impl FromStr for ItemId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 {
            return Err(Error::MalformedDelta(format!("item id `{s}` is not 32 hex characters")));
        }
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| Error::MalformedDelta(format!("item id `{s}`: {e}")))?;
        Ok(ItemId(bytes))
    }
}

/// Unique identity of one asset document.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(Uuid);

impl AssetId {
    pub fn new() -> Self {
        AssetId(Uuid::new_v4())
    }

    pub const fn nil() -> Self {
        AssetId(Uuid::nil())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for AssetId {
    fn from(value: Uuid) -> Self {
        AssetId(value)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({self})")
    }
}

impl FromStr for AssetId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(AssetId)
            .map_err(|e| Error::MalformedDelta(format!("asset id `{s}`: {e}")))
    }
}
