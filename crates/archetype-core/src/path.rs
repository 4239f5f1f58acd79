//! Structural paths: member names and item identities from the root.
//!
//! Paths never contain ordinal positions, so a path stays valid when the
//! containers along it are reordered.

use std::fmt;

use crate::ids::ItemId;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathStep {
    Member(String),
    Item(ItemId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectPath(Vec<PathStep>);

impl ObjectPath {
    pub fn root() -> Self {
        ObjectPath(Vec::new())
    }

    pub fn from_steps(steps: Vec<PathStep>) -> Self {
        ObjectPath(steps)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn member(&self, name: impl Into<String>) -> Self {
        let mut steps = self.0.clone();
        steps.push(PathStep::Member(name.into()));
        ObjectPath(steps)
    }

    pub fn item(&self, id: ItemId) -> Self {
        let mut steps = self.0.clone();
        steps.push(PathStep::Item(id));
        ObjectPath(steps)
    }

    pub fn parent(&self) -> Option<ObjectPath> {
        if self.0.is_empty() {
            None
        } else {
            Some(ObjectPath(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn last(&self) -> Option<&PathStep> {
        self.0.last()
    }

    /// `true` when `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &ObjectPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Proper ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = ObjectPath> + '_ {
        (0..self.0.len()).rev().map(move |n| ObjectPath(self.0[..n].to_vec()))
    }
}

fn escape_member(name: &str) -> String {
    if !name.contains(['~', '/', '[']) {
        return name.to_string();
    }
    name.replace('~', "~0").replace('/', "~1").replace('[', "~2")
}

impl fmt::Display for ObjectPath {
    /// `/Member/Nested[<item id>]/Value`; the root renders as `/`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for step in &self.0 {
            match step {
                PathStep::Member(name) => write!(f, "/{}", escape_member(name))?,
                PathStep::Item(id) => write!(f, "[{id}]")?,
            }
        }
        Ok(())
    }
}
