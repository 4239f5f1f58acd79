//! Base/derived reconciliation.
//!
//! Both graphs are walked in lockstep. Members pair by name and container
//! items pair by [`ItemId`], never by position, so reordering on either side
//! does not misattribute overrides.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::graph::{NodeId, NodeKind, PropertyGraph};
use crate::ids::ItemId;
use crate::index::Index;
use crate::path::ObjectPath;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub path: ObjectPath,
    pub reason: String,
}

/// What a reconciliation pass changed in the derived graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Nodes and items newly classified New.
    pub marked_new: Vec<ObjectPath>,
    /// Base items copied back into the derived graph.
    pub restored: Vec<ObjectPath>,
    /// Inherited items dropped because the base no longer has them.
    pub dropped: Vec<ObjectPath>,
    pub mismatches: Vec<Mismatch>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Fails with the first structural mismatch, if any.
    pub fn into_result(self) -> Result<Self> {
        match self.mismatches.first() {
            Some(m) => Err(Error::mismatch(&m.path, m.reason.clone())),
            None => Ok(self),
        }
    }

    pub fn merge(&mut self, other: ReconcileReport) {
        self.marked_new.extend(other.marked_new);
        self.restored.extend(other.restored);
        self.dropped.extend(other.dropped);
        self.mismatches.extend(other.mismatches);
    }

    fn mismatch(&mut self, path: &ObjectPath, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(path = %path, reason = %reason, "structural mismatch");
        self.mismatches.push(Mismatch { path: path.clone(), reason });
    }
}

/// Classifies every derived node against `base`: differing values and
/// derived-only items become New, and base items the derived graph neither
/// has nor deleted are restored. Explicit New entries are kept as they are.
pub fn reconcile(derived: &mut PropertyGraph, base: &PropertyGraph) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let (d, b) = (derived.root_id(), base.root_id());
    compare(derived, d, base, b, &ObjectPath::root(), &mut report);
    debug!(
        marked_new = report.marked_new.len(),
        restored = report.restored.len(),
        mismatches = report.mismatches.len(),
        "reconciled with base"
    );
    report
}

fn mark(derived: &mut PropertyGraph, path: &ObjectPath, report: &mut ReconcileReport) {
    derived.mark_new(path);
    report.marked_new.push(path.clone());
}

fn compare(
    derived: &mut PropertyGraph,
    d: NodeId,
    base: &PropertyGraph,
    b: NodeId,
    path: &ObjectPath,
    report: &mut ReconcileReport,
) {
    if derived.classification(path).is_new() {
        return;
    }
    let (d_shape, b_shape) = (derived.kind(d).shape(), base.kind(b).shape());
    if d_shape != b_shape {
        report.mismatch(path, format!("{} in derived, {} in base", d_shape.describe(), b_shape.describe()));
        mark(derived, path, report);
        return;
    }
    match (derived.kind(d), base.kind(b)) {
        (NodeKind::Scalar { value: dv, .. }, NodeKind::Scalar { value: bv, .. }) => {
            if dv != bv {
                mark(derived, path, report);
            }
        }
        (NodeKind::Object { target: dt, .. }, NodeKind::Object { target: bt, .. })
            if dt.is_some() != bt.is_some() =>
        {
            mark(derived, path, report);
        }
        (NodeKind::Struct { .. } | NodeKind::Object { .. }, _) => {
            let pairs: Vec<(String, NodeId, NodeId)> = derived
                .member_list(d)
                .into_iter()
                .filter_map(|(name, dc)| base.member_of(b, &name).map(|bc| (name, dc, bc)))
                .collect();
            for (name, dc, bc) in pairs {
                compare(derived, dc, base, bc, &path.member(name), report);
            }
        }
        (NodeKind::List { .. } | NodeKind::Map { .. }, _) => {
            for (index, item, dc) in derived.item_entries(d) {
                let item_path = path.item(item);
                let Some(bc) = base.item_by_id(b, item) else {
                    if !derived.classification(&item_path).is_new() {
                        mark(derived, &item_path, report);
                    }
                    continue;
                };
                if key_changed(base, b, item, &index) {
                    mark(derived, &item_path, report);
                } else {
                    compare(derived, dc, base, bc, &item_path, report);
                }
            }
            restore_missing(derived, d, base, b, path, report);
        }
        _ => {}
    }
}

fn key_changed(base: &PropertyGraph, b: NodeId, item: ItemId, index: &Index) -> bool {
    match (index, base.ids(b).and_then(|ids| ids.locate(item).ok())) {
        (Index::Key(dk), Some(Index::Key(bk))) => *dk != bk,
        _ => false,
    }
}

/// Copies base items the derived container neither holds nor retired.
/// Ordered items land right after the nearest preceding shared item.
fn restore_missing(
    derived: &mut PropertyGraph,
    d: NodeId,
    base: &PropertyGraph,
    b: NodeId,
    path: &ObjectPath,
    report: &mut ReconcileReport,
) {
    let keyed = matches!(base.kind(b), NodeKind::Map { .. });
    let mut anchor: Option<usize> = None;
    for (index, item, source) in base.item_entries(b) {
        let Some(ids) = derived.ids(d) else { return };
        if ids.contains(item) {
            if !keyed {
                anchor = ids.locate(item).ok().and_then(|i| i.position());
            }
            continue;
        }
        if ids.is_retired(item) {
            continue;
        }
        let at = if keyed { index } else { Index::Position(anchor.map_or(0, |p| p + 1)) };
        let item_path = path.item(item);
        match derived.insert_imported(d, &at, item, base, source) {
            Ok(()) => {
                if !keyed {
                    anchor = at.position();
                }
                debug!(path = %item_path, "restored base item");
                report.restored.push(item_path);
            }
            Err(err) => report.mismatch(&item_path, err.to_string()),
        }
    }
}

/// Replaces the values of every inherited node with the base's.
///
/// Used after reading a derived asset: anything not marked New must exist in
/// the base with the same shape, id and key, otherwise the input is rejected.
pub fn adopt_base_values(derived: &mut PropertyGraph, base: &PropertyGraph) -> Result<()> {
    let mut report = ReconcileReport::default();
    let (d, b) = (derived.root_id(), base.root_id());
    pull(derived, d, base, b, &ObjectPath::root(), true, &mut report)
}

/// Carries base changes into the inherited parts of `derived`, e.g. after
/// switching to a new base. Inherited items the base lost are dropped and
/// new base items are restored; local overrides are left alone.
pub fn propagate(derived: &mut PropertyGraph, base: &PropertyGraph) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let (d, b) = (derived.root_id(), base.root_id());
    if let Err(err) = pull(derived, d, base, b, &ObjectPath::root(), false, &mut report) {
        report.mismatch(&ObjectPath::root(), err.to_string());
    }
    report
}

fn pull(
    derived: &mut PropertyGraph,
    d: NodeId,
    base: &PropertyGraph,
    b: NodeId,
    path: &ObjectPath,
    strict: bool,
    report: &mut ReconcileReport,
) -> Result<()> {
    if derived.classification(path).is_new() {
        return Ok(());
    }
    let (d_shape, b_shape) = (derived.kind(d).shape(), base.kind(b).shape());
    if d_shape != b_shape {
        let reason = format!("{} in derived, {} in base", d_shape.describe(), b_shape.describe());
        if strict {
            return Err(Error::mismatch(path, reason));
        }
        report.mismatch(path, reason);
        mark(derived, path, report);
        return Ok(());
    }
    match (derived.kind(d), base.kind(b)) {
        (NodeKind::Scalar { value: dv, .. }, NodeKind::Scalar { value: bv, .. }) => {
            if dv != bv {
                derived.set_scalar(d, bv.clone());
            }
        }
        (NodeKind::Object { target: dt, .. }, NodeKind::Object { target: bt, .. })
            if dt.is_some() != bt.is_some() =>
        {
            derived.replace_with_import(d, base, b);
        }
        (NodeKind::Struct { .. } | NodeKind::Object { .. }, _) => {
            let pairs: Vec<(String, NodeId, Option<NodeId>)> = derived
                .member_list(d)
                .into_iter()
                .map(|(name, dc)| {
                    let bc = base.member_of(b, &name);
                    (name, dc, bc)
                })
                .collect();
            for (name, dc, bc) in pairs {
                let member_path = path.member(name);
                match bc {
                    Some(bc) => pull(derived, dc, base, bc, &member_path, strict, report)?,
                    None if strict => {
                        return Err(Error::malformed(format!("{member_path} has no base value")))
                    }
                    None => report.mismatch(&member_path, "member missing from base"),
                }
            }
        }
        (NodeKind::List { .. } | NodeKind::Map { .. }, _) => {
            pull_items(derived, d, base, b, path, strict, report)?;
        }
        _ => {}
    }
    Ok(())
}

fn pull_items(
    derived: &mut PropertyGraph,
    d: NodeId,
    base: &PropertyGraph,
    b: NodeId,
    path: &ObjectPath,
    strict: bool,
    report: &mut ReconcileReport,
) -> Result<()> {
    let deleted: Vec<ItemId> = derived.ids(d).map(|ids| ids.deleted().collect()).unwrap_or_default();
    for item in deleted {
        if base.item_by_id(b, item).is_some() {
            continue;
        }
        if strict {
            return Err(Error::malformed(format!("deleted item {item} under {path} is not in the base")));
        }
        derived.forget_deletion(d, item);
    }

    for (index, item, dc) in derived.item_entries(d) {
        let item_path = path.item(item);
        if derived.classification(&item_path).is_new() {
            continue;
        }
        let Some(bc) = base.item_by_id(b, item) else {
            if strict {
                return Err(Error::malformed(format!("inherited item {item_path} is not in the base")));
            }
            derived.drop_item(d, item)?;
            debug!(path = %item_path, "dropped item removed from base");
            report.dropped.push(item_path);
            continue;
        };
        if let (Index::Key(dk), Some(Index::Key(bk))) =
            (&index, base.ids(b).and_then(|ids| ids.locate(item).ok()))
        {
            if *dk != bk {
                if strict {
                    return Err(Error::malformed(format!(
                        "inherited item {item_path} has key `{dk}` but `{bk}` in the base"
                    )));
                }
                if let Err(err) = derived.rekey_item(d, dk, &bk) {
                    report.mismatch(&item_path, err.to_string());
                    mark(derived, &item_path, report);
                    continue;
                }
            }
        }
        pull(derived, dc, base, bc, &item_path, strict, report)?;
    }

    if !strict {
        restore_missing(derived, d, base, b, path, report);
    }
    Ok(())
}
