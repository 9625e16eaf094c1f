//! Differ: desired vs observed, as an ordered change set.
//!
//! Comparison runs over the attribute representation. Keyed sets are
//! matched by element key, never by position; blocks are diffed
//! recursively; leaves produce one `Update` each. Identity changes cannot
//! be applied in place and are reported as `ReplacementRequired`.
//!
//! Ordering: replacement entries first, then entries in the desired spec's
//! declaration order. A removal that would collide with an addition (same
//! listener port, or a different service-discovery mechanism) is placed
//! immediately before that addition; all other removals follow, in
//! observed order.

use std::collections::{BTreeMap, BTreeSet};

use meshform_id::ObjectIdentity;
use meshform_model::{AttributePath, AttributeValue, Attributes, ObservedState, SetElement, Spec};

/// What a change does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeKind {
    Add,
    Remove,
    Update,
    /// Not an error: the change can only be applied by delete-then-create.
    ReplacementRequired,
}

impl ChangeKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            ChangeKind::Add => "+",
            ChangeKind::Remove => "-",
            ChangeKind::Update => "~",
            ChangeKind::ReplacementRequired => "!",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Add => "add",
            ChangeKind::Remove => "remove",
            ChangeKind::Update => "update",
            ChangeKind::ReplacementRequired => "replace",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: AttributePath,
    pub before: Option<AttributeValue>,
    pub after: Option<AttributeValue>,
}

impl Change {
    fn add(path: AttributePath, after: AttributeValue) -> Self {
        Self {
            kind: ChangeKind::Add,
            path,
            before: None,
            after: Some(after),
        }
    }

    fn remove(path: AttributePath, before: AttributeValue) -> Self {
        Self {
            kind: ChangeKind::Remove,
            path,
            before: Some(before),
            after: None,
        }
    }

    fn update(path: AttributePath, before: AttributeValue, after: AttributeValue) -> Self {
        Self {
            kind: ChangeKind::Update,
            path,
            before: Some(before),
            after: Some(after),
        }
    }
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind.symbol(), self.path)?;
        match (&self.before, &self.after) {
            (Some(before), Some(after)) => write!(f, ": {before} -> {after}")?,
            (None, Some(after)) => write!(f, " = {after}")?,
            _ => {}
        }
        if self.kind == ChangeKind::ReplacementRequired {
            f.write_str(" (forces replacement)")?;
        }
        Ok(())
    }
}

/// Ordered list of changes moving observed state toward desired state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }

    /// Returns true if applying this set needs delete-then-create.
    pub fn requires_replacement(&self) -> bool {
        self.count(ChangeKind::ReplacementRequired) > 0
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }

    /// One-line summary, e.g. `2 to add, 1 to update, 0 to remove`.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} to add, {} to update, {} to remove",
            self.count(ChangeKind::Add),
            self.count(ChangeKind::Update),
            self.count(ChangeKind::Remove)
        );
        if self.requires_replacement() {
            summary.push_str(", replacement required");
        }
        summary
    }
}

impl std::fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for change in &self.changes {
            writeln!(f, "{change}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

impl IntoIterator for ChangeSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

// =============================================================================
// Diffing
// =============================================================================

/// Diff a desired identity and spec against an observed remote object.
pub fn diff_objects(
    identity: &ObjectIdentity,
    desired: &Spec,
    observed: &ObservedState,
) -> ChangeSet {
    let mut changes = Vec::new();

    if identity.mesh() != observed.identity.mesh() {
        changes.push(Change {
            kind: ChangeKind::ReplacementRequired,
            path: AttributePath::root().field("mesh_name"),
            before: Some(AttributeValue::String(observed.identity.mesh().to_string())),
            after: Some(AttributeValue::String(identity.mesh().to_string())),
        });
    }
    if identity.name() != observed.identity.name() {
        changes.push(Change {
            kind: ChangeKind::ReplacementRequired,
            path: AttributePath::root().field("name"),
            before: Some(AttributeValue::String(observed.identity.name().to_string())),
            after: Some(AttributeValue::String(identity.name().to_string())),
        });
    }

    diff_attributes(
        &AttributePath::spec(),
        &desired.to_attributes(),
        &observed.spec.to_attributes(),
        &mut changes,
    );

    ChangeSet { changes }
}

/// Diff two specs.
pub fn diff_specs(desired: &Spec, observed: &Spec) -> ChangeSet {
    let mut changes = Vec::new();
    diff_attributes(
        &AttributePath::spec(),
        &desired.to_attributes(),
        &observed.to_attributes(),
        &mut changes,
    );
    ChangeSet { changes }
}

fn diff_attributes(
    path: &AttributePath,
    desired: &Attributes,
    observed: &Attributes,
    out: &mut Vec<Change>,
) {
    for (name, d) in desired {
        let field = path.field(name);
        match (observed.get(name), d) {
            (Some(o), d) => diff_value(&field, d, o, out),
            (None, AttributeValue::Set(elements)) => diff_set(&field, elements, &[], out),
            (None, d) => out.push(Change::add(field, d.clone())),
        }
    }

    for (name, o) in observed {
        if desired.contains_key(name) {
            continue;
        }
        let field = path.field(name);
        match o {
            AttributeValue::Set(elements) => diff_set(&field, &[], elements, out),
            o => out.push(Change::remove(field, o.clone())),
        }
    }
}

fn diff_value(
    path: &AttributePath,
    desired: &AttributeValue,
    observed: &AttributeValue,
    out: &mut Vec<Change>,
) {
    match (desired, observed) {
        (AttributeValue::Block(d), AttributeValue::Block(o)) => diff_attributes(path, d, o, out),
        (AttributeValue::Set(d), AttributeValue::Set(o)) => diff_set(path, d, o, out),
        (
            AttributeValue::OneOf {
                variant: dv,
                attributes: d,
            },
            AttributeValue::OneOf {
                variant: ov,
                attributes: o,
            },
        ) => {
            if dv == ov {
                diff_attributes(&path.field(dv), d, o, out);
            } else {
                // Only one mechanism can be selected at a time.
                out.push(Change::remove(path.field(ov), AttributeValue::Block(o.clone())));
                out.push(Change::add(path.field(dv), AttributeValue::Block(d.clone())));
            }
        }
        (d, o) if d == o => {}
        (d, o) => out.push(Change::update(path.clone(), o.clone(), d.clone())),
    }
}

fn diff_set(
    path: &AttributePath,
    desired: &[SetElement],
    observed: &[SetElement],
    out: &mut Vec<Change>,
) {
    let observed_by_key: BTreeMap<&str, &SetElement> =
        observed.iter().map(|e| (e.key.as_str(), e)).collect();
    let desired_keys: BTreeSet<&str> = desired.iter().map(|e| e.key.as_str()).collect();

    let mut removals: Vec<&SetElement> = observed
        .iter()
        .filter(|e| !desired_keys.contains(e.key.as_str()))
        .collect();

    for element in desired {
        let element_path = path.key(&element.key);
        match observed_by_key.get(element.key.as_str()) {
            Some(existing) => {
                diff_attributes(&element_path, &element.attributes, &existing.attributes, out)
            }
            None => {
                if let Some(conflict) = &element.conflict_key {
                    removals.retain(|removed| {
                        if removed.conflict_key.as_ref() == Some(conflict) {
                            out.push(Change::remove(
                                path.key(&removed.key),
                                AttributeValue::Block(removed.attributes.clone()),
                            ));
                            false
                        } else {
                            true
                        }
                    });
                }
                out.push(Change::add(
                    element_path,
                    AttributeValue::Block(element.attributes.clone()),
                ));
            }
        }
    }

    for removed in removals {
        out.push(Change::remove(
            path.key(&removed.key),
            AttributeValue::Block(removed.attributes.clone()),
        ));
    }
}
