//! Diff computation between desired configuration and durable state

use crate::schema::{NestingMode, Schema, Type};
use crate::state::State;
use crate::value::{Attributes, Value, join_path};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Overall action a diff calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    NoOp,
    Create,
    Update,
    /// Destroy then create (or the reverse, per the replace strategy)
    Replace,
    Destroy,
}

/// Kind of an attribute-level change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Add,
    Change,
    Remove,
}

/// A single attribute-level change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub path: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
    pub kind: ChangeKind,
    /// The attribute (or an enclosing block) is marked force-new
    pub requires_new: bool,
}

impl AttributeChange {
    fn add(path: String, new: Value, requires_new: bool) -> Self {
        Self {
            path,
            old: None,
            new: Some(new),
            kind: ChangeKind::Add,
            requires_new,
        }
    }

    fn remove(path: String, old: Value, requires_new: bool) -> Self {
        Self {
            path,
            old: Some(old),
            new: None,
            kind: ChangeKind::Remove,
            requires_new,
        }
    }

    fn change(path: String, old: Value, new: Value, requires_new: bool) -> Self {
        Self {
            path,
            old: Some(old),
            new: Some(new),
            kind: ChangeKind::Change,
            requires_new,
        }
    }
}

/// Ordered attribute changes plus the action they call for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    pub action: Action,
    pub changes: Vec<AttributeChange>,
}

impl Diff {
    /// Diff that requires nothing
    pub fn empty() -> Self {
        Self {
            action: Action::NoOp,
            changes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Check if the attribute at `path` or anything below it changed
    pub fn has_change(&self, path: &str) -> bool {
        let prefix = format!("{path}.");
        self.changes
            .iter()
            .any(|c| c.path == path || c.path.starts_with(&prefix))
    }

    /// Change recorded exactly at `path`
    pub fn change(&self, path: &str) -> Option<&AttributeChange> {
        self.changes.iter().find(|c| c.path == path)
    }

    /// Check if any change forces a replacement
    pub fn requires_replace(&self) -> bool {
        self.changes.iter().any(|c| c.requires_new)
    }
}

/// Compute the diff between desired configuration and current state
///
/// `config` is `None` when the resource was removed from the desired set.
/// The configuration is expected to be validated already.
pub fn compute(schema: &Schema, config: Option<&Attributes>, state: &State) -> Diff {
    let Some(config) = config else {
        if !state.exists() {
            return Diff::empty();
        }
        let changes = state
            .attributes
            .iter()
            .map(|(name, old)| AttributeChange::remove(name.clone(), old.clone(), false))
            .collect();
        return Diff {
            action: Action::Destroy,
            changes,
        };
    };

    let desired = schema.apply_defaults(config);

    if !state.exists() {
        let changes = desired
            .iter()
            .filter(|(name, _)| schema.get(name).is_some_and(|a| !a.is_computed_only()))
            .map(|(name, new)| AttributeChange::add(name.clone(), new.clone(), false))
            .collect();
        return Diff {
            action: Action::Create,
            changes,
        };
    }

    let mut changes = Vec::new();
    diff_attributes(schema, "", &desired, &state.attributes, false, &mut changes);

    let action = if changes.is_empty() {
        Action::NoOp
    } else if changes.iter().any(|c| c.requires_new) {
        Action::Replace
    } else {
        Action::Update
    };

    Diff { action, changes }
}

fn diff_attributes(
    schema: &Schema,
    prefix: &str,
    desired: &Attributes,
    current: &Attributes,
    inherited_force_new: bool,
    out: &mut Vec<AttributeChange>,
) {
    for (name, attr) in schema.iter() {
        if attr.is_computed_only() {
            continue;
        }
        let path = join_path(prefix, name);
        let force_new = inherited_force_new || attr.force_new;

        match (desired.get(name), current.get(name)) {
            // Left for the callback to populate
            (None, _) if attr.computed => {}
            (None, None) => {}
            (Some(new), None) => out.push(AttributeChange::add(path, new.clone(), force_new)),
            (None, Some(old)) => out.push(AttributeChange::remove(path, old.clone(), force_new)),
            (Some(new), Some(old)) => diff_value(&path, &attr.ty, new, old, force_new, out),
        }
    }
}

fn diff_value(
    path: &str,
    ty: &Type,
    new: &Value,
    old: &Value,
    force_new: bool,
    out: &mut Vec<AttributeChange>,
) {
    match (ty, new, old) {
        (Type::List(elem), Value::List(new_items), Value::List(old_items)) => {
            let len = new_items.len().max(old_items.len());
            for index in 0..len {
                let item_path = join_path(path, &index.to_string());
                match (new_items.get(index), old_items.get(index)) {
                    (Some(n), Some(o)) => diff_value(&item_path, elem, n, o, force_new, out),
                    (Some(n), None) => out.push(AttributeChange::add(item_path, n.clone(), force_new)),
                    (None, Some(o)) => {
                        out.push(AttributeChange::remove(item_path, o.clone(), force_new));
                    }
                    (None, None) => {}
                }
            }
        }
        (
            Type::Block {
                schema,
                mode: NestingMode::List,
            },
            Value::List(new_items),
            Value::List(old_items),
        ) => {
            let len = new_items.len().max(old_items.len());
            for index in 0..len {
                let item_path = join_path(path, &index.to_string());
                match (new_items.get(index), old_items.get(index)) {
                    (Some(Value::Block(n)), Some(Value::Block(o))) => {
                        diff_attributes(schema, &item_path, n, o, force_new, out);
                    }
                    (Some(n), Some(o)) => {
                        if n != o {
                            out.push(AttributeChange::change(item_path, o.clone(), n.clone(), force_new));
                        }
                    }
                    (Some(n), None) => out.push(AttributeChange::add(item_path, n.clone(), force_new)),
                    (None, Some(o)) => {
                        out.push(AttributeChange::remove(item_path, o.clone(), force_new));
                    }
                    (None, None) => {}
                }
            }
        }
        (Type::Set(elem), Value::Set(new_items), Value::Set(old_items)) => {
            diff_set(path, elem, new_items, old_items, force_new, out);
        }
        (
            Type::Block {
                schema,
                mode: NestingMode::Set,
            },
            Value::Set(new_items),
            Value::Set(old_items),
        ) => diff_block_set(path, schema, new_items, old_items, force_new, out),
        (Type::Map, Value::Map(new_entries), Value::Map(old_entries)) => {
            let keys: BTreeSet<&String> = new_entries.keys().chain(old_entries.keys()).collect();
            for key in keys {
                let entry_path = join_path(path, key);
                match (new_entries.get(key), old_entries.get(key)) {
                    (Some(n), Some(o)) if n != o => out.push(AttributeChange::change(
                        entry_path,
                        Value::String(o.clone()),
                        Value::String(n.clone()),
                        force_new,
                    )),
                    (Some(n), None) => {
                        out.push(AttributeChange::add(entry_path, Value::String(n.clone()), force_new));
                    }
                    (None, Some(o)) => out.push(AttributeChange::remove(
                        entry_path,
                        Value::String(o.clone()),
                        force_new,
                    )),
                    _ => {}
                }
            }
        }
        // State written before normalization may still hold an int
        (Type::Float, _, _) if new.as_float().is_some() && new.as_float() == old.as_float() => {}
        _ => {
            if new != old {
                out.push(AttributeChange::change(
                    path.to_string(),
                    old.clone(),
                    new.clone(),
                    force_new,
                ));
            }
        }
    }
}

/// Sets are compared by content: only elements present on one side change
fn diff_set(
    path: &str,
    elem: &Type,
    new_items: &[Value],
    old_items: &[Value],
    force_new: bool,
    out: &mut Vec<AttributeChange>,
) {
    let new_items: Vec<Value> = new_items.iter().map(|item| elem.normalize(item)).collect();
    let old_items: Vec<Value> = old_items.iter().map(|item| elem.normalize(item)).collect();
    let new_keys: BTreeSet<String> = new_items.iter().map(Value::canonical_key).collect();
    let old_keys: BTreeSet<String> = old_items.iter().map(Value::canonical_key).collect();

    for item in old_items {
        if !new_keys.contains(&item.canonical_key()) {
            let item_path = join_path(path, &item.set_hash());
            out.push(AttributeChange::remove(item_path, item, force_new));
        }
    }
    for item in new_items {
        if !old_keys.contains(&item.canonical_key()) {
            let item_path = join_path(path, &item.set_hash());
            out.push(AttributeChange::add(item_path, item, force_new));
        }
    }
}

/// Block sets pair elements on their configurable fields
///
/// Computed fields never take part in the pairing, so an element upstream
/// decorated with server-assigned values still matches its configuration.
/// Paired elements are then diffed field by field under the desired
/// element's set hash.
fn diff_block_set(
    path: &str,
    schema: &Schema,
    new_items: &[Value],
    old_items: &[Value],
    force_new: bool,
    out: &mut Vec<AttributeChange>,
) {
    let mut unpaired: Vec<Option<(String, &Value)>> = old_items
        .iter()
        .map(|item| Some((identity(schema, item), item)))
        .collect();
    let mut added = Vec::new();
    let mut paired = Vec::new();

    for item in new_items {
        let key = identity(schema, item);
        let slot = unpaired
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|(old_key, _)| *old_key == key));
        match slot.and_then(Option::take) {
            Some((_, old)) => paired.push((item, old)),
            None => added.push(item),
        }
    }

    for (_, old) in unpaired.into_iter().flatten() {
        let item_path = join_path(path, &old.set_hash());
        out.push(AttributeChange::remove(item_path, old.clone(), force_new));
    }
    for (new, old) in paired {
        let item_path = join_path(path, &new.set_hash());
        match (new, old) {
            (Value::Block(n), Value::Block(o)) => diff_attributes(schema, &item_path, n, o, force_new, out),
            _ => {
                if new != old {
                    out.push(AttributeChange::change(item_path, old.clone(), new.clone(), force_new));
                }
            }
        }
    }
    for item in added {
        let item_path = join_path(path, &item.set_hash());
        out.push(AttributeChange::add(item_path, item.clone(), force_new));
    }
}

/// Canonical key of a block element restricted to its non-computed fields
fn identity(schema: &Schema, item: &Value) -> String {
    match item {
        Value::Block(attrs) => Value::Block(configurable(schema, &schema.apply_defaults(attrs))).canonical_key(),
        other => other.canonical_key(),
    }
}

fn configurable(schema: &Schema, attrs: &Attributes) -> Attributes {
    let mut out = Attributes::new();
    for (name, attr) in schema.iter() {
        if attr.computed {
            continue;
        }
        let Some(value) = attrs.get(name) else {
            continue;
        };
        let value = attr.ty.normalize(value);
        let value = match (&attr.ty, &value) {
            (Type::Block { schema: inner, mode }, Value::List(items) | Value::Set(items)) => {
                let stripped = items.iter().map(|item| match item {
                    Value::Block(block) => Value::Block(configurable(inner, block)),
                    other => other.clone(),
                });
                match mode {
                    NestingMode::List => Value::list(stripped),
                    NestingMode::Set => Value::set(stripped),
                }
            }
            _ => value,
        };
        out.insert(name.clone(), value);
    }
    out
}

/// Diff summary statistics
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    /// Number of resources to create
    pub creates: usize,
    /// Number of resources to update in place
    pub updates: usize,
    /// Number of resources to replace
    pub replaces: usize,
    /// Number of resources to destroy
    pub destroys: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs<'a>(diffs: impl IntoIterator<Item = &'a Diff>) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            match diff.action {
                Action::NoOp => {}
                Action::Create => summary.creates += 1,
                Action::Update => summary.updates += 1,
                Action::Replace => summary.replaces += 1,
                Action::Destroy => summary.destroys += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.creates + self.updates + self.replaces + self.destroys
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}
