//! Pure merge/diff operations over [`Value`] trees.
//!
//! These functions are the layering engine underneath the registry: [`merge`]
//! folds one tree over another with overwrite or append semantics, [`diff`]
//! produces the minimal patch from one tree to another, and [`remove_leaves`]
//! prunes the paths named by a document's `_remove_` shape. None of them
//! touch registry state; they clone on write and leave their sources intact.
//!
//! The string sentinel [`DEFAULT_VALUE`](crate::keys::DEFAULT_VALUE)
//! (`"_default_"`) threads through both directions: as a merge source it
//! means "leave the target untouched", and diff emits it to pad unchanged
//! list indices so a patch stays the same length as its source list and can
//! be fed back through [`merge`].

use crate::keys;
use crate::value::{Map, Value};

/// Returns true when `v` is the `"_default_"` inherit sentinel.
fn is_default_sentinel(v: &Value) -> bool {
    matches!(v, Value::String(s) if s == keys::DEFAULT_VALUE)
}

/// Deep-merges `source` over `target`.
///
/// * a null source nulls the target;
/// * the `"_default_"` sentinel leaves the target unchanged;
/// * scalars overwrite by cloning;
/// * maps merge key-wise, creating missing keys;
/// * lists merge element-wise starting at index `target.len()` when `append`
///   is set, else at index 0; merging a shorter list over a longer one only
///   overwrites a prefix. Elements recurse, so appending a list of maps
///   merges into any entries the indices land on rather than discarding them.
///
/// ```
/// use sediment::{engine::merge, list};
///
/// let mut target = list![1, 2, 3];
/// merge(&mut target, &list![9], false);
/// assert_eq!(target, list![9, 2, 3]);
/// merge(&mut target, &list![4], true);
/// assert_eq!(target, list![9, 2, 3, 4]);
/// ```
pub fn merge(target: &mut Value, source: &Value, append: bool) {
    if source.is_null() {
        *target = Value::Null;
        return;
    }
    if is_default_sentinel(source) {
        return;
    }
    match source {
        Value::Map(entries) => {
            if !target.is_map() {
                *target = Value::Map(Map::new());
            }
            if let Value::Map(map) = target {
                for (key, value) in entries {
                    let slot = map.entry(key.clone()).or_insert(Value::Null);
                    merge(slot, value, append);
                }
            }
        }
        Value::List(items) => {
            if !target.is_list() {
                *target = Value::List(Vec::new());
            }
            if let Value::List(list) = target {
                let mut index = if append { list.len() } else { 0 };
                for item in items {
                    if list.len() <= index {
                        list.resize(index + 1, Value::Null);
                    }
                    merge(&mut list[index], item, append);
                    index += 1;
                }
            }
        }
        _ => *target = source.clone(),
    }
}

/// Computes the patch that turns `a` into `b`, or `None` when they match.
///
/// The patch reports additions and changes only; keys or list entries present
/// in `a` but absent from `b` are *not* represented, so this is a display and
/// conflict-detection aid rather than a reversible delta. Rules:
///
/// * `a` present, `b` null: the patch is null;
/// * `a` null or a different variant than `b`: the patch is a clone of `b`;
/// * scalars: clone of `b` when the values differ;
/// * maps: keyed sub-patches for keys of `b` that are new or changed
///   (`_tmp_` keys are skipped; they hold session-local data);
/// * lists: the patch has exactly `b`'s length, with unchanged indices
///   padded by the `"_default_"` sentinel so the patch merges cleanly.
pub fn diff(a: &Value, b: &Value) -> Option<Value> {
    match (a, b) {
        (Value::Null, Value::Null) => None,
        (_, Value::Null) => Some(Value::Null),
        (Value::Null, _) => Some(b.clone()),
        (Value::Map(ma), Value::Map(mb)) => {
            let mut patch = Map::new();
            for (key, vb) in mb {
                if key == keys::TMP {
                    continue;
                }
                match ma.get(key) {
                    None => {
                        patch.insert(key.clone(), vb.clone());
                    }
                    Some(va) => {
                        if let Some(sub) = diff(va, vb) {
                            patch.insert(key.clone(), sub);
                        }
                    }
                }
            }
            (!patch.is_empty()).then_some(Value::Map(patch))
        }
        (Value::List(la), Value::List(lb)) => {
            let mut patch = Vec::with_capacity(lb.len());
            let mut changed = false;
            for (index, vb) in lb.iter().enumerate() {
                let va = la.get(index).unwrap_or(&Value::Null);
                match diff(va, vb) {
                    Some(sub) => {
                        changed = true;
                        patch.push(sub);
                    }
                    None => patch.push(Value::String(keys::DEFAULT_VALUE.to_string())),
                }
            }
            changed.then_some(Value::List(patch))
        }
        _ if std::mem::discriminant(a) != std::mem::discriminant(b) => Some(b.clone()),
        _ => (a != b).then(|| b.clone()),
    }
}

/// Deletes from `target` every path named by `remove`.
///
/// `remove` is a shape mirroring the target: an empty map or list at a path
/// deletes the whole subtree at that path, a non-empty map recurses, and any
/// scalar leaf deletes the key it sits under. Only map targets are pruned;
/// individual list elements cannot be removed (a list can only be deleted
/// wholesale by naming its key).
pub fn remove_leaves(target: &mut Value, remove: &Value) {
    let Some(shape) = remove.as_map() else {
        return;
    };
    let Some(map) = target.as_map_mut() else {
        return;
    };
    for (key, entry) in shape {
        if !map.contains_key(key) {
            continue;
        }
        match entry {
            Value::Map(m) if !m.is_empty() => {
                if let Some(slot) = map.get_mut(key) {
                    remove_leaves(slot, entry);
                }
            }
            _ => {
                map.shift_remove(key);
            }
        }
    }
}
