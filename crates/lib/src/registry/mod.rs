//! The configuration registry.
//!
//! [`Registry`] owns a map of config id to [`Node`]: each node holds a
//! document's raw form, a lazily cached merged view, and the graph edges
//! (children, group members) that drive invalidation. Documents layer on one
//! another through `_parent_` inheritance and `_group_` aggregation; the
//! registry keeps every cached merged view exactly equal to what a fresh
//! resolve would produce, and tells the registered
//! [`ChangeObserver`](crate::ChangeObserver) precisely what changed after
//! every mutation.
//!
//! All state sits behind a single reader/writer lock. Reads (including lazy
//! cache population, which upgrades to the write lock) and mutations are
//! atomic: no caller ever observes a child invalidated while its parent is
//! not yet updated. Observer callbacks run after the lock is released.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fmt,
    path::Path,
    sync::{Arc, Mutex, RwLock},
};

use indexmap::IndexMap;

use crate::{
    Result,
    engine::{diff, merge, remove_leaves},
    keys,
    observer::ChangeObserver,
    subst,
    value::{Map, Value},
};

pub mod errors;

pub use errors::RegistryError;

/// Keyword installed while a document loaded from a file is substituted;
/// holds the directory of that file.
const CURRENT_DIR_KEYWORD: &str = "CURRENT_DIR";

/// One registered document.
///
/// `children` is derived state: the ids of every node whose raw `_parent_`
/// names this node. `members` is present only for group nodes; a group's raw
/// `_merge_`/`_append_`/`_remove_` fields are rebuilt from its members on
/// every update and never supplied by a caller.
#[derive(Debug, Clone)]
struct Node {
    raw: Value,
    children: Vec<String>,
    members: Option<Vec<String>>,
    merged: Option<Value>,
}

/// Everything guarded by the registry lock.
#[derive(Debug, Default)]
struct State {
    nodes: HashMap<String, Node>,
    versions: BTreeSet<String>,
    keywords: HashMap<String, String>,
}

/// A store of named, tree-structured configuration documents.
///
/// Documents are added with [`add_config`](Registry::add_config) (or loaded
/// from files with [`add_config_file`](Registry::add_config_file)), build on
/// each other via `_parent_` and `_group_`, and are read back with
/// [`get_config`](Registry::get_config) either raw or merged with their
/// whole ancestor chain.
///
/// ```
/// use sediment::{Registry, map};
///
/// let registry = Registry::new();
/// registry.add_config(map! { "_id_" => "base", "_merge_" => map! { "x" => 1 } },
///     false, None)?;
/// registry.add_config(map! {
///     "_id_" => "child",
///     "_parent_" => "base",
///     "_merge_" => map! { "y" => 2 },
/// }, false, None)?;
///
/// let merged = registry.get_config("child", false, true)?;
/// assert_eq!(merged, map! { "x" => 1, "y" => 2 });
/// # Ok::<(), sediment::Error>(())
/// ```
pub struct Registry {
    state: RwLock<State>,
    observer: Mutex<Option<Arc<dyn ChangeObserver>>>,
}

impl Registry {
    /// Creates an empty registry: no documents, an empty (accept-all)
    /// version set, and no keywords.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            observer: Mutex::new(None),
        }
    }

    /// Registers the observer notified after every mutation, replacing any
    /// previous one. Pass `None` to stop notifications.
    pub fn set_observer(&self, observer: Option<Arc<dyn ChangeObserver>>) {
        *self.observer.lock().unwrap() = observer;
    }

    /// Adds a document.
    ///
    /// The `_id_` key is required. Re-adding an existing id is a merge-in:
    /// the incoming `_merge_`/`_append_`/`_remove_` fields accumulate onto
    /// the stored raw, while a disagreement on `_parent_` or `_group_` fails
    /// with [`RegistryError::ConfigConflict`]. When `include` is set,
    /// `_include_` directives are loaded (relative to `dir`) before this
    /// document is installed. Affected merged views are recomputed before
    /// the call returns.
    pub fn add_config(&self, doc: Value, include: bool, dir: Option<&Path>) -> Result<()> {
        let (id, changes) = self.add_config_inner(doc, include, dir)?;
        if let Some(observer) = self.observer() {
            observer.on_added(&id);
            for (changed_id, patch) in &changes {
                observer.on_changed(changed_id, patch);
            }
        }
        Ok(())
    }

    pub(crate) fn add_config_inner(
        &self,
        mut doc: Value,
        include: bool,
        dir: Option<&Path>,
    ) -> Result<(String, Vec<(String, Value)>)> {
        let id = doc
            .get_str(keys::ID)
            .map(str::to_string)
            .ok_or(RegistryError::MissingId)?;
        let group_id = doc.get_str(keys::GROUP).map(str::to_string);
        if group_id.as_deref() == Some(id.as_str()) {
            return Err(RegistryError::ConfigConflict {
                id,
                field: "group",
            }
            .into());
        }

        // Version and parent validation under the read lock; the include
        // file I/O below must not hold any lock.
        {
            let state = self.state.read().unwrap();
            if !state.versions.is_empty() {
                match doc.get_str(keys::VERSION) {
                    None => {
                        return Err(RegistryError::UnspecifiedVersion { id }.into());
                    }
                    Some(version) if !state.versions.contains(version) => {
                        return Err(RegistryError::UnsupportedVersion {
                            id,
                            version: version.to_string(),
                        }
                        .into());
                    }
                    Some(_) => {}
                }
            }
            if let Some(parent) = doc.get_str(keys::PARENT)
                && !state.nodes.contains_key(parent)
            {
                return Err(RegistryError::InvalidParent {
                    id,
                    parent: parent.to_string(),
                }
                .into());
            }
        }

        // Keyword substitution works on a local copy of the table extended
        // with CURRENT_DIR, so the shared table is never transiently mutated
        // and concurrent loads cannot observe each other's directory.
        let mut keywords = self.state.read().unwrap().keywords.clone();
        if let Some(dir) = dir {
            keywords.insert(
                CURRENT_DIR_KEYWORD.to_string(),
                dir.display().to_string(),
            );
        }
        subst::replace_document_keywords(&mut doc, &keywords);

        if include && let Some(directives) = doc.get(keys::INCLUDE) {
            self.process_includes(&id, directives, dir)?;
        }

        let parent_id = doc.get_str(keys::PARENT).map(str::to_string);
        let mut state = self.state.write().unwrap();

        // All conflict checks complete before any mutation; a failed add
        // leaves the registry untouched.
        if let Some(existing) = state.nodes.get(&id) {
            check_conflicts(&id, &existing.raw, &doc)?;
        }
        if let Some(group) = &group_id
            && let Some(existing) = state.nodes.get(group)
        {
            check_conflicts(group, &existing.raw, &doc)?;
        }

        if state.nodes.contains_key(&id) {
            // Merge-in: accumulate layering fields onto the stored raw.
            if let Some(node) = state.nodes.get_mut(&id)
                && let Some(raw) = node.raw.as_map_mut()
            {
                for (key, append) in [
                    (keys::MERGE, false),
                    (keys::APPEND, true),
                    (keys::REMOVE, true),
                ] {
                    if let Some(incoming) = doc.get(key) {
                        let slot = raw.entry(key.to_string()).or_insert(Value::Null);
                        merge(slot, incoming, append);
                    }
                }
            }
        } else {
            state.nodes.insert(
                id.clone(),
                Node {
                    raw: doc,
                    children: Vec::new(),
                    members: None,
                    merged: None,
                },
            );
            if let Some(parent) = &parent_id
                && let Some(parent_node) = state.nodes.get_mut(parent)
            {
                parent_node.children.push(id.clone());
            }
        }

        if let Some(group) = &group_id {
            if state.nodes.contains_key(group) {
                if let Some(group_node) = state.nodes.get_mut(group) {
                    let members = group_node.members.get_or_insert_with(Vec::new);
                    if !members.iter().any(|m| m == &id) {
                        members.push(id.clone());
                    }
                }
            } else {
                // First sighting of the group id: create the synthetic group
                // node. Its raw is rebuilt from the members on every update.
                let mut raw = Map::new();
                raw.insert(keys::ID.to_string(), Value::String(group.clone()));
                raw.insert(keys::GROUP.to_string(), Value::String(group.clone()));
                if let Some(parent) = &parent_id {
                    raw.insert(keys::PARENT.to_string(), Value::String(parent.clone()));
                }
                state.nodes.insert(
                    group.clone(),
                    Node {
                        raw: Value::Map(raw),
                        children: Vec::new(),
                        members: Some(vec![id.clone()]),
                        merged: None,
                    },
                );
                if let Some(parent) = &parent_id
                    && let Some(parent_node) = state.nodes.get_mut(parent)
                {
                    parent_node.children.push(group.clone());
                }
            }
        }

        let mut changed = IndexMap::new();
        update(&mut state, &id, &mut changed, &mut HashSet::new());
        let changes = produce_changes(&state, changed);
        Ok((id, changes))
    }

    fn process_includes(&self, id: &str, directives: &Value, dir: Option<&Path>) -> Result<()> {
        let Some(entries) = directives.as_list() else {
            return Err(RegistryError::InvalidIncludeType { id: id.to_string() }.into());
        };
        for entry in entries {
            let (path, load, optional, subdirectories) = match entry {
                Value::String(path) => (path.as_str(), true, false, false),
                Value::Map(_) => {
                    let path = entry.get_str("path").ok_or_else(|| {
                        RegistryError::MissingIncludePath { id: id.to_string() }
                    })?;
                    (
                        path,
                        entry.get("load").and_then(Value::as_bool).unwrap_or(true),
                        entry
                            .get("optional")
                            .and_then(Value::as_bool)
                            .unwrap_or(false),
                        entry
                            .get("includeSubdirectories")
                            .and_then(Value::as_bool)
                            .unwrap_or(false),
                    )
                }
                _ => {
                    return Err(
                        RegistryError::InvalidIncludeType { id: id.to_string() }.into()
                    );
                }
            };
            if load {
                tracing::debug!(path, config = id, "loading include");
                self.add_config_file(Path::new(path), true, dir, optional, subdirectories)?;
            }
        }
        Ok(())
    }

    /// Replaces a document's raw form wholesale.
    ///
    /// The id must already be registered, and `_parent_`/`_group_` must be
    /// identical to the stored raw; they are part of a document's identity
    /// and cannot be changed after the fact.
    pub fn set_config(&self, doc: Value) -> Result<()> {
        let id = doc
            .get_str(keys::ID)
            .map(str::to_string)
            .ok_or(RegistryError::MissingId)?;
        let changes;
        {
            let mut state = self.state.write().unwrap();
            let node = state
                .nodes
                .get(&id)
                .ok_or_else(|| RegistryError::InvalidId { id: id.clone() })?;
            for (key, field) in [(keys::GROUP, "group"), (keys::PARENT, "parent")] {
                if node.raw.get(key) != doc.get(key) {
                    return Err(RegistryError::ConfigConflict { id, field }.into());
                }
            }
            if let Some(node) = state.nodes.get_mut(&id) {
                node.raw = doc;
            }
            let mut changed = IndexMap::new();
            update(&mut state, &id, &mut changed, &mut HashSet::new());
            changes = produce_changes(&state, changed);
        }
        if let Some(observer) = self.observer() {
            for (changed_id, patch) in &changes {
                observer.on_changed(changed_id, patch);
            }
        }
        Ok(())
    }

    /// Removes a document.
    ///
    /// Fails with [`RegistryError::HasDependents`] while other documents
    /// still build on this one: a node with children cannot be removed, a
    /// group with members cannot be removed directly, and a member whose
    /// departure would dissolve a group that still has children is refused.
    /// Removing the last member of a group removes the group as well.
    pub fn remove_config(&self, id: &str) -> Result<()> {
        let changes;
        {
            let mut state = self.state.write().unwrap();
            let node = state
                .nodes
                .get(id)
                .ok_or_else(|| RegistryError::InvalidId { id: id.to_string() })?;
            if !node.children.is_empty() {
                return Err(RegistryError::HasDependents {
                    id: id.to_string(),
                    dependents: node.children.clone(),
                }
                .into());
            }
            if let Some(members) = &node.members
                && !members.is_empty()
            {
                return Err(RegistryError::HasDependents {
                    id: id.to_string(),
                    dependents: members.clone(),
                }
                .into());
            }
            let parent = node.raw.get_str(keys::PARENT).map(str::to_string);
            let group = node
                .raw
                .get_str(keys::GROUP)
                .filter(|g| *g != id)
                .map(str::to_string);

            // A member removal that would dissolve a group with children
            // would orphan those children; refuse it up front.
            if let Some(group_id) = &group
                && let Some(group_node) = state.nodes.get(group_id)
                && group_node
                    .members
                    .as_ref()
                    .is_some_and(|members| members.len() == 1 && members[0] == id)
                && !group_node.children.is_empty()
            {
                return Err(RegistryError::HasDependents {
                    id: group_id.clone(),
                    dependents: group_node.children.clone(),
                }
                .into());
            }

            if let Some(parent_id) = &parent
                && let Some(parent_node) = state.nodes.get_mut(parent_id)
            {
                parent_node.children.retain(|child| child != id);
            }

            let mut affected: Vec<String> = Vec::new();
            if let Some(group_id) = &group {
                let mut dissolve = false;
                if let Some(group_node) = state.nodes.get_mut(group_id) {
                    if let Some(members) = &mut group_node.members {
                        members.retain(|member| member != id);
                        dissolve = members.is_empty();
                    }
                }
                if dissolve {
                    let group_parent = state
                        .nodes
                        .get(group_id)
                        .and_then(|n| n.raw.get_str(keys::PARENT))
                        .map(str::to_string);
                    if let Some(gp) = &group_parent
                        && let Some(parent_node) = state.nodes.get_mut(gp)
                    {
                        parent_node.children.retain(|child| child != group_id);
                    }
                    state.nodes.remove(group_id);
                } else {
                    affected.push(group_id.clone());
                }
            }

            state.nodes.remove(id);

            let mut changed = IndexMap::new();
            let mut visited = HashSet::new();
            for affected_id in &affected {
                update(&mut state, affected_id, &mut changed, &mut visited);
            }
            changes = produce_changes(&state, changed);
        }
        if let Some(observer) = self.observer() {
            observer.on_removed(id);
            for (changed_id, patch) in &changes {
                observer.on_changed(changed_id, patch);
            }
        }
        Ok(())
    }

    /// Gets a document by id.
    ///
    /// With `raw` set, returns a clone of the stored raw document (an error
    /// for group ids, which have no caller-supplied raw). Otherwise returns
    /// the merged view: read through the lazy cache when `cache` is set, or
    /// computed fresh without touching the cache when it is not.
    pub fn get_config(&self, id: &str, raw: bool, cache: bool) -> Result<Value> {
        if raw {
            let state = self.state.read().unwrap();
            let node = state
                .nodes
                .get(id)
                .ok_or_else(|| RegistryError::InvalidId { id: id.to_string() })?;
            if node.raw.get_str(keys::GROUP) == Some(id) {
                return Err(RegistryError::InvalidId { id: id.to_string() }.into());
            }
            return Ok(node.raw.clone());
        }
        if cache {
            {
                let state = self.state.read().unwrap();
                let node = state
                    .nodes
                    .get(id)
                    .ok_or_else(|| RegistryError::InvalidId { id: id.to_string() })?;
                if let Some(merged) = &node.merged {
                    return Ok(merged.clone());
                }
            }
            // Lazy population is a write; re-check existence after the
            // upgrade since the id may have been removed in between.
            let mut state = self.state.write().unwrap();
            if !state.nodes.contains_key(id) {
                return Err(RegistryError::InvalidId { id: id.to_string() }.into());
            }
            make_merged(&mut state, id);
            Ok(merged_view(&state, id))
        } else {
            let state = self.state.read().unwrap();
            if !state.nodes.contains_key(id) {
                return Err(RegistryError::InvalidId { id: id.to_string() }.into());
            }
            Ok(merged_view(&state, id))
        }
    }

    /// Check if a document with this id exists.
    pub fn has_config(&self, id: &str) -> bool {
        self.state.read().unwrap().nodes.contains_key(id)
    }

    /// Ids of the documents contributing to a group; empty when the id does
    /// not name a group.
    pub fn ids_in_group(&self, group_id: &str) -> Vec<String> {
        self.state
            .read()
            .unwrap()
            .nodes
            .get(group_id)
            .and_then(|node| node.members.clone())
            .unwrap_or_default()
    }

    /// Removes every document. Versions and keywords are kept.
    pub fn clear(&self) {
        self.state.write().unwrap().nodes.clear();
        if let Some(observer) = self.observer() {
            observer.on_cleared();
        }
    }

    /// Associates a keyword with a value for `{keyword}` substitution in
    /// documents added afterwards.
    pub fn set_keyword(&self, keyword: &str, value: &str) {
        self.state
            .write()
            .unwrap()
            .keywords
            .insert(keyword.to_string(), value.to_string());
    }

    /// Accepts a document format version. Once any version is registered,
    /// every added document must name one of the accepted versions.
    pub fn add_version(&self, version: &str) {
        tracing::debug!(version, "accepting config version");
        self.state
            .write()
            .unwrap()
            .versions
            .insert(version.to_string());
    }

    /// The set of accepted versions; empty means all versions are accepted.
    pub fn versions(&self) -> BTreeSet<String> {
        self.state.read().unwrap().versions.clone()
    }

    fn observer(&self) -> Option<Arc<dyn ChangeObserver>> {
        self.observer.lock().unwrap().clone()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read().unwrap();
        f.debug_struct("Registry")
            .field("nodes", &state.nodes.len())
            .field("versions", &state.versions)
            .field("keywords", &state.keywords.len())
            .finish()
    }
}

/// Rejects a re-add (or group membership) that disagrees with the stored raw
/// on an identity field.
///
/// Only `_parent_` and `_group_` are identity: introducing either on a
/// re-add, or naming a different value, conflicts. The layering fields
/// (`_merge_`/`_append_`/`_remove_`) always accumulate, later additions
/// winning under overwrite semantics, and the incoming document may omit
/// fields the stored raw has.
fn check_conflicts(id: &str, existing_raw: &Value, incoming: &Value) -> Result<()> {
    for (key, field) in [(keys::PARENT, "parent"), (keys::GROUP, "group")] {
        match (existing_raw.get(key), incoming.get(key)) {
            (None, Some(_)) => {
                return Err(RegistryError::ConfigConflict {
                    id: id.to_string(),
                    field,
                }
                .into());
            }
            (Some(existing), Some(incoming)) if existing != incoming => {
                return Err(RegistryError::ConfigConflict {
                    id: id.to_string(),
                    field,
                }
                .into());
            }
            _ => {}
        }
    }
    Ok(())
}

/// Recomputes everything affected by a change to `id`: the node itself, its
/// group, and all children, transitively. Old cached merged views are saved
/// into `changed` (first occurrence wins; that is the pre-mutation view)
/// before being replaced, so the notifier can diff them afterwards. Nodes
/// whose merged view was never computed stay uncached; their correct view is
/// produced lazily on the next read.
fn update(
    state: &mut State,
    id: &str,
    changed: &mut IndexMap<String, Value>,
    visited: &mut HashSet<String>,
) {
    // Guards against parent/group reference cycles.
    if !visited.insert(id.to_string()) {
        return;
    }
    let Some(node) = state.nodes.get(id) else {
        return;
    };
    if let Some(old) = &node.merged
        && !changed.contains_key(id)
    {
        changed.insert(id.to_string(), old.clone());
    }
    if node.members.is_some() {
        rebuild_group_raw(state, id);
    }
    let was_cached = state.nodes.get(id).is_some_and(|n| n.merged.is_some());
    if was_cached {
        if let Some(node) = state.nodes.get_mut(id) {
            node.merged = None;
        }
        // Recompute immediately: a cached view must never be stale, and a
        // previously read view must stay readable without another upgrade.
        make_merged(state, id);
    }
    let group = state
        .nodes
        .get(id)
        .and_then(|n| n.raw.get_str(keys::GROUP))
        .filter(|g| *g != id)
        .map(str::to_string);
    if let Some(group_id) = group {
        update(state, &group_id, changed, visited);
    }
    let children: Vec<String> = state
        .nodes
        .get(id)
        .map(|n| n.children.clone())
        .unwrap_or_default();
    for child in children {
        update(state, &child, changed, visited);
    }
}

/// Rebuilds a group's raw layering fields from the union of its members:
/// member `_merge_` fields fold together with overwrite semantics (later
/// members win), `_append_` and `_remove_` accumulate with append semantics.
fn rebuild_group_raw(state: &mut State, id: &str) {
    let members = state
        .nodes
        .get(id)
        .and_then(|n| n.members.clone())
        .unwrap_or_default();
    let mut rebuilt = [
        (keys::MERGE, false, Value::Null),
        (keys::APPEND, true, Value::Null),
        (keys::REMOVE, true, Value::Null),
    ];
    for member_id in &members {
        let Some(member) = state.nodes.get(member_id) else {
            continue;
        };
        for (key, append, accumulator) in &mut rebuilt {
            if let Some(value) = member.raw.get(key) {
                merge(accumulator, value, *append);
            }
        }
    }
    if let Some(node) = state.nodes.get_mut(id)
        && let Some(raw) = node.raw.as_map_mut()
    {
        for (key, _, accumulator) in rebuilt {
            if accumulator.is_null() {
                raw.shift_remove(key);
            } else {
                raw.insert(key.to_string(), accumulator);
            }
        }
    }
}

/// Caches the merged view for `id`, first making sure the parent chain is
/// cached. No-op when already cached.
fn make_merged(state: &mut State, id: &str) {
    let Some(node) = state.nodes.get(id) else {
        return;
    };
    if node.merged.is_some() {
        return;
    }
    let parent = node.raw.get_str(keys::PARENT).map(str::to_string);
    if let Some(parent_id) = parent {
        make_merged(state, &parent_id);
    }
    let view = merged_view(state, id);
    if let Some(node) = state.nodes.get_mut(id) {
        node.merged = Some(view);
    }
}

/// Computes the merged view for `id` without mutating any cache, reading
/// through caches where they exist. Parent chain recursion is bounded by the
/// inheritance depth; parent existence is enforced at add time.
fn merged_view(state: &State, id: &str) -> Value {
    let Some(node) = state.nodes.get(id) else {
        return Value::Map(Map::new());
    };
    if let Some(merged) = &node.merged {
        return merged.clone();
    }
    let raw = &node.raw;
    if let Some(parent) = raw.get_str(keys::PARENT) {
        let mut view = merged_view(state, parent);
        if let Some(remove) = raw.get(keys::REMOVE) {
            remove_leaves(&mut view, remove);
        }
        if let Some(overlay) = raw.get(keys::MERGE) {
            merge(&mut view, overlay, false);
        }
        if let Some(additions) = raw.get(keys::APPEND) {
            merge(&mut view, additions, true);
        }
        view
    } else if let Some(overlay) = raw.get(keys::MERGE) {
        let mut view = overlay.clone();
        if let Some(additions) = raw.get(keys::APPEND) {
            merge(&mut view, additions, true);
        }
        view
    } else if let Some(additions) = raw.get(keys::APPEND) {
        additions.clone()
    } else {
        Value::Map(Map::new())
    }
}

/// Turns the saved pre-mutation views into observer patches: each id still
/// registered is diffed against its freshly recomputed view, and ids with an
/// empty diff are dropped.
fn produce_changes(state: &State, changed: IndexMap<String, Value>) -> Vec<(String, Value)> {
    changed
        .into_iter()
        .filter_map(|(id, old)| {
            if !state.nodes.contains_key(&id) {
                return None;
            }
            let new = merged_view(state, &id);
            diff(&old, &new).map(|patch| (id, patch))
        })
        .collect()
}
