//! [`ObjectTree`] – roots, arena and global path index.
//!
//! Every mutation validates completely before it touches the tree:
//!
//! - [`ObjectTree::add_subtree`] builds a plan of every node a description
//!   would create, checks each candidate path against the index and against
//!   the rest of the candidate set, and only then allocates and links.
//! - [`ObjectTree::delete_subtree`] and [`ObjectTree::reset_subtree`] walk a
//!   snapshot of each node's children and produce a post-order removal plan,
//!   checking every planned node against the index. Removal then runs in
//!   that order, so a child is always gone before its parent.
//!
//! A plan that finds the index and the topology disagreeing returns
//! [`FruError::Internal`] and leaves the tree as it was.

use std::collections::{BTreeMap, HashMap, HashSet};

use frusvc_types::{FruError, NodeDescription, Properties, path};
use tracing::debug;

use crate::object::{NodeId, Object};

/// One node a pending attach will create.
struct PendingNode<'a> {
    path: String,
    name: &'a str,
    parent_path: String,
    properties: &'a Properties,
    /// Position of the parent in the plan, `None` for the attach point.
    parent: Option<usize>,
}

/// One node a pending removal will destroy.
struct PlannedRemoval {
    id: NodeId,
    /// `None` when the node is a root.
    parent: Option<NodeId>,
}

/// The FRU object tree.
///
/// # Example
///
/// ```
/// use frusvc_tree::ObjectTree;
/// use frusvc_types::NodeDescription;
///
/// let mut tree = ObjectTree::new();
/// tree.add_root("/system", Default::default()).unwrap();
///
/// let slot = NodeDescription::leaf("slot1")
///     .with_child(NodeDescription::leaf("dev0"))
///     .with_child(NodeDescription::leaf("dev1"));
/// let created = tree.add_subtree("/system", &[slot]).unwrap();
/// assert_eq!(created.len(), 3);
/// assert!(tree.get_object("/system/slot1/dev0").is_ok());
///
/// let removed = tree.delete_subtree("/system/slot1").unwrap();
/// assert_eq!(removed.last().map(String::as_str), Some("/system/slot1"));
/// assert!(tree.get_object("/system/slot1/dev0").is_err());
/// ```
#[derive(Debug, Default)]
pub struct ObjectTree {
    slots: Vec<Option<Object>>,
    free: Vec<usize>,
    index: HashMap<String, NodeId>,
    roots: BTreeMap<String, NodeId>,
}

impl ObjectTree {
    /// Create an empty tree with no roots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed objects.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Paths of all roots, sorted.
    pub fn root_paths(&self) -> impl Iterator<Item = &str> {
        self.roots.keys().map(String::as_str)
    }

    /// Every indexed path, in no particular order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    /// Create a root object at `path`.
    ///
    /// # Errors
    ///
    /// - [`FruError::InvalidDescription`] – `path` is malformed or a property
    ///   key is empty.
    /// - [`FruError::Conflict`] – `path` is already indexed, or it would
    ///   nest inside (or around) an existing object.
    pub fn add_root(&mut self, root_path: &str, properties: Properties) -> Result<(), FruError> {
        path::validate_path(root_path)?;
        validate_properties(root_path, &properties)?;
        if self.index.contains_key(root_path) {
            return Err(FruError::Conflict(root_path.to_string()));
        }

        let mut ancestor = path::split_parent(root_path);
        while let Some((parent, _)) = ancestor {
            if self.index.contains_key(parent) {
                return Err(FruError::Conflict(format!(
                    "{root_path} would nest under existing object {parent}"
                )));
            }
            ancestor = path::split_parent(parent);
        }
        let prefix = path::join(root_path, "");
        if let Some(inner) = self.index.keys().find(|p| p.starts_with(&prefix)) {
            return Err(FruError::Conflict(format!(
                "{root_path} would enclose existing object {inner}"
            )));
        }

        let name = match path::split_parent(root_path) {
            Some((_, name)) => name.to_string(),
            None => root_path[1..].to_string(),
        };
        let id = self.alloc(Object::new(root_path.to_string(), name, None, properties));
        self.index.insert(root_path.to_string(), id);
        self.roots.insert(root_path.to_string(), id);
        debug!(path = root_path, "root created");
        Ok(())
    }

    /// Look up the object at `path`.
    ///
    /// # Errors
    ///
    /// [`FruError::NotFound`] when `path` is not indexed.
    pub fn get_object(&self, path: &str) -> Result<&Object, FruError> {
        let id = self.lookup(path)?;
        self.node(id)
    }

    /// The object at `path` followed by all of its descendants, pre-order,
    /// children visited in name order.
    pub fn walk(&self, path: &str) -> Result<Vec<&Object>, FruError> {
        let mut out = Vec::new();
        let mut stack = vec![self.lookup(path)?];
        while let Some(id) = stack.pop() {
            let obj = self.node(id)?;
            stack.extend(obj.children.values().rev().copied());
            out.push(obj);
        }
        Ok(out)
    }

    /// Attach the nodes described by `nodes` beneath `parent_path`.
    ///
    /// All-or-nothing: either every described node is created or the tree
    /// is left untouched. Returns the created paths in creation order
    /// (each parent before its children).
    ///
    /// # Errors
    ///
    /// - [`FruError::NotFound`] – `parent_path` does not exist.
    /// - [`FruError::InvalidDescription`] – empty description, bad node name
    ///   or empty property key.
    /// - [`FruError::Conflict`] – a described path already exists, or two
    ///   described nodes would share a path.
    /// - [`FruError::Internal`] – the index entry for `parent_path` does not
    ///   lead to that object.
    pub fn add_subtree(
        &mut self,
        parent_path: &str,
        nodes: &[NodeDescription],
    ) -> Result<Vec<String>, FruError> {
        let attach_id = self.resolve(parent_path)?;
        if nodes.is_empty() {
            return Err(FruError::InvalidDescription(
                "description contains no nodes".into(),
            ));
        }

        let mut plan = Vec::new();
        let mut seen = HashSet::new();
        for node in nodes {
            self.plan_node(parent_path, None, node, &mut plan, &mut seen)?;
        }

        let mut ids: Vec<NodeId> = Vec::with_capacity(plan.len());
        let mut created = Vec::with_capacity(plan.len());
        for pending in plan {
            let parent_id = match pending.parent {
                Some(slot) => ids[slot],
                None => attach_id,
            };
            let id = self.alloc(Object::new(
                pending.path.clone(),
                pending.name.to_string(),
                Some(pending.parent_path),
                pending.properties.clone(),
            ));
            // The attach point was resolved and every other parent was
            // allocated above, so the slot is always live.
            if let Some(Some(parent)) = self.slots.get_mut(parent_id.0) {
                parent.children.insert(pending.name.to_string(), id);
            }
            self.index.insert(pending.path.clone(), id);
            debug!(path = %pending.path, "object created");
            ids.push(id);
            created.push(pending.path);
        }
        Ok(created)
    }

    /// Remove the object at `path` and everything beneath it.
    ///
    /// Returns the removed paths in removal order: every child precedes its
    /// parent and `path` itself comes last.
    ///
    /// # Errors
    ///
    /// - [`FruError::NotFound`] – `path` does not exist.
    /// - [`FruError::Internal`] – the index and the topology disagree
    ///   somewhere in the subtree; nothing is removed.
    pub fn delete_subtree(&mut self, path: &str) -> Result<Vec<String>, FruError> {
        let id = self.resolve(path)?;
        let parent = match self.node(id)?.parent_path() {
            Some(parent_path) => Some(self.lookup(parent_path).map_err(|_| {
                FruError::Internal(format!(
                    "parent {parent_path} of {path} is not indexed"
                ))
            })?),
            None => None,
        };

        let mut plan = Vec::new();
        self.plan_removal(id, parent, &mut plan)?;
        Ok(self.commit_removal(plan))
    }

    /// Remove every child subtree of `path`, keeping `path` itself.
    ///
    /// # Errors
    ///
    /// Same as [`ObjectTree::delete_subtree`].
    pub fn reset_subtree(&mut self, path: &str) -> Result<Vec<String>, FruError> {
        let id = self.resolve(path)?;
        let children: Vec<NodeId> = self.node(id)?.children.values().copied().collect();

        let mut plan = Vec::new();
        for child in children {
            self.plan_removal(child, Some(id), &mut plan)?;
        }
        Ok(self.commit_removal(plan))
    }

    /// Check the structural invariants: the set of indexed paths equals the
    /// set of nodes reachable from the roots, every child path is its
    /// parent's path plus its name, back-references name the real parent,
    /// and no node is reachable twice.
    pub fn verify(&self) -> Result<(), FruError> {
        let mut visited: HashSet<NodeId> = HashSet::new();

        for (root_path, &root_id) in &self.roots {
            let root = self.node(root_id)?;
            if root.path() != root_path || !root.is_root() {
                return Err(FruError::Internal(format!(
                    "root entry {root_path} points at {}",
                    root.path()
                )));
            }
            self.check_indexed(root, root_id)?;

            let mut stack = vec![root_id];
            while let Some(id) = stack.pop() {
                if !visited.insert(id) {
                    return Err(FruError::Internal(format!(
                        "slot {} is reachable more than once",
                        id.0
                    )));
                }
                let obj = self.node(id)?;
                for (name, &child_id) in &obj.children {
                    let child = self.node(child_id)?;
                    if child.path() != path::join(obj.path(), name)
                        || child.parent_path() != Some(obj.path())
                    {
                        return Err(FruError::Internal(format!(
                            "child {name} of {} has path {} and parent {:?}",
                            obj.path(),
                            child.path(),
                            child.parent_path()
                        )));
                    }
                    self.check_indexed(child, child_id)?;
                    stack.push(child_id);
                }
            }
        }

        if visited.len() != self.index.len() {
            return Err(FruError::Internal(format!(
                "index holds {} paths but {} objects are reachable",
                self.index.len(),
                visited.len()
            )));
        }
        let live = self.slots.iter().filter(|s| s.is_some()).count();
        if live != visited.len() {
            return Err(FruError::Internal(format!(
                "{live} live objects but {} reachable",
                visited.len()
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------------

    fn lookup(&self, path: &str) -> Result<NodeId, FruError> {
        self.index
            .get(path)
            .copied()
            .ok_or_else(|| FruError::NotFound(path.to_string()))
    }

    /// Look up `path` and confirm the indexed slot holds the object stored
    /// under that path.
    fn resolve(&self, path: &str) -> Result<NodeId, FruError> {
        let id = self.lookup(path)?;
        let obj = self.node(id)?;
        if obj.path() != path {
            return Err(FruError::Internal(format!(
                "index entry for {path} points at {}",
                obj.path()
            )));
        }
        Ok(id)
    }

    fn node(&self, id: NodeId) -> Result<&Object, FruError> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| FruError::Internal(format!("dangling reference to slot {}", id.0)))
    }

    fn check_indexed(&self, obj: &Object, id: NodeId) -> Result<(), FruError> {
        match self.index.get(obj.path()) {
            Some(&indexed) if indexed == id => Ok(()),
            _ => Err(FruError::Internal(format!(
                "index entry for {} does not match the tree",
                obj.path()
            ))),
        }
    }

    fn alloc(&mut self, obj: Object) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(obj);
                NodeId(slot)
            }
            None => {
                self.slots.push(Some(obj));
                NodeId(self.slots.len() - 1)
            }
        }
    }

    fn plan_node<'a>(
        &self,
        parent_path: &str,
        parent: Option<usize>,
        node: &'a NodeDescription,
        plan: &mut Vec<PendingNode<'a>>,
        seen: &mut HashSet<String>,
    ) -> Result<(), FruError> {
        path::validate_name(&node.name)?;
        let node_path = path::join(parent_path, &node.name);
        validate_properties(&node_path, &node.properties)?;
        if self.index.contains_key(&node_path) || !seen.insert(node_path.clone()) {
            return Err(FruError::Conflict(node_path));
        }

        let slot = plan.len();
        plan.push(PendingNode {
            path: node_path.clone(),
            name: &node.name,
            parent_path: parent_path.to_string(),
            properties: &node.properties,
            parent,
        });
        for child in &node.children {
            self.plan_node(&node_path, Some(slot), child, plan, seen)?;
        }
        Ok(())
    }

    /// Append the post-order removal plan for the subtree at `id`.
    fn plan_removal(
        &self,
        id: NodeId,
        parent: Option<NodeId>,
        plan: &mut Vec<PlannedRemoval>,
    ) -> Result<(), FruError> {
        let obj = self.node(id)?;
        self.check_indexed(obj, id)?;

        let children: Vec<(String, NodeId)> = obj
            .children
            .iter()
            .map(|(name, &child)| (name.clone(), child))
            .collect();
        for (name, child_id) in children {
            let child = self.node(child_id)?;
            if child.path() != path::join(obj.path(), &name) {
                return Err(FruError::Internal(format!(
                    "child {name} of {} is stored as {}",
                    obj.path(),
                    child.path()
                )));
            }
            self.plan_removal(child_id, Some(id), plan)?;
        }

        plan.push(PlannedRemoval { id, parent });
        Ok(())
    }

    /// Execute a removal plan produced by [`Self::plan_removal`].
    fn commit_removal(&mut self, plan: Vec<PlannedRemoval>) -> Vec<String> {
        let mut removed = Vec::with_capacity(plan.len());
        for step in plan {
            let Some(obj) = self.slots.get_mut(step.id.0).and_then(Option::take) else {
                continue;
            };
            match step.parent {
                Some(parent_id) => {
                    if let Some(Some(parent)) = self.slots.get_mut(parent_id.0) {
                        parent.children.remove(obj.name());
                    }
                }
                None => {
                    self.roots.remove(obj.path());
                }
            }
            self.index.remove(obj.path());
            self.free.push(step.id.0);
            debug!(path = obj.path(), "object removed");
            removed.push(obj.path);
        }
        removed
    }
}

fn validate_properties(path: &str, properties: &Properties) -> Result<(), FruError> {
    if properties.keys().any(String::is_empty) {
        return Err(FruError::InvalidDescription(format!(
            "{path}: property key is empty"
        )));
    }
    Ok(())
}
