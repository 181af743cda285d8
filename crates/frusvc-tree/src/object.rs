//! [`Object`] – one node of the FRU tree.

use std::collections::BTreeMap;

use frusvc_types::{ObjectSnapshot, Properties, PropertyValue};

/// Arena slot of a node inside its [`ObjectTree`][crate::ObjectTree].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(pub(crate) usize);

/// A tree node.
///
/// The path never changes after creation. Children are owned through the
/// tree's arena and reached through `children`; `parent` is the parent's
/// path, kept for traversal only.
#[derive(Debug, Clone)]
pub struct Object {
    pub(crate) path: String,
    pub(crate) name: String,
    pub(crate) parent: Option<String>,
    pub(crate) properties: Properties,
    pub(crate) children: BTreeMap<String, NodeId>,
}

impl Object {
    pub(crate) fn new(
        path: String,
        name: String,
        parent: Option<String>,
        properties: Properties,
    ) -> Self {
        Self {
            path,
            name,
            parent,
            properties,
            children: BTreeMap::new(),
        }
    }

    /// Full object path, e.g. `/system/slot1`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the parent node, `None` for a root.
    pub fn parent_path(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Names of the direct children in sorted order.
    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Owned copy of this node for handing out beyond the current borrow.
    pub fn snapshot(&self) -> ObjectSnapshot {
        ObjectSnapshot {
            path: self.path.clone(),
            properties: self.properties.clone(),
            children: self.children.keys().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_lists_children_sorted() {
        let mut obj = Object::new(
            "/system/slot1".into(),
            "slot1".into(),
            Some("/system".into()),
            Properties::new(),
        );
        obj.children.insert("dev1".into(), NodeId(3));
        obj.children.insert("dev0".into(), NodeId(2));

        let snap = obj.snapshot();
        assert_eq!(snap.path, "/system/slot1");
        assert_eq!(snap.children, vec!["dev0".to_string(), "dev1".to_string()]);
        assert_eq!(obj.parent_path(), Some("/system"));
        assert!(!obj.is_root());
    }
}
