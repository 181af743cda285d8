//! [`FruService`] – the process-wide object tree and its locking discipline.
//!
//! One tree-wide [`RwLock`] guards the tree. Lookups share the read lock;
//! attach, delete and reset take the write lock, so no lookup ever observes
//! a half-applied mutation. Tree operations are pure in-memory work, so the
//! lock is never held across I/O or an `.await`.
//!
//! Nothing borrowed from the tree escapes a call: every result is an owned
//! [`ObjectSnapshot`] or a list of paths, and the next call re-resolves by
//! path.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use frusvc_tree::{Object, ObjectTree};
use frusvc_types::{FruError, NodeDescription, ObjectSnapshot, Properties};
use tracing::{error, info};

/// Shared FRU inventory. Construct once at startup, share through an
/// `Arc`, drop at shutdown.
#[derive(Debug, Default)]
pub struct FruService {
    tree: RwLock<ObjectTree>,
}

impl FruService {
    /// Service with an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Service whose tree starts with the given root paths.
    ///
    /// # Errors
    ///
    /// Whatever [`ObjectTree::add_root`] reports for the first bad root.
    pub fn with_roots<I, S>(roots: I) -> Result<Self, FruError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let service = Self::new();
        for root in roots {
            service.add_root(root.as_ref())?;
        }
        Ok(service)
    }

    /// Create a root object with no properties.
    pub fn add_root(&self, path: &str) -> Result<(), FruError> {
        self.mutate(|tree| tree.add_root(path, Properties::new()))?;
        info!(path, "root object registered");
        Ok(())
    }

    pub fn get_object(&self, path: &str) -> Result<ObjectSnapshot, FruError> {
        Ok(self.read()?.get_object(path)?.snapshot())
    }

    /// Snapshot of `path` and all its descendants, pre-order.
    pub fn subtree(&self, path: &str) -> Result<Vec<ObjectSnapshot>, FruError> {
        Ok(self
            .read()?
            .walk(path)?
            .into_iter()
            .map(Object::snapshot)
            .collect())
    }

    pub fn root_paths(&self) -> Result<Vec<String>, FruError> {
        Ok(self.read()?.root_paths().map(String::from).collect())
    }

    /// Number of indexed objects.
    pub fn node_count(&self) -> Result<usize, FruError> {
        Ok(self.read()?.len())
    }

    /// Attach `nodes` beneath `parent_path`; see [`ObjectTree::add_subtree`].
    pub fn add_subtree(
        &self,
        parent_path: &str,
        nodes: &[NodeDescription],
    ) -> Result<Vec<String>, FruError> {
        self.mutate(|tree| tree.add_subtree(parent_path, nodes))
    }

    /// Remove `path` and its subtree; see [`ObjectTree::delete_subtree`].
    pub fn delete_subtree(&self, path: &str) -> Result<Vec<String>, FruError> {
        self.mutate(|tree| tree.delete_subtree(path))
    }

    /// Remove every child subtree of `path`; see
    /// [`ObjectTree::reset_subtree`].
    pub fn reset_subtree(&self, path: &str) -> Result<Vec<String>, FruError> {
        self.mutate(|tree| tree.reset_subtree(path))
    }

    /// Run the full structural invariant check under the read lock.
    pub fn verify(&self) -> Result<(), FruError> {
        self.read()?.verify()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, ObjectTree>, FruError> {
        self.tree
            .read()
            .map_err(|_| FruError::Internal("object tree lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ObjectTree>, FruError> {
        self.tree
            .write()
            .map_err(|_| FruError::Internal("object tree lock poisoned".into()))
    }

    /// Apply `op` under the write lock. Debug builds verify the whole tree
    /// before and after.
    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut ObjectTree) -> Result<T, FruError>,
    ) -> Result<T, FruError> {
        if cfg!(debug_assertions) {
            self.mutate_checked(ObjectTree::verify, op)
        } else {
            op(&mut *self.write()?)
        }
    }

    /// Run `check` before `op` and again after it.
    ///
    /// A failed check before `op` aborts the call with the tree untouched.
    /// A failed check after `op` cannot undo the committed change, so it is
    /// logged and `op`'s result is returned; the next mutation then refuses.
    fn mutate_checked<T>(
        &self,
        check: impl Fn(&ObjectTree) -> Result<(), FruError>,
        op: impl FnOnce(&mut ObjectTree) -> Result<T, FruError>,
    ) -> Result<T, FruError> {
        let mut tree = self.write()?;
        check(&*tree).inspect_err(|e| {
            error!(error = %e, "object tree inconsistent, mutation refused");
        })?;
        let out = op(&mut *tree)?;
        if let Err(e) = check(&*tree) {
            error!(error = %e, "object tree invariant violated after mutation");
        }
        Ok(out)
    }
}

impl Drop for FruService {
    fn drop(&mut self) {
        let count = match self.tree.get_mut() {
            Ok(tree) => tree.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        };
        info!(objects = count, "object tree discarded");
    }
}
