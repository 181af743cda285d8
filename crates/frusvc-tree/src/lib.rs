//! `frusvc-tree` – the in-memory FRU object tree.
//!
//! Pure data structure: no I/O and no locking. Callers that share a tree
//! between threads wrap it themselves (see `frusvc-service`).
//!
//! # Modules
//!
//! - [`object`] – [`Object`][object::Object]: a single node with its path,
//!   scalar properties and named children.
//! - [`tree`] – [`ObjectTree`][tree::ObjectTree]: the roots plus a global
//!   path index; atomic subtree attach, post-order subtree removal, and
//!   invariant verification.

pub mod object;
pub mod tree;

pub use object::Object;
pub use tree::ObjectTree;
