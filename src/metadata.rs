//! Metadata domain contracts.
//!
//! Owns the namespaced extension data carried at fragment and association scope.

pub mod namespace;

pub use namespace::{validate_namespace_uri, NamespaceBlock, NamespaceMap};
