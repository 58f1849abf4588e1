//! Fragmirror: Metadata Mirrors for Hierarchical Stores
//!
//! Keeps a serialized metadata description ("fragment") of a container's children in step
//! with an external, independently-mutable backend, and exposes association lifecycle
//! operations guarded by optimistic concurrency over a version token.

pub mod association;
pub mod backend;
pub mod config;
pub mod error;
pub mod fragment;
pub mod logging;
pub mod metadata;
pub mod mirror;
pub mod reconcile;
pub mod types;

pub use association::{AssociationData, AssociationRecord};
pub use backend::{BackendDriver, DriverRegistry, InMemoryDriver, ListingEntry, LocalFsDriver};
pub use config::{ConfigLoader, FragmirrorConfig, MirrorSettings};
pub use error::{BackendError, FragmentError};
pub use fragment::{CommonAttributes, FragmentDocument};
pub use mirror::{CreateAssociation, MirrorController, OpenMode};
pub use reconcile::{ReconcilePlan, ReconcileReport, Reconciler};
pub use types::{AssociationId, BackendRef, DriverIdentifiers, VersionToken};
