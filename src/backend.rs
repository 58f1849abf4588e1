//! Backend Driver Abstraction
//!
//! The storage backend is an external, independently-mutable hierarchical store. The core
//! consumes it only through [`BackendDriver`]; drivers arrive already authenticated and are
//! shared between controllers as `Arc<dyn BackendDriver>`. Every operation is a suspension
//! point; timeouts and retries are the driver's business and surface as ordinary errors.

use crate::error::BackendError;
use crate::types::{BackendRef, DriverIdentifiers};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod local;
pub mod memory;
pub mod registry;

pub use local::LocalFsDriver;
pub use memory::{DriverCall, DriverOp, InMemoryDriver};
pub use registry::DriverRegistry;

/// One child item reported by [`BackendDriver::list`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub name: String,
    pub is_container: bool,
    pub backend_ref: BackendRef,
}

/// Storage backend driver
#[async_trait]
pub trait BackendDriver: Send + Sync {
    /// Registry name of this driver
    fn name(&self) -> &str;

    /// Identifiers recorded on fragments and cross-backend associations
    fn identifiers(&self) -> DriverIdentifiers {
        DriverIdentifiers::new(self.name())
    }

    /// Reference to the item called `name` inside `parent`
    fn child_ref(&self, parent: &BackendRef, name: &str) -> BackendRef;

    /// Last path segment of a reference, if it has one
    fn item_name(&self, item: &BackendRef) -> Option<String>;

    /// Direct children of a container
    async fn list(&self, container: &BackendRef) -> Result<Vec<ListingEntry>, BackendError>;

    /// Read a metadata file; a missing file is [`BackendError::NotFound`]
    async fn read_metadata_file(&self, item: &BackendRef) -> Result<String, BackendError>;

    async fn write_metadata_file(&self, item: &BackendRef, text: &str)
        -> Result<(), BackendError>;

    async fn create_container(
        &self,
        parent: &BackendRef,
        name: &str,
    ) -> Result<BackendRef, BackendError>;

    async fn create_leaf_item(
        &self,
        parent: &BackendRef,
        name: &str,
        content: &[u8],
    ) -> Result<BackendRef, BackendError>;

    async fn delete_container(&self, item: &BackendRef) -> Result<(), BackendError>;

    async fn delete_leaf_item(&self, item: &BackendRef) -> Result<(), BackendError>;

    async fn move_item(&self, from: &BackendRef, to: &BackendRef) -> Result<(), BackendError>;

    async fn copy_item(&self, from: &BackendRef, to: &BackendRef) -> Result<(), BackendError>;

    /// Publicly reachable URL for an item
    async fn public_url(&self, item: &BackendRef) -> Result<String, BackendError> {
        let _ = item;
        Err(BackendError::Unsupported {
            driver: self.name().to_string(),
            operation: "public_url",
        })
    }
}
