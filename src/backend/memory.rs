//! In-process backend driver
//!
//! Holds a hierarchical namespace in memory behind a `parking_lot` mutex. Every driver call
//! is appended to a call log, and individual operations can be made to fail once, which is
//! what tests use to observe write counts and partial-failure behavior. The `seed_*` and
//! `remove_item` helpers mutate the store directly, standing in for changes made by other
//! writers; they are not logged.

use crate::backend::{BackendDriver, ListingEntry};
use crate::error::BackendError;
use crate::types::BackendRef;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

pub const ROOT: &str = "/";

/// Driver operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOp {
    List,
    ReadMetadata,
    WriteMetadata,
    CreateContainer,
    CreateLeaf,
    DeleteContainer,
    DeleteLeaf,
    Move,
    Copy,
    PublicUrl,
}

impl DriverOp {
    fn as_str(self) -> &'static str {
        match self {
            DriverOp::List => "list",
            DriverOp::ReadMetadata => "read_metadata_file",
            DriverOp::WriteMetadata => "write_metadata_file",
            DriverOp::CreateContainer => "create_container",
            DriverOp::CreateLeaf => "create_leaf_item",
            DriverOp::DeleteContainer => "delete_container",
            DriverOp::DeleteLeaf => "delete_leaf_item",
            DriverOp::Move => "move_item",
            DriverOp::Copy => "copy_item",
            DriverOp::PublicUrl => "public_url",
        }
    }
}

/// One logged driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverCall {
    pub op: DriverOp,
    pub target: String,
    pub destination: Option<String>,
}

#[derive(Debug, Clone)]
enum Node {
    Container,
    Leaf(Vec<u8>),
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    calls: Vec<DriverCall>,
    failures: Vec<DriverOp>,
}

impl State {
    fn record(
        &mut self,
        op: DriverOp,
        target: &str,
        destination: Option<&str>,
    ) -> Result<(), BackendError> {
        self.calls.push(DriverCall {
            op,
            target: target.to_string(),
            destination: destination.map(str::to_string),
        });
        if let Some(pos) = self.failures.iter().position(|f| *f == op) {
            self.failures.remove(pos);
            return Err(BackendError::Failed {
                operation: op.as_str(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn require_container(&self, path: &str) -> Result<(), BackendError> {
        match self.nodes.get(path) {
            Some(Node::Container) => Ok(()),
            Some(Node::Leaf(_)) => Err(BackendError::Failed {
                operation: "resolve",
                message: format!("{} is not a container", path),
            }),
            None => Err(BackendError::NotFound(path.to_string())),
        }
    }

    fn subtree_keys(&self, path: &str) -> Vec<String> {
        let prefix = format!("{}/", path);
        self.nodes
            .keys()
            .filter(|k| k.as_str() == path || k.starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn relocate(&mut self, from: &str, to: &str, keep_source: bool) -> Result<(), BackendError> {
        if !self.nodes.contains_key(from) {
            return Err(BackendError::NotFound(from.to_string()));
        }
        if self.nodes.contains_key(to) {
            return Err(BackendError::AlreadyExists(to.to_string()));
        }
        self.require_container(parent_of(to))?;
        if to.starts_with(&format!("{}/", from)) {
            return Err(BackendError::Failed {
                operation: "relocate",
                message: format!("cannot place {} inside itself", from),
            });
        }

        for key in self.subtree_keys(from) {
            let node = if keep_source {
                self.nodes.get(&key).cloned()
            } else {
                self.nodes.remove(&key)
            };
            if let Some(node) = node {
                let relocated = format!("{}{}", to, &key[from.len()..]);
                self.nodes.insert(relocated, node);
            }
        }
        Ok(())
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent == ROOT {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => ROOT,
        Some(idx) => &path[..idx],
    }
}

/// In-memory hierarchical store
pub struct InMemoryDriver {
    name: String,
    state: Mutex<State>,
}

impl Default for InMemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDriver {
    pub fn new() -> Self {
        Self::with_name("memory")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        let mut state = State::default();
        state.nodes.insert(ROOT.to_string(), Node::Container);
        Self {
            name: name.into(),
            state: Mutex::new(state),
        }
    }

    /// Reference to the store root
    pub fn root(&self) -> BackendRef {
        BackendRef::new(ROOT)
    }

    /// Create a container (and any missing ancestors) without logging a call.
    pub fn seed_container(&self, path: &str) -> BackendRef {
        let mut state = self.state.lock();
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = join(if current.is_empty() { ROOT } else { &current }, segment);
            state
                .nodes
                .entry(current.clone())
                .or_insert(Node::Container);
        }
        BackendRef::new(if current.is_empty() { ROOT.to_string() } else { current })
    }

    /// Create or overwrite a leaf without logging a call.
    pub fn seed_leaf(&self, path: &str, content: &[u8]) -> BackendRef {
        self.seed_container(parent_of(path));
        self.state
            .lock()
            .nodes
            .insert(path.to_string(), Node::Leaf(content.to_vec()));
        BackendRef::new(path)
    }

    /// Remove an item and its descendants without logging a call.
    pub fn remove_item(&self, path: &str) -> bool {
        let mut state = self.state.lock();
        let keys = state.subtree_keys(path);
        for key in &keys {
            state.nodes.remove(key);
        }
        !keys.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state.lock().nodes.contains_key(path)
    }

    pub fn is_container(&self, path: &str) -> bool {
        matches!(self.state.lock().nodes.get(path), Some(Node::Container))
    }

    pub fn leaf_content(&self, path: &str) -> Option<Vec<u8>> {
        match self.state.lock().nodes.get(path) {
            Some(Node::Leaf(content)) => Some(content.clone()),
            _ => None,
        }
    }

    /// Make the next call of `op` fail with [`BackendError::Failed`].
    pub fn fail_next(&self, op: DriverOp) {
        self.state.lock().failures.push(op);
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, op: DriverOp) -> usize {
        self.state.lock().calls.iter().filter(|c| c.op == op).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }
}

#[async_trait]
impl BackendDriver for InMemoryDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn child_ref(&self, parent: &BackendRef, name: &str) -> BackendRef {
        BackendRef::new(join(parent.as_str(), name))
    }

    fn item_name(&self, item: &BackendRef) -> Option<String> {
        item.as_str()
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    async fn list(&self, container: &BackendRef) -> Result<Vec<ListingEntry>, BackendError> {
        let mut state = self.state.lock();
        state.record(DriverOp::List, container.as_str(), None)?;
        state.require_container(container.as_str())?;

        let prefix = join(container.as_str(), "");
        let entries = state
            .nodes
            .iter()
            .filter_map(|(path, node)| {
                let name = path.strip_prefix(&prefix)?;
                if name.is_empty() || name.contains('/') {
                    return None;
                }
                Some(ListingEntry {
                    name: name.to_string(),
                    is_container: matches!(node, Node::Container),
                    backend_ref: BackendRef::new(path.clone()),
                })
            })
            .collect();
        Ok(entries)
    }

    async fn read_metadata_file(&self, item: &BackendRef) -> Result<String, BackendError> {
        let mut state = self.state.lock();
        state.record(DriverOp::ReadMetadata, item.as_str(), None)?;
        match state.nodes.get(item.as_str()) {
            Some(Node::Leaf(content)) => {
                String::from_utf8(content.clone()).map_err(|e| BackendError::Failed {
                    operation: "read_metadata_file",
                    message: e.to_string(),
                })
            }
            Some(Node::Container) => Err(BackendError::Failed {
                operation: "read_metadata_file",
                message: format!("{} is a container", item),
            }),
            None => Err(BackendError::NotFound(item.to_string())),
        }
    }

    async fn write_metadata_file(
        &self,
        item: &BackendRef,
        text: &str,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.record(DriverOp::WriteMetadata, item.as_str(), None)?;
        state.require_container(parent_of(item.as_str()))?;
        if let Some(Node::Container) = state.nodes.get(item.as_str()) {
            return Err(BackendError::AlreadyExists(item.to_string()));
        }
        state
            .nodes
            .insert(item.to_string(), Node::Leaf(text.as_bytes().to_vec()));
        Ok(())
    }

    async fn create_container(
        &self,
        parent: &BackendRef,
        name: &str,
    ) -> Result<BackendRef, BackendError> {
        let path = join(parent.as_str(), name);
        let mut state = self.state.lock();
        state.record(DriverOp::CreateContainer, &path, None)?;
        state.require_container(parent.as_str())?;
        if state.nodes.contains_key(&path) {
            return Err(BackendError::AlreadyExists(path));
        }
        state.nodes.insert(path.clone(), Node::Container);
        Ok(BackendRef::new(path))
    }

    async fn create_leaf_item(
        &self,
        parent: &BackendRef,
        name: &str,
        content: &[u8],
    ) -> Result<BackendRef, BackendError> {
        let path = join(parent.as_str(), name);
        let mut state = self.state.lock();
        state.record(DriverOp::CreateLeaf, &path, None)?;
        state.require_container(parent.as_str())?;
        if state.nodes.contains_key(&path) {
            return Err(BackendError::AlreadyExists(path));
        }
        state.nodes.insert(path.clone(), Node::Leaf(content.to_vec()));
        Ok(BackendRef::new(path))
    }

    async fn delete_container(&self, item: &BackendRef) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.record(DriverOp::DeleteContainer, item.as_str(), None)?;
        if item.as_str() == ROOT {
            return Err(BackendError::Failed {
                operation: "delete_container",
                message: "cannot delete the root".to_string(),
            });
        }
        state.require_container(item.as_str())?;
        for key in state.subtree_keys(item.as_str()) {
            state.nodes.remove(&key);
        }
        Ok(())
    }

    async fn delete_leaf_item(&self, item: &BackendRef) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.record(DriverOp::DeleteLeaf, item.as_str(), None)?;
        match state.nodes.get(item.as_str()) {
            Some(Node::Leaf(_)) => {
                state.nodes.remove(item.as_str());
                Ok(())
            }
            Some(Node::Container) => Err(BackendError::Failed {
                operation: "delete_leaf_item",
                message: format!("{} is a container", item),
            }),
            None => Err(BackendError::NotFound(item.to_string())),
        }
    }

    async fn move_item(&self, from: &BackendRef, to: &BackendRef) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.record(DriverOp::Move, from.as_str(), Some(to.as_str()))?;
        state.relocate(from.as_str(), to.as_str(), false)
    }

    async fn copy_item(&self, from: &BackendRef, to: &BackendRef) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.record(DriverOp::Copy, from.as_str(), Some(to.as_str()))?;
        state.relocate(from.as_str(), to.as_str(), true)
    }

    async fn public_url(&self, item: &BackendRef) -> Result<String, BackendError> {
        let mut state = self.state.lock();
        state.record(DriverOp::PublicUrl, item.as_str(), None)?;
        if !state.nodes.contains_key(item.as_str()) {
            return Err(BackendError::NotFound(item.to_string()));
        }
        Ok(format!("memory://{}{}", self.name, item))
    }
}
