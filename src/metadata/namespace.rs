//! Namespaced extension data.
//!
//! Applications layer their own metadata onto fragments and associations under a namespace
//! URI. Each namespace holds a string attribute map and one opaque data payload.

use crate::error::FragmentError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

/// Extension data for one namespace URI.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamespaceBlock {
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub data: String,
}

impl NamespaceBlock {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.data.is_empty()
    }
}

/// Namespace URI -> extension block.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct NamespaceMap(BTreeMap<String, NamespaceBlock>);

impl NamespaceMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn attribute(&self, uri: &str, key: &str) -> Option<&str> {
        self.0
            .get(uri)
            .and_then(|block| block.attributes.get(key))
            .map(String::as_str)
    }

    /// Set an attribute, returning the previous value.
    pub fn set_attribute(
        &mut self,
        uri: &str,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        self.0
            .entry(uri.to_string())
            .or_default()
            .attributes
            .insert(key.into(), value.into())
    }

    /// Remove an attribute; a namespace left with no content is dropped.
    pub fn remove_attribute(&mut self, uri: &str, key: &str) -> Option<String> {
        let block = self.0.get_mut(uri)?;
        let removed = block.attributes.remove(key);
        if block.is_empty() {
            self.0.remove(uri);
        }
        removed
    }

    pub fn data(&self, uri: &str) -> Option<&str> {
        self.0.get(uri).map(|block| block.data.as_str())
    }

    /// Replace the opaque payload, returning the previous one.
    pub fn set_data(&mut self, uri: &str, data: impl Into<String>) -> Option<String> {
        let block = self.0.entry(uri.to_string()).or_default();
        let previous = std::mem::replace(&mut block.data, data.into());
        if previous.is_empty() {
            None
        } else {
            Some(previous)
        }
    }

    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl From<BTreeMap<String, NamespaceBlock>> for NamespaceMap {
    fn from(value: BTreeMap<String, NamespaceBlock>) -> Self {
        Self(value)
    }
}

impl FromIterator<(String, NamespaceBlock)> for NamespaceMap {
    fn from_iter<T: IntoIterator<Item = (String, NamespaceBlock)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Deref for NamespaceMap {
    type Target = BTreeMap<String, NamespaceBlock>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for NamespaceMap {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl IntoIterator for NamespaceMap {
    type Item = (String, NamespaceBlock);
    type IntoIter = std::collections::btree_map::IntoIter<String, NamespaceBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a NamespaceMap {
    type Item = (&'a String, &'a NamespaceBlock);
    type IntoIter = std::collections::btree_map::Iter<'a, String, NamespaceBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Namespace URIs must be non-empty and free of whitespace.
pub fn validate_namespace_uri(uri: &str) -> Result<(), FragmentError> {
    if uri.is_empty() {
        return Err(FragmentError::InvalidArgument(
            "Namespace URI cannot be empty".to_string(),
        ));
    }
    if uri.chars().any(char::is_whitespace) {
        return Err(FragmentError::InvalidArgument(format!(
            "Namespace URI contains whitespace: {:?}",
            uri
        )));
    }
    Ok(())
}
