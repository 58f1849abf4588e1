//! Fragment documents
//!
//! The full metadata document for one container: common attributes, the owned map of
//! associations, and fragment-scope namespace extension data. The whole document is the
//! unit of serialization; the text form is produced and consumed by [`codec`] only.

pub mod codec;
pub mod persist;

use crate::association::AssociationRecord;
use crate::error::FragmentError;
use crate::metadata::{validate_namespace_uri, NamespaceMap};
use crate::types::{AssociationId, BackendRef, DriverIdentifiers, VersionToken};
use std::collections::BTreeMap;

/// Fragment-level attributes carried on the root element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonAttributes {
    pub schema_version: String,
    pub schema_location: String,
    /// The container this fragment describes
    pub described_item: Option<BackendRef>,
    pub display_name: String,
    pub driver: Option<DriverIdentifiers>,
    /// Names the last persisted revision; `None` until the first write
    pub version_token: Option<VersionToken>,
}

impl CommonAttributes {
    pub fn new(schema_version: impl Into<String>, schema_location: impl Into<String>) -> Self {
        Self {
            schema_version: schema_version.into(),
            schema_location: schema_location.into(),
            described_item: None,
            display_name: String::new(),
            driver: None,
            version_token: None,
        }
    }
}

/// Metadata document for one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentDocument {
    common: CommonAttributes,
    associations: BTreeMap<AssociationId, AssociationRecord>,
    namespaces: NamespaceMap,
}

impl FragmentDocument {
    pub fn new(common: CommonAttributes) -> Self {
        Self {
            common,
            associations: BTreeMap::new(),
            namespaces: NamespaceMap::new(),
        }
    }

    pub(crate) fn from_parts(
        common: CommonAttributes,
        associations: BTreeMap<AssociationId, AssociationRecord>,
        namespaces: NamespaceMap,
    ) -> Self {
        Self {
            common,
            associations,
            namespaces,
        }
    }

    /// Decode persisted text.
    pub fn deserialize(text: &str) -> Result<Self, FragmentError> {
        codec::decode(text)
    }

    /// Encode to persisted text; exact inverse of [`FragmentDocument::deserialize`].
    pub fn serialize(&self) -> Result<String, FragmentError> {
        codec::encode(self)
    }

    pub fn common(&self) -> &CommonAttributes {
        &self.common
    }

    pub fn version_token(&self) -> Option<&VersionToken> {
        self.common.version_token.as_ref()
    }

    /// Replace the version token ahead of a persist, returning the previous one.
    ///
    /// Call immediately before writing, never speculatively; restore the returned token
    /// with [`FragmentDocument::restore_version_token`] if the write fails.
    pub fn regenerate_version_token(&mut self) -> Option<VersionToken> {
        self.common
            .version_token
            .replace(VersionToken::generate())
    }

    pub(crate) fn restore_version_token(&mut self, token: Option<VersionToken>) {
        self.common.version_token = token;
    }

    pub fn display_name(&self) -> &str {
        &self.common.display_name
    }

    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.common.display_name = name.into();
    }

    pub fn len(&self) -> usize {
        self.associations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.associations.is_empty()
    }

    pub fn associations(&self) -> impl Iterator<Item = &AssociationRecord> {
        self.associations.values()
    }

    pub fn association_ids(&self) -> impl Iterator<Item = AssociationId> + '_ {
        self.associations.keys().copied()
    }

    pub fn association(&self, id: &AssociationId) -> Option<&AssociationRecord> {
        self.associations.get(id)
    }

    pub fn association_mut(&mut self, id: &AssociationId) -> Option<&mut AssociationRecord> {
        self.associations.get_mut(id)
    }

    /// Linked associations: those naming an item inside the container.
    pub fn linked(&self) -> impl Iterator<Item = &AssociationRecord> {
        self.associations.values().filter(|a| a.is_linked())
    }

    /// Associations with no local backend item.
    pub fn unlinked(&self) -> impl Iterator<Item = &AssociationRecord> {
        self.associations.values().filter(|a| !a.is_linked())
    }

    /// Associations with no confirmed backend presence.
    pub fn phantoms(&self) -> impl Iterator<Item = &AssociationRecord> {
        self.associations.values().filter(|a| a.is_phantom())
    }

    pub fn find_linked(&self, local_item: &str) -> Option<&AssociationRecord> {
        self.linked().find(|a| a.local_item() == Some(local_item))
    }

    /// Insert an association, returning any record previously stored under its id.
    pub fn insert(&mut self, record: AssociationRecord) -> Option<AssociationRecord> {
        self.associations.insert(record.id(), record)
    }

    pub fn remove(&mut self, id: &AssociationId) -> Option<AssociationRecord> {
        self.associations.remove(id)
    }

    pub fn namespaces(&self) -> &NamespaceMap {
        &self.namespaces
    }

    pub fn attribute(&self, uri: &str, key: &str) -> Option<&str> {
        self.namespaces.attribute(uri, key)
    }

    pub fn set_attribute(
        &mut self,
        uri: &str,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, FragmentError> {
        validate_namespace_uri(uri)?;
        Ok(self.namespaces.set_attribute(uri, key, value))
    }

    pub fn remove_attribute(&mut self, uri: &str, key: &str) -> Option<String> {
        self.namespaces.remove_attribute(uri, key)
    }

    pub fn data(&self, uri: &str) -> Option<&str> {
        self.namespaces.data(uri)
    }

    pub fn set_data(
        &mut self,
        uri: &str,
        data: impl Into<String>,
    ) -> Result<Option<String>, FragmentError> {
        validate_namespace_uri(uri)?;
        Ok(self.namespaces.set_data(uri, data))
    }
}
