//! Association records
//!
//! One metadata entry describing a child of a container. An association is either
//! *linked* (it names a real item in the container's backend namespace) or *phantom*
//! (intent only, no confirmed backend item). Records carry no I/O.

use crate::backend::ListingEntry;
use crate::error::FragmentError;
use crate::fragment::codec::{namespace_elements, AssociationElement};
use crate::metadata::{validate_namespace_uri, NamespaceMap};
use crate::types::{AssociationId, BackendRef, DriverIdentifiers};

/// Common data supplied by a caller creating a new association.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationData {
    pub display_text: String,
    pub is_grouping: bool,
    pub local_item: Option<String>,
    pub associated_item: Option<BackendRef>,
    pub driver: Option<DriverIdentifiers>,
}

impl AssociationData {
    pub fn phantom(display_text: impl Into<String>) -> Self {
        Self {
            display_text: display_text.into(),
            ..Default::default()
        }
    }
}

/// Metadata entry for one child of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationRecord {
    id: AssociationId,
    display_text: String,
    is_grouping: bool,
    local_item: Option<String>,
    associated_item: Option<BackendRef>,
    driver: Option<DriverIdentifiers>,
    namespaces: NamespaceMap,
}

impl AssociationRecord {
    /// Linked association for an item found in a backend listing.
    pub fn from_listing(entry: &ListingEntry) -> Self {
        Self {
            id: AssociationId::generate(),
            display_text: entry.name.clone(),
            is_grouping: entry.is_container,
            local_item: Some(entry.name.clone()),
            associated_item: Some(entry.backend_ref.clone()),
            driver: None,
            namespaces: NamespaceMap::new(),
        }
    }

    /// New association from caller-supplied common data.
    pub fn from_data(data: AssociationData) -> Self {
        Self {
            id: AssociationId::generate(),
            display_text: data.display_text,
            is_grouping: data.is_grouping,
            local_item: data.local_item,
            associated_item: data.associated_item,
            driver: data.driver,
            namespaces: NamespaceMap::new(),
        }
    }

    /// Rebuild a persisted association element.
    ///
    /// `namespaces` are the element's already-validated extension blocks; any left on the
    /// element itself are ignored.
    pub fn from_element(element: AssociationElement, namespaces: NamespaceMap) -> Self {
        Self {
            id: element.id,
            display_text: element.display_text,
            is_grouping: element.is_grouping,
            local_item: element.local_item,
            associated_item: element.associated_item,
            driver: element.driver,
            namespaces,
        }
    }

    /// Persisted element form.
    pub fn to_element(&self) -> AssociationElement {
        AssociationElement {
            id: self.id,
            display_text: self.display_text.clone(),
            is_grouping: self.is_grouping,
            local_item: self.local_item.clone(),
            associated_item: self.associated_item.clone(),
            driver: self.driver.clone(),
            namespaces: namespace_elements(&self.namespaces),
        }
    }

    pub fn id(&self) -> AssociationId {
        self.id
    }

    pub fn display_text(&self) -> &str {
        &self.display_text
    }

    pub fn set_display_text(&mut self, text: impl Into<String>) {
        self.display_text = text.into();
    }

    pub fn is_grouping(&self) -> bool {
        self.is_grouping
    }

    pub fn local_item(&self) -> Option<&str> {
        self.local_item.as_deref()
    }

    pub fn associated_item(&self) -> Option<&BackendRef> {
        self.associated_item.as_ref()
    }

    pub fn driver(&self) -> Option<&DriverIdentifiers> {
        self.driver.as_ref()
    }

    /// No confirmed presence: neither a grouping item nor a local backend item.
    pub fn is_phantom(&self) -> bool {
        !(self.is_grouping || self.local_item.is_some())
    }

    /// Corresponds to a real item inside the owning container.
    pub fn is_linked(&self) -> bool {
        self.local_item.is_some()
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

    /// Point the association at a backend item inside its container.
    pub(crate) fn link(&mut self, local_item: String, associated_item: BackendRef) {
        self.local_item = Some(local_item);
        self.associated_item = Some(associated_item);
    }

    pub(crate) fn set_grouping(&mut self, is_grouping: bool) {
        self.is_grouping = is_grouping;
    }

    /// Same content under a fresh id.
    pub(crate) fn duplicate(&self) -> Self {
        Self {
            id: AssociationId::generate(),
            ..self.clone()
        }
    }
}
