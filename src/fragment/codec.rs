//! Fragment text codec
//!
//! Stateless transform between [`FragmentDocument`] and its persisted text. The element
//! layout is one root element carrying the common attributes, nested association elements,
//! and namespace extension elements at both fragment and association scope.

use crate::association::AssociationRecord;
use crate::error::FragmentError;
use crate::fragment::{CommonAttributes, FragmentDocument};
use crate::metadata::{validate_namespace_uri, NamespaceBlock, NamespaceMap};
use crate::types::{AssociationId, BackendRef, DriverIdentifiers, VersionToken};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Root element of a persisted fragment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FragmentElement {
    pub schema_version: String,
    #[serde(default)]
    pub schema_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub described_item: Option<BackendRef>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<DriverIdentifiers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_token: Option<VersionToken>,
    #[serde(default)]
    pub associations: Vec<AssociationElement>,
    #[serde(default)]
    pub namespaces: Vec<NamespaceElement>,
}

/// Persisted form of one association
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssociationElement {
    pub id: AssociationId,
    #[serde(default)]
    pub display_text: String,
    #[serde(default)]
    pub is_grouping: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_item: Option<BackendRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<DriverIdentifiers>,
    #[serde(default)]
    pub namespaces: Vec<NamespaceElement>,
}

/// Namespace extension element: attributes plus an opaque text payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamespaceElement {
    pub uri: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub data: String,
}

impl NamespaceElement {
    pub fn new(uri: &str, block: &NamespaceBlock) -> Self {
        Self {
            uri: uri.to_string(),
            attributes: block.attributes.clone(),
            data: block.data.clone(),
        }
    }

    pub fn into_entry(self) -> (String, NamespaceBlock) {
        (
            self.uri,
            NamespaceBlock {
                attributes: self.attributes,
                data: self.data,
            },
        )
    }
}

/// Encode a document to its persisted text.
pub fn encode(document: &FragmentDocument) -> Result<String, FragmentError> {
    let element = to_element(document);
    Ok(serde_json::to_string_pretty(&element)?)
}

/// Decode persisted text, rejecting duplicate ids and namespace URIs.
pub fn decode(text: &str) -> Result<FragmentDocument, FragmentError> {
    let element: FragmentElement = serde_json::from_str(text)?;
    from_element(element)
}

pub fn to_element(document: &FragmentDocument) -> FragmentElement {
    let common = document.common();
    FragmentElement {
        schema_version: common.schema_version.clone(),
        schema_location: common.schema_location.clone(),
        described_item: common.described_item.clone(),
        display_name: common.display_name.clone(),
        driver: common.driver.clone(),
        version_token: common.version_token.clone(),
        associations: document
            .associations()
            .map(AssociationRecord::to_element)
            .collect(),
        namespaces: namespace_elements(document.namespaces()),
    }
}

pub fn from_element(element: FragmentElement) -> Result<FragmentDocument, FragmentError> {
    let common = CommonAttributes {
        schema_version: element.schema_version,
        schema_location: element.schema_location,
        described_item: element.described_item,
        display_name: element.display_name,
        driver: element.driver,
        version_token: element.version_token,
    };

    let namespaces = namespace_map(element.namespaces, "fragment")?;

    let mut associations = BTreeMap::new();
    for mut association in element.associations {
        let scope = format!("association {}", association.id);
        let association_namespaces =
            namespace_map(std::mem::take(&mut association.namespaces), &scope)?;
        let id = association.id;
        let record = AssociationRecord::from_element(association, association_namespaces);
        if associations.insert(id, record).is_some() {
            return Err(FragmentError::Codec(format!(
                "Duplicate association id {}",
                id
            )));
        }
    }

    Ok(FragmentDocument::from_parts(common, associations, namespaces))
}

pub(crate) fn namespace_elements(namespaces: &NamespaceMap) -> Vec<NamespaceElement> {
    namespaces
        .iter()
        .map(|(uri, block)| NamespaceElement::new(uri, block))
        .collect()
}

fn namespace_map(
    elements: Vec<NamespaceElement>,
    scope: &str,
) -> Result<NamespaceMap, FragmentError> {
    let mut seen = HashSet::new();
    let mut map = NamespaceMap::new();
    for element in elements {
        validate_namespace_uri(&element.uri)
            .map_err(|e| FragmentError::Codec(format!("{} in {}", e, scope)))?;
        if !seen.insert(element.uri.clone()) {
            return Err(FragmentError::Codec(format!(
                "Duplicate namespace {} in {}",
                element.uri, scope
            )));
        }
        let (uri, block) = element.into_entry();
        map.insert(uri, block);
    }
    Ok(map)
}
