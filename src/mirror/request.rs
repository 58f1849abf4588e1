//! Association creation requests
//!
//! Each way of creating an association is its own variant, decided once by the caller.
//! No variant is ever inferred from the fields of another.

use crate::error::FragmentError;
use crate::types::{BackendRef, DriverIdentifiers};
use std::collections::BTreeSet;

/// A request to create one association
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateAssociation {
    /// Intent only: no backend item, no backend call
    Phantom { display_text: String },

    /// Link to an existing non-grouping item anywhere on this backend; stays phantom here
    ItemLink {
        display_text: String,
        item: BackendRef,
    },

    /// Link to an existing grouping item anywhere on this backend
    GroupingLink {
        display_text: String,
        item: BackendRef,
    },

    /// New container named `local_item` inside this one
    Grouping {
        display_text: String,
        local_item: String,
    },

    /// New leaf item named `local_item` inside this one, holding `content`
    Leaf {
        display_text: String,
        local_item: String,
        content: Vec<u8>,
    },

    /// New container whose name is derived from the display text
    DerivedGrouping { display_text: String },

    /// Link to an item on another registered backend
    ForeignLink {
        display_text: String,
        driver: DriverIdentifiers,
        item: BackendRef,
        is_grouping: bool,
    },
}

impl CreateAssociation {
    pub fn phantom(display_text: impl Into<String>) -> Self {
        CreateAssociation::Phantom {
            display_text: display_text.into(),
        }
    }

    pub fn item_link(display_text: impl Into<String>, item: impl Into<BackendRef>) -> Self {
        CreateAssociation::ItemLink {
            display_text: display_text.into(),
            item: item.into(),
        }
    }

    pub fn grouping(display_text: impl Into<String>, local_item: impl Into<String>) -> Self {
        CreateAssociation::Grouping {
            display_text: display_text.into(),
            local_item: local_item.into(),
        }
    }

    pub fn leaf(
        display_text: impl Into<String>,
        local_item: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        CreateAssociation::Leaf {
            display_text: display_text.into(),
            local_item: local_item.into(),
            content: content.into(),
        }
    }

    pub fn display_text(&self) -> &str {
        match self {
            CreateAssociation::Phantom { display_text }
            | CreateAssociation::ItemLink { display_text, .. }
            | CreateAssociation::GroupingLink { display_text, .. }
            | CreateAssociation::Grouping { display_text, .. }
            | CreateAssociation::Leaf { display_text, .. }
            | CreateAssociation::DerivedGrouping { display_text }
            | CreateAssociation::ForeignLink { display_text, .. } => display_text,
        }
    }

    /// Short name of the variant, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            CreateAssociation::Phantom { .. } => "phantom",
            CreateAssociation::ItemLink { .. } => "item_link",
            CreateAssociation::GroupingLink { .. } => "grouping_link",
            CreateAssociation::Grouping { .. } => "grouping",
            CreateAssociation::Leaf { .. } => "leaf",
            CreateAssociation::DerivedGrouping { .. } => "derived_grouping",
            CreateAssociation::ForeignLink { .. } => "foreign_link",
        }
    }

    /// Whether creating this association calls the backend.
    pub fn creates_backend_item(&self) -> bool {
        matches!(
            self,
            CreateAssociation::Grouping { .. }
                | CreateAssociation::Leaf { .. }
                | CreateAssociation::DerivedGrouping { .. }
        )
    }

    /// Checks that need no backend and no document.
    pub fn validate(&self) -> Result<(), FragmentError> {
        if self.display_text().trim().is_empty() {
            return Err(FragmentError::InvalidArgument(
                "Display text cannot be empty".to_string(),
            ));
        }
        match self {
            CreateAssociation::ItemLink { item, .. }
            | CreateAssociation::GroupingLink { item, .. }
            | CreateAssociation::ForeignLink { item, .. }
                if item.as_str().is_empty() =>
            {
                Err(FragmentError::InvalidArgument(
                    "Item reference cannot be empty".to_string(),
                ))
            }
            CreateAssociation::ForeignLink { driver, .. } if driver.name.is_empty() => Err(
                FragmentError::InvalidArgument("Driver name cannot be empty".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

/// Validate a name for an item created inside a container.
pub(crate) fn validate_local_name(name: &str, metadata_file_name: &str) -> Result<(), FragmentError> {
    if name.is_empty() {
        return Err(FragmentError::InvalidArgument(
            "Local item name cannot be empty".to_string(),
        ));
    }
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(FragmentError::InvalidArgument(format!(
            "Local item name must be a single path segment: {:?}",
            name
        )));
    }
    if name == metadata_file_name {
        return Err(FragmentError::InvalidArgument(format!(
            "Local item name {:?} is reserved for the metadata file",
            name
        )));
    }
    Ok(())
}

/// Container name derived from display text.
///
/// Separators and control characters become `_`, surrounding whitespace is trimmed, and the
/// result is cut to `max_len` characters. A name already in `taken` (or equal to
/// `reserved`) gets a `-2`, `-3`, ... suffix.
pub fn derive_local_name(
    display_text: &str,
    max_len: usize,
    reserved: &str,
    taken: &BTreeSet<String>,
) -> Result<String, FragmentError> {
    let sanitized: String = display_text
        .trim()
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .take(max_len)
        .collect();
    let base = sanitized.trim_end().to_string();
    if base.is_empty() || base == "." || base == ".." {
        return Err(FragmentError::InvalidArgument(format!(
            "Cannot derive a container name from {:?}",
            display_text
        )));
    }

    if base != reserved && !taken.contains(&base) {
        return Ok(base);
    }
    // The suffixed name still has to fit in max_len, so the base gives up characters.
    let mut suffix = 2usize;
    loop {
        let tail = format!("-{}", suffix);
        let keep = max_len.saturating_sub(tail.chars().count());
        let stem: String = base.chars().take(keep).collect();
        let stem = stem.trim_end();
        if stem.is_empty() {
            return Err(FragmentError::InvalidArgument(format!(
                "No free container name for {:?} within {} characters",
                display_text, max_len
            )));
        }
        let candidate = format!("{}{}", stem, tail);
        if candidate != reserved && !taken.contains(&candidate) {
            return Ok(candidate);
        }
        suffix += 1;
    }
}
