//! Reconciliation
//!
//! Converges a fragment's linked associations with the backend's live listing of the
//! container. Both sides are sorted by item name with one ordering function and merge-joined:
//!
//! - listed only: a new linked association is inserted
//! - linked only: the association is removed
//! - on both sides: left untouched, attributes and namespace data included
//!
//! Unlinked associations (phantoms and links to items elsewhere) are never touched. A
//! persist only happens when something changed or no fragment existed, so repeated runs
//! against an unchanged backend never churn the version token.
//!
//! Items are matched purely by name: a renamed backend item is a removal plus an addition
//! and the old association's id and namespace data do not carry over.

use crate::association::AssociationRecord;
use crate::backend::{BackendDriver, ListingEntry};
use crate::error::FragmentError;
use crate::fragment::{persist, CommonAttributes, FragmentDocument};
use crate::types::{AssociationId, BackendRef};
use std::cmp::Ordering;
use tracing::{debug, info, instrument};

/// Ordering applied to both the listing and the linked associations.
pub fn name_order(a: &str, b: &str) -> Ordering {
    a.cmp(b)
}

/// Minimal edit converging a document with a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Listed items with no linked association
    pub additions: Vec<ListingEntry>,
    /// Linked associations whose item is no longer listed
    pub removals: Vec<AssociationId>,
}

impl ReconcilePlan {
    /// Merge-join `listing` against the linked associations of `document`.
    pub fn compute(listing: &[ListingEntry], document: &FragmentDocument) -> Self {
        let mut listed: Vec<&ListingEntry> = listing.iter().collect();
        listed.sort_by(|a, b| name_order(&a.name, &b.name));

        let mut linked: Vec<(&str, AssociationId)> = document
            .linked()
            .filter_map(|a| a.local_item().map(|name| (name, a.id())))
            .collect();
        linked.sort_by(|a, b| name_order(a.0, b.0));

        let mut plan = ReconcilePlan::default();
        let (mut i, mut j) = (0, 0);
        while i < listed.len() && j < linked.len() {
            match name_order(&listed[i].name, linked[j].0) {
                Ordering::Less => {
                    plan.additions.push(listed[i].clone());
                    i += 1;
                }
                Ordering::Greater => {
                    plan.removals.push(linked[j].1);
                    j += 1;
                }
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
            }
        }
        plan.additions
            .extend(listed[i..].iter().map(|entry| (*entry).clone()));
        plan.removals.extend(linked[j..].iter().map(|(_, id)| *id));
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    /// Apply the edit, reporting the ids inserted and removed.
    pub fn apply(self, document: &mut FragmentDocument) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for id in self.removals {
            if document.remove(&id).is_some() {
                report.removed.push(id);
            }
        }
        for entry in &self.additions {
            let record = AssociationRecord::from_listing(entry);
            report.added.push(record.id());
            document.insert(record);
        }
        report
    }
}

/// Outcome of one reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<AssociationId>,
    pub removed: Vec<AssociationId>,
    /// No persisted fragment existed; a fresh one was synthesized
    pub created: bool,
    /// A new revision was written
    pub persisted: bool,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// A reconciled document together with what reconciliation did to it
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub document: FragmentDocument,
    pub report: ReconcileReport,
}

/// Reconciles one container's fragment against its backend listing
pub struct Reconciler<'a> {
    driver: &'a dyn BackendDriver,
    container: &'a BackendRef,
    metadata_file_name: &'a str,
    metadata_ref: BackendRef,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        driver: &'a dyn BackendDriver,
        container: &'a BackendRef,
        metadata_file_name: &'a str,
    ) -> Self {
        let metadata_ref = driver.child_ref(container, metadata_file_name);
        Self {
            driver,
            container,
            metadata_file_name,
            metadata_ref,
        }
    }

    pub fn metadata_ref(&self) -> &BackendRef {
        &self.metadata_ref
    }

    /// Current listing of the container, without the metadata file.
    pub async fn fetch_listing(&self) -> Result<Vec<ListingEntry>, FragmentError> {
        let mut listing = self.driver.list(self.container).await?;
        listing.retain(|entry| entry.name != self.metadata_file_name);
        Ok(listing)
    }

    pub async fn fetch_persisted(&self) -> Result<Option<FragmentDocument>, FragmentError> {
        persist::load(self.driver, &self.metadata_ref).await
    }

    /// Pure convergence step: plan and apply in one go.
    pub fn converge(listing: &[ListingEntry], document: &mut FragmentDocument) -> ReconcileReport {
        let plan = ReconcilePlan::compute(listing, document);
        debug!(
            additions = plan.additions.len(),
            removals = plan.removals.len(),
            "Computed reconcile plan"
        );
        plan.apply(document)
    }

    /// Reconcile the persisted fragment end to end, persisting only if something changed.
    ///
    /// When no fragment exists, `template` seeds a fresh one in which every listed item
    /// becomes a linked association.
    #[instrument(skip(self, template), fields(container = %self.container))]
    pub async fn run(&self, template: CommonAttributes) -> Result<Reconciled, FragmentError> {
        let listing = self.fetch_listing().await?;
        let (mut document, created) = match self.fetch_persisted().await? {
            Some(document) => (document, false),
            None => (FragmentDocument::new(template), true),
        };

        let mut report = Self::converge(&listing, &mut document);
        report.created = created;

        if created || report.changed() {
            persist::persist(self.driver, &self.metadata_ref, &mut document).await?;
            report.persisted = true;
        }

        info!(
            added = report.added.len(),
            removed = report.removed.len(),
            created = report.created,
            persisted = report.persisted,
            "Reconciled fragment"
        );
        Ok(Reconciled { document, report })
    }
}
