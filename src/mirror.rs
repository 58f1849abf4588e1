//! Mirror Controller
//!
//! Binds one [`FragmentDocument`] to one backend container and is the public surface of the
//! crate. Construction probes the backend for the container's metadata file and either
//! attaches to it (reconciling once) or bootstraps a fresh fragment from the listing.
//!
//! Writes follow an optimistic protocol: before every persist the controller re-reads the
//! stored revision and compares its version token with the one it holds. A mismatch means
//! another writer got there first; the write is refused with
//! [`FragmentError::StaleDocument`] and the controller must be [`refresh`]ed before any
//! further mutation. Nothing is ever merged or retried automatically.
//!
//! [`refresh`]: MirrorController::refresh

mod lifecycle;
pub mod request;

pub use request::{derive_local_name, CreateAssociation};

use crate::association::AssociationRecord;
use crate::backend::{BackendDriver, DriverRegistry};
use crate::config::MirrorSettings;
use crate::error::FragmentError;
use crate::fragment::{persist, CommonAttributes, FragmentDocument};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::types::{AssociationId, BackendRef, VersionToken};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// How a controller came up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// A metadata file existed and was reconciled against the listing
    Attach,
    /// No metadata file existed; a fresh fragment was synthesized and written
    Bootstrap,
}

/// Controller for one container's fragment
pub struct MirrorController {
    driver: Arc<dyn BackendDriver>,
    registry: DriverRegistry,
    settings: MirrorSettings,
    container: BackendRef,
    metadata_ref: BackendRef,
    document: FragmentDocument,
    mode: OpenMode,
    /// Container of the controller this one was opened from; not owned
    parent: Option<BackendRef>,
    needs_refresh: bool,
}

impl MirrorController {
    /// Open the fragment of `container`, attaching or bootstrapping as the backend dictates.
    ///
    /// Backend failures other than the metadata file being absent abort construction and
    /// surface unchanged.
    pub async fn open(
        driver: Arc<dyn BackendDriver>,
        container: BackendRef,
        settings: MirrorSettings,
    ) -> Result<Self, FragmentError> {
        Self::open_inner(driver, container, settings, DriverRegistry::new(), None).await
    }

    #[instrument(skip(driver, settings, registry), fields(driver = driver.name()))]
    async fn open_inner(
        driver: Arc<dyn BackendDriver>,
        container: BackendRef,
        settings: MirrorSettings,
        registry: DriverRegistry,
        parent: Option<BackendRef>,
    ) -> Result<Self, FragmentError> {
        settings.validate().map_err(FragmentError::InvalidArgument)?;

        let template = fragment_template(driver.as_ref(), &container, &settings);
        let reconciler = Reconciler::new(driver.as_ref(), &container, &settings.metadata_file_name);
        let metadata_ref = reconciler.metadata_ref().clone();
        let reconciled = reconciler.run(template).await?;

        let mode = if reconciled.report.created {
            OpenMode::Bootstrap
        } else {
            OpenMode::Attach
        };
        info!(
            container = %container,
            mode = ?mode,
            associations = reconciled.document.len(),
            "Opened fragment mirror"
        );

        Ok(Self {
            driver,
            registry,
            settings,
            container,
            metadata_ref,
            document: reconciled.document,
            mode,
            parent,
            needs_refresh: false,
        })
    }

    /// Resolve cross-backend associations through `registry`.
    pub fn with_registry(mut self, registry: DriverRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn container(&self) -> &BackendRef {
        &self.container
    }

    pub fn metadata_ref(&self) -> &BackendRef {
        &self.metadata_ref
    }

    pub fn parent(&self) -> Option<&BackendRef> {
        self.parent.as_ref()
    }

    pub fn driver(&self) -> &Arc<dyn BackendDriver> {
        &self.driver
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &MirrorSettings {
        &self.settings
    }

    pub fn document(&self) -> &FragmentDocument {
        &self.document
    }

    pub fn version_token(&self) -> Option<&VersionToken> {
        self.document.version_token()
    }

    pub fn associations(&self) -> impl Iterator<Item = &AssociationRecord> {
        self.document.associations()
    }

    pub fn association_ids(&self) -> Vec<AssociationId> {
        self.document.association_ids().collect()
    }

    pub fn association(&self, id: &AssociationId) -> Result<&AssociationRecord, FragmentError> {
        self.document
            .association(id)
            .ok_or(FragmentError::AssociationNotFound(*id))
    }

    /// True after a detected conflict or an aborted multi-step operation.
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    /// Discard in-memory state and reload the stored revision, reconciled against the
    /// current listing.
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn refresh(&mut self) -> Result<ReconcileReport, FragmentError> {
        let template = fragment_template(self.driver.as_ref(), &self.container, &self.settings);
        let reconciled = Reconciler::new(
            self.driver.as_ref(),
            &self.container,
            &self.settings.metadata_file_name,
        )
        .run(template)
        .await?;

        self.document = reconciled.document;
        self.needs_refresh = false;
        info!(
            version = %self.document.version_token().map(|t| t.as_str()).unwrap_or_default(),
            "Refreshed fragment"
        );
        Ok(reconciled.report)
    }

    /// Persist in-memory edits under the optimistic protocol.
    ///
    /// On any failure the edits stay in memory, but nothing more can be mutated until
    /// [`MirrorController::refresh`] has run.
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn save(&mut self) -> Result<ReconcileReport, FragmentError> {
        self.ensure_fresh()?;
        match self.commit().await {
            Ok(report) => Ok(report),
            Err(e) => {
                if !self.needs_refresh {
                    warn!(error = %e, "Save failed; refresh required");
                    self.needs_refresh = true;
                }
                Err(e)
            }
        }
    }

    /// Display name recorded on the fragment.
    pub fn display_name(&self) -> &str {
        self.document.display_name()
    }

    pub fn set_display_name(&mut self, name: impl Into<String>) -> Result<(), FragmentError> {
        self.ensure_fresh()?;
        self.document.set_display_name(name);
        Ok(())
    }

    pub fn set_display_text(
        &mut self,
        id: &AssociationId,
        text: impl Into<String>,
    ) -> Result<(), FragmentError> {
        self.record_mut(id)?.set_display_text(text);
        Ok(())
    }

    pub fn attribute(
        &self,
        id: &AssociationId,
        uri: &str,
        key: &str,
    ) -> Result<Option<&str>, FragmentError> {
        Ok(self.association(id)?.attribute(uri, key))
    }

    /// Set a namespaced attribute on an association. In memory only; call
    /// [`MirrorController::save`] to persist.
    pub fn set_attribute(
        &mut self,
        id: &AssociationId,
        uri: &str,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, FragmentError> {
        self.record_mut(id)?.set_attribute(uri, key, value)
    }

    pub fn remove_attribute(
        &mut self,
        id: &AssociationId,
        uri: &str,
        key: &str,
    ) -> Result<Option<String>, FragmentError> {
        Ok(self.record_mut(id)?.remove_attribute(uri, key))
    }

    pub fn data(&self, id: &AssociationId, uri: &str) -> Result<Option<&str>, FragmentError> {
        Ok(self.association(id)?.data(uri))
    }

    pub fn set_data(
        &mut self,
        id: &AssociationId,
        uri: &str,
        data: impl Into<String>,
    ) -> Result<Option<String>, FragmentError> {
        self.record_mut(id)?.set_data(uri, data)
    }

    pub fn fragment_attribute(&self, uri: &str, key: &str) -> Option<&str> {
        self.document.attribute(uri, key)
    }

    pub fn set_fragment_attribute(
        &mut self,
        uri: &str,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, FragmentError> {
        self.ensure_fresh()?;
        self.document.set_attribute(uri, key, value)
    }

    pub fn fragment_data(&self, uri: &str) -> Option<&str> {
        self.document.data(uri)
    }

    pub fn set_fragment_data(
        &mut self,
        uri: &str,
        data: impl Into<String>,
    ) -> Result<Option<String>, FragmentError> {
        self.ensure_fresh()?;
        self.document.set_data(uri, data)
    }

    /// Publicly reachable URL of an association's backend item.
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn public_url(&self, id: &AssociationId) -> Result<String, FragmentError> {
        let record = self.association(id)?;
        let item = record.associated_item().ok_or_else(|| {
            FragmentError::InvalidArgument(format!("Association {} has no backend item", id))
        })?;
        let driver = self.driver_for(record)?;
        Ok(driver.public_url(item).await?)
    }

    /// Controller for the container behind a grouping association.
    ///
    /// The child shares this controller's settings and registry and records this container
    /// as its parent.
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn open_child(&self, id: &AssociationId) -> Result<MirrorController, FragmentError> {
        let record = self.association(id)?;
        if !record.is_grouping() {
            return Err(FragmentError::InvalidArgument(format!(
                "Association {} is not a grouping item",
                id
            )));
        }
        let item = record.associated_item().cloned().ok_or_else(|| {
            FragmentError::InvalidArgument(format!("Association {} has no backend item", id))
        })?;
        let driver = self.driver_for(record)?;

        Self::open_inner(
            driver,
            item,
            self.settings.clone(),
            self.registry.clone(),
            Some(self.container.clone()),
        )
        .await
    }

    pub(crate) fn ensure_fresh(&self) -> Result<(), FragmentError> {
        if self.needs_refresh {
            return Err(FragmentError::RefreshRequired);
        }
        Ok(())
    }

    fn record_mut(&mut self, id: &AssociationId) -> Result<&mut AssociationRecord, FragmentError> {
        self.ensure_fresh()?;
        self.document
            .association_mut(id)
            .ok_or(FragmentError::AssociationNotFound(*id))
    }

    /// Driver owning an association's item: this controller's own, or a registered one.
    pub(crate) fn driver_for(
        &self,
        record: &AssociationRecord,
    ) -> Result<Arc<dyn BackendDriver>, FragmentError> {
        match record.driver() {
            Some(ids) if ids.name != self.driver.name() => {
                self.registry.get(&ids.name).ok_or_else(|| {
                    FragmentError::UnsupportedOperation(format!(
                        "No driver registered under '{}'",
                        ids.name
                    ))
                })
            }
            _ => Ok(Arc::clone(&self.driver)),
        }
    }

    /// Compare tokens with the stored revision, reconcile, and write.
    pub(crate) async fn commit(&mut self) -> Result<ReconcileReport, FragmentError> {
        let reconciler = Reconciler::new(
            self.driver.as_ref(),
            &self.container,
            &self.settings.metadata_file_name,
        );

        let stored = reconciler.fetch_persisted().await?;
        let found = stored.as_ref().and_then(|d| d.version_token().cloned());
        if found.as_ref() != self.document.version_token() {
            let expected = token_label(self.document.version_token());
            let found = match stored {
                Some(_) => token_label(found.as_ref()),
                None => "<absent>".to_string(),
            };
            warn!(
                container = %self.container,
                expected = %expected,
                found = %found,
                "Stored fragment changed since last read; refresh required"
            );
            self.needs_refresh = true;
            return Err(FragmentError::StaleDocument { expected, found });
        }

        let listing = reconciler.fetch_listing().await?;
        let mut report = Reconciler::converge(&listing, &mut self.document);
        persist::persist(self.driver.as_ref(), &self.metadata_ref, &mut self.document).await?;
        report.persisted = true;
        Ok(report)
    }

    /// Undo an in-memory mutation whose backend step or save failed.
    pub(crate) fn abort(
        &mut self,
        snapshot: FragmentDocument,
        operation: &'static str,
        error: FragmentError,
    ) -> FragmentError {
        warn!(
            container = %self.container,
            operation,
            error = %error,
            "Association operation aborted; refresh required"
        );
        self.document = snapshot;
        self.needs_refresh = true;
        error
    }
}

impl std::fmt::Debug for MirrorController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorController")
            .field("driver", &self.driver.name())
            .field("container", &self.container)
            .field("mode", &self.mode)
            .field("parent", &self.parent)
            .field("associations", &self.document.len())
            .field("needs_refresh", &self.needs_refresh)
            .finish()
    }
}

fn fragment_template(
    driver: &dyn BackendDriver,
    container: &BackendRef,
    settings: &MirrorSettings,
) -> CommonAttributes {
    let mut common = settings.common_attributes();
    common.described_item = Some(container.clone());
    common.display_name = driver.item_name(container).unwrap_or_default();
    common.driver = Some(driver.identifiers());
    common
}

fn token_label(token: Option<&VersionToken>) -> String {
    token
        .map(|t| t.to_string())
        .unwrap_or_else(|| "<none>".to_string())
}
