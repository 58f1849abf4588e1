//! Association lifecycle operations.
//!
//! Every operation runs the same three steps: mutate the in-memory fragment, perform the
//! backend operation if the association is linked, then save. When the backend step fails
//! the save never runs; when either fails the in-memory fragment is rolled back and the
//! controller refuses further mutation until refreshed.

use super::request::{derive_local_name, validate_local_name, CreateAssociation};
use super::MirrorController;
use crate::association::{AssociationData, AssociationRecord};
use crate::error::FragmentError;
use crate::types::{AssociationId, BackendRef};
use std::collections::BTreeSet;
use tracing::{info, instrument};

/// Backend item a create request needs
enum BackendStep {
    Container { name: String },
    Leaf { name: String, content: Vec<u8> },
}

impl BackendStep {
    fn name(&self) -> &str {
        match self {
            BackendStep::Container { name } | BackendStep::Leaf { name, .. } => name,
        }
    }
}

impl MirrorController {
    /// Create an association as described by `request`.
    #[instrument(skip(self, request), fields(container = %self.container, kind = request.kind()))]
    pub async fn create_association(
        &mut self,
        request: CreateAssociation,
    ) -> Result<AssociationId, FragmentError> {
        self.ensure_fresh()?;
        request.validate()?;

        let (record, step) = self.prepare_create(request)?;
        let id = record.id();
        let snapshot = self.document.clone();
        self.document.insert(record);

        if let Some(step) = step {
            let created = match &step {
                BackendStep::Container { name } => {
                    self.driver.create_container(&self.container, name).await
                }
                BackendStep::Leaf { name, content } => {
                    self.driver
                        .create_leaf_item(&self.container, name, content)
                        .await
                }
            };
            match created {
                Ok(item) => {
                    if let Some(record) = self.document.association_mut(&id) {
                        record.link(step.name().to_string(), item);
                    }
                }
                Err(e) => return Err(self.abort(snapshot, "create_association", e.into())),
            }
        }

        if let Err(e) = self.commit().await {
            return Err(self.abort(snapshot, "create_association", e));
        }
        info!(association = %id, "Created association");
        Ok(id)
    }

    /// Delete an association, and its backend item when it is linked.
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn delete_association(&mut self, id: &AssociationId) -> Result<(), FragmentError> {
        self.ensure_fresh()?;
        let record = self.association(id)?.clone();

        let snapshot = self.document.clone();
        self.document.remove(id);

        if let Some(name) = record.local_item() {
            let item = self.driver.child_ref(&self.container, name);
            let deleted = if record.is_grouping() {
                self.driver.delete_container(&item).await
            } else {
                self.driver.delete_leaf_item(&item).await
            };
            if let Err(e) = deleted {
                return Err(self.abort(snapshot, "delete_association", e.into()));
            }
        }

        if let Err(e) = self.commit().await {
            return Err(self.abort(snapshot, "delete_association", e));
        }
        info!(association = %id, "Deleted association");
        Ok(())
    }

    /// Give an association a new name. A linked association's backend item is renamed with
    /// it; id and namespace data are kept.
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn rename_association(
        &mut self,
        id: &AssociationId,
        new_name: &str,
    ) -> Result<(), FragmentError> {
        self.ensure_fresh()?;
        if new_name.trim().is_empty() {
            return Err(FragmentError::InvalidArgument(
                "New name cannot be empty".to_string(),
            ));
        }
        let record = self.association(id)?.clone();

        let relocation = match record.local_item() {
            Some(old) if old != new_name => {
                self.check_new_local_name(new_name)?;
                Some((
                    self.driver.child_ref(&self.container, old),
                    self.driver.child_ref(&self.container, new_name),
                ))
            }
            _ => None,
        };

        let snapshot = self.document.clone();
        if let Some(current) = self.document.association_mut(id) {
            current.set_display_text(new_name);
            if let Some((_, to)) = &relocation {
                current.link(new_name.to_string(), to.clone());
            }
        }

        if let Some((from, to)) = &relocation {
            if let Err(e) = self.driver.move_item(from, to).await {
                return Err(self.abort(snapshot, "rename_association", e.into()));
            }
        }

        if let Err(e) = self.commit().await {
            return Err(self.abort(snapshot, "rename_association", e));
        }
        info!(association = %id, name = new_name, "Renamed association");
        Ok(())
    }

    /// Move an association (and its backend item, when linked) into `target`'s container.
    ///
    /// The association keeps its id. Both controllers must use the same driver.
    #[instrument(skip(self, target), fields(container = %self.container, target = %target.container))]
    pub async fn move_association(
        &mut self,
        id: &AssociationId,
        target: &mut MirrorController,
    ) -> Result<(), FragmentError> {
        self.ensure_fresh()?;
        target.ensure_fresh()?;
        if self.container == target.container && self.driver.name() == target.driver.name() {
            return Err(FragmentError::InvalidArgument(
                "Source and target are the same container".to_string(),
            ));
        }
        let record = self.association(id)?.clone();
        let relocation = self.plan_transfer(&record, target, "move")?;

        let source_snapshot = self.document.clone();
        let target_snapshot = target.document.clone();
        self.document.remove(id);
        let mut moved = record;
        if let Some((name, _, to)) = &relocation {
            moved.link(name.clone(), to.clone());
        }
        target.document.insert(moved);

        if let Some((_, from, to)) = &relocation {
            if let Err(e) = self.driver.move_item(from, to).await {
                let e = target.abort(target_snapshot, "move_association", e.into());
                return Err(self.abort(source_snapshot, "move_association", e));
            }
        }

        if let Err(e) = target.commit().await {
            let e = target.abort(target_snapshot, "move_association", e);
            return Err(self.abort(source_snapshot, "move_association", e));
        }
        if let Err(e) = self.commit().await {
            return Err(self.abort(source_snapshot, "move_association", e));
        }
        info!(association = %id, "Moved association");
        Ok(())
    }

    /// Copy an association (and its backend item, when linked) into `target`'s container,
    /// returning the id of the copy.
    #[instrument(skip(self, target), fields(container = %self.container, target = %target.container))]
    pub async fn copy_association(
        &self,
        id: &AssociationId,
        target: &mut MirrorController,
    ) -> Result<AssociationId, FragmentError> {
        self.ensure_fresh()?;
        target.ensure_fresh()?;
        let record = self.association(id)?;
        let relocation = self.plan_transfer(record, target, "copy")?;

        let mut copy = record.duplicate();
        let copy_id = copy.id();
        if let Some((name, _, to)) = &relocation {
            copy.link(name.clone(), to.clone());
        }

        let snapshot = target.document.clone();
        target.document.insert(copy);

        if let Some((_, from, to)) = &relocation {
            if let Err(e) = self.driver.copy_item(from, to).await {
                return Err(target.abort(snapshot, "copy_association", e.into()));
            }
        }

        if let Err(e) = target.commit().await {
            return Err(target.abort(snapshot, "copy_association", e));
        }
        info!(association = %id, copy = %copy_id, "Copied association");
        Ok(copy_id)
    }

    /// Turn a phantom into a grouping item backed by a new container named after its
    /// display text. Phantoms linking an existing item are refused.
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn materialize_phantom(
        &mut self,
        id: &AssociationId,
    ) -> Result<BackendRef, FragmentError> {
        self.ensure_fresh()?;
        let record = self.association(id)?;
        if !record.is_phantom() {
            return Err(FragmentError::InvalidArgument(format!(
                "Association {} is not a phantom",
                id
            )));
        }
        if let Some(item) = record.associated_item() {
            return Err(FragmentError::InvalidArgument(format!(
                "Association {} already links {}",
                id, item
            )));
        }
        let name = derive_local_name(
            record.display_text(),
            self.settings.max_local_name_len,
            &self.settings.metadata_file_name,
            &self.linked_names(),
        )?;

        let snapshot = self.document.clone();
        let planned = self.driver.child_ref(&self.container, &name);
        if let Some(current) = self.document.association_mut(id) {
            current.set_grouping(true);
            current.link(name.clone(), planned);
        }

        let created = match self.driver.create_container(&self.container, &name).await {
            Ok(item) => item,
            Err(e) => return Err(self.abort(snapshot, "materialize_phantom", e.into())),
        };
        if let Some(current) = self.document.association_mut(id) {
            current.link(name.clone(), created.clone());
        }

        if let Err(e) = self.commit().await {
            return Err(self.abort(snapshot, "materialize_phantom", e));
        }
        info!(association = %id, item = %created, "Materialized phantom");
        Ok(created)
    }

    fn prepare_create(
        &self,
        request: CreateAssociation,
    ) -> Result<(AssociationRecord, Option<BackendStep>), FragmentError> {
        let prepared = match request {
            CreateAssociation::Phantom { display_text } => (
                AssociationRecord::from_data(AssociationData::phantom(display_text)),
                None,
            ),
            CreateAssociation::ItemLink { display_text, item } => (
                AssociationRecord::from_data(AssociationData {
                    display_text,
                    associated_item: Some(item),
                    ..Default::default()
                }),
                None,
            ),
            CreateAssociation::GroupingLink { display_text, item } => (
                AssociationRecord::from_data(AssociationData {
                    display_text,
                    is_grouping: true,
                    associated_item: Some(item),
                    ..Default::default()
                }),
                None,
            ),
            CreateAssociation::Grouping {
                display_text,
                local_item,
            } => {
                self.check_new_local_name(&local_item)?;
                let record = self.local_record(display_text, &local_item, true);
                (record, Some(BackendStep::Container { name: local_item }))
            }
            CreateAssociation::Leaf {
                display_text,
                local_item,
                content,
            } => {
                self.check_new_local_name(&local_item)?;
                let record = self.local_record(display_text, &local_item, false);
                (
                    record,
                    Some(BackendStep::Leaf {
                        name: local_item,
                        content,
                    }),
                )
            }
            CreateAssociation::DerivedGrouping { display_text } => {
                let name = derive_local_name(
                    &display_text,
                    self.settings.max_local_name_len,
                    &self.settings.metadata_file_name,
                    &self.linked_names(),
                )?;
                let record = self.local_record(display_text, &name, true);
                (record, Some(BackendStep::Container { name }))
            }
            CreateAssociation::ForeignLink {
                display_text,
                driver,
                item,
                is_grouping,
            } => {
                if driver.name != self.driver.name() && !self.registry.contains(&driver.name) {
                    return Err(FragmentError::UnsupportedOperation(format!(
                        "No driver registered under '{}'",
                        driver.name
                    )));
                }
                (
                    AssociationRecord::from_data(AssociationData {
                        display_text,
                        is_grouping,
                        associated_item: Some(item),
                        driver: Some(driver),
                        ..Default::default()
                    }),
                    None,
                )
            }
        };
        Ok(prepared)
    }

    fn local_record(&self, display_text: String, name: &str, is_grouping: bool) -> AssociationRecord {
        AssociationRecord::from_data(AssociationData {
            display_text,
            is_grouping,
            local_item: Some(name.to_string()),
            associated_item: Some(self.driver.child_ref(&self.container, name)),
            driver: None,
        })
    }

    fn check_new_local_name(&self, name: &str) -> Result<(), FragmentError> {
        validate_local_name(name, &self.settings.metadata_file_name)?;
        if self.document.find_linked(name).is_some() {
            return Err(FragmentError::InvalidArgument(format!(
                "An association for {:?} already exists in {}",
                name, self.container
            )));
        }
        Ok(())
    }

    fn linked_names(&self) -> BTreeSet<String> {
        self.document
            .linked()
            .filter_map(|a| a.local_item().map(str::to_string))
            .collect()
    }

    /// For a linked association: its name plus source and destination refs.
    fn plan_transfer(
        &self,
        record: &AssociationRecord,
        target: &MirrorController,
        operation: &str,
    ) -> Result<Option<(String, BackendRef, BackendRef)>, FragmentError> {
        let Some(name) = record.local_item() else {
            return Ok(None);
        };
        if self.driver.name() != target.driver.name() {
            return Err(FragmentError::UnsupportedOperation(format!(
                "Cannot {} between drivers '{}' and '{}'",
                operation,
                self.driver.name(),
                target.driver.name()
            )));
        }
        target.check_new_local_name(name)?;
        Ok(Some((
            name.to_string(),
            self.driver.child_ref(&self.container, name),
            target.driver.child_ref(&target.container, name),
        )))
    }
}
