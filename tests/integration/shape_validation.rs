//! Integration tests for create-request shapes

use super::test_utils::{item_mutations, memory_driver, open_root};
use fragmirror::backend::DriverOp;
use fragmirror::{BackendRef, CreateAssociation, FragmentError};

#[tokio::test]
async fn test_phantom_makes_no_backend_item_calls() {
    let driver = memory_driver();
    let mut mirror = open_root(&driver).await;
    driver.clear_calls();

    let id = mirror
        .create_association(CreateAssociation::phantom("someday"))
        .await
        .unwrap();

    let record = mirror.association(&id).unwrap();
    assert!(record.is_phantom());
    assert!(!record.is_grouping());
    assert!(record.local_item().is_none());
    assert!(item_mutations(&driver).is_empty());
}

#[tokio::test]
async fn test_grouping_creates_container_once_before_persisting() {
    let driver = memory_driver();
    let mut mirror = open_root(&driver).await;
    driver.clear_calls();

    let id = mirror
        .create_association(CreateAssociation::grouping("Projects", "projects"))
        .await
        .unwrap();

    let ops: Vec<DriverOp> = driver.calls().into_iter().map(|c| c.op).collect();
    let creates: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| **op == DriverOp::CreateContainer)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(creates.len(), 1);
    let last_write = ops
        .iter()
        .rposition(|op| *op == DriverOp::WriteMetadata)
        .unwrap();
    assert!(creates[0] < last_write);

    let record = mirror.association(&id).unwrap();
    assert!(record.is_linked());
    assert!(record.is_grouping());
    assert_eq!(record.display_text(), "Projects");
    assert_eq!(record.associated_item(), Some(&BackendRef::new("/projects")));
    assert!(driver.is_container("/projects"));
    assert_eq!(mirror.document().len(), 1);
}

#[tokio::test]
async fn test_item_link_stays_phantom_without_calls() {
    let driver = memory_driver();
    driver.seed_leaf("/elsewhere/report.pdf", b"%PDF");
    let mut mirror = open_root(&driver).await;
    driver.clear_calls();

    let id = mirror
        .create_association(CreateAssociation::item_link(
            "Report",
            "/elsewhere/report.pdf",
        ))
        .await
        .unwrap();

    let record = mirror.association(&id).unwrap();
    assert!(record.is_phantom());
    assert!(record.local_item().is_none());
    assert_eq!(
        record.associated_item().map(|r| r.as_str()),
        Some("/elsewhere/report.pdf")
    );
    assert!(item_mutations(&driver).is_empty());
}

#[tokio::test]
async fn test_grouping_link_is_not_phantom_and_survives_reconcile() {
    let driver = memory_driver();
    driver.seed_container("/shared/archive");
    let mut mirror = open_at_root_with_link(&driver).await;

    let link = mirror
        .associations()
        .find(|r| r.display_text() == "Archive")
        .unwrap()
        .id();
    assert!(!mirror.association(&link).unwrap().is_phantom());

    mirror.refresh().await.unwrap();
    assert!(mirror.association(&link).is_ok());
}

async fn open_at_root_with_link(
    driver: &std::sync::Arc<fragmirror::InMemoryDriver>,
) -> fragmirror::MirrorController {
    let mut mirror = open_root(driver).await;
    mirror
        .create_association(CreateAssociation::GroupingLink {
            display_text: "Archive".to_string(),
            item: BackendRef::new("/shared/archive"),
        })
        .await
        .unwrap();
    mirror
}

#[tokio::test]
async fn test_invalid_requests_fail_without_io() {
    let driver = memory_driver();
    let mut mirror = open_root(&driver).await;
    driver.clear_calls();

    for request in [
        CreateAssociation::phantom(""),
        CreateAssociation::grouping("Bad", "a/b"),
        CreateAssociation::grouping("Reserved", ".fragment.json"),
        CreateAssociation::leaf("Empty", "", b"x".to_vec()),
    ] {
        let err = mirror.create_association(request).await.unwrap_err();
        assert!(matches!(err, FragmentError::InvalidArgument(_)));
    }
    assert!(driver.calls().is_empty());
    assert!(!mirror.needs_refresh());
}

#[tokio::test]
async fn test_derived_grouping_dedupes_existing_names() {
    let driver = memory_driver();
    driver.seed_container("/Plans");
    let mut mirror = open_root(&driver).await;

    let id = mirror
        .create_association(CreateAssociation::DerivedGrouping {
            display_text: "Plans".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(mirror.association(&id).unwrap().local_item(), Some("Plans-2"));
    assert!(driver.is_container("/Plans-2"));
}
