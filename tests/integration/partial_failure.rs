//! Integration tests for multi-step operations that fail midway

use super::test_utils::{linked_names, memory_driver, open_root, writes};
use fragmirror::backend::DriverOp;
use fragmirror::{CreateAssociation, FragmentError};

#[tokio::test]
async fn test_failed_backend_step_skips_save_and_requires_refresh() {
    let driver = memory_driver();
    let mut mirror = open_root(&driver).await;
    let writes_before = writes(&driver);

    driver.fail_next(DriverOp::CreateContainer);
    let err = mirror
        .create_association(CreateAssociation::grouping("Docs", "docs"))
        .await
        .unwrap_err();

    assert!(matches!(err, FragmentError::Backend(_)));
    assert_eq!(writes(&driver), writes_before);
    assert!(mirror.needs_refresh());
    assert!(mirror.document().is_empty());

    let blocked = mirror
        .create_association(CreateAssociation::phantom("later"))
        .await
        .unwrap_err();
    assert!(matches!(blocked, FragmentError::RefreshRequired));

    mirror.refresh().await.unwrap();
    assert!(!mirror.needs_refresh());
    mirror
        .create_association(CreateAssociation::grouping("Docs", "docs"))
        .await
        .unwrap();
    assert_eq!(linked_names(&mirror), vec!["docs"]);
}

#[tokio::test]
async fn test_failed_save_after_backend_step_recovers_on_refresh() {
    let driver = memory_driver();
    driver.seed_leaf("/a.txt", b"a");
    let mut mirror = open_root(&driver).await;
    let id = mirror.document().find_linked("a.txt").unwrap().id();
    let token = mirror.version_token().cloned();

    driver.fail_next(DriverOp::WriteMetadata);
    let err = mirror.delete_association(&id).await.unwrap_err();

    assert!(matches!(err, FragmentError::Backend(_)));
    assert!(!driver.contains("/a.txt"));
    // The unpersisted removal is not treated as durable
    assert!(mirror.association(&id).is_ok());
    assert_eq!(mirror.version_token().cloned(), token);
    assert!(mirror.needs_refresh());

    let report = mirror.refresh().await.unwrap();
    assert_eq!(report.removed, vec![id]);
    assert!(mirror.document().is_empty());
}

#[tokio::test]
async fn test_failed_delete_keeps_record() {
    let driver = memory_driver();
    driver.seed_leaf("/keep.txt", b"k");
    let mut mirror = open_root(&driver).await;
    let id = mirror.document().find_linked("keep.txt").unwrap().id();
    let writes_before = writes(&driver);

    driver.fail_next(DriverOp::DeleteLeaf);
    assert!(mirror.delete_association(&id).await.is_err());

    assert!(driver.contains("/keep.txt"));
    assert!(mirror.association(&id).is_ok());
    assert_eq!(writes(&driver), writes_before);
}

#[tokio::test]
async fn test_failed_refresh_leaves_refresh_requirement() {
    let driver = memory_driver();
    let mut mirror = open_root(&driver).await;
    driver.fail_next(DriverOp::CreateLeaf);
    assert!(mirror
        .create_association(CreateAssociation::leaf("x", "x.bin", vec![1, 2, 3]))
        .await
        .is_err());

    driver.fail_next(DriverOp::List);
    assert!(mirror.refresh().await.is_err());
    assert!(mirror.needs_refresh());
}
