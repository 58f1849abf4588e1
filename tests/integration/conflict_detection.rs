//! Integration tests for optimistic concurrency between controllers

use super::test_utils::{memory_driver, open_root, writes};
use fragmirror::{CreateAssociation, FragmentDocument, FragmentError};

#[tokio::test]
async fn test_stale_controller_cannot_overwrite_newer_revision() {
    let driver = memory_driver();
    driver.seed_leaf("/a.txt", b"a");
    let mut a = open_root(&driver).await;
    let mut b = open_root(&driver).await;
    let t0 = b.version_token().cloned();

    a.create_association(CreateAssociation::phantom("from a"))
        .await
        .unwrap();
    let t1 = a.version_token().cloned();
    assert_ne!(t1, t0);
    let writes_before = writes(&driver);

    let err = b
        .create_association(CreateAssociation::phantom("from b"))
        .await
        .unwrap_err();

    match &err {
        FragmentError::StaleDocument { expected, found } => {
            assert_eq!(Some(expected.as_str()), t0.as_ref().map(|t| t.as_str()));
            assert_eq!(Some(found.as_str()), t1.as_ref().map(|t| t.as_str()));
        }
        other => panic!("expected StaleDocument, got {:?}", other),
    }
    assert!(err.is_stale());
    assert!(b.needs_refresh());
    assert_eq!(writes(&driver), writes_before);

    // The stored revision is still A's
    let stored = driver.leaf_content("/.fragment.json").unwrap();
    let stored = FragmentDocument::deserialize(std::str::from_utf8(&stored).unwrap()).unwrap();
    assert_eq!(stored.version_token().cloned(), t1);
    assert!(stored.associations().all(|r| r.display_text() != "from b"));

    // B's aborted association is not kept in memory either
    assert!(b.associations().all(|r| r.display_text() != "from b"));
}

#[tokio::test]
async fn test_refresh_then_retry_succeeds() {
    let driver = memory_driver();
    let mut a = open_root(&driver).await;
    let mut b = open_root(&driver).await;

    a.create_association(CreateAssociation::phantom("first"))
        .await
        .unwrap();
    assert!(b
        .create_association(CreateAssociation::phantom("second"))
        .await
        .is_err());

    assert!(matches!(
        b.create_association(CreateAssociation::phantom("second"))
            .await,
        Err(FragmentError::RefreshRequired)
    ));

    b.refresh().await.unwrap();
    b.create_association(CreateAssociation::phantom("second"))
        .await
        .unwrap();

    assert_eq!(b.document().len(), 2);
    a.refresh().await.unwrap();
    assert_eq!(a.version_token(), b.version_token());
    assert_eq!(a.document().len(), 2);
}

#[tokio::test]
async fn test_deleted_metadata_file_is_stale() {
    let driver = memory_driver();
    let mut mirror = open_root(&driver).await;
    driver.remove_item("/.fragment.json");

    mirror.set_display_name("renamed").unwrap();
    let err = mirror.save().await.unwrap_err();
    assert!(matches!(
        err,
        FragmentError::StaleDocument { ref found, .. } if found == "<absent>"
    ));
    assert!(mirror.needs_refresh());
}

#[tokio::test]
async fn test_unchanged_token_saves_without_conflict() {
    let driver = memory_driver();
    let mut mirror = open_root(&driver).await;

    for label in ["one", "two", "three"] {
        mirror
            .create_association(CreateAssociation::phantom(label))
            .await
            .unwrap();
    }
    assert!(!mirror.needs_refresh());
    assert_eq!(mirror.document().len(), 3);
    assert_eq!(writes(&driver), 4);
}
