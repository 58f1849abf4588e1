//! Integration tests for deleting associations

use super::test_utils::{item_mutations, memory_driver, open_root};
use fragmirror::backend::DriverOp;
use fragmirror::{AssociationId, CreateAssociation, FragmentError};

#[tokio::test]
async fn test_delete_linked_leaf_removes_item_and_record() {
    let driver = memory_driver();
    driver.seed_leaf("/a.txt", b"a");
    driver.seed_leaf("/b.txt", b"b");
    let mut mirror = open_root(&driver).await;
    let id = mirror.document().find_linked("a.txt").unwrap().id();

    mirror.delete_association(&id).await.unwrap();

    assert!(!driver.contains("/a.txt"));
    assert!(driver.contains("/b.txt"));
    assert!(!mirror.association_ids().contains(&id));
    assert_eq!(driver.call_count(DriverOp::DeleteLeaf), 1);

    let reopened = open_root(&driver).await;
    assert!(reopened.association(&id).is_err());
    assert_eq!(reopened.document().len(), 1);
}

#[tokio::test]
async fn test_delete_grouping_removes_container() {
    let driver = memory_driver();
    driver.seed_leaf("/photos/one.jpg", b"1");
    let mut mirror = open_root(&driver).await;
    let id = mirror.document().find_linked("photos").unwrap().id();

    mirror.delete_association(&id).await.unwrap();

    assert!(!driver.contains("/photos"));
    assert!(!driver.contains("/photos/one.jpg"));
    assert_eq!(driver.call_count(DriverOp::DeleteContainer), 1);
    assert!(mirror.document().is_empty());
}

#[tokio::test]
async fn test_delete_phantom_touches_no_backend_item() {
    let driver = memory_driver();
    let mut mirror = open_root(&driver).await;
    let id = mirror
        .create_association(CreateAssociation::phantom("maybe"))
        .await
        .unwrap();
    driver.clear_calls();

    mirror.delete_association(&id).await.unwrap();

    assert!(item_mutations(&driver).is_empty());
    assert!(mirror.document().is_empty());
}

#[tokio::test]
async fn test_delete_unknown_id_is_not_found() {
    let driver = memory_driver();
    let mut mirror = open_root(&driver).await;
    driver.clear_calls();

    let missing = AssociationId::generate();
    let err = mirror.delete_association(&missing).await.unwrap_err();
    assert!(matches!(err, FragmentError::AssociationNotFound(id) if id == missing));
    assert!(driver.calls().is_empty());
}
