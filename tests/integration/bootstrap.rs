//! Integration tests for controller construction

use super::test_utils::{linked_names, memory_driver, open_root, writes};
use fragmirror::{FragmentDocument, OpenMode};

#[tokio::test]
async fn test_bootstrap_links_every_listed_item() {
    let driver = memory_driver();
    driver.seed_leaf("/a.txt", b"alpha");
    driver.seed_container("/notes");

    let mirror = open_root(&driver).await;

    assert_eq!(mirror.mode(), OpenMode::Bootstrap);
    assert_eq!(mirror.document().len(), 2);
    assert_eq!(linked_names(&mirror), vec!["a.txt", "notes"]);

    let a = mirror.document().find_linked("a.txt").unwrap();
    assert!(!a.is_grouping());
    assert_eq!(a.display_text(), "a.txt");
    let notes = mirror.document().find_linked("notes").unwrap();
    assert!(notes.is_grouping());
    assert_eq!(mirror.document().unlinked().count(), 0);

    assert!(mirror.version_token().is_some());
    assert_eq!(writes(&driver), 1);
}

#[tokio::test]
async fn test_bootstrap_writes_what_it_holds() {
    let driver = memory_driver();
    driver.seed_leaf("/a.txt", b"alpha");
    let mirror = open_root(&driver).await;

    let stored = driver.leaf_content("/.fragment.json").unwrap();
    let stored = FragmentDocument::deserialize(std::str::from_utf8(&stored).unwrap()).unwrap();
    assert_eq!(stored.version_token(), mirror.version_token());
    assert_eq!(stored.len(), 1);
    assert_eq!(
        stored.common().described_item.as_ref().map(|r| r.as_str()),
        Some("/")
    );
}

#[tokio::test]
async fn test_empty_container_bootstraps_empty_fragment() {
    let driver = memory_driver();
    let mirror = open_root(&driver).await;

    assert_eq!(mirror.mode(), OpenMode::Bootstrap);
    assert!(mirror.document().is_empty());
    assert_eq!(writes(&driver), 1);
}

#[tokio::test]
async fn test_attach_to_unchanged_backend_does_not_write() {
    let driver = memory_driver();
    driver.seed_leaf("/a.txt", b"alpha");
    let first = open_root(&driver).await;

    let second = open_root(&driver).await;
    assert_eq!(second.mode(), OpenMode::Attach);
    assert_eq!(second.version_token(), first.version_token());
    assert_eq!(second.association_ids(), first.association_ids());
    assert_eq!(writes(&driver), 1);
}
