//! Integration tests for controllers over a local directory

use fragmirror::backend::BackendDriver;
use fragmirror::{CreateAssociation, LocalFsDriver, MirrorController, MirrorSettings, OpenMode};
use std::sync::Arc;
use tempfile::TempDir;

async fn open_local(dir: &TempDir) -> (Arc<LocalFsDriver>, MirrorController) {
    let driver = Arc::new(LocalFsDriver::new(dir.path()).unwrap());
    let mirror = MirrorController::open(driver.clone(), driver.root(), MirrorSettings::default())
        .await
        .unwrap();
    (driver, mirror)
}

#[tokio::test]
async fn test_bootstrap_over_directory() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
    std::fs::create_dir(dir.path().join("notes")).unwrap();

    let (_driver, mirror) = open_local(&dir).await;

    assert_eq!(mirror.mode(), OpenMode::Bootstrap);
    assert_eq!(mirror.document().len(), 2);
    assert!(mirror.document().find_linked("notes").unwrap().is_grouping());
    assert!(dir.path().join(".fragment.json").is_file());

    let (_driver, again) = open_local(&dir).await;
    assert_eq!(again.mode(), OpenMode::Attach);
    assert_eq!(again.version_token(), mirror.version_token());
}

#[tokio::test]
async fn test_lifecycle_on_disk() {
    let dir = TempDir::new().unwrap();
    let (_driver, mut mirror) = open_local(&dir).await;

    let docs = mirror
        .create_association(CreateAssociation::grouping("Documents", "docs"))
        .await
        .unwrap();
    let readme = mirror
        .create_association(CreateAssociation::leaf("Readme", "README.md", b"hello".to_vec()))
        .await
        .unwrap();
    assert!(dir.path().join("docs").is_dir());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("README.md")).unwrap(),
        "hello"
    );

    mirror.rename_association(&readme, "READ.md").await.unwrap();
    assert!(dir.path().join("READ.md").is_file());
    assert!(!dir.path().join("README.md").exists());

    mirror.delete_association(&docs).await.unwrap();
    assert!(!dir.path().join("docs").exists());
    assert_eq!(mirror.document().len(), 1);
}

#[tokio::test]
async fn test_open_child_records_parent() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("projects")).unwrap();
    std::fs::write(dir.path().join("projects").join("plan.md"), "# plan").unwrap();
    let (driver, mirror) = open_local(&dir).await;
    let projects = mirror.document().find_linked("projects").unwrap().id();

    let child = mirror.open_child(&projects).await.unwrap();

    assert_eq!(child.parent(), Some(&driver.root()));
    assert_eq!(child.mode(), OpenMode::Bootstrap);
    assert!(child.document().find_linked("plan.md").is_some());
    assert!(dir.path().join("projects").join(".fragment.json").is_file());

    let plan = child.document().find_linked("plan.md").unwrap().id();
    let url = child.public_url(&plan).await.unwrap();
    assert!(url.starts_with("file://"));
    assert!(url.ends_with("plan.md"));
    assert!(child.open_child(&plan).await.is_err());
}

#[tokio::test]
async fn test_bootstrap_keeps_user_item_named_like_a_temp_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".fragment.tmp"), "USER DATA").unwrap();

    let (_driver, mirror) = open_local(&dir).await;

    let linked: Vec<&str> = mirror
        .document()
        .linked()
        .filter_map(|a| a.local_item())
        .collect();
    assert_eq!(linked, vec![".fragment.tmp"]);
    assert_eq!(
        std::fs::read_to_string(dir.path().join(".fragment.tmp")).unwrap(),
        "USER DATA"
    );
    let entries = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(entries, 2);
}
