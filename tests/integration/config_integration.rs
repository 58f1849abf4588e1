//! Integration tests for Configuration System

use super::test_utils::{memory_driver, with_xdg_env};
use fragmirror::{ConfigLoader, FragmirrorConfig, MirrorController};
use tempfile::TempDir;

#[test]
fn test_loaded_settings_reach_controller() {
    let test_dir = TempDir::new().unwrap();
    let workspace = test_dir.path().join("workspace");
    std::fs::create_dir_all(workspace.join("config")).unwrap();
    std::fs::write(
        workspace.join("config").join("config.toml"),
        r#"
[mirror]
metadata_file_name = ".mirror.json"
schema_version = "2.1"
"#,
    )
    .unwrap();

    let config = with_xdg_env(&test_dir, || ConfigLoader::load(&workspace).unwrap());
    assert!(config.validate().is_ok());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    runtime.block_on(async {
        let driver = memory_driver();
        driver.seed_leaf("/a.txt", b"a");
        let mirror = MirrorController::open(driver.clone(), driver.root(), config.mirror.clone())
            .await
            .unwrap();

        assert!(driver.contains("/.mirror.json"));
        assert!(!driver.contains("/.fragment.json"));
        assert_eq!(mirror.document().common().schema_version, "2.1");
        assert_eq!(mirror.document().len(), 1);
    });
}

#[test]
fn test_global_config_under_xdg_config_home() {
    let test_dir = TempDir::new().unwrap();
    let global_dir = test_dir.path().join("xdg").join("fragmirror");
    std::fs::create_dir_all(&global_dir).unwrap();
    std::fs::write(
        global_dir.join("config.toml"),
        "[logging]\nlevel = \"warn\"\nformat = \"json\"\n",
    )
    .unwrap();
    let workspace = test_dir.path().join("empty-workspace");
    std::fs::create_dir_all(&workspace).unwrap();

    let (config, path) = with_xdg_env(&test_dir, || {
        (
            ConfigLoader::load(&workspace).unwrap(),
            ConfigLoader::global_config_path(),
        )
    });

    assert_eq!(path, Some(global_dir.join("config.toml")));
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.mirror.metadata_file_name, ".fragment.json");
}

#[test]
fn test_invalid_file_fails_validation() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("bad.toml");
    std::fs::write(
        &config_file,
        "[mirror]\nmetadata_file_name = \"a/b\"\nmax_local_name_len = 0\n",
    )
    .unwrap();

    let config: FragmirrorConfig = ConfigLoader::load_from_file(&config_file).unwrap();
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(config.ensure_valid().is_err());
}
