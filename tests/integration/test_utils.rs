//! Shared test utilities for integration tests
//!
//! Controller setup over in-memory drivers, and isolated XDG directories for config tests.

use fragmirror::backend::{DriverOp, InMemoryDriver};
use fragmirror::{MirrorController, MirrorSettings};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Global mutex to serialize environment variable access across all tests
static XDG_ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Environment variable state to restore after test
struct EnvState {
    home: Option<String>,
    xdg_config_home: Option<String>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            home: std::env::var("HOME").ok(),
            xdg_config_home: std::env::var("XDG_CONFIG_HOME").ok(),
        }
    }

    fn restore(self) {
        match self.home {
            Some(orig) => std::env::set_var("HOME", orig),
            None => std::env::remove_var("HOME"),
        }
        match self.xdg_config_home {
            Some(orig) => std::env::set_var("XDG_CONFIG_HOME", orig),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointed into `test_dir`, restoring both after.
pub fn with_xdg_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = XDG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let test_config_home = test_dir.path().join("xdg");
    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_config_home).unwrap();
    std::fs::create_dir_all(&test_home).unwrap();

    std::env::set_var("HOME", test_home.to_str().unwrap());
    std::env::set_var("XDG_CONFIG_HOME", test_config_home.to_str().unwrap());

    let result = f();

    env_state.restore();

    result
}

pub fn memory_driver() -> Arc<InMemoryDriver> {
    Arc::new(InMemoryDriver::new())
}

/// Open the root container of `driver` with default settings.
pub async fn open_root(driver: &Arc<InMemoryDriver>) -> MirrorController {
    open_at(driver, "/").await
}

pub async fn open_at(driver: &Arc<InMemoryDriver>, container: &str) -> MirrorController {
    MirrorController::open(driver.clone(), container.into(), MirrorSettings::default())
        .await
        .unwrap()
}

/// Sorted local item names of the controller's linked associations.
pub fn linked_names(mirror: &MirrorController) -> Vec<String> {
    let mut names: Vec<String> = mirror
        .document()
        .linked()
        .filter_map(|a| a.local_item().map(str::to_string))
        .collect();
    names.sort();
    names
}

pub fn writes(driver: &InMemoryDriver) -> usize {
    driver.call_count(DriverOp::WriteMetadata)
}

/// Calls that change backend items (everything but listing and metadata I/O).
pub fn item_mutations(driver: &InMemoryDriver) -> Vec<DriverOp> {
    driver
        .calls()
        .into_iter()
        .map(|c| c.op)
        .filter(|op| {
            !matches!(
                op,
                DriverOp::List | DriverOp::ReadMetadata | DriverOp::WriteMetadata
            )
        })
        .collect()
}
