//! Loading and persisting fragments through a backend driver.

use crate::backend::BackendDriver;
use crate::error::FragmentError;
use crate::fragment::{codec, FragmentDocument};
use crate::types::BackendRef;
use tracing::{debug, info};

/// Read and decode the metadata file; `None` when the backend reports it absent.
pub async fn load(
    driver: &dyn BackendDriver,
    metadata_ref: &BackendRef,
) -> Result<Option<FragmentDocument>, FragmentError> {
    match driver.read_metadata_file(metadata_ref).await {
        Ok(text) => {
            let document = codec::decode(&text)?;
            debug!(
                metadata = %metadata_ref,
                associations = document.len(),
                "Loaded fragment"
            );
            Ok(Some(document))
        }
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Regenerate the version token and write the document.
///
/// If encoding or the write fails the previous token is restored, so the in-memory token
/// always names the revision last written under it.
pub async fn persist(
    driver: &dyn BackendDriver,
    metadata_ref: &BackendRef,
    document: &mut FragmentDocument,
) -> Result<(), FragmentError> {
    let previous = document.regenerate_version_token();

    let text = match codec::encode(document) {
        Ok(text) => text,
        Err(e) => {
            document.restore_version_token(previous);
            return Err(e);
        }
    };

    if let Err(e) = driver.write_metadata_file(metadata_ref, &text).await {
        document.restore_version_token(previous);
        return Err(e.into());
    }

    info!(
        metadata = %metadata_ref,
        version = %document.version_token().map(|t| t.as_str()).unwrap_or_default(),
        associations = document.len(),
        "Persisted fragment revision"
    );
    Ok(())
}
