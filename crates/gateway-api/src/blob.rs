//! File blob storage (spec §10.4): raw bytes live with a collaborator
//! outside the core, behind an enum-dispatch seam matching the convention
//! already used for `ScoringClientKind`/`ModelSourceKind`.

use std::path::PathBuf;

use gateway_shared::{GatewayError, GatewayResult};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum BlobStoreKind {
    /// Writes under a local directory; the default, suitable for tests and
    /// single-node deployments.
    LocalDisk { root: PathBuf },
}

impl BlobStoreKind {
    pub fn local_disk(root: impl Into<PathBuf>) -> Self {
        Self::LocalDisk { root: root.into() }
    }

    pub async fn put(&self, id: Uuid, bytes: &[u8]) -> GatewayResult<()> {
        match self {
            Self::LocalDisk { root } => {
                tokio::fs::create_dir_all(root)
                    .await
                    .map_err(|e| GatewayError::Internal(format!("blob store: {e}")))?;
                tokio::fs::write(root.join(id.to_string()), bytes)
                    .await
                    .map_err(|e| GatewayError::Internal(format!("blob store: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_bytes_under_the_configured_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStoreKind::local_disk(dir.path());
        let id = Uuid::new_v4();

        store.put(id, b"hello blob").await.unwrap();

        let written = tokio::fs::read(dir.path().join(id.to_string())).await.unwrap();
        assert_eq!(written, b"hello blob");
    }

    #[tokio::test]
    async fn creates_missing_root_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("blobs");
        let store = BlobStoreKind::local_disk(&root);

        store.put(Uuid::new_v4(), b"x").await.unwrap();

        assert!(root.is_dir());
    }
}
