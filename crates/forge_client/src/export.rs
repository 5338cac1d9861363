//! "Download": writes a finished component and its sandbox files to disk.

use std::io;
use std::path::{Path, PathBuf};

use component_forge::PreviewAdapter;
use thiserror::Error;

pub const DOWNLOAD_FILE_NAME: &str = "GeneratedComponent.tsx";
pub const RENDER_PAYLOAD_FILE_NAME: &str = "render.json";
/// Subdirectory holding the virtual file set, one file per path key.
pub const SANDBOX_DIR: &str = "sandbox";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to encode render payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Writes `component` as [`DOWNLOAD_FILE_NAME`], the preview's virtual files
/// under [`SANDBOX_DIR`] and its render payload as
/// [`RENDER_PAYLOAD_FILE_NAME`]. Returns the written paths in that order.
pub async fn export(
    dir: &Path,
    component: &str,
    preview: &PreviewAdapter,
) -> Result<Vec<PathBuf>, ExportError> {
    let mut written = Vec::new();

    let component_path = dir.join(DOWNLOAD_FILE_NAME);
    write(&component_path, component.as_bytes()).await?;
    written.push(component_path);

    let sandbox = dir.join(SANDBOX_DIR);
    for (key, file) in preview.files().iter() {
        let path = sandbox.join(key.trim_start_matches('/'));
        write(&path, file.code.as_bytes()).await?;
        written.push(path);
    }

    let payload = serde_json::to_vec_pretty(&preview.render_payload())?;
    let payload_path = dir.join(RENDER_PAYLOAD_FILE_NAME);
    write(&payload_path, &payload).await?;
    written.push(payload_path);

    tracing::debug!(files = written.len(), dir = %dir.display(), "exported component");
    Ok(written)
}

async fn write(path: &Path, contents: &[u8]) -> Result<(), ExportError> {
    let io_error = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    tokio::fs::write(path, contents).await.map_err(io_error)
}
