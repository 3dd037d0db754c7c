//! Staging directory for an upload

use super::{DatasetMetadata, PublishError};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const METADATA_FILE: &str = "dataset-metadata.json";

/// Resolve configured files against `root`, skipping missing ones
///
/// Returns `(configured path, resolved path)` pairs.
pub fn collect_files(root: &Path, files: &[String]) -> Vec<(String, PathBuf)> {
    let mut found = Vec::new();
    for file in files {
        let path = root.join(file);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {
                tracing::info!(
                    file = %file,
                    size_mb = %format!("{:.2}", meta.len() as f64 / (1024.0 * 1024.0)),
                    "Found file"
                );
                found.push((file.clone(), path));
            }
            _ => tracing::warn!(file = %file, "File not found, skipping"),
        }
    }
    found
}

/// Files copied into a temporary directory alongside their metadata
///
/// The directory is removed when this is dropped.
pub struct StagedUpload {
    dir: TempDir,
    metadata_path: PathBuf,
    files: Vec<String>,
}

impl StagedUpload {
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    /// Staged file names, metadata excluded
    pub fn files(&self) -> &[String] {
        &self.files
    }
}

/// Copy files and an optional image into a fresh directory and write the
/// metadata document next to them
pub fn stage(
    files: &[PathBuf],
    image: Option<&Path>,
    metadata: &mut DatasetMetadata,
) -> Result<StagedUpload, PublishError> {
    let dir = TempDir::new().map_err(|e| PublishError::io(&std::env::temp_dir(), e))?;
    let mut staged = Vec::with_capacity(files.len() + 1);

    for file in files {
        staged.push(copy_into(dir.path(), file)?);
    }

    if let Some(image) = image {
        let name = copy_into(dir.path(), image)?;
        metadata.add_image(&name);
        staged.push(name);
    }

    let metadata_path = dir.path().join(METADATA_FILE);
    let out = fs::File::create(&metadata_path).map_err(|e| PublishError::io(&metadata_path, e))?;
    let mut writer = BufWriter::new(out);
    serde_json::to_writer_pretty(&mut writer, metadata)?;
    writer.flush().map_err(|e| PublishError::io(&metadata_path, e))?;

    tracing::debug!(dir = ?dir.path(), files = staged.len(), "Staged upload");

    Ok(StagedUpload {
        dir,
        metadata_path,
        files: staged,
    })
}

fn copy_into(dir: &Path, src: &Path) -> Result<String, PublishError> {
    let name = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            PublishError::io(
                src,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })?;
    fs::copy(src, dir.join(&name)).map_err(|e| PublishError::io(src, e))?;
    Ok(name)
}
