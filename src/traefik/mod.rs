//! Traefik dynamic configuration: document model, synthesizer, patcher,
//! and the atomic file publisher they share.

pub mod labels;
pub mod model;
pub mod patch;
pub mod synth;

pub use model::DynamicConfig;

use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{Error, Result};

/// Read a previously published document.
pub fn load(path: &Path) -> Result<DynamicConfig> {
    let raw = fs::read_to_string(path).map_err(|e| Error::Publish {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_yaml::from_str(&raw).map_err(|e| Error::Publish {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })
}

/// Atomically publish the document: serialize, write a temporary sibling,
/// rename into place. A concurrent reader of `path` sees either the old
/// document or the new one, never a partial write.
pub fn publish(path: &Path, config: &DynamicConfig) -> Result<()> {
    let publish_err = |e: std::io::Error| Error::Publish {
        path: path.to_path_buf(),
        source: e,
    };

    let yaml = serde_yaml::to_string(config).map_err(|e| {
        publish_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = parent {
        fs::create_dir_all(dir).map_err(publish_err)?;
    }

    // Hidden sibling in the same directory: the rename stays on one
    // filesystem and a directory watcher never parses the half-written
    // file.
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dynamic_conf.yml".to_string());
    let tmp = match parent {
        Some(dir) => dir.join(format!(".{file_name}.tmp")),
        None => std::path::PathBuf::from(format!(".{file_name}.tmp")),
    };

    fs::write(&tmp, yaml.as_bytes()).map_err(publish_err)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        publish_err(e)
    })?;

    debug!("Published routing configuration to {}", path.display());
    Ok(())
}
