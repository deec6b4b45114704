//! Compose project view: the declarative service files.
//!
//! Only the `services:` key set is read here. The set is authoritative for
//! which services are eligible for routing; everything else in the files
//! belongs to `docker compose` itself.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// The compose files and env files named on the command line.
#[derive(Debug, Clone, Default)]
pub struct ComposeProject {
    pub files: Vec<PathBuf>,
    pub env_files: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ComposeFile {
    #[serde(default)]
    services: serde_yaml::Mapping,
}

impl ComposeProject {
    pub fn new(files: Vec<PathBuf>, env_files: Vec<PathBuf>) -> Self {
        Self { files, env_files }
    }

    /// The authoritative set of declared service names, merged across all
    /// compose files. An unreadable or unparseable file is fatal.
    pub fn service_names(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for path in &self.files {
            let raw = fs::read_to_string(path).map_err(|e| Error::Compose {
                path: path.clone(),
                message: e.to_string(),
            })?;
            let parsed: ComposeFile =
                serde_yaml::from_str(&raw).map_err(|e| Error::Compose {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            for key in parsed.services.keys() {
                if let Some(name) = key.as_str() {
                    names.insert(name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Compose derives the project name from the first file's stem when no
    /// explicit project is given; container project labels match it.
    pub fn project_name(&self) -> Option<String> {
        let first = self.files.first()?;
        file_stem(first)
    }

    /// Shared `-f`/`--env-file` argument vector for compose subcommands.
    pub fn compose_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for file in &self.files {
            args.push("-f".to_string());
            args.push(file.display().to_string());
        }
        for file in &self.env_files {
            args.push("--env-file".to_string());
            args.push(file.display().to_string());
        }
        args
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
}
