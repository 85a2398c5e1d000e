//! Document Loading
//!
//! Reads parsed module documents from a directory (or a string), hashes the
//! inputs for reproducibility reporting, and lowers them into a
//! [`SchemaModel`].

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{ResolveError, Result};
use crate::model::{Document, SchemaModel};

/// Configuration for document loading
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// File extension of module documents
    pub extension: String,
    /// Skip files matching these relative path prefixes
    pub skip_prefixes: Vec<String>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            extension: "json".to_string(),
            skip_prefixes: vec!["target/".to_string(), ".git/".to_string()],
        }
    }
}

/// Result of loading a directory
#[derive(Debug)]
pub struct LoadedBundle {
    pub model: SchemaModel,
    /// SHA-256 over every loaded file, in load order
    pub bundle_hash: String,
    /// Loaded files, relative to the input directory
    pub files: Vec<PathBuf>,
}

/// Parse a single document
pub fn load_from_str(content: &str, source_name: &str) -> Result<Document> {
    serde_json::from_str(content).map_err(|e| ResolveError::InvalidDocument {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}

/// Load every matching document below `dir`.
///
/// Files are visited in file-name order so the hash and the module
/// registration order are stable across runs.
pub fn load_from_directory(dir: &Path, config: &LoadConfig) -> Result<LoadedBundle> {
    let mut hasher = Sha256::new();
    let mut documents = Vec::new();
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path
            .extension()
            .map(|ext| ext != config.extension.as_str())
            .unwrap_or(true)
        {
            continue;
        }

        let relative_path = path.strip_prefix(dir).unwrap_or(path).to_path_buf();
        let relative_str = relative_path.to_string_lossy();
        if config
            .skip_prefixes
            .iter()
            .any(|p| relative_str.starts_with(p.as_str()))
        {
            debug!(file = %relative_str, "Skipping file");
            continue;
        }

        let content = fs::read_to_string(path)?;
        hasher.update(content.as_bytes());

        let document = load_from_str(&content, &relative_str)?;
        debug!(file = %relative_str, unit = %document.name(), "Loaded document");
        documents.push(document);
        files.push(relative_path);
    }

    let bundle_hash = format!("{:x}", hasher.finalize());
    let model = SchemaModel::from_documents(documents)?;

    info!(
        dir = %dir.display(),
        files = files.len(),
        modules = model.module_count(),
        bundle_hash = %bundle_hash,
        "Loaded module documents"
    );

    Ok(LoadedBundle {
        model,
        bundle_hash,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_from_str_reports_source() {
        let err = load_from_str("{\"module\": 1}", "broken.json").unwrap_err();
        assert!(matches!(
            err,
            ResolveError::InvalidDocument { ref source_name, .. } if source_name == "broken.json"
        ));
    }

    #[test]
    fn test_directory_walk_filters_and_hashes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.json", r#"{"module": "a", "prefix": "a", "namespace": "urn:a"}"#);
        write(
            dir.path(),
            "nested/a-sub.json",
            r#"{"submodule": "a-sub", "belongs_to": "a"}"#,
        );
        write(
            dir.path(),
            "drafts/b.json",
            r#"{"module": "b", "prefix": "b", "namespace": "urn:b"}"#,
        );
        write(dir.path(), "notes.txt", "not a document");

        let config = LoadConfig {
            skip_prefixes: vec!["drafts/".to_string()],
            ..LoadConfig::default()
        };
        let bundle = load_from_directory(dir.path(), &config).unwrap();

        assert_eq!(bundle.files.len(), 2);
        assert_eq!(bundle.model.module_count(), 1);
        assert_eq!(bundle.bundle_hash.len(), 64);

        let a = bundle.model.module_by_name("a").unwrap();
        assert_eq!(bundle.model.module(a).submodules.len(), 2);

        // same inputs, same hash
        let again = load_from_directory(dir.path(), &config).unwrap();
        assert_eq!(again.bundle_hash, bundle.bundle_hash);
    }

    #[test]
    fn test_invalid_file_aborts() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bad.json", "{ not json");
        let err = load_from_directory(dir.path(), &LoadConfig::default()).unwrap_err();
        assert!(err.is_fatal());
    }
}
