use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::canonical::canonicalize;
use crate::error::{Error, Result};

/// Canonical seed document plus the name it was loaded under.
///
/// The document is shared read-only between every task generating from it.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    path: PathBuf,
    document: Arc<Value>,
}

impl Template {
    /// Canonicalize `document` and wrap it as a template.
    pub fn new(name: impl Into<String>, mut document: Value) -> Self {
        canonicalize(&mut document);
        Self {
            name: name.into(),
            path: PathBuf::new(),
            document: Arc::new(document),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File the template was read from; empty for in-memory templates.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without its extension, used to name generated outputs.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.name)
    }

    pub fn document(&self) -> &Value {
        &self.document
    }
}

/// Load every `*.json` file under `dir` as a canonical template.
///
/// Discovery order is the sorted path order. A file that is not valid JSON
/// aborts the load, as do two files sharing a file stem (compared
/// case-insensitively).
pub fn load_templates(dir: &Path) -> Result<Vec<Template>> {
    let files = discover_files(dir, "json")?;
    let mut seen: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut templates = Vec::with_capacity(files.len());

    for path in files {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidTemplates(format!("no file name: {}", path.display())))?;

        // Variants are written as `<stem>_<index>.json`, so stems must not collide,
        // including on case-insensitive filesystems.
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| name.to_lowercase());
        if let Some(previous) = seen.insert(stem.clone(), path.clone()) {
            return Err(Error::InvalidTemplates(format!(
                "duplicate template name '{stem}': {} and {}",
                previous.display(),
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        let document: Value = serde_json::from_str(&contents).map_err(|source| Error::Parse {
            path: path.clone(),
            source,
        })?;

        debug!(template = %name, path = %path.display(), "template loaded");
        let mut template = Template::new(name, document);
        template.path = path;
        templates.push(template);
    }

    Ok(templates)
}

/// Recursively list files under `dir` with the given extension, sorted.
pub fn discover_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current).map_err(|source| Error::Io {
            path: current.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| Error::Io {
                path: current.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
            {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
