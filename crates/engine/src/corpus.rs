//! Parser script corpus loading.
//!
//! A refresh walks a directory of site scripts. Ids are the originating
//! filenames, which also key the registry and the export manifest.

use std::path::Path;

use thiserror::Error;

/// Corpus loading failures. Fatal to a refresh before it starts.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("corpus directory unreadable: {0}")]
    Unreadable(String),

    #[error("corpus directory contains no scripts: {0}")]
    Empty(String),
}

/// One site script, identified by its filename.
#[derive(Debug, Clone)]
pub struct CorpusScript {
    pub id: String,
    pub source: String,
}

/// Ordered set of site scripts to refresh from.
#[derive(Debug, Clone)]
pub struct ScriptCorpus {
    scripts: Vec<CorpusScript>,
}

impl ScriptCorpus {
    /// Load every `.js` file in `dir`, sorted by filename.
    pub fn from_dir(dir: &Path) -> Result<Self, CorpusError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CorpusError::Unreadable(format!("{}: {e}", dir.display())))?;

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "js"))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(CorpusError::Empty(dir.display().to_string()));
        }

        let mut scripts = Vec::with_capacity(paths.len());
        for path in paths {
            let source = std::fs::read_to_string(&path)
                .map_err(|e| CorpusError::Unreadable(format!("{}: {e}", path.display())))?;
            let id = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            scripts.push(CorpusScript { id, source });
        }

        Ok(Self { scripts })
    }

    /// Wrap already-loaded scripts, preserving their order.
    pub fn from_scripts(scripts: Vec<CorpusScript>) -> Self {
        Self { scripts }
    }

    pub fn scripts(&self) -> &[CorpusScript] {
        &self.scripts
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}
