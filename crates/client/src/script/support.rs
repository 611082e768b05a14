//! Support scripts injected ahead of every parser script.
//!
//! Parser scripts are written against a small, versioned API surface
//! (the `parserFactory` registration hook plus utility routines). The
//! bundle is fixed for the process lifetime: either the snapshot
//! embedded at build time or a sideloaded directory, never a mix.

use std::path::Path;

/// API version the bundled support scripts implement.
pub const SUPPORT_API_VERSION: &str = "1";

const BUNDLED: &[(&str, &str)] =
    &[("bootstrap.js", include_str!("../../assets/support/bootstrap.js"))];

/// Errors loading a sideloaded support snapshot.
///
/// These are fatal to the whole job: execution without the support API
/// is not attempted.
#[derive(Debug, thiserror::Error)]
pub enum SupportError {
    #[error("support directory unreadable: {0}")]
    Unreadable(String),

    #[error("support directory contains no scripts: {0}")]
    Empty(String),
}

/// One support script, kept in injection order.
#[derive(Debug, Clone)]
pub struct SupportScript {
    pub name: String,
    pub source: String,
}

/// Ordered, immutable set of support scripts.
#[derive(Debug, Clone)]
pub struct SupportBundle {
    scripts: Vec<SupportScript>,
}

impl SupportBundle {
    /// The snapshot embedded at build time.
    pub fn bundled() -> Self {
        Self {
            scripts: BUNDLED
                .iter()
                .map(|(name, source)| SupportScript {
                    name: (*name).to_string(),
                    source: (*source).to_string(),
                })
                .collect(),
        }
    }

    /// Load a sideloaded snapshot from a directory of `.js` files.
    ///
    /// Scripts are ordered by filename. An unreadable or empty directory
    /// is an error.
    pub fn from_dir(dir: &Path) -> Result<Self, SupportError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| SupportError::Unreadable(format!("{}: {e}", dir.display())))?;

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "js"))
            .collect();
        paths.sort();

        let mut scripts = Vec::with_capacity(paths.len());
        for path in paths {
            let source = std::fs::read_to_string(&path)
                .map_err(|e| SupportError::Unreadable(format!("{}: {e}", path.display())))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            scripts.push(SupportScript { name, source });
        }

        if scripts.is_empty() {
            return Err(SupportError::Empty(dir.display().to_string()));
        }

        Ok(Self { scripts })
    }

    /// Scripts in injection order.
    pub fn scripts(&self) -> &[SupportScript] {
        &self.scripts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_defines_registration_hook() {
        let bundle = SupportBundle::bundled();
        assert!(!bundle.scripts().is_empty());
        assert!(bundle.scripts()[0].source.contains("parserFactory"));
    }

    #[test]
    fn test_from_dir_ordered_by_filename() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("20_second.js"), "// second").unwrap();
        std::fs::write(dir.path().join("10_first.js"), "// first").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let bundle = SupportBundle::from_dir(dir.path()).unwrap();
        let names: Vec<&str> = bundle.scripts().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["10_first.js", "20_second.js"]);
    }

    #[test]
    fn test_from_dir_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(SupportBundle::from_dir(&missing), Err(SupportError::Unreadable(_))));
    }

    #[test]
    fn test_from_dir_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "no scripts").unwrap();
        assert!(matches!(SupportBundle::from_dir(dir.path()), Err(SupportError::Empty(_))));
    }
}
