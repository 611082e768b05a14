//! Document packaging seam.
//!
//! Assembled chapters leave the engine as ordered sections; turning them
//! into an e-book or any other artifact belongs to the embedding
//! application.

use async_trait::async_trait;
use thiserror::Error;

/// One assembled chapter, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Chapter title, unescaped.
    pub title: String,
    /// Chapter markup, already wrapped with its heading.
    pub html: String,
}

/// Locator for a packaged document: a file path, object key, or URL,
/// depending on the packager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub location: String,
}

/// Packaging failure, opaque to the engine.
#[derive(Debug, Error)]
#[error("packaging failed: {0}")]
pub struct PackageError(pub String);

/// Builds a document artifact from ordered sections.
#[async_trait]
pub trait DocumentPackager: Send + Sync {
    async fn build(
        &self,
        title: &str,
        sections: &[Section],
    ) -> Result<ArtifactHandle, PackageError>;
}
