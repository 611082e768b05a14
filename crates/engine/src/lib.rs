//! Extraction orchestration for quire.
//!
//! This crate ties the registry, the page renderer, and the script
//! engine together: the orchestrator runs listing and content phases for
//! a conversion job, and the refresher rebuilds the registry from a
//! corpus of site scripts. Packaging stays behind a trait.

pub mod corpus;
pub mod orchestrator;
pub mod package;
pub mod refresh;
pub mod warmth;

pub use corpus::{CorpusError, CorpusScript, ScriptCorpus};
pub use orchestrator::{
    ChapterListing, ContentReport, JobConfig, JobError, JobReport, Orchestrator, SkippedChapter,
};
pub use package::{ArtifactHandle, DocumentPackager, PackageError, Section};
pub use refresh::{
    LogObserver, RefreshError, RefreshObserver, RefreshOptions, RefreshProgress, RefreshSummary,
    RegistryRefresher,
};
pub use warmth::RegistryWarmth;
