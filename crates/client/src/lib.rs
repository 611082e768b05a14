//! Page-facing functionality for quire.
//!
//! This crate provides the page rendering seam, the parser script
//! execution engine, and the heuristic fallback extractor used by the
//! orchestration layer.

pub mod heuristic;
pub mod render;
pub mod script;

pub use heuristic::{Chapter, guess_chapters, page_title};
pub use render::{PageRenderer, PageSession, RenderError};
pub use script::{
    ChapterRef, EngineConfig, EngineError, SUPPORT_API_VERSION, ScriptEngine, ScriptOutcome,
    SupportBundle, SupportError, Task,
};
