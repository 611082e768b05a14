//! Wire protocol between the host and the in-page dispatch harness.
//!
//! The harness posts exactly one JSON result per execution:
//!
//! - `{"type": "chapters", "title": ..., "chapters": [{"title", "url"}, ...]}`
//! - `{"type": "content", "html": ...}`
//! - `{"error": ..., "stack"?: ...}`
//!
//! Decoding is tolerant of missing fields but rejects shapes outside
//! these three.

use serde::{Deserialize, Serialize};

use super::EngineError;

/// What the engine asks a parser script to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Produce the ordered chapter listing for the current page.
    ListChapters,
    /// Produce the chapter body for the current page.
    GetContent,
}

impl Task {
    /// Tag understood by the dispatch harness.
    pub(crate) fn wire_name(self) -> &'static str {
        match self {
            Task::ListChapters => "list_chapters",
            Task::GetContent => "get_content",
        }
    }
}

/// One chapter reference as declared by a script.
///
/// URLs are kept as declared; the orchestration layer absolutizes them
/// against the page URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRef {
    pub title: String,
    pub url: String,
}

/// Decoded result of one script execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutcome {
    /// Chapter listing, with the work title when the script supplied one.
    Chapters { title: Option<String>, chapters: Vec<ChapterRef> },
    /// Rendered chapter body.
    Content { html: String },
    /// The script failed inside the page.
    Failed { message: String, stack: Option<String> },
}

#[derive(Debug, Deserialize)]
struct WireResult {
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    #[serde(default)]
    chapters: Vec<WireChapter>,
    html: Option<String>,
    error: Option<String>,
    stack: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChapter {
    title: Option<String>,
    url: Option<String>,
}

/// Shape evaluated by the discovery harness.
#[derive(Debug, Deserialize)]
pub(crate) struct DiscoveryResult {
    #[serde(default)]
    pub domains: Vec<String>,
    pub error: Option<String>,
}

/// Decode one payload posted through the delivery binding.
///
/// An `error` key wins over everything else. Chapter entries without a
/// URL are dropped; a missing title becomes empty.
pub(crate) fn decode_payload(payload: &str) -> Result<ScriptOutcome, EngineError> {
    let wire: WireResult =
        serde_json::from_str(payload).map_err(|e| EngineError::MalformedResult(e.to_string()))?;

    if let Some(message) = wire.error {
        return Ok(ScriptOutcome::Failed { message, stack: wire.stack });
    }

    match wire.kind.as_deref() {
        Some("chapters") => {
            let chapters = wire
                .chapters
                .into_iter()
                .filter_map(|c| {
                    c.url
                        .map(|url| ChapterRef { title: c.title.unwrap_or_default(), url })
                })
                .collect();
            Ok(ScriptOutcome::Chapters {
                title: wire.title.filter(|t| !t.trim().is_empty()),
                chapters,
            })
        }
        Some("content") => Ok(ScriptOutcome::Content { html: wire.html.unwrap_or_default() }),
        Some(other) => Err(EngineError::MalformedResult(format!("unknown result type: {other}"))),
        None => Err(EngineError::MalformedResult("result has neither type nor error".to_string())),
    }
}
