//! Page rendering seam.
//!
//! Script execution needs a live rendered page it can navigate, read,
//! evaluate JavaScript in, and receive callbacks from. This module
//! defines that seam as traits; the feature-gated `chromium` module
//! provides the production implementation on top of chromiumoxide.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

#[cfg(feature = "render")]
pub mod chromium;

#[cfg(feature = "render")]
pub use chromium::ChromiumRenderer;

/// Errors that can occur while driving a page.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Failed to launch or connect to a browser.
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    /// Failed to open a new page session.
    #[error("session open failed: {0}")]
    Session(String),

    /// Failed to navigate to a URL.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Timeout waiting for a page to load.
    #[error("navigation timeout after {0}ms")]
    Timeout(u64),

    /// Failed to get page content.
    #[error("content retrieval failed: {0}")]
    ContentRetrieval(String),

    /// Script evaluation failed at the transport level.
    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    /// Failed to install a host callback binding.
    #[error("callback binding failed: {0}")]
    Binding(String),
}

/// Factory for page sessions.
///
/// Implementations are shared across concurrent extraction jobs; every
/// session is independent.
#[async_trait::async_trait]
pub trait PageRenderer: Send + Sync {
    /// Open a fresh page session on a blank page.
    async fn open_session(&self) -> Result<Box<dyn PageSession>, RenderError>;
}

/// One live page that scripts run against.
///
/// Sessions follow an acquire, work, close lifecycle; callers close them
/// on every path, error or not.
#[async_trait::async_trait]
pub trait PageSession: Send + Sync {
    /// Navigate to `url` and wait for the page to load, bounded by `timeout`.
    ///
    /// Navigation resets the page's JavaScript world; exposed callbacks
    /// survive it.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), RenderError>;

    /// Current rendered markup of the page.
    async fn content(&self) -> Result<String, RenderError>;

    /// Evaluate a script in the page, returning its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, RenderError>;

    /// Expose a host callback named `name` to the page.
    ///
    /// Page code calls `window.<name>(payload)` with a string; payloads
    /// are forwarded into `sink` in call order. Re-exposing a name
    /// replaces its sink.
    async fn expose_callback(
        &self,
        name: &str,
        sink: mpsc::Sender<String>,
    ) -> Result<(), RenderError>;

    /// Dispose of the session. Infallible; failures are logged.
    async fn close(&self);
}
