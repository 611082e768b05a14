//! Parser script execution against a live page.
//!
//! Untrusted site scripts run inside the page's JavaScript context, never
//! in the host process. The engine injects a fixed support bundle, splices
//! the parser script into a dispatch harness, and takes exactly one result
//! back through a host callback binding. In-page failures come back as
//! [`ScriptOutcome::Failed`]; transport failures and deadline expiry are
//! [`EngineError`]s. Either way the host never crashes or hangs past the
//! configured timeout.

pub mod protocol;
pub mod support;

pub use protocol::{ChapterRef, ScriptOutcome, Task};
pub use support::{SUPPORT_API_VERSION, SupportBundle, SupportError};

use std::time::Duration;

use tokio::sync::mpsc;

use crate::render::{PageSession, RenderError};

/// Binding the dispatch harness posts results through.
const RESULT_BINDING: &str = "__quireDeliver";

const DISPATCH_TEMPLATE: &str = include_str!("../../assets/harness/dispatch.js");
const DISCOVERY_TEMPLATE: &str = include_str!("../../assets/harness/discovery.js");

/// Errors crossing the host side of script execution.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Render(#[from] RenderError),

    /// No result arrived before the deadline.
    #[error("script execution timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The script threw during discovery.
    #[error("script failed: {0}")]
    Script(String),

    /// The result payload was not one of the known shapes.
    #[error("malformed script result: {0}")]
    MalformedResult(String),

    /// The delivery channel closed before a result arrived.
    #[error("result channel closed before a result arrived")]
    ResultChannel,
}

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wall-clock budget for one execution, including result delivery.
    pub script_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { script_timeout: Duration::from_secs(30) }
    }
}

/// Runs parser scripts inside page sessions.
#[derive(Debug, Clone)]
pub struct ScriptEngine {
    support: SupportBundle,
    config: EngineConfig,
}

impl ScriptEngine {
    pub fn new(support: SupportBundle) -> Self {
        Self { support, config: EngineConfig::default() }
    }

    pub fn with_config(support: SupportBundle, config: EngineConfig) -> Self {
        Self { support, config }
    }

    /// Execute `script` against the session's current page.
    ///
    /// The session must already be navigated to the target page. The
    /// first payload the harness posts decides the outcome; anything a
    /// misbehaving script posts after that is ignored.
    pub async fn execute(
        &self,
        session: &dyn PageSession,
        script: &str,
        task: Task,
    ) -> Result<ScriptOutcome, EngineError> {
        let (tx, mut rx) = mpsc::channel(4);
        session.expose_callback(RESULT_BINDING, tx).await?;
        self.inject_support(session).await?;

        let dispatch = render_dispatch(script, task);
        let budget = self.config.script_timeout;

        let payload = tokio::time::timeout(budget, async {
            session.evaluate(&dispatch).await?;
            rx.recv().await.ok_or(EngineError::ResultChannel)
        })
        .await
        .map_err(|_| EngineError::Timeout(budget))??;

        protocol::decode_payload(&payload)
    }

    /// Run `script` in discovery mode, collecting its declared domains.
    ///
    /// No handler is constructed and no page content is touched, so any
    /// throwaway context works; callers reset the session between scripts
    /// by navigating it to `about:blank`.
    pub async fn discover_domains(
        &self,
        session: &dyn PageSession,
        script: &str,
    ) -> Result<Vec<String>, EngineError> {
        self.inject_support(session).await?;

        let discovery = render_discovery(script);
        let budget = self.config.script_timeout;

        let value = tokio::time::timeout(budget, session.evaluate(&discovery))
            .await
            .map_err(|_| EngineError::Timeout(budget))??;

        let result: protocol::DiscoveryResult =
            serde_json::from_value(value).map_err(|e| EngineError::MalformedResult(e.to_string()))?;

        if let Some(error) = result.error {
            return Err(EngineError::Script(error));
        }
        Ok(result.domains)
    }

    async fn inject_support(&self, session: &dyn PageSession) -> Result<(), EngineError> {
        for script in self.support.scripts() {
            session.evaluate(&script.source).await?;
        }
        Ok(())
    }
}

/// Splice the parser script and task into the dispatch harness.
///
/// The script body is spliced last so harness placeholders occurring in
/// its text are never rewritten.
fn render_dispatch(script: &str, task: Task) -> String {
    DISPATCH_TEMPLATE
        .replace("__TASK__", task.wire_name())
        .replace("__DELIVER__", RESULT_BINDING)
        .replace("__PARSER_SCRIPT__", &encode_script(script))
}

/// Splice the parser script into the discovery harness.
fn render_discovery(script: &str) -> String {
    DISCOVERY_TEMPLATE.replace("__PARSER_SCRIPT__", &encode_script(script))
}

fn encode_script(script: &str) -> String {
    serde_json::Value::String(script.to_string()).to_string()
}
