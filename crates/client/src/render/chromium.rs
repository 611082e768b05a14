//! Headless Chrome/Chromium sessions using chromiumoxide.
//!
//! One launched browser backs any number of sessions; each session is a
//! tab. Host callbacks are implemented with CDP `Runtime.addBinding`,
//! whose `bindingCalled` events are forwarded into the sink registered
//! for that binding name.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EventBindingCalled};
use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc};

use super::{PageRenderer, PageSession, RenderError};

/// Headless browser shared by all sessions.
pub struct ChromiumRenderer {
    browser: Browser,
}

impl ChromiumRenderer {
    /// Launch a headless browser instance.
    ///
    /// A background task drains Chrome DevTools Protocol events for the
    /// life of the browser.
    pub async fn launch() -> Result<Self, RenderError> {
        let (browser, mut handler) = Browser::launch(
            BrowserConfig::builder()
                .build()
                .map_err(RenderError::BrowserLaunch)?,
        )
        .await
        .map_err(|e| RenderError::BrowserLaunch(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {e}");
                    break;
                }
            }
        });

        Ok(Self { browser })
    }
}

#[async_trait::async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn open_session(&self) -> Result<Box<dyn PageSession>, RenderError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Session(e.to_string()))?;

        Ok(Box::new(ChromiumSession {
            page,
            sinks: Arc::new(Mutex::new(HashMap::new())),
            forwarding: Mutex::new(false),
        }))
    }
}

struct ChromiumSession {
    page: Page,
    /// Binding name to sink; the forwarding task looks payloads up here.
    sinks: Arc<Mutex<HashMap<String, mpsc::Sender<String>>>>,
    forwarding: Mutex<bool>,
}

impl ChromiumSession {
    /// Start the task that forwards `bindingCalled` events into sinks.
    ///
    /// Runs once per session; ends when the page's event stream does.
    async fn ensure_forwarding(&self) -> Result<(), RenderError> {
        let mut started = self.forwarding.lock().await;
        if *started {
            return Ok(());
        }

        let mut events = self
            .page
            .event_listener::<EventBindingCalled>()
            .await
            .map_err(|e| RenderError::Binding(e.to_string()))?;

        let sinks = Arc::clone(&self.sinks);
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let sink = { sinks.lock().await.get(&event.name).cloned() };
                if let Some(sink) = sink
                    && sink.send(event.payload.clone()).await.is_err()
                {
                    // Receiver gone; the caller already took what it wanted.
                    tracing::trace!(binding = %event.name, "dropping payload for closed sink");
                }
            }
        });

        *started = true;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PageSession for ChromiumSession {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), RenderError> {
        let millis = timeout.as_millis() as u64;
        tokio::time::timeout(timeout, async {
            self.page
                .goto(url)
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;
            Ok::<(), RenderError>(())
        })
        .await
        .map_err(|_| RenderError::Timeout(millis))?
    }

    async fn content(&self) -> Result<String, RenderError> {
        self.page
            .content()
            .await
            .map_err(|e| RenderError::ContentRetrieval(e.to_string()))
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, RenderError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| RenderError::Evaluation(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn expose_callback(
        &self,
        name: &str,
        sink: mpsc::Sender<String>,
    ) -> Result<(), RenderError> {
        let newly_bound = {
            let mut sinks = self.sinks.lock().await;
            sinks.insert(name.to_string(), sink).is_none()
        };

        if newly_bound {
            self.page
                .execute(AddBindingParams::new(name))
                .await
                .map_err(|e| RenderError::Binding(e.to_string()))?;
        }

        self.ensure_forwarding().await
    }

    async fn close(&self) {
        if let Err(e) = self.page.clone().close().await {
            tracing::debug!("page close failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Chrome/Chromium installation"]
    async fn test_launch() {
        let renderer = ChromiumRenderer::launch().await;
        assert!(renderer.is_ok());
    }

    #[tokio::test]
    #[ignore = "requires Chrome/Chromium installation"]
    async fn test_binding_round_trip() {
        let renderer = ChromiumRenderer::launch().await.unwrap();
        let session = renderer.open_session().await.unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        session.expose_callback("deliver", tx).await.unwrap();
        session.navigate("about:blank", Duration::from_secs(10)).await.unwrap();
        session.evaluate("window.deliver(\"hello\")").await.unwrap();

        let payload = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(payload.as_deref(), Some("hello"));

        session.close().await;
    }

    #[tokio::test]
    #[ignore = "requires Chrome/Chromium installation"]
    async fn test_content_after_navigation() {
        let renderer = ChromiumRenderer::launch().await.unwrap();
        let session = renderer.open_session().await.unwrap();

        session
            .navigate("data:text/html,<title>t</title><p>body</p>", Duration::from_secs(10))
            .await
            .unwrap();
        let html = session.content().await.unwrap();
        assert!(html.contains("body"));

        session.close().await;
    }
}
