//! End-to-end extraction jobs.
//!
//! A job runs in two phases against the same registry: a listing phase
//! that turns the starting page into an ordered chapter list, and a
//! content phase that fetches every selected chapter and hands the
//! assembled sections to a packager. Parser scripts are preferred and the
//! heuristic scan is the fallback; a job degrades instead of failing when
//! a script misbehaves. Only whole-job preconditions (a bad URL, an
//! unreachable starting page, packaging) surface as errors.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use url::Url;

use quire_client::{
    Chapter, ChapterRef, PageRenderer, PageSession, RenderError, ScriptEngine, ScriptOutcome,
    Task, guess_chapters, page_title,
};
use quire_core::{DomainResolver, RegistryDb};

use crate::package::{ArtifactHandle, DocumentPackager, PackageError, Section};
use crate::warmth::RegistryWarmth;

/// Title used when neither the parser script nor the page supplies one.
const UNTITLED: &str = "Untitled";

/// Failures that abort a whole job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The starting URL could not be parsed at all.
    #[error("invalid page url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A page session could not be opened.
    #[error("browser session unavailable")]
    Session(#[source] RenderError),

    /// The starting page could not be loaded.
    #[error("failed to load {url}")]
    Navigation {
        url: String,
        #[source]
        source: RenderError,
    },

    /// The listing phase produced nothing, not even a synthetic chapter.
    #[error("no chapters found at {0}")]
    NoChapters(String),

    /// Every selected chapter was skipped during the content phase.
    #[error("no chapter content could be fetched for {0}")]
    NoContent(String),

    #[error(transparent)]
    Registry(#[from] quire_core::Error),

    #[error(transparent)]
    Package(#[from] PackageError),
}

/// Orchestration tuning knobs.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Upper bound for one page navigation, listing page or chapter.
    pub navigation_timeout: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self { navigation_timeout: Duration::from_secs(60) }
    }
}

/// Result of the listing phase.
#[derive(Debug, Clone)]
pub struct ChapterListing {
    /// Work title: from the parser script, the page, or [`UNTITLED`].
    pub title: String,
    /// Ordered chapters; every one starts selected.
    pub chapters: Vec<Chapter>,
    /// Label of the parser that produced the listing, `None` when the
    /// heuristic scan did.
    pub parser_used: Option<String>,
}

/// A chapter dropped during the content phase, with the reason kept so
/// callers can report it instead of silently losing data.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedChapter {
    pub title: String,
    pub url: String,
    pub reason: String,
}

/// Result of the content phase: assembled sections in selection order,
/// plus every chapter that had to be dropped.
#[derive(Debug, Clone)]
pub struct ContentReport {
    pub sections: Vec<Section>,
    pub skipped: Vec<SkippedChapter>,
}

/// Summary of a finished conversion job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub title: String,
    pub artifact: ArtifactHandle,
    pub parser_used: Option<String>,
    pub listed: usize,
    pub packaged: usize,
    pub skipped: Vec<SkippedChapter>,
}

/// Drives one conversion job end to end.
///
/// Phases share nothing but the registry; each opens its own page
/// sessions and closes them on every path, error or not. Independent
/// jobs can run concurrently over the same renderer.
pub struct Orchestrator {
    db: RegistryDb,
    resolver: DomainResolver,
    renderer: Arc<dyn PageRenderer>,
    engine: ScriptEngine,
    packager: Arc<dyn DocumentPackager>,
    warmth: Arc<RegistryWarmth>,
    config: JobConfig,
}

impl Orchestrator {
    pub fn new(
        db: RegistryDb,
        renderer: Arc<dyn PageRenderer>,
        engine: ScriptEngine,
        packager: Arc<dyn DocumentPackager>,
        warmth: Arc<RegistryWarmth>,
    ) -> Self {
        Self::with_config(db, renderer, engine, packager, warmth, JobConfig::default())
    }

    pub fn with_config(
        db: RegistryDb,
        renderer: Arc<dyn PageRenderer>,
        engine: ScriptEngine,
        packager: Arc<dyn DocumentPackager>,
        warmth: Arc<RegistryWarmth>,
        config: JobConfig,
    ) -> Self {
        let resolver = DomainResolver::new(db.clone());
        Self { db, resolver, renderer, engine, packager, warmth, config }
    }

    /// Run a full conversion job: listing, content for every chapter,
    /// packaging.
    pub async fn convert(&self, owner_id: Option<i64>, url: &str) -> Result<JobReport, JobError> {
        let listing = self.list_chapters(owner_id, url).await?;
        let listed = listing.chapters.len();
        tracing::info!(
            title = %listing.title,
            chapters = listed,
            parser = listing.parser_used.as_deref().unwrap_or("heuristic"),
            "chapter listing complete"
        );

        let report = self.fetch_content(owner_id, &listing.chapters).await;
        if report.sections.is_empty() {
            return Err(JobError::NoContent(url.to_string()));
        }

        let artifact = self.packager.build(&listing.title, &report.sections).await?;
        tracing::info!(
            location = %artifact.location,
            packaged = report.sections.len(),
            skipped = report.skipped.len(),
            "document packaged"
        );

        Ok(JobReport {
            title: listing.title,
            artifact,
            parser_used: listing.parser_used,
            listed,
            packaged: report.sections.len(),
            skipped: report.skipped,
        })
    }

    /// Listing phase: turn the starting page into an ordered chapter list.
    ///
    /// A resolved parser script runs first; its listing is accepted only
    /// when it yields at least one chapter with a resolvable URL. Any
    /// other outcome falls back to the heuristic scan over the rendered
    /// markup, which always produces at least a synthetic chapter.
    pub async fn list_chapters(
        &self,
        owner_id: Option<i64>,
        url: &str,
    ) -> Result<ChapterListing, JobError> {
        let page_url = Url::parse(url)
            .map_err(|e| JobError::InvalidUrl { url: url.to_string(), reason: e.to_string() })?;

        self.check_registry_warmth().await;

        let session = self.renderer.open_session().await.map_err(JobError::Session)?;
        let listing = self.listing_phase(session.as_ref(), owner_id, &page_url).await;
        session.close().await;
        listing
    }

    async fn listing_phase(
        &self,
        session: &dyn PageSession,
        owner_id: Option<i64>,
        page_url: &Url,
    ) -> Result<ChapterListing, JobError> {
        session
            .navigate(page_url.as_str(), self.config.navigation_timeout)
            .await
            .map_err(|e| JobError::Navigation { url: page_url.to_string(), source: e })?;

        let resolved = self.resolver.resolve_for_user(owner_id, page_url.as_str()).await?;

        if let Some(parser) = resolved {
            let label = parser.label();
            match self.engine.execute(session, parser.script(), Task::ListChapters).await {
                Ok(ScriptOutcome::Chapters { title, chapters }) => {
                    let chapters = absolutize(chapters, page_url);
                    if chapters.is_empty() {
                        tracing::warn!(parser = %label, "script listed no usable chapters, falling back");
                    } else {
                        let title = match title {
                            Some(title) => title,
                            None => self.title_of(session).await,
                        };
                        return Ok(ChapterListing { title, chapters, parser_used: Some(label) });
                    }
                }
                Ok(ScriptOutcome::Content { .. }) => {
                    tracing::warn!(parser = %label, "script returned content for a listing task, falling back");
                }
                Ok(ScriptOutcome::Failed { message, stack }) => {
                    tracing::warn!(
                        parser = %label,
                        stack = stack.as_deref().unwrap_or(""),
                        "script failed while listing: {message}, falling back"
                    );
                }
                Err(e) => {
                    tracing::warn!(parser = %label, "listing execution failed: {e}, falling back");
                }
            }
        }

        self.heuristic_listing(session, page_url).await
    }

    async fn heuristic_listing(
        &self,
        session: &dyn PageSession,
        page_url: &Url,
    ) -> Result<ChapterListing, JobError> {
        let html = session
            .content()
            .await
            .map_err(|e| JobError::Navigation { url: page_url.to_string(), source: e })?;

        let chapters = guess_chapters(&html, page_url);
        if chapters.is_empty() {
            return Err(JobError::NoChapters(page_url.to_string()));
        }

        let title = page_title(&html).unwrap_or_else(|| UNTITLED.to_string());
        Ok(ChapterListing { title, chapters, parser_used: None })
    }

    /// Content phase: fetch every selected chapter sequentially.
    ///
    /// Each chapter gets its own session and its own resolution, since
    /// chapters may live on a different domain than the listing page. A
    /// chapter that cannot be loaded becomes a skip entry; the job keeps
    /// going. Bodies are wrapped with an escaped `<h1>` heading.
    pub async fn fetch_content(
        &self,
        owner_id: Option<i64>,
        chapters: &[Chapter],
    ) -> ContentReport {
        let selected: Vec<&Chapter> = chapters.iter().filter(|c| c.selected).collect();
        let total = selected.len();

        let mut sections = Vec::new();
        let mut skipped = Vec::new();

        for (index, chapter) in selected.into_iter().enumerate() {
            tracing::debug!(chapter = %chapter.title, "fetching chapter {}/{total}", index + 1);
            match self.chapter_body(owner_id, chapter).await {
                Ok(body) => sections.push(Section {
                    title: chapter.title.clone(),
                    html: compose_section(&chapter.title, &body),
                }),
                Err(reason) => {
                    tracing::warn!(chapter = %chapter.title, url = %chapter.url, "skipping chapter: {reason}");
                    skipped.push(SkippedChapter {
                        title: chapter.title.clone(),
                        url: chapter.url.to_string(),
                        reason,
                    });
                }
            }
        }

        ContentReport { sections, skipped }
    }

    async fn chapter_body(
        &self,
        owner_id: Option<i64>,
        chapter: &Chapter,
    ) -> Result<String, String> {
        let session = match self.renderer.open_session().await {
            Ok(session) => session,
            Err(e) => return Err(format!("session open failed: {e}")),
        };
        let body = self.chapter_body_in(session.as_ref(), owner_id, chapter).await;
        session.close().await;
        body
    }

    async fn chapter_body_in(
        &self,
        session: &dyn PageSession,
        owner_id: Option<i64>,
        chapter: &Chapter,
    ) -> Result<String, String> {
        session
            .navigate(chapter.url.as_str(), self.config.navigation_timeout)
            .await
            .map_err(|e| e.to_string())?;

        let resolved = match self.resolver.resolve_for_user(owner_id, chapter.url.as_str()).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(url = %chapter.url, "registry lookup failed during content fetch: {e}");
                None
            }
        };

        if let Some(parser) = resolved {
            let label = parser.label();
            match self.engine.execute(session, parser.script(), Task::GetContent).await {
                Ok(ScriptOutcome::Content { html }) if !html.trim().is_empty() => return Ok(html),
                Ok(ScriptOutcome::Content { .. }) => {
                    tracing::debug!(parser = %label, "script returned empty content, using page markup");
                }
                Ok(ScriptOutcome::Chapters { .. }) => {
                    tracing::debug!(parser = %label, "script returned a listing for a content task, using page markup");
                }
                Ok(ScriptOutcome::Failed { message, .. }) => {
                    tracing::debug!(parser = %label, "script failed on chapter: {message}, using page markup");
                }
                Err(e) => {
                    tracing::debug!(parser = %label, "content execution failed: {e}, using page markup");
                }
            }
        }

        session.content().await.map_err(|e| e.to_string())
    }

    async fn title_of(&self, session: &dyn PageSession) -> String {
        match session.content().await {
            Ok(html) => page_title(&html).unwrap_or_else(|| UNTITLED.to_string()),
            Err(e) => {
                tracing::debug!("could not read the page for a title: {e}");
                UNTITLED.to_string()
            }
        }
    }

    /// Warm the registry flag once, or warn that the store is empty and
    /// the job will run in fallback-only mode.
    async fn check_registry_warmth(&self) {
        if self.warmth.is_warm() {
            return;
        }
        match self.db.parser_count().await {
            Ok(0) => tracing::warn!(
                "parser registry is empty, jobs will rely on the heuristic fallback"
            ),
            Ok(_) => self.warmth.mark_warm(),
            Err(e) => tracing::warn!("could not check the parser registry: {e}"),
        }
    }
}

/// Resolve script-declared chapter URLs against the page URL, dropping
/// entries that cannot be resolved.
fn absolutize(refs: Vec<ChapterRef>, base: &Url) -> Vec<Chapter> {
    refs.into_iter()
        .filter_map(|r| match base.join(&r.url) {
            Ok(url) => Some(Chapter { title: r.title, url, selected: true }),
            Err(e) => {
                tracing::warn!(url = %r.url, "dropping chapter with unresolvable url: {e}");
                None
            }
        })
        .collect()
}

/// Wrap a chapter body with its heading.
fn compose_section(title: &str, body: &str) -> String {
    format!("<h1>{}</h1>{body}", escape_text(title))
}

/// Minimal text escaping for headings built from untrusted titles.
fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
