//! Batch registry refresh from a script corpus.
//!
//! An offline maintenance path: every corpus script runs in discovery
//! mode against a throwaway page context, and the domains it declares
//! become its registry record. Scripts that throw or declare nothing are
//! counted and skipped. Batches commit as they finish, so an interrupted
//! run keeps what was already committed; a restart begins at the first
//! batch again.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use quire_client::{PageRenderer, PageSession, RenderError, ScriptEngine};
use quire_core::{ParserRecord, RegistryDb};

use crate::corpus::{CorpusScript, ScriptCorpus};
use crate::warmth::RegistryWarmth;

/// Deadline for resetting a session context between scripts.
const CONTEXT_RESET_TIMEOUT: Duration = Duration::from_secs(15);

/// Failures that abort a refresh.
///
/// Per-script failures never abort a run; they are counted and skipped.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// A batch session could not be opened.
    #[error("browser session unavailable")]
    Session(#[source] RenderError),

    /// A batch commit failed. Earlier batches stay committed.
    #[error(transparent)]
    Registry(#[from] quire_core::Error),
}

/// Refresh tuning knobs.
#[derive(Debug, Clone)]
pub struct RefreshOptions {
    /// Scripts per batch; one render session and one commit per batch.
    pub batch_size: usize,
    /// Cap on how many corpus scripts to scan, for smoke runs.
    pub limit: Option<usize>,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self { batch_size: 50, limit: None }
    }
}

/// Progress after one committed batch. Counts are cumulative.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshProgress {
    pub batch: usize,
    pub batches: usize,
    pub scanned: usize,
    pub total: usize,
    pub committed: usize,
    pub failed: usize,
}

/// Receives progress after every committed batch, so a long refresh
/// stays observably live.
pub trait RefreshObserver: Send + Sync {
    fn batch_finished(&self, progress: &RefreshProgress);
}

/// Observer that reports progress through the log.
#[derive(Debug, Default)]
pub struct LogObserver;

impl RefreshObserver for LogObserver {
    fn batch_finished(&self, progress: &RefreshProgress) {
        tracing::info!(
            batch = progress.batch,
            batches = progress.batches,
            scanned = progress.scanned,
            total = progress.total,
            committed = progress.committed,
            failed = progress.failed,
            "refresh batch committed"
        );
    }
}

/// Final accounting of one refresh run.
///
/// `committed` counts scripts that declared at least one usable domain;
/// re-running an unchanged corpus reports the same counts while leaving
/// identical records untouched in place.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub scanned: usize,
    pub committed: usize,
    pub failed: usize,
    pub batches: usize,
}

/// Rebuilds the shared registry from a corpus of site scripts.
pub struct RegistryRefresher {
    db: RegistryDb,
    renderer: Arc<dyn PageRenderer>,
    engine: ScriptEngine,
    warmth: Arc<RegistryWarmth>,
    options: RefreshOptions,
}

impl RegistryRefresher {
    pub fn new(
        db: RegistryDb,
        renderer: Arc<dyn PageRenderer>,
        engine: ScriptEngine,
        warmth: Arc<RegistryWarmth>,
    ) -> Self {
        Self::with_options(db, renderer, engine, warmth, RefreshOptions::default())
    }

    pub fn with_options(
        db: RegistryDb,
        renderer: Arc<dyn PageRenderer>,
        engine: ScriptEngine,
        warmth: Arc<RegistryWarmth>,
        options: RefreshOptions,
    ) -> Self {
        Self { db, renderer, engine, warmth, options }
    }

    /// Scan the corpus in batches and merge discovered records.
    ///
    /// Each batch shares one render session, released at the batch
    /// boundary before the commit. The observer is notified after every
    /// batch, including ones that committed nothing.
    pub async fn refresh(
        &self,
        corpus: &ScriptCorpus,
        observer: &dyn RefreshObserver,
    ) -> Result<RefreshSummary, RefreshError> {
        let scripts = match self.options.limit {
            Some(limit) => &corpus.scripts()[..limit.min(corpus.len())],
            None => corpus.scripts(),
        };
        let total = scripts.len();
        let batch_size = self.options.batch_size.max(1);
        let batches = total.div_ceil(batch_size);

        tracing::info!(total, batches, "registry refresh starting");

        let mut scanned = 0usize;
        let mut committed = 0usize;
        let mut failed = 0usize;

        for (index, chunk) in scripts.chunks(batch_size).enumerate() {
            let session = self.renderer.open_session().await.map_err(RefreshError::Session)?;

            let mut records = Vec::new();
            for script in chunk {
                scanned += 1;
                match self.discover(session.as_ref(), script).await {
                    Some(record) => records.push(record),
                    None => failed += 1,
                }
            }

            session.close().await;

            self.db.upsert_parsers(&records).await?;
            committed += records.len();

            observer.batch_finished(&RefreshProgress {
                batch: index + 1,
                batches,
                scanned,
                total,
                committed,
                failed,
            });
        }

        if committed > 0 {
            self.warmth.mark_warm();
        }

        tracing::info!(scanned, committed, failed, "registry refresh finished");
        Ok(RefreshSummary { scanned, committed, failed, batches })
    }

    /// Run one script in discovery mode, returning its record when it
    /// declares at least one usable domain.
    async fn discover(
        &self,
        session: &dyn PageSession,
        script: &CorpusScript,
    ) -> Option<ParserRecord> {
        if let Err(e) = session.navigate("about:blank", CONTEXT_RESET_TIMEOUT).await {
            tracing::warn!(script = %script.id, "context reset failed: {e}");
            return None;
        }

        match self.engine.discover_domains(session, &script.source).await {
            Ok(domains) if !domains.is_empty() => {
                let record = ParserRecord::new(script.id.clone(), domains, script.source.clone());
                if record.domains.is_empty() {
                    tracing::warn!(script = %script.id, "declared domains were all unusable");
                    return None;
                }
                tracing::debug!(script = %script.id, domains = record.domains.len(), "domains discovered");
                Some(record)
            }
            Ok(_) => {
                tracing::debug!(script = %script.id, "script declared no domains");
                None
            }
            Err(e) => {
                tracing::warn!(script = %script.id, "discovery failed: {e}");
                None
            }
        }
    }
}
