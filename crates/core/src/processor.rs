//! Bounded-parallel processing of many tools.
//!
//! Every tool runs as its own task in a [`JoinSet`]. A [`Semaphore`] caps
//! how many make progress at once. Each task sends exactly one
//! [`ToolResult`] over an `mpsc` channel; the collector drains it in
//! arrival order, logs the outcome and writes the cache.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::cache::{CacheBackend, CacheItem};
use crate::download::{self, NoProgress, ProgressReporter};
use crate::install::{InstallData, InstallOutcome};
use crate::shell::{self, Script};
use crate::sources::SourceProvider;
use crate::tool::{Resolver, Tool};
use crate::version;
use crate::{Error, Result};

/// Outcome class of one tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Skipped,
    Failed,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ok => "ok",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        })
    }
}

/// What happened to one tool.
#[derive(Debug)]
pub struct ToolResult {
    pub name: String,
    pub status: Status,
    /// Reason for a skip or failure, or command output on success.
    pub message: String,
    /// The installed executable, when one exists.
    pub found: Option<PathBuf>,
    /// Record to persist, if the outcome warrants one.
    pub cache_item: Option<CacheItem>,
    /// The resolved tool as it stood when processing stopped.
    pub tool: Tool,
}

impl ToolResult {
    fn failed(tool: Tool, error: &Error) -> Self {
        Self {
            name: tool.name.clone(),
            status: Status::Failed,
            message: error.to_string(),
            found: None,
            cache_item: None,
            tool,
        }
    }
}

/// Aggregated results of a run, in arrival order.
#[derive(Debug, Default)]
pub struct ProcessReport {
    pub results: Vec<ToolResult>,
}

impl ProcessReport {
    fn count(&self, status: Status) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    #[must_use]
    pub fn ok(&self) -> usize {
        self.count(Status::Ok)
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(Status::Skipped)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(Status::Failed)
    }

    /// [`Error::ToolsFailed`] when any tool failed.
    pub fn into_result(self) -> Result<Self> {
        let names: Vec<String> = self
            .results
            .iter()
            .filter(|r| r.status == Status::Failed)
            .map(|r| r.name.clone())
            .collect();
        if names.is_empty() {
            Ok(self)
        } else {
            Err(Error::ToolsFailed {
                count: names.len(),
                names,
            })
        }
    }
}

/// Run settings.
#[derive(Clone)]
pub struct ProcessorOptions {
    /// Maximum concurrent tools; 0 means unbounded.
    pub parallel: usize,
    /// Skip every cache write.
    pub no_cache: bool,
    /// Deadline for each download.
    pub timeout: Duration,
    pub progress: Arc<dyn ProgressReporter>,
    pub cancel: CancellationToken,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            parallel: 0,
            no_cache: false,
            timeout: download::DEFAULT_TIMEOUT,
            progress: Arc::new(NoProgress),
            cancel: CancellationToken::new(),
        }
    }
}

impl std::fmt::Debug for ProcessorOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorOptions")
            .field("parallel", &self.parallel)
            .field("no_cache", &self.no_cache)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Runs the resolution pipeline and installation over many tools.
#[derive(Debug, Clone)]
pub struct Processor {
    resolver: Resolver,
    cache: Option<Arc<dyn CacheBackend>>,
    options: ProcessorOptions,
}

impl Processor {
    #[must_use]
    pub fn new(resolver: Resolver, options: ProcessorOptions) -> Self {
        Self {
            resolver,
            cache: None,
            options,
        }
    }

    /// Persist results to `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Process every tool and fail with [`Error::ToolsFailed`] if any failed.
    pub async fn run(&self, tools: Vec<Tool>) -> Result<ProcessReport> {
        self.collect(tools).await.into_result()
    }

    /// Process every tool and return all results.
    pub async fn collect(&self, tools: Vec<Tool>) -> ProcessReport {
        let total = tools.len();
        info!(tools = total, parallel = self.options.parallel, "Processing tools");

        let (tx, mut rx) = mpsc::channel::<ToolResult>(total.max(1));
        let permits = (self.options.parallel > 0)
            .then(|| Arc::new(Semaphore::new(self.options.parallel)));

        let mut workers = JoinSet::new();
        for tool in tools {
            let tx = tx.clone();
            let permits = permits.clone();
            let this = self.clone();
            let span = info_span!("tool", name = %tool.name);

            workers.spawn(
                async move {
                    let _permit = match permits {
                        Some(sem) => match sem.acquire_owned().await {
                            Ok(permit) => Some(permit),
                            Err(e) => {
                                let _ = tx
                                    .send(ToolResult::failed(tool, &Error::install(e.to_string())))
                                    .await;
                                return;
                            }
                        },
                        None => None,
                    };

                    let cancel = this.options.cancel.clone();
                    let name = tool.name.clone();
                    let result = tokio::select! {
                        biased;
                        () = cancel.cancelled() => ToolResult::failed(Tool::named(name), &Error::Cancelled),
                        result = this.process(tool) => result,
                    };
                    let _ = tx.send(result).await;
                }
                .instrument(span),
            );
        }
        drop(tx);

        let mut report = ProcessReport::default();
        while let Some(result) = rx.recv().await {
            self.record(&result);
            report.results.push(result);
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Worker task panicked");
            }
        }

        info!(
            ok = report.ok(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Processing complete"
        );
        report
    }

    /// Log the outcome and persist its cache record.
    fn record(&self, result: &ToolResult) {
        match result.status {
            Status::Ok => info!(tool = %result.name, path = ?result.found, "Installed"),
            Status::Skipped => warn!(tool = %result.name, reason = %result.message, "Skipped"),
            Status::Failed => error!(tool = %result.name, error = %result.message, "Failed"),
        }

        if self.options.no_cache {
            return;
        }
        if let (Some(cache), Some(item)) = (&self.cache, &result.cache_item)
            && let Err(e) = cache.save(item.clone())
        {
            warn!(tool = %result.name, error = %e, "Failed to write cache entry");
        }
    }

    /// Resolve, install and run the commands of one tool.
    async fn process(&self, mut tool: Tool) -> ToolResult {
        if let Err(e) = self.resolver.resolve(&mut tool).await {
            return self.resolve_failure(tool, e).await;
        }

        let provider = match self.resolver.provider_for(&tool) {
            Ok(provider) => provider,
            Err(e) => return ToolResult::failed(tool, &e),
        };

        match self.install(&tool, provider.as_ref()).await {
            Ok(outcome) => {
                let cache_item = outcome.found.as_ref().filter(|_| !tool.no_cache).map(|exe| {
                    CacheItem::new(&tool.name, exe, &tool.version.requested, &tool.version)
                });
                ToolResult {
                    name: tool.name.clone(),
                    status: Status::Ok,
                    message: outcome.output,
                    found: outcome.found,
                    cache_item,
                    tool,
                }
            }
            Err(e) => ToolResult::failed(tool, &e),
        }
    }

    async fn install(&self, tool: &Tool, provider: &dyn SourceProvider) -> Result<InstallOutcome> {
        self.commands(tool, tool.commands.pre.as_slice(), "pre").await?;

        let data = self.install_data(tool, provider);
        debug!(source = %provider.source_type(), path = %data.path, "Installing");
        let mut outcome = provider.install(&tool.source, &data).await?;

        let post = self.commands(tool, tool.commands.post.as_slice(), "post").await?;
        if !post.is_empty() {
            if !outcome.output.is_empty() {
                outcome.output.push('\n');
            }
            outcome.output.push_str(&post);
        }
        Ok(outcome)
    }

    async fn commands(&self, tool: &Tool, commands: &[String], stage: &str) -> Result<String> {
        if commands.is_empty() {
            return Ok(String::new());
        }
        debug!(stage, count = commands.len(), "Running commands");
        shell::run(&Script {
            commands,
            env: Some(&tool.env),
            allow_failure: tool.commands.allow_failure,
            cwd: None,
        })
        .await
    }

    fn install_data(&self, tool: &Tool, provider: &dyn SourceProvider) -> InstallData {
        InstallData {
            path: tool.path.clone(),
            name: tool.name.clone(),
            version: tool.version.requested.clone(),
            exe: tool.exe.name.clone(),
            patterns: tool.exe.patterns.to_vec(),
            output: PathBuf::from(&tool.output),
            aliases: tool.aliases.to_vec(),
            mode: tool.mode(),
            env: tool.env.clone(),
            headers: provider.download_headers(&tool.source),
            no_verify_ssl: tool.no_verify_ssl,
            checksum: tool.checksum(),
            timeout: self.options.timeout,
            progress: Arc::clone(&self.options.progress),
            cancel: self.options.cancel.clone(),
            extension: tool.platform.extension.clone(),
        }
    }

    /// Turn a resolution error into a result, recording expected skips.
    async fn resolve_failure(&self, tool: Tool, error: Error) -> ToolResult {
        if !error.is_skip() {
            return ToolResult::failed(tool, &error);
        }

        let cache_item = if error.records_cache() && !tool.no_cache {
            let exe = tool.exe_path();
            let installed = match &error {
                Error::UpToDate { version } => Some(version.clone()),
                _ => version::probe(&exe, &tool.version).await,
            };
            installed.map(|v| CacheItem::new(&tool.name, &exe, v, &tool.version))
        } else {
            None
        };

        ToolResult {
            name: tool.name.clone(),
            status: Status::Skipped,
            message: error.to_string(),
            found: cache_item.as_ref().map(|item| item.path.clone()),
            cache_item,
            tool,
        }
    }
}
