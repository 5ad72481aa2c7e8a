//! Command implementations.
//!
//! Every command receives a [`Session`]: the merged settings plus the
//! pieces built from them (defaults, provider registry, cache, resolver).

pub mod cache;
pub mod download;
pub mod dump;
pub mod install;
pub mod status;
pub mod version;

use godyl_core::Result;
use godyl_core::cache::{self as core_cache, CacheBackend};
use godyl_core::download::{NoProgress, ProgressReporter};
use godyl_core::processor::{ProcessReport, Processor, ProcessorOptions, Status};
use godyl_core::sources::{NoneProvider, SourceRegistry};
use godyl_core::tool::{DefaultsSet, Resolver, TagFilter};
use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Settings;
use crate::progress::BarProgress;

/// Registry with every built-in source provider.
pub fn registry() -> Result<SourceRegistry> {
    let mut registry = SourceRegistry::new();
    registry.register(NoneProvider);
    registry.register(godyl_tools_github::GithubProvider::new()?);
    registry.register(godyl_tools_gitlab::GitlabProvider::new()?);
    registry.register(godyl_tools_url::UrlProvider::new());
    registry.register(godyl_tools_go::GoProvider::new()?);
    registry.register(godyl_tools_command::CommandProvider::new());
    debug!(providers = ?registry.types(), "Registered source providers");
    Ok(registry)
}

/// State shared by the commands of one invocation.
pub struct Session {
    pub settings: Settings,
    pub defaults: Arc<DefaultsSet>,
    pub registry: Arc<SourceRegistry>,
    pub json: bool,
    pub cancel: CancellationToken,
}

impl Session {
    /// Load defaults and build the provider registry.
    pub fn new(settings: Settings, json: bool, cancel: CancellationToken) -> Result<Self> {
        let defaults = Arc::new(settings.load_defaults()?);
        Ok(Self {
            settings,
            defaults,
            registry: Arc::new(registry()?),
            json,
            cancel,
        })
    }

    /// Open the configured cache backend.
    pub fn cache(&self) -> Result<Arc<dyn CacheBackend>> {
        core_cache::open(self.settings.cache_type, &self.settings.cache_dir)
    }

    /// The cache, unless `--no-cache` is set.
    pub fn cache_if_enabled(&self) -> Result<Option<Arc<dyn CacheBackend>>> {
        if self.settings.no_cache {
            Ok(None)
        } else {
            self.cache().map(Some)
        }
    }

    /// Resolver with defaults, tag filter and an optional cache.
    #[must_use]
    pub fn resolver(&self, cache: Option<Arc<dyn CacheBackend>>) -> Resolver {
        let resolver = Resolver::new(Arc::clone(&self.registry))
            .with_defaults(Arc::clone(&self.defaults))
            .with_tags(TagFilter::new(
                self.settings.tags.clone(),
                self.settings.exclude_tags.clone(),
            ));
        match cache {
            Some(cache) => resolver.with_cache(cache),
            None => resolver,
        }
    }

    /// Processor whose resolver and result collector share one cache.
    pub fn processor(&self) -> Result<Processor> {
        let progress: Arc<dyn ProgressReporter> = if self.json {
            Arc::new(NoProgress)
        } else {
            Arc::new(BarProgress::new())
        };
        let options = ProcessorOptions {
            parallel: self.settings.parallel,
            no_cache: self.settings.no_cache,
            timeout: self.settings.timeout,
            progress,
            cancel: self.cancel.clone(),
        };
        let cache = self.cache_if_enabled()?;
        let processor = Processor::new(self.resolver(cache.clone()), options);
        Ok(match cache {
            Some(cache) => processor.with_cache(cache),
            None => processor,
        })
    }
}

/// One tool's outcome as printed to the user.
#[derive(Debug, Serialize)]
pub struct Outcome {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Flatten a processor report for output.
#[must_use]
pub fn outcomes(report: &ProcessReport) -> Vec<Outcome> {
    report
        .results
        .iter()
        .map(|result| Outcome {
            name: result.name.clone(),
            status: result.status.to_string(),
            version: result.tool.version.requested.clone(),
            path: result.found.as_ref().map(|p| p.display().to_string()),
            message: if result.status == Status::Ok {
                String::new()
            } else {
                result.message.clone()
            },
        })
        .collect()
}

/// Human-readable summary line per tool plus totals.
#[must_use]
pub fn summary(report: &ProcessReport) -> String {
    let mut out = String::new();
    for outcome in outcomes(report) {
        let detail = match (&outcome.path, outcome.message.is_empty()) {
            (_, false) => outcome.message,
            (Some(path), true) => path.clone(),
            (None, true) => String::new(),
        };
        let _ = writeln!(
            out,
            "{:<8} {:<32} {:<12} {detail}",
            outcome.status, outcome.name, outcome.version
        );
    }
    let _ = writeln!(
        out,
        "{} installed, {} skipped, {} failed",
        report.ok(),
        report.skipped(),
        report.failed()
    );
    out
}
