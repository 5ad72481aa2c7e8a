//! The per-tool resolution pipeline.
//!
//! ```text
//! Loaded -> DefaultsApplied -> Templated(1) -> SourceChosen -> Identified
//!        -> TaggedPass -> ExeNamed -> VersionKnown -> PathKnown
//!        -> Templated(2) -> StrategyOK -> Ready
//! ```
//!
//! [`Resolver::resolve`] runs the first three steps once, then tries the
//! primary source followed by each fallback on a fresh copy of the tool.
//! Retryable failures move on to the next source; anything else stops the
//! loop. The tool is left in the state of the last attempt either way.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::{DefaultsSet, Strategy, TagFilter, Tool, with_extension};
use crate::cache::{CacheBackend, cache_id};
use crate::matcher::Requirements;
use crate::paths;
use crate::platform::Platform;
use crate::sources::{AssetRequest, SourceProvider, SourceRegistry, SourceType};
use crate::template::{TemplateContext, Templater};
use crate::{Error, Result};

/// Resolves tools against a provider registry.
#[derive(Clone)]
pub struct Resolver {
    registry: Arc<SourceRegistry>,
    defaults: Arc<DefaultsSet>,
    templater: Arc<Templater>,
    cache: Option<Arc<dyn CacheBackend>>,
    tags: TagFilter,
    host: Platform,
    env: BTreeMap<String, String>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("registry", &self.registry)
            .field("groups", &self.defaults.names())
            .field("tags", &self.tags)
            .field("host", &self.host.to_string())
            .finish_non_exhaustive()
    }
}

impl Resolver {
    /// A resolver for the detected host, with the process environment.
    #[must_use]
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self {
            registry,
            defaults: Arc::new(DefaultsSet::default()),
            templater: Arc::new(Templater::new()),
            cache: None,
            tags: TagFilter::default(),
            host: Platform::detect(),
            env: std::env::vars().collect(),
        }
    }

    #[must_use]
    pub fn with_defaults(mut self, defaults: Arc<DefaultsSet>) -> Self {
        self.defaults = defaults;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: TagFilter) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: Platform) -> Self {
        self.host = host;
        self
    }

    /// Replace the environment exposed to templates as `Env`.
    #[must_use]
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub const fn host(&self) -> &Platform {
        &self.host
    }

    #[must_use]
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Provider for the tool's (resolved) source type.
    pub fn provider_for(&self, tool: &Tool) -> Result<Arc<dyn SourceProvider>> {
        let kind = tool.source.source_type()?;
        self.registry.require(kind).cloned()
    }

    /// Run the whole pipeline on `tool`.
    #[instrument(name = "resolve", skip_all, fields(tool = %tool.name))]
    pub async fn resolve(&self, tool: &mut Tool) -> Result<()> {
        self.setup(tool)?;

        let sources = source_order(tool)?;
        for (index, kind) in sources.iter().copied().enumerate() {
            let mut candidate = tool.clone();
            match self.attempt(&mut candidate, kind).await {
                Ok(()) => {
                    debug!(
                        source = %kind,
                        version = %candidate.version.requested,
                        path = %candidate.path,
                        "Resolved"
                    );
                    *tool = candidate;
                    return Ok(());
                }
                Err(e) if e.is_retryable() && index + 1 < sources.len() => {
                    warn!(source = %kind, error = %e, "Source failed, trying next fallback");
                }
                Err(e) => {
                    *tool = candidate;
                    return Err(e);
                }
            }
        }

        Err(Error::configuration(format!(
            "{}: no source to resolve from",
            tool.name
        )))
    }

    /// Resolve as far as possible without touching the network.
    ///
    /// Applies defaults, identifies the primary source and names the
    /// executable, leaving version and path as configured. Reports such as
    /// `status` use this to find where a tool would be installed.
    pub fn prepare(&self, tool: &mut Tool) -> Result<()> {
        self.setup(tool)?;

        let kind = source_order(tool)?[0];
        let provider = self.registry.require(kind)?;
        tool.source.kind = kind.to_string();
        provider.initialize(&tool.name, &mut tool.source)?;
        if tool.exe.name.is_empty() {
            tool.exe.name = provider.default_exe_name(&tool.name, &tool.source);
        }
        self.second_pass(tool)?;

        let extension = tool.platform.extension.clone();
        tool.exe.name = with_extension(&tool.exe.name, &extension);
        for alias in tool.aliases.iter_mut() {
            *alias = with_extension(alias, &extension);
        }
        Ok(())
    }

    fn setup(&self, tool: &mut Tool) -> Result<()> {
        self.defaults.apply(tool)?;
        fill_platform(&mut tool.platform, &self.host);
        self.first_pass(tool)
    }

    /// Template pass 1 and the skip conditions.
    fn first_pass(&self, tool: &mut Tool) -> Result<()> {
        let ctx = self.context(tool);
        let t = &self.templater;

        t.apply(&mut tool.source.kind, &ctx)?;
        for skip in tool.skip.iter_mut() {
            skip.condition.parse(t, &ctx)?;
        }
        t.apply(&mut tool.output, &ctx)?;
        t.apply(&mut tool.version.requested, &ctx)?;

        if !tool.output.is_empty() {
            tool.output = paths::expand_home(&tool.output)
                .to_string_lossy()
                .into_owned();
        }

        if let Some(skip) = tool.skip.iter().find(|s| s.is_active()) {
            let reason = if skip.reason.is_empty() {
                skip.condition.source().to_string()
            } else {
                skip.reason.clone()
            };
            return Err(Error::SkipCondition { reason });
        }
        Ok(())
    }

    async fn attempt(&self, tool: &mut Tool, kind: SourceType) -> Result<()> {
        let provider = self.registry.require(kind)?.clone();
        provider.check_prerequisites().await?;

        tool.source.kind = kind.to_string();
        provider.initialize(&tool.name, &mut tool.source)?;
        if tool.exe.name.is_empty() {
            tool.exe.name = provider.default_exe_name(&tool.name, &tool.source);
        }

        if !tool.tags.contains(&tool.name) {
            tool.tags.push(tool.name.clone());
        }
        self.tags.check(&tool.tags)?;

        if tool.strategy() == Strategy::None {
            let ctx = self.context(tool);
            let exe = with_extension(
                &self.templater.render(&tool.exe.name, &ctx)?,
                &tool.platform.extension,
            );
            tool.strategy().check_exists(&Path::new(&tool.output).join(exe))?;
        }

        self.second_pass(tool)?;

        if tool.version.requested.is_empty() {
            tool.version.requested = provider.discover_version(&tool.source).await?;
        }

        if tool.path.is_empty() {
            let requirements = Requirements {
                platform: tool.platform.clone(),
                hints: tool.hints.clone(),
            };
            let request = AssetRequest {
                name: &tool.name,
                version: &tool.version.requested,
                extensions: tool.extensions.as_slice(),
                requirements: &requirements,
            };
            tool.path = provider.select_asset(&tool.source, &request).await?;
        } else {
            let ctx = self.context(tool);
            self.templater.apply(&mut tool.path, &ctx)?;
        }

        let extension = tool.platform.extension.clone();
        tool.exe.name = with_extension(&tool.exe.name, &extension);
        for alias in tool.aliases.iter_mut() {
            *alias = with_extension(alias, &extension);
        }

        if tool.strategy() == Strategy::Sync {
            let cached = self.cached(tool);
            tool.strategy()
                .check_sync(
                    &tool.version.requested,
                    &tool.exe_path(),
                    cached.as_ref(),
                    &tool.version,
                )
                .await?;
        }

        validate(tool, kind)
    }

    /// Template pass 2: every remaining templated field except `path`.
    fn second_pass(&self, tool: &mut Tool) -> Result<()> {
        let ctx = self.context(tool);
        let t = &self.templater;

        t.apply(&mut tool.exe.name, &ctx)?;
        t.apply_all(tool.exe.patterns.iter_mut(), &ctx)?;
        t.apply_all(tool.aliases.iter_mut(), &ctx)?;
        t.apply_all(tool.extensions.iter_mut(), &ctx)?;
        for hint in &mut tool.hints {
            t.apply(&mut hint.pattern, &ctx)?;
            hint.weight.parse(t, &ctx)?;
            hint.matching.parse(t, &ctx)?;
        }
        t.apply_all(tool.source.strings_mut(), &ctx)?;
        t.apply_all(
            tool.commands.pre.iter_mut().chain(tool.commands.post.iter_mut()),
            &ctx,
        )?;
        t.apply(&mut tool.checksum, &ctx)
    }

    fn cached(&self, tool: &Tool) -> Option<crate::cache::CacheItem> {
        let cache = self.cache.as_ref()?;
        let id = cache_id(&tool.name, Path::new(&tool.output));
        match cache.get(&id) {
            Ok(item) => item,
            Err(e) => {
                warn!(%id, error = %e, "Cache lookup failed");
                None
            }
        }
    }

    /// Template context for the tool's current state.
    #[must_use]
    pub fn context(&self, tool: &Tool) -> TemplateContext {
        let mut env = self.env.clone();
        env.extend(tool.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        TemplateContext {
            name: tool.name.clone(),
            version: tool.version.requested.clone(),
            exe: tool.exe.name.clone(),
            output: tool.output.clone(),
            env,
            values: tool.values.clone(),
            platform: BTreeMap::new(),
        }
        .with_platform(&tool.platform)
    }
}

/// Fill unset platform fields from the host.
///
/// Distribution and library only carry over when the tool targets the
/// host OS.
fn fill_platform(platform: &mut Platform, host: &Platform) {
    let same_os = platform.os.is_unknown() || platform.os == host.os;
    if platform.os.is_unknown() {
        platform.os = host.os;
    }
    if platform.architecture.is_unknown() {
        platform.architecture = host.architecture;
    }
    if same_os {
        if platform.distribution.is_unknown() {
            platform.distribution = host.distribution;
        }
        if platform.library.is_unknown() {
            platform.library = host.library;
        }
    }
    platform.complete();
}

/// `[primary, ...fallbacks]` without repeats; an empty type means github.
fn source_order(tool: &Tool) -> Result<Vec<SourceType>> {
    let primary = if tool.source.kind.trim().is_empty() {
        SourceType::Github
    } else {
        tool.source.source_type()?
    };
    let mut order = vec![primary];
    for kind in tool.fallbacks.iter().copied() {
        if !order.contains(&kind) {
            order.push(kind);
        }
    }
    Ok(order)
}

fn validate(tool: &Tool, kind: SourceType) -> Result<()> {
    let fail = |what: &str| Err(Error::validation(format!("{}: {what}", tool.name)));

    if tool.exe.name.is_empty() {
        return fail("executable name is empty");
    }
    if tool.output.is_empty() {
        return fail("output directory is not set");
    }
    if kind.downloads() && tool.path.is_empty() {
        return fail("no download path resolved");
    }
    if kind == SourceType::Go && tool.path.is_empty() {
        return fail("no module path resolved");
    }
    if kind == SourceType::Command && tool.source.commands.commands.is_empty() {
        return fail("command source without commands");
    }
    Ok(())
}
