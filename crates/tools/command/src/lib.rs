//! Shell recipe source provider for godyl.
//!
//! Runs `source.commands.commands` as one script. Nothing is downloaded or
//! placed; the recipe is responsible for putting the executable into the
//! output directory.

use async_trait::async_trait;
use godyl_core::Result;
use godyl_core::install::{InstallData, InstallOutcome};
use godyl_core::shell::{self, Script};
use godyl_core::sources::{AssetRequest, Source, SourceProvider, SourceType, base_name};
use tracing::{debug, info};

/// Source provider running shell commands.
#[derive(Debug, Default)]
pub struct CommandProvider;

impl CommandProvider {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceProvider for CommandProvider {
    fn source_type(&self) -> SourceType {
        SourceType::Command
    }

    fn description(&self) -> &'static str {
        "Install tools by running shell commands"
    }

    fn initialize(&self, _name: &str, _source: &mut Source) -> Result<()> {
        Ok(())
    }

    fn default_exe_name(&self, name: &str, _source: &Source) -> String {
        base_name(name)
    }

    async fn discover_version(&self, _source: &Source) -> Result<String> {
        Ok(String::new())
    }

    async fn select_asset(&self, _source: &Source, _request: &AssetRequest<'_>) -> Result<String> {
        Ok(String::new())
    }

    async fn install(&self, source: &Source, data: &InstallData) -> Result<InstallOutcome> {
        let commands = &source.commands;
        debug!(tool = %data.name, count = commands.commands.len(), "Running install commands");

        let output = shell::run(&Script {
            commands: commands.commands.as_slice(),
            env: Some(&data.env),
            allow_failure: commands.allow_failure,
            cwd: None,
        })
        .await?;

        let exe = data.exe_path();
        let found = exe.is_file().then_some(exe);
        info!(tool = %data.name, found = ?found, "Commands finished");
        Ok(InstallOutcome { output, found })
    }
}
