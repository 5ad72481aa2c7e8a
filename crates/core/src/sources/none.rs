//! The `none` source: every step is a no-op.

use async_trait::async_trait;

use super::{AssetRequest, Source, SourceProvider, SourceType, base_name};
use crate::Result;
use crate::install::{InstallData, InstallOutcome};

/// Provider for tools that only run their pre/post commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneProvider;

#[async_trait]
impl SourceProvider for NoneProvider {
    fn source_type(&self) -> SourceType {
        SourceType::None
    }

    fn description(&self) -> &'static str {
        "Does nothing; useful for tools driven purely by commands"
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

    async fn install(&self, _source: &Source, data: &InstallData) -> Result<InstallOutcome> {
        let exe = data.output.join(&data.exe);
        Ok(InstallOutcome {
            output: String::new(),
            found: exe.is_file().then_some(exe),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_none_is_noop() {
        let provider = NoneProvider;
        let mut source = Source::default();
        provider.initialize("owner/tool", &mut source).unwrap();
        assert_eq!(source, Source::default());
        assert_eq!(provider.default_exe_name("owner/tool", &source), "tool");
        assert_eq!(provider.discover_version(&source).await.unwrap(), "");

        let dir = tempfile::TempDir::new().unwrap();
        let data = InstallData {
            output: dir.path().to_path_buf(),
            exe: "tool".into(),
            ..InstallData::default()
        };
        let outcome = provider.install(&source, &data).await.unwrap();
        assert!(outcome.found.is_none());
    }
}
