//! Plain URL source provider for godyl.
//!
//! The download location comes straight from `source.url.url` (or the
//! tool's `path`), already templated. There is no version discovery.

use async_trait::async_trait;
use godyl_core::sources::{AssetRequest, Source, SourceProvider, SourceType, base_name};
use godyl_core::{Error, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Source provider for direct download URLs.
#[derive(Debug, Default)]
pub struct UrlProvider;

impl UrlProvider {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceProvider for UrlProvider {
    fn source_type(&self) -> SourceType {
        SourceType::Url
    }

    fn description(&self) -> &'static str {
        "Download tools from a plain URL"
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

    async fn select_asset(&self, source: &Source, request: &AssetRequest<'_>) -> Result<String> {
        if source.url.url.is_empty() {
            return Err(Error::tool_resolution(format!(
                "{}: url source needs source.url.url or a path",
                request.name
            )));
        }
        debug!(url = %source.url.url, "Using configured URL");
        Ok(source.url.url.clone())
    }

    fn download_headers(&self, source: &Source) -> BTreeMap<String, String> {
        let mut headers = source.url.headers.clone();
        if !source.url.token.is_empty() {
            headers.insert(
                "Authorization".to_string(),
                format!("Bearer {}", source.url.token),
            );
        }
        headers
    }
}
