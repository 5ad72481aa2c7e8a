//! GitHub provider against a mocked API.

use godyl_core::cache::{self, CacheItem, CacheType};
use godyl_core::matcher::Requirements;
use godyl_core::platform::{Arch, ArchType, Os, Platform};
use godyl_core::sources::{AssetRequest, Source, SourceProvider, SourceRegistry, SourceType};
use godyl_core::Error;
use godyl_core::tool::{Resolver, Strategy, Tool};
use godyl_tools_github::GithubProvider;
use godyl_tools_url::UrlProvider;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPO: &str = "/repos/goreleaser/goreleaser";

fn source(server: &MockServer) -> (GithubProvider, Source) {
    let provider = GithubProvider::with_base(server.uri(), server.uri()).unwrap();
    let mut source = Source::default();
    source.github.owner = "goreleaser".into();
    source.github.repo = "goreleaser".into();
    (provider, source)
}

fn release_json(server: &MockServer, tag: &str) -> serde_json::Value {
    let asset = |name: &str| {
        json!({
            "name": name,
            "browser_download_url": format!("{}/dl/{tag}/{name}", server.uri()),
            "content_type": "application/gzip",
            "size": 1024
        })
    };
    json!({
        "tag_name": tag,
        "published_at": "2024-05-01T10:00:00Z",
        "assets": [
            asset("goreleaser_Linux_x86_64.tar.gz"),
            asset("goreleaser_Linux_arm64.tar.gz"),
            asset("goreleaser_Darwin_x86_64.tar.gz"),
            asset("goreleaser_Windows_x86_64.zip"),
        ]
    })
}

async fn mount_release(server: &MockServer, tag: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/releases/latest")))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_json(server, tag)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/releases/tags/{tag}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_json(server, tag)))
        .mount(server)
        .await;
}

fn linux_amd64() -> Platform {
    Platform::new(Os::Linux, Arch::new(ArchType::Amd64))
}

fn resolver(server: &MockServer) -> Resolver {
    let mut registry = SourceRegistry::new();
    registry.register(GithubProvider::with_base(server.uri(), server.uri()).unwrap());
    Resolver::new(Arc::new(registry))
        .with_host(linux_amd64())
        .with_env(BTreeMap::new())
}

#[tokio::test]
async fn test_discover_latest() {
    let server = MockServer::start().await;
    mount_release(&server, "v2.5.0").await;

    let (provider, source) = source(&server);
    assert_eq!(provider.discover_version(&source).await.unwrap(), "v2.5.0");
}

#[tokio::test]
async fn test_token_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/releases/latest")))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tag_name": "v1.0.0"})))
        .expect(1)
        .mount(&server)
        .await;

    let (provider, mut source) = source(&server);
    source.github.token = "s3cret".into();
    assert_eq!(provider.discover_version(&source).await.unwrap(), "v1.0.0");
}

#[tokio::test]
async fn test_rate_limit_falls_back_to_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/releases/latest")))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/goreleaser/goreleaser/releases/latest"))
        .respond_with(ResponseTemplate::new(302).insert_header(
            "location",
            "https://github.com/goreleaser/goreleaser/releases/tag/v2.4.8",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let (provider, source) = source(&server);
    assert_eq!(provider.discover_version(&source).await.unwrap(), "v2.4.8");
}

#[tokio::test]
async fn test_prerelease_picks_newest_published() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/releases")))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"tag_name": "v2.5.0", "published_at": "2024-05-01T10:00:00Z"},
            {"tag_name": "v2.6.0-rc.1", "published_at": "2024-06-01T10:00:00Z"},
            {"tag_name": "v2.4.0", "published_at": "2024-03-01T10:00:00Z"}
        ])))
        .mount(&server)
        .await;

    let (provider, mut source) = source(&server);
    source.github.pre = true;
    assert_eq!(provider.discover_version(&source).await.unwrap(), "v2.6.0-rc.1");
}

#[tokio::test]
async fn test_empty_prerelease_list_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/releases")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let (provider, mut source) = source(&server);
    source.github.pre = true;
    let err = provider.discover_version(&source).await.unwrap_err();
    assert!(err.is_retryable(), "{err}");
}

#[tokio::test]
async fn test_select_asset_returns_download_url() {
    let server = MockServer::start().await;
    mount_release(&server, "v2.5.0").await;

    let (provider, source) = source(&server);
    let requirements = Requirements {
        platform: linux_amd64(),
        hints: Vec::new(),
    };
    let url = provider
        .select_asset(
            &source,
            &AssetRequest {
                name: "goreleaser/goreleaser",
                version: "v2.5.0",
                extensions: &[],
                requirements: &requirements,
            },
        )
        .await
        .unwrap();
    assert_eq!(
        url,
        format!("{}/dl/v2.5.0/goreleaser_Linux_x86_64.tar.gz", server.uri())
    );
}

#[tokio::test]
async fn test_missing_release_is_retryable() {
    let server = MockServer::start().await;
    let (provider, source) = source(&server);
    let err = provider.discover_version(&source).await.unwrap_err();
    assert!(matches!(err, Error::ToolResolution { .. }));
}

#[tokio::test]
async fn test_resolve_latest_release() {
    let server = MockServer::start().await;
    mount_release(&server, "v2.5.0").await;
    let dir = TempDir::new().unwrap();

    let mut tool = Tool::named("goreleaser/goreleaser");
    tool.source.kind = "github".into();
    tool.output = dir.path().display().to_string();

    resolver(&server).resolve(&mut tool).await.unwrap();

    assert_eq!(tool.version.requested, "v2.5.0");
    assert_eq!(
        tool.path,
        format!("{}/dl/v2.5.0/goreleaser_Linux_x86_64.tar.gz", server.uri())
    );
    assert_eq!(tool.exe.name, "goreleaser");
}

#[tokio::test]
async fn test_resolve_sync_up_to_date_skips_download() {
    let server = MockServer::start().await;
    mount_release(&server, "v2.5.0").await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("bin");
    std::fs::create_dir_all(&output).unwrap();
    std::fs::write(output.join("goreleaser"), "").unwrap();

    let store = cache::open(CacheType::File, &dir.path().join("cache")).unwrap();
    let mut cached = Tool::named("goreleaser/goreleaser");
    cached.output = output.display().to_string();
    store
        .save(CacheItem::new(
            "goreleaser/goreleaser",
            output.join("goreleaser"),
            "v2.5.0",
            &cached.version,
        ))
        .unwrap();

    let mut tool = Tool::named("goreleaser/goreleaser");
    tool.source.kind = "github".into();
    tool.output = output.display().to_string();
    tool.strategy = Some(Strategy::Sync);

    let err = resolver(&server)
        .with_cache(store)
        .resolve(&mut tool)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UpToDate { ref version } if version == "v2.5.0"));

    let downloads = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path().starts_with("/dl/"))
        .count();
    assert_eq!(downloads, 0);
}

#[tokio::test]
async fn test_bare_name_falls_back_to_url() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let mut registry = SourceRegistry::new();
    registry.register(GithubProvider::with_base(server.uri(), server.uri()).unwrap());
    registry.register(UrlProvider::new());
    let resolver = Resolver::new(Arc::new(registry))
        .with_host(linux_amd64())
        .with_env(BTreeMap::new());

    let mut tool = Tool::named("jq");
    tool.source.kind = "github".into();
    tool.fallbacks = vec![SourceType::Url].into();
    tool.path = "https://dl.example/jq-{{ OS }}".into();
    tool.output = dir.path().display().to_string();

    resolver.resolve(&mut tool).await.unwrap();

    assert_eq!(tool.source.kind, "url");
    assert_eq!(tool.path, "https://dl.example/jq-linux");
    assert_eq!(tool.exe.name, "jq");
    assert!(server.received_requests().await.unwrap().is_empty());
}
