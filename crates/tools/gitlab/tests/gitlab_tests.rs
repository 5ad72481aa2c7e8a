//! GitLab provider against a mocked API.

use godyl_core::matcher::Requirements;
use godyl_core::platform::{Arch, ArchType, Os, Platform};
use godyl_core::sources::{AssetRequest, Source, SourceProvider};
use godyl_tools_gitlab::GitlabProvider;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT: &str = "/api/v4/projects/gitlab-org%2Fcli";

fn source(server: &MockServer) -> Source {
    let mut source = Source::default();
    source.gitlab.owner = "gitlab-org".into();
    source.gitlab.repo = "cli".into();
    source.gitlab.server = server.uri();
    source
}

#[tokio::test]
async fn test_discover_latest_with_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{PROJECT}/releases/permalink/latest")))
        .and(header("PRIVATE-TOKEN", "glpat-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tag_name": "v1.46.1",
            "released_at": "2024-09-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut source = source(&server);
    source.gitlab.token = "glpat-123".into();
    let provider = GitlabProvider::new().unwrap();
    assert_eq!(provider.discover_version(&source).await.unwrap(), "v1.46.1");
}

#[tokio::test]
async fn test_prerelease_picks_newest_released() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{PROJECT}/releases")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"tag_name": "v1.46.0", "released_at": "2024-08-01T00:00:00Z"},
            {"tag_name": "v1.47.0-rc1", "released_at": "2024-10-01T00:00:00Z"}
        ])))
        .mount(&server)
        .await;

    let mut source = source(&server);
    source.gitlab.pre = true;
    let provider = GitlabProvider::new().unwrap();
    assert_eq!(provider.discover_version(&source).await.unwrap(), "v1.47.0-rc1");
}

#[tokio::test]
async fn test_empty_release_list_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{PROJECT}/releases")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let mut source = source(&server);
    source.gitlab.pre = true;
    let err = GitlabProvider::new()
        .unwrap()
        .discover_version(&source)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_select_asset_from_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{PROJECT}/releases/v1.46.1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tag_name": "v1.46.1",
            "assets": {
                "links": [
                    {
                        "name": "glab_1.46.1_Linux_x86_64.tar.gz",
                        "url": "https://gitlab.com/uploads/linux",
                        "direct_asset_url": "https://gitlab.com/direct/linux",
                        "link_type": "package"
                    },
                    {
                        "name": "glab_1.46.1_macOS_arm64.tar.gz",
                        "url": "https://gitlab.com/uploads/mac"
                    }
                ]
            }
        })))
        .mount(&server)
        .await;

    let requirements = Requirements {
        platform: Platform::new(Os::Linux, Arch::new(ArchType::Amd64)),
        hints: Vec::new(),
    };
    let url = GitlabProvider::new()
        .unwrap()
        .select_asset(
            &source(&server),
            &AssetRequest {
                name: "gitlab-org/cli",
                version: "v1.46.1",
                extensions: &[],
                requirements: &requirements,
            },
        )
        .await
        .unwrap();
    assert_eq!(url, "https://gitlab.com/direct/linux");
}
