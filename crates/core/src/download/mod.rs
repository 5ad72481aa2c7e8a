//! Fetching assets over HTTP.
//!
//! [`fetch`] streams a URL into a directory with optional custom headers,
//! TLS verification bypass, an overall deadline, cancellation, progress
//! reporting and sha256 verification. `file://` URLs are copied locally.

mod archive;

pub use archive::{ArchiveKind, decompress, unpack};

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{Error, Result};

/// Default overall deadline for one download.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Receives download progress.
pub trait ProgressReporter: Send + Sync {
    /// A download for `label` began; `total` is known when the server sent it.
    fn start(&self, label: &str, total: Option<u64>) {
        let _ = (label, total);
    }

    /// `current` bytes of `label` have arrived.
    fn update(&self, label: &str, current: u64, total: Option<u64>);

    /// The download for `label` ended.
    fn finish(&self, label: &str) {
        let _ = label;
    }
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn update(&self, _label: &str, _current: u64, _total: Option<u64>) {}
}

/// Settings for a single download.
#[derive(Clone)]
pub struct DownloadOptions {
    /// Name shown by progress reporters.
    pub label: String,
    pub headers: BTreeMap<String, String>,
    pub no_verify_ssl: bool,
    pub timeout: Duration,
    /// `sha256:<hex>` or bare hex digest.
    pub checksum: Option<String>,
    pub progress: Arc<dyn ProgressReporter>,
    pub cancel: CancellationToken,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            label: String::new(),
            headers: BTreeMap::new(),
            no_verify_ssl: false,
            timeout: DEFAULT_TIMEOUT,
            checksum: None,
            progress: Arc::new(NoProgress),
            cancel: CancellationToken::new(),
        }
    }
}

impl std::fmt::Debug for DownloadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOptions")
            .field("label", &self.label)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("no_verify_ssl", &self.no_verify_ssl)
            .field("timeout", &self.timeout)
            .field("checksum", &self.checksum)
            .finish_non_exhaustive()
    }
}

/// Download `url` into `dir`, returning the written file.
pub async fn fetch(url: &str, dir: &Path, options: &DownloadOptions) -> Result<PathBuf> {
    let dest = dir.join(file_name(url));
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::io(e, dir, "create"))?;

    let digest = match tokio::time::timeout(options.timeout, fetch_to(url, &dest, options)).await
    {
        Ok(result) => result?,
        Err(_) => {
            return Err(Error::Timeout {
                seconds: options.timeout.as_secs(),
            });
        }
    };

    if let Some(expected) = &options.checksum {
        verify_checksum(expected, &digest)?;
        debug!(%url, sha256 = %digest, "Checksum verified");
    }
    Ok(dest)
}

async fn fetch_to(url: &str, dest: &Path, options: &DownloadOptions) -> Result<String> {
    if let Some(local) = url.strip_prefix("file://") {
        let data = tokio::fs::read(local)
            .await
            .map_err(|e| Error::download(url, e.to_string()))?;
        tokio::fs::write(dest, &data)
            .await
            .map_err(|e| Error::io(e, dest, "write"))?;
        return Ok(hex::encode(Sha256::digest(&data)));
    }

    let client = client(options)?;
    let headers = header_map(&options.headers)?;

    let total = preflight(&client, url, &headers).await;
    let response = client
        .get(url)
        .headers(headers)
        .send()
        .await
        .map_err(|e| Error::download(url, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::download(url, format!("HTTP {status}")));
    }
    let total = response.content_length().or(total);

    info!(%url, dest = %dest.display(), ?total, "Downloading");
    options.progress.start(&options.label, total);

    let mut file = File::create(dest)
        .await
        .map_err(|e| Error::io(e, dest, "create"))?;
    let mut stream = response.bytes_stream();
    let mut hasher = Sha256::new();
    let mut current = 0_u64;

    loop {
        let chunk = tokio::select! {
            () = options.cancel.cancelled() => {
                options.progress.finish(&options.label);
                return Err(Error::Cancelled);
            }
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk.map_err(|e| Error::download(url, e.to_string()))?;

        hasher.update(&chunk);
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::io(e, dest, "write"))?;
        current += chunk.len() as u64;
        options.progress.update(&options.label, current, total);
    }

    file.flush().await.map_err(|e| Error::io(e, dest, "flush"))?;
    options.progress.finish(&options.label);
    debug!(%url, bytes = current, "Download complete");
    Ok(hex::encode(hasher.finalize()))
}

/// HEAD request for the content length; failures are not fatal.
async fn preflight(client: &reqwest::Client, url: &str, headers: &HeaderMap) -> Option<u64> {
    match client.head(url).headers(headers.clone()).send().await {
        Ok(resp) if resp.status().is_success() => resp.content_length(),
        Ok(resp) => {
            debug!(%url, status = %resp.status(), "HEAD preflight not successful");
            None
        }
        Err(e) => {
            debug!(%url, error = %e, "HEAD preflight failed");
            None
        }
    }
}

/// HTTP client honouring the TLS verification setting.
pub fn client(options: &DownloadOptions) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("godyl/", env!("CARGO_PKG_VERSION")))
        .danger_accept_invalid_certs(options.no_verify_ssl)
        .build()
        .map_err(|e| Error::configuration(format!("failed to create HTTP client: {e}")))
}

/// Convert configured headers into a `HeaderMap`.
pub fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::configuration(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::configuration(format!("invalid value for header {name}: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Last path segment of a URL, without query or fragment.
#[must_use]
pub fn file_name(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty() && !s.contains(':'))
        .unwrap_or("download")
        .to_string()
}

fn verify_checksum(expected: &str, actual: &str) -> Result<()> {
    let expected = expected.trim();
    let hex_digest = match expected.split_once(':') {
        Some((algo, digest)) if algo.eq_ignore_ascii_case("sha256") => digest,
        Some((algo, _)) => {
            return Err(Error::configuration(format!(
                "unsupported checksum algorithm '{algo}', only sha256 is supported"
            )));
        }
        None => expected,
    };
    if hex_digest.eq_ignore_ascii_case(actual) {
        Ok(())
    } else {
        Err(Error::Checksum {
            expected: hex_digest.to_lowercase(),
            actual: actual.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct Recorder {
        last: AtomicU64,
    }

    impl ProgressReporter for Recorder {
        fn update(&self, _label: &str, current: u64, _total: Option<u64>) {
            self.last.store(current, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name("https://example.com/dl/tool_1.0_linux.tar.gz?token=x"),
            "tool_1.0_linux.tar.gz"
        );
        assert_eq!(file_name("https://example.com/"), "example.com");
        assert_eq!(file_name(""), "download");
    }

    #[test]
    fn test_verify_checksum() {
        let digest = hex::encode(Sha256::digest(b"abc"));
        assert!(verify_checksum(&format!("sha256:{digest}"), &digest).is_ok());
        assert!(verify_checksum(&digest.to_uppercase(), &digest).is_ok());
        assert!(matches!(
            verify_checksum("sha256:00", &digest),
            Err(Error::Checksum { .. })
        ));
        assert!(matches!(
            verify_checksum("md5:00", &digest),
            Err(Error::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_with_headers_and_progress() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/tool.tar.gz"))
            .and(header("x-custom", "yes"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let options = DownloadOptions {
            headers: BTreeMap::from([("x-custom".to_string(), "yes".to_string())]),
            progress: recorder.clone(),
            checksum: Some(format!("sha256:{}", hex::encode(Sha256::digest(b"payload")))),
            ..DownloadOptions::default()
        };

        let url = format!("{}/files/tool.tar.gz", server.uri());
        let file = fetch(&url, dir.path(), &options).await.unwrap();
        assert_eq!(file, dir.path().join("tool.tar.gz"));
        assert_eq!(std::fs::read(&file).unwrap(), b"payload");
        assert_eq!(recorder.last.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = fetch(
            &format!("{}/missing.zip", server.uri()),
            dir.path(),
            &DownloadOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Download { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_fetch_local_file() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("asset.bin");
        std::fs::write(&src, b"local").unwrap();

        let out = dir.path().join("out");
        let file = fetch(
            &format!("file://{}", src.display()),
            &out,
            &DownloadOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(std::fs::read(file).unwrap(), b"local");
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0_u8; 16])
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let options = DownloadOptions {
            timeout: Duration::from_millis(200),
            ..DownloadOptions::default()
        };
        let err = fetch(&format!("{}/slow.bin", server.uri()), dir.path(), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }
}
