//! The error type shared by every godyl crate.

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

use crate::matcher::MatchError;

/// Everything that can go wrong while resolving or installing a tool.
///
/// Some variants are not failures: see [`Error::is_skip`].
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Settings, flags or defaults are unusable
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(godyl::config::invalid),
        help("Check your godyl configuration and defaults file")
    )]
    Configuration {
        /// Error message
        message: String,
    },

    /// A manifest or defaults document could not be read
    #[error("Manifest error{}: {message}", path.as_ref().map_or(String::new(), |p| format!(" in {}", p.display())))]
    #[diagnostic(
        code(godyl::manifest::invalid),
        help("Unknown keys are rejected; check the spelling of every field")
    )]
    Manifest {
        /// File the document came from, if any
        path: Option<Box<Path>>,
        /// Error message
        message: String,
    },

    /// A resolved tool is not installable as configured
    #[error("invalid tool: {message}")]
    #[diagnostic(code(godyl::validation::failed))]
    Validation {
        /// Error message
        message: String,
    },

    /// A template string failed to render or parse
    #[error("Template error in {template:?}: {message}")]
    #[diagnostic(code(godyl::template::render))]
    Template {
        /// The template source text
        template: String,
        /// Error message
        message: String,
    },

    /// A skip condition evaluated to true
    #[error("skipped: {reason}")]
    #[diagnostic(code(godyl::skip::condition))]
    SkipCondition {
        /// Reason given in the manifest
        reason: String,
    },

    /// The include-tag filter did not match
    #[error("tool does not contain included tags: {}", required.join(", "))]
    #[diagnostic(code(godyl::skip::tags))]
    DoesNotHaveTags {
        /// Tags required by the run
        required: Vec<String>,
    },

    /// The exclude-tag filter matched
    #[error("tool contains excluded tags: {}", excluded.join(", "))]
    #[diagnostic(code(godyl::skip::tags))]
    DoesHaveTags {
        /// Tags excluded by the run
        excluded: Vec<String>,
    },

    /// Strategy `none` found an existing executable
    #[error("already exists: {}", path.display())]
    #[diagnostic(code(godyl::skip::exists))]
    AlreadyExists {
        /// Path of the existing executable
        path: Box<Path>,
    },

    /// Strategy `sync` found the target version installed
    #[error("already up to date: {version}")]
    #[diagnostic(code(godyl::skip::up_to_date))]
    UpToDate {
        /// The installed version
        version: String,
    },

    /// A source could not resolve the tool
    #[error("Tool resolution failed: {message}")]
    #[diagnostic(code(godyl::tool::resolution))]
    ToolResolution {
        /// Error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },

    /// Asset matching failed
    #[error(transparent)]
    #[diagnostic(code(godyl::matcher))]
    Matcher(#[from] MatchError),

    /// An HTTP request failed before producing a usable response
    #[error("HTTP request to {url} failed: {message}")]
    #[diagnostic(code(godyl::http::request))]
    Http {
        /// Requested URL
        url: String,
        /// Error message
        message: String,
    },

    /// A download did not complete
    #[error("Download of {url} failed: {message}")]
    #[diagnostic(
        code(godyl::download::failed),
        help("Check network access, the asset URL and any required token")
    )]
    Download {
        /// Requested URL
        url: String,
        /// Error message
        message: String,
    },

    /// The downloaded asset does not match the configured digest
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    #[diagnostic(code(godyl::download::checksum))]
    Checksum {
        /// Digest from the manifest
        expected: String,
        /// Digest of the downloaded file
        actual: String,
    },

    /// Placing the executable failed
    #[error("Installation failed: {message}")]
    #[diagnostic(code(godyl::install::failed))]
    Install {
        /// Error message
        message: String,
    },

    /// Filesystem failure
    #[error("cannot {operation}{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(godyl::io::error),
        help("The path may be missing or not writable by this user")
    )]
    Io {
        #[source]
        source: std::io::Error,
        path: Option<Box<Path>>,
        /// What was being attempted, e.g. "rename" or "create dir".
        operation: String,
    },

    /// The cache file or database is unreadable or unwritable
    #[error("cache: {message}")]
    #[diagnostic(code(godyl::cache::error))]
    Cache {
        /// Error message
        message: String,
    },

    /// A download exceeded `--timeout`
    #[error("timed out after {seconds}s")]
    #[diagnostic(code(godyl::timeout))]
    Timeout {
        /// Elapsed seconds
        seconds: u64,
    },

    /// The run was cancelled
    #[error("cancelled")]
    #[diagnostic(code(godyl::cancelled))]
    Cancelled,

    /// One or more tools failed during a processor run
    #[error("{count} tool(s) failed: {}", names.join(", "))]
    #[diagnostic(
        code(godyl::processor::failed),
        help("Re-run with --level debug for details on each failure")
    )]
    ToolsFailed {
        /// Number of failed tools
        count: usize,
        /// Names of the failed tools
        names: Vec<String>,
    },
}

impl Error {
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    #[must_use]
    pub fn manifest(path: Option<&Path>, msg: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.map(Into::into),
            message: msg.into(),
        }
    }

    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    #[must_use]
    pub fn template(template: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Template {
            template: template.into(),
            message: msg.into(),
        }
    }

    #[must_use]
    pub fn tool_resolution(msg: impl Into<String>) -> Self {
        Self::ToolResolution {
            message: msg.into(),
            help: None,
        }
    }

    #[must_use]
    pub fn tool_resolution_with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
        Self::ToolResolution {
            message: msg.into(),
            help: Some(help.into()),
        }
    }

    #[must_use]
    pub fn http(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Http {
            url: url.into(),
            message: msg.into(),
        }
    }

    #[must_use]
    pub fn download(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            message: msg.into(),
        }
    }

    #[must_use]
    pub fn install(msg: impl Into<String>) -> Self {
        Self::Install {
            message: msg.into(),
        }
    }

    #[must_use]
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache {
            message: msg.into(),
        }
    }

    /// Filesystem failure on `path`.
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    #[must_use]
    pub fn io_without_path(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: None,
            operation: operation.into(),
        }
    }

    /// Whether this error represents an expected skip rather than a failure.
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::SkipCondition { .. }
                | Self::DoesNotHaveTags { .. }
                | Self::DoesHaveTags { .. }
                | Self::AlreadyExists { .. }
                | Self::UpToDate { .. }
        )
    }

    /// Whether the resolution loop may move on to the next fallback source.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ToolResolution { .. }
                | Self::Matcher(_)
                | Self::Http { .. }
                | Self::Download { .. }
                | Self::Timeout { .. }
        )
    }

    /// Whether a successful cache record should still be written.
    #[must_use]
    pub const fn records_cache(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. } | Self::UpToDate { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::io_without_path(source, "complete I/O")
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map_or_else(String::new, |u| u.to_string());
        Self::Http {
            url,
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
