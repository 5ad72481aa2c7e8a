//! Command-line surface: arguments, exit codes and error rendering.

use crate::logging::LogLevel;
use clap::{Args, Parser, Subcommand};
use godyl_core::cache::CacheType;
use godyl_core::tool::Strategy;
use miette::{Diagnostic, Report};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Every tool succeeded or was skipped.
pub const EXIT_OK: i32 = 0;
/// At least one tool failed, or the run hit an unexpected error.
pub const EXIT_FAILED: i32 = 1;
/// Bad flags, config, defaults or manifest.
pub const EXIT_CLI: i32 = 2;

/// Errors surfaced to the user, grouped by exit code.
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// The invocation or its input files are wrong.
    #[error("{message}")]
    #[diagnostic(code(godyl::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },
    /// Tools were processed and some failed.
    #[error("{message}")]
    #[diagnostic(code(godyl::failed))]
    Failed {
        message: String,
        #[help]
        help: Option<String>,
    },
    #[error("{message}")]
    #[diagnostic(code(godyl::error))]
    Other {
        message: String,
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            help: None,
        }
    }

    #[must_use]
    pub fn other_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Short machine-readable tag used in JSON output.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Failed { .. } => "failed",
            Self::Other { .. } => "error",
        }
    }
}

impl From<godyl_core::Error> for CliError {
    fn from(err: godyl_core::Error) -> Self {
        use godyl_core::Error;

        match err {
            Error::Configuration { message } => {
                Self::config_with_help(message, "Check your godyl flags, config file and defaults")
            }
            Error::Manifest { .. } | Error::Template { .. } => Self::config_with_help(
                err.to_string(),
                "Unknown keys are rejected; check the spelling of every field",
            ),
            Error::Validation { .. } => Self::config(err.to_string()),
            Error::ToolsFailed { count, names } => Self::Failed {
                message: format!("{count} tool(s) failed: {}", names.join(", ")),
                help: Some("Re-run with --level debug for details".to_string()),
            },
            Error::ToolResolution { message, help } => Self::Other { message, help },
            Error::Io { .. } => Self::other_with_help(
                err.to_string(),
                "The path may be missing or not writable by this user",
            ),
            other => Self::other(other.to_string()),
        }
    }
}

#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Failed { .. } | CliError::Other { .. } => EXIT_FAILED,
    }
}

/// Print `err` as a JSON envelope on stdout, or as a miette report on stderr.
#[allow(clippy::print_stdout, clippy::print_stderr)]
pub fn render_error(err: &CliError, json: bool) {
    if !json {
        eprintln!("{:?}", Report::new(err.clone()));
        let _ = io::stderr().flush();
        return;
    }

    let envelope = ErrorEnvelope::new(serde_json::json!({
        "code": err.code(),
        "message": err.to_string(),
    }));
    match serde_json::to_string(&envelope) {
        Ok(line) => println!("{line}"),
        Err(e) => eprintln!("cannot encode error as JSON: {e}"),
    }
}

/// `{"status": "ok", "data": ...}`
#[derive(Debug, Clone, Serialize)]
pub struct OkEnvelope<T> {
    pub status: &'static str,
    pub data: T,
}

impl<T> OkEnvelope<T> {
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// `{"status": "error", "error": ...}`
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope<E> {
    pub status: &'static str,
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Batch installer for statically compiled CLI tools.
///
/// Reads a YAML manifest of tools, resolves each against GitHub, GitLab,
/// plain URLs, `go install` or shell recipes, and installs the matching
/// executables for this machine.
#[derive(Parser, Debug)]
#[command(name = "godyl")]
#[command(about = "Batch installer for statically compiled CLI tools")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log verbosity; `RUST_LOG` overrides it.
    #[arg(
        short = 'L',
        long,
        global = true,
        env = "GODYL_LEVEL",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    /// Emit JSON logs and JSON result envelopes.
    #[arg(long, global = true, env = "GODYL_JSON")]
    pub json: bool,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

/// Flags shared by every command. Unset values fall back to the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct SettingsArgs {
    /// Config file (default: <config dir>/config.yml).
    #[arg(short = 'c', long, global = true, env = "GODYL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Defaults file (default: <config dir>/defaults.yml, else built in).
    #[arg(short = 'd', long, global = true, env = "GODYL_DEFAULTS")]
    pub defaults: Option<PathBuf>,

    /// Directory holding the installed-tool cache.
    #[arg(long, global = true, env = "GODYL_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Cache backend.
    #[arg(long, global = true, env = "GODYL_CACHE_TYPE", value_parser = parse_cache_type)]
    pub cache_type: Option<CacheType>,

    /// Tools processed at once; 0 is unbounded.
    #[arg(short = 'j', long, global = true, env = "GODYL_PARALLEL")]
    pub parallel: Option<usize>,

    /// Directory executables are installed into.
    #[arg(short = 'o', long, global = true, env = "GODYL_OUTPUT")]
    pub output: Option<String>,

    /// Installation strategy: none, sync or force.
    #[arg(short = 's', long, global = true, env = "GODYL_STRATEGY", value_parser = parse_strategy)]
    pub strategy: Option<Strategy>,

    /// Only process tools carrying one of these tags.
    #[arg(
        short = 't',
        long,
        global = true,
        env = "GODYL_TAGS",
        value_delimiter = ','
    )]
    pub tags: Vec<String>,

    /// Skip tools carrying any of these tags.
    #[arg(long, global = true, env = "GODYL_EXCLUDE_TAGS", value_delimiter = ',')]
    pub exclude_tags: Vec<String>,

    /// Skip TLS certificate verification.
    #[arg(short = 'k', long, global = true, env = "GODYL_NO_VERIFY_SSL")]
    pub no_verify_ssl: bool,

    /// Do not read or write the cache.
    #[arg(long, global = true, env = "GODYL_NO_CACHE")]
    pub no_cache: bool,

    /// GitHub token (also read from GITHUB_TOKEN and GH_TOKEN).
    #[arg(long, global = true, env = "GODYL_GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// GitLab token (also read from GITLAB_TOKEN and CI_JOB_TOKEN).
    #[arg(long, global = true, env = "GODYL_GITLAB_TOKEN", hide_env_values = true)]
    pub gitlab_token: Option<String>,

    /// Bearer token for URL sources (also read from URL_TOKEN).
    #[arg(long, global = true, env = "GODYL_URL_TOKEN", hide_env_values = true)]
    pub url_token: Option<String>,

    /// Deadline per download, e.g. `90s`, `10m` or `1h`.
    #[arg(long, global = true, env = "GODYL_TIMEOUT", value_parser = crate::config::parse_duration)]
    pub timeout: Option<std::time::Duration>,
}

fn parse_cache_type(s: &str) -> Result<CacheType, String> {
    s.parse().map_err(|e: godyl_core::Error| e.to_string())
}

fn parse_strategy(s: &str) -> Result<Strategy, String> {
    s.parse().map_err(|e: godyl_core::Error| e.to_string())
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install every tool in the given manifests.
    Install {
        /// Manifest files; `-` reads stdin.
        #[arg(default_value = "tools.yml")]
        files: Vec<PathBuf>,
    },
    /// Install tools named on the command line.
    ///
    /// `owner/repo` installs from GitHub releases, an http(s) URL downloads
    /// that file directly.
    Download {
        /// `owner/repo` or URL specs.
        #[arg(required = true)]
        specs: Vec<String>,
    },
    /// Print effective data as YAML.
    Dump {
        #[command(subcommand)]
        what: DumpCommands,
    },
    /// Inspect and maintain the installed-tool cache.
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },
    /// Report which manifest tools are installed and at what version.
    Status {
        /// Manifest files; `-` reads stdin.
        #[arg(default_value = "tools.yml")]
        files: Vec<PathBuf>,
    },
    /// Print the godyl version and detected host platform.
    Version,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum DumpCommands {
    /// Effective settings after merging flags, env and the config file.
    Config,
    /// The defaults groups in use.
    Defaults,
    /// Environment passed to templates and shell snippets.
    Env,
    /// Detected host platform.
    Platform,
    /// Manifest tools with defaults applied.
    Tools {
        #[arg(default_value = "tools.yml")]
        files: Vec<PathBuf>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CacheCommands {
    /// Print the cache location.
    Path,
    /// Drop entries whose executable is gone and refresh versions.
    Clean,
    /// Remove entries by tool name or id; all entries when none are given.
    Remove { names: Vec<String> },
}

/// Parse the process arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
