//! Detecting installed versions and comparing version strings.
//!
//! An executable is probed by running it with each configured argument list
//! (default `--version`, `-v`, `-version`, `version`) and applying each
//! pattern to the merged output. The first capture of the first match wins.

use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::unmarshal::OneOrMany;

/// Argument lists tried when none are configured.
pub const DEFAULT_COMMANDS: &[&str] = &["--version", "-v", "-version", "version"];

/// Patterns tried when none are configured.
pub const DEFAULT_PATTERNS: &[&str] = &[r".*?(\d+\.\d+\.\d+).*", r".*?(\d+\.\d+).*"];

/// Deadline for a single probe command.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Requested version of a tool, plus how to read it back from the binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionSpec {
    /// Requested version; empty means latest.
    #[serde(rename = "version", default, skip_serializing_if = "String::is_empty")]
    pub requested: String,
    /// Argument strings used to probe an installed binary.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: OneOrMany<String>,
    /// Regexes applied to probe output.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: OneOrMany<String>,
}

impl VersionSpec {
    #[must_use]
    pub fn new(requested: impl Into<String>) -> Self {
        Self {
            requested: requested.into(),
            ..Self::default()
        }
    }

    /// Configured commands, or the defaults.
    #[must_use]
    pub fn commands_or_default(&self) -> Vec<String> {
        if self.commands.is_empty() {
            DEFAULT_COMMANDS.iter().map(|c| (*c).to_string()).collect()
        } else {
            self.commands.to_vec()
        }
    }

    /// Configured patterns, or the defaults.
    #[must_use]
    pub fn patterns_or_default(&self) -> Vec<String> {
        if self.patterns.is_empty() {
            DEFAULT_PATTERNS.iter().map(|p| (*p).to_string()).collect()
        } else {
            self.patterns.to_vec()
        }
    }
}

impl From<String> for VersionSpec {
    fn from(requested: String) -> Self {
        Self::new(requested)
    }
}

/// Run `exe` with each command and parse a version from its output.
///
/// Returns `None` when no command produced a match.
pub async fn probe(exe: &Path, spec: &VersionSpec) -> Option<String> {
    let patterns = compile(&spec.patterns_or_default());
    if patterns.is_empty() {
        return None;
    }

    for command in spec.commands_or_default() {
        let Some(output) = run(exe, &command).await else {
            continue;
        };
        if let Some(version) = parse_output(&output, &patterns) {
            debug!(exe = %exe.display(), %command, %version, "Parsed installed version");
            return Some(version);
        }
    }
    None
}

/// Apply patterns in order to probe output.
#[must_use]
pub fn parse_output(output: &str, patterns: &[Regex]) -> Option<String> {
    let flattened = output.replace(['\r', '\n'], " ");
    patterns.iter().find_map(|re| {
        re.captures(&flattened)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Compile patterns, dropping (and logging) invalid ones.
#[must_use]
pub fn compile(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                debug!(pattern = %p, error = %e, "Ignoring invalid version pattern");
                None
            }
        })
        .collect()
}

async fn run(exe: &Path, command: &str) -> Option<String> {
    let Some(args) = shlex::split(command) else {
        debug!(%command, "Skipping version command with unbalanced quotes");
        return None;
    };
    let child = Command::new(exe)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(PROBE_TIMEOUT, child).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            trace!(exe = %exe.display(), %command, error = %e, "Probe failed to start");
            return None;
        }
        Err(_) => {
            debug!(exe = %exe.display(), %command, "Probe timed out");
            return None;
        }
    };

    let mut merged = String::from_utf8_lossy(&output.stdout).into_owned();
    merged.push(' ');
    merged.push_str(&String::from_utf8_lossy(&output.stderr));
    Some(merged)
}

/// Parse a version string leniently.
///
/// Strips any leading non-digit prefix (`v`, `go`, `release-`) and pads a
/// missing minor or patch component with zero.
#[must_use]
pub fn parse_semver(raw: &str) -> Option<Version> {
    let trimmed = raw
        .trim()
        .trim_start_matches(|c: char| !c.is_ascii_digit());
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }

    let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(split);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.parse::<u64>().is_err()) {
        return None;
    }
    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(rest);
    Version::parse(&padded).ok()
}

/// Whether two version strings denote the same version.
///
/// Versions that fail to parse are never equal.
#[must_use]
pub fn equal(a: &str, b: &str) -> bool {
    match (parse_semver(a), parse_semver(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
