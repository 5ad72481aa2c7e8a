//! Running manifest shell snippets.
//!
//! Pre/post commands and the `command` source join their lines into one
//! script run by `bash` (or `sh` when bash is unavailable). The tool's env
//! is layered over the process env for the child only.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::{Error, Result};

/// Interpreter used for snippets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shell {
    #[default]
    Bash,
    Sh,
}

impl Shell {
    /// Prefer bash when it is on PATH.
    #[must_use]
    pub fn detect() -> Self {
        if which::which("bash").is_ok() {
            Self::Bash
        } else {
            Self::Sh
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Sh => "sh",
        }
    }

    /// Script prologue controlling failure handling.
    #[must_use]
    pub const fn prologue(&self, allow_failure: bool) -> &'static str {
        match (self, allow_failure) {
            (_, true) => "set +e",
            (Self::Bash, false) => "set -e -o pipefail",
            (Self::Sh, false) => "set -e",
        }
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A script to run.
#[derive(Debug, Clone, Default)]
pub struct Script<'a> {
    pub commands: &'a [String],
    pub env: Option<&'a BTreeMap<String, String>>,
    pub allow_failure: bool,
    pub cwd: Option<&'a Path>,
}

/// Join commands behind the failure-handling prologue.
#[must_use]
pub fn build_script(shell: Shell, commands: &[String], allow_failure: bool) -> String {
    let mut script = String::from(shell.prologue(allow_failure));
    for command in commands {
        script.push('\n');
        script.push_str(command);
    }
    script
}

/// Run the script and return its combined output.
///
/// A non-zero exit status is an error unless `allow_failure` is set.
pub async fn run(script: &Script<'_>) -> Result<String> {
    if script.commands.is_empty() {
        return Ok(String::new());
    }

    let shell = Shell::detect();
    let body = build_script(shell, script.commands, script.allow_failure);
    debug!(%shell, lines = script.commands.len(), "Running shell commands");

    let mut command = Command::new(shell.name());
    command
        .arg("-c")
        .arg(&body)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(env) = script.env {
        command.envs(env);
    }
    if let Some(cwd) = script.cwd {
        command.current_dir(cwd);
    }

    let output = command.output().await.map_err(|e| {
        Error::tool_resolution(format!("Failed to run {}: {e}", shell.name()))
    })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    let combined = combined.trim_end().to_string();

    if !output.status.success() && !script.allow_failure {
        return Err(Error::install(format!(
            "command exited with {}: {combined}",
            output.status
        )));
    }
    Ok(combined)
}
