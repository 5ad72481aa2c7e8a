//! Layered settings.
//!
//! Each value comes from the first layer that sets it:
//!
//! 1. command-line flags
//! 2. `GODYL_*` environment variables (handled by clap)
//! 3. the well-known token variables (`GITHUB_TOKEN`, `GH_TOKEN`, ...)
//! 4. the YAML config file
//! 5. built-in values
//!
//! The resulting [`Settings`] also produce the flag overrides applied on
//! top of every defaults group.

use godyl_core::cache::CacheType;
use godyl_core::download::DEFAULT_TIMEOUT;
use godyl_core::paths;
use godyl_core::tool::{DefaultsSet, Strategy, Tool};
use godyl_core::{Error, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::cli::SettingsArgs;

/// Defaults shipped inside the binary, used when no defaults file exists.
pub const EMBEDDED_DEFAULTS: &str = include_str!("defaults.yml");

/// Contents of the optional config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub defaults: Option<String>,
    pub cache_dir: Option<String>,
    pub cache_type: Option<CacheType>,
    pub parallel: Option<usize>,
    pub output: Option<String>,
    pub strategy: Option<Strategy>,
    pub tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub no_verify_ssl: Option<bool>,
    pub no_cache: Option<bool>,
    pub github_token: Option<String>,
    pub gitlab_token: Option<String>,
    pub url_token: Option<String>,
    pub timeout: Option<String>,
}

impl FileConfig {
    /// Read a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text).map_err(|e| Error::manifest(Some(path), e.to_string()))
    }
}

/// Effective settings for one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// Config file that was read, if any.
    pub config_file: Option<PathBuf>,
    /// Explicit defaults file; `None` means the config-dir file or the
    /// embedded defaults.
    pub defaults: Option<PathBuf>,
    pub cache_dir: PathBuf,
    pub cache_type: CacheType,
    pub parallel: usize,
    pub output: String,
    pub strategy: Option<Strategy>,
    pub tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub no_verify_ssl: bool,
    pub no_cache: bool,
    #[serde(serialize_with = "mask")]
    pub github_token: String,
    #[serde(serialize_with = "mask")]
    pub gitlab_token: String,
    #[serde(serialize_with = "mask")]
    pub url_token: String,
    #[serde(serialize_with = "seconds")]
    pub timeout: Duration,
}

fn mask<S: Serializer>(token: &str, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(if token.is_empty() { "" } else { "***" })
}

fn seconds<S: Serializer>(timeout: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{}s", timeout.as_secs()))
}

/// First non-empty value of the named environment variables.
fn env_token(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.is_empty())
}

impl Settings {
    /// Merge flags, environment and the config file.
    pub fn resolve(args: &SettingsArgs) -> Result<Self> {
        let (config_file, file) = match &args.config {
            Some(path) => {
                if !path.is_file() {
                    return Err(Error::configuration(format!(
                        "config file {} does not exist",
                        path.display()
                    )));
                }
                (Some(path.clone()), FileConfig::load(path)?)
            }
            None => {
                let path = paths::config_file()?;
                if path.is_file() {
                    let file = FileConfig::load(&path)?;
                    (Some(path), file)
                } else {
                    (None, FileConfig::default())
                }
            }
        };
        if let Some(path) = &config_file {
            debug!(path = %path.display(), "Loaded config file");
        }

        let cache_dir = match (&args.cache_dir, &file.cache_dir) {
            (Some(dir), _) => dir.clone(),
            (None, Some(dir)) => paths::expand_home(dir),
            (None, None) => paths::cache_dir()?,
        };

        let timeout = match (args.timeout, &file.timeout) {
            (Some(timeout), _) => timeout,
            (None, Some(raw)) => parse_duration(raw).map_err(Error::configuration)?,
            (None, None) => DEFAULT_TIMEOUT,
        };

        let or_file = |flag: &[String], file: &[String]| {
            if flag.is_empty() {
                file.to_vec()
            } else {
                flag.to_vec()
            }
        };

        Ok(Self {
            config_file,
            defaults: args
                .defaults
                .clone()
                .or_else(|| file.defaults.as_deref().map(paths::expand_home)),
            cache_dir,
            cache_type: args.cache_type.or(file.cache_type).unwrap_or_default(),
            parallel: args.parallel.or(file.parallel).unwrap_or(0),
            output: args.output.clone().or(file.output).unwrap_or_default(),
            strategy: args.strategy.or(file.strategy),
            tags: or_file(&args.tags, &file.tags),
            exclude_tags: or_file(&args.exclude_tags, &file.exclude_tags),
            no_verify_ssl: args.no_verify_ssl || file.no_verify_ssl.unwrap_or(false),
            no_cache: args.no_cache || file.no_cache.unwrap_or(false),
            github_token: args
                .github_token
                .clone()
                .or_else(|| env_token(&["GITHUB_TOKEN", "GH_TOKEN"]))
                .or(file.github_token)
                .unwrap_or_default(),
            gitlab_token: args
                .gitlab_token
                .clone()
                .or_else(|| env_token(&["GITLAB_TOKEN", "CI_JOB_TOKEN"]))
                .or(file.gitlab_token)
                .unwrap_or_default(),
            url_token: args
                .url_token
                .clone()
                .or_else(|| env_token(&["URL_TOKEN"]))
                .or(file.url_token)
                .unwrap_or_default(),
            timeout,
        })
    }

    /// Tool fields the settings force onto every defaults group.
    #[must_use]
    pub fn overrides(&self) -> Tool {
        let mut tool = Tool::default();
        tool.output.clone_from(&self.output);
        tool.strategy = self.strategy;
        tool.no_verify_ssl = self.no_verify_ssl;
        tool.no_cache = self.no_cache;
        tool.source.github.token.clone_from(&self.github_token);
        tool.source.gitlab.token.clone_from(&self.gitlab_token);
        tool.source.url.token.clone_from(&self.url_token);
        tool
    }

    /// Load the defaults groups and apply the flag overrides.
    ///
    /// Order: the explicit defaults file, `<config dir>/defaults.yml`, then
    /// the embedded defaults.
    pub fn load_defaults(&self) -> Result<DefaultsSet> {
        let mut defaults = match &self.defaults {
            Some(path) => DefaultsSet::load(path)?,
            None => {
                let path = paths::config_dir()?.join("defaults.yml");
                if path.is_file() {
                    DefaultsSet::load(&path)?
                } else {
                    debug!("Using embedded defaults");
                    DefaultsSet::from_yaml(EMBEDDED_DEFAULTS, None)?
                }
            }
        };
        defaults.apply_overrides(&self.overrides());
        Ok(defaults)
    }
}

/// Parse `90`, `90s`, `10m` or `1h` into a duration.
pub fn parse_duration(raw: &str) -> std::result::Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration '{raw}', expected e.g. 90s, 10m or 1h"))?;
    let multiplier = match unit.trim() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        other => return Err(format!("invalid duration unit '{other}' in '{raw}'")),
    };
    Ok(Duration::from_secs(value * multiplier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TOKEN_VARS: [&str; 5] = [
        "GITHUB_TOKEN",
        "GH_TOKEN",
        "GITLAB_TOKEN",
        "CI_JOB_TOKEN",
        "URL_TOKEN",
    ];

    fn with_clean_env<F: FnOnce(&Path)>(f: F) {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join("config");
        std::fs::create_dir_all(&config_dir).unwrap();
        let mut vars: Vec<(&str, Option<String>)> =
            TOKEN_VARS.iter().map(|name| (*name, None)).collect();
        vars.push((
            "GODYL_CONFIG_DIR",
            Some(config_dir.display().to_string()),
        ));
        vars.push((
            "GODYL_CACHE_DIR",
            Some(dir.path().join("cache").display().to_string()),
        ));
        temp_env::with_vars(vars, || f(&config_dir));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("5d").is_err());
    }

    #[test]
    fn test_builtin_values() {
        with_clean_env(|config_dir| {
            let settings = Settings::resolve(&SettingsArgs::default()).unwrap();
            assert!(settings.config_file.is_none());
            assert_eq!(settings.parallel, 0);
            assert_eq!(settings.cache_type, CacheType::File);
            assert_eq!(settings.timeout, DEFAULT_TIMEOUT);
            assert!(settings.github_token.is_empty());
            assert!(settings.cache_dir.ends_with("cache"));
            assert!(!config_dir.join("config.yml").exists());
        });
    }

    #[test]
    fn test_config_file_below_flags() {
        with_clean_env(|config_dir| {
            std::fs::write(
                config_dir.join("config.yml"),
                "parallel: 2\noutput: /opt/bin\nstrategy: sync\ntags: [cli]\ntimeout: 5m\ngithub_token: from-file\n",
            )
            .unwrap();

            let settings = Settings::resolve(&SettingsArgs::default()).unwrap();
            assert_eq!(settings.parallel, 2);
            assert_eq!(settings.output, "/opt/bin");
            assert_eq!(settings.strategy, Some(Strategy::Sync));
            assert_eq!(settings.tags, vec!["cli"]);
            assert_eq!(settings.timeout, Duration::from_secs(300));
            assert_eq!(settings.github_token, "from-file");

            let args = SettingsArgs {
                parallel: Some(8),
                tags: vec!["dev".into()],
                ..SettingsArgs::default()
            };
            let settings = Settings::resolve(&args).unwrap();
            assert_eq!(settings.parallel, 8);
            assert_eq!(settings.tags, vec!["dev"]);
            assert_eq!(settings.output, "/opt/bin");
        });
    }

    #[test]
    fn test_token_env_beats_config_file() {
        with_clean_env(|config_dir| {
            std::fs::write(config_dir.join("config.yml"), "github_token: from-file\n").unwrap();
            temp_env::with_var("GH_TOKEN", Some("from-gh"), || {
                let settings = Settings::resolve(&SettingsArgs::default()).unwrap();
                assert_eq!(settings.github_token, "from-gh");
            });
            temp_env::with_var("CI_JOB_TOKEN", Some("ci"), || {
                let settings = Settings::resolve(&SettingsArgs::default()).unwrap();
                assert_eq!(settings.gitlab_token, "ci");
            });
        });
    }

    #[test]
    fn test_unknown_config_key_is_rejected() {
        with_clean_env(|config_dir| {
            std::fs::write(config_dir.join("config.yml"), "paralel: 2\n").unwrap();
            let err = Settings::resolve(&SettingsArgs::default()).unwrap_err();
            assert!(matches!(err, Error::Manifest { .. }));
        });
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        with_clean_env(|config_dir| {
            let args = SettingsArgs {
                config: Some(config_dir.join("nope.yml")),
                ..SettingsArgs::default()
            };
            let err = Settings::resolve(&args).unwrap_err();
            assert!(matches!(err, Error::Configuration { .. }));
        });
    }

    #[test]
    fn test_defaults_with_overrides() {
        with_clean_env(|_| {
            let args = SettingsArgs {
                output: Some("/tmp/godyl-bin".into()),
                strategy: Some(Strategy::Force),
                github_token: Some("abc".into()),
                ..SettingsArgs::default()
            };
            let settings = Settings::resolve(&args).unwrap();
            let defaults = settings.load_defaults().unwrap();
            let group = defaults.get("default").unwrap();
            assert_eq!(group.output, "/tmp/godyl-bin");
            assert_eq!(group.strategy, Some(Strategy::Force));
            assert_eq!(group.source.github.token, "abc");

            let mut tool = Tool::named("owner/repo");
            tool.output = "/usr/local/bin".into();
            defaults.apply(&mut tool).unwrap();
            assert_eq!(tool.output, "/usr/local/bin");
            assert_eq!(tool.source.github.token, "abc");
        });
    }

    #[test]
    fn test_tokens_are_masked_in_dump() {
        with_clean_env(|_| {
            let args = SettingsArgs {
                github_token: Some("secret".into()),
                ..SettingsArgs::default()
            };
            let settings = Settings::resolve(&args).unwrap();
            let yaml = serde_yaml::to_string(&settings).unwrap();
            assert!(!yaml.contains("secret"));
            assert!(yaml.contains("***"));
        });
    }
}
