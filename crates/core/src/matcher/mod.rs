//! Scoring release assets against platform requirements.
//!
//! [`select`] filters assets by extension, scores every survivor against the
//! host platform and the configured hints, and picks the single best
//! qualified candidate. Ties are errors; there is no secondary ordering.

mod hint;

pub use hint::{Hint, HintType, MatchType};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::platform::Platform;

/// A downloadable artifact attached to a release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    #[serde(default, rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub size: u64,
}

impl Asset {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// What an asset must satisfy.
#[derive(Debug, Clone, Default)]
pub struct Requirements {
    pub platform: Platform,
    pub hints: Vec<Hint>,
}

/// An asset with its score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub score: i64,
    pub qualified: bool,
}

impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.qualified {
            write!(f, "  - {} (score {})", self.name, self.score)
        } else {
            write!(f, "  - {} (disqualified)", self.name)
        }
    }
}

/// Asset matching errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("no matches")]
    NoMatches,

    #[error("no qualified matches\n{}\n** check settings **", list(.candidates))]
    NoQualified { candidates: Vec<Candidate> },

    #[error("ambiguous matches found\n{}\n** try to tune weights **", list(.candidates))]
    Ambiguous { candidates: Vec<Candidate> },

    #[error("invalid hint pattern {pattern:?}: {message}")]
    InvalidHint { pattern: String, message: String },
}

fn list(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Select the single best asset.
pub fn select(
    assets: &[Asset],
    requirements: &Requirements,
    extensions: &[String],
) -> Result<Asset, MatchError> {
    let filtered: Vec<&Asset> = assets
        .iter()
        .filter(|a| extensions.is_empty() || extensions.iter().any(|e| has_extension(&a.name, e)))
        .collect();

    if filtered.is_empty() {
        debug!(
            assets = assets.len(),
            ?extensions,
            "No assets left after extension filter"
        );
        return Err(MatchError::NoMatches);
    }

    let mut scored = Vec::with_capacity(filtered.len());
    for asset in &filtered {
        scored.push(score(asset, requirements)?);
    }
    scored.sort_by(|a, b| {
        b.qualified
            .cmp(&a.qualified)
            .then(b.score.cmp(&a.score))
    });

    let Some(best) = scored.iter().filter(|c| c.qualified).map(|c| c.score).max() else {
        return Err(MatchError::NoQualified { candidates: scored });
    };

    let top: Vec<Candidate> = scored
        .iter()
        .filter(|c| c.qualified && c.score == best)
        .cloned()
        .collect();

    if top.len() > 1 {
        return Err(MatchError::Ambiguous { candidates: top });
    }

    let winner = &top[0].name;
    debug!(asset = %winner, score = best, "Selected asset");
    filtered
        .into_iter()
        .find(|a| &a.name == winner)
        .cloned()
        .ok_or(MatchError::NoMatches)
}

/// Score one asset.
pub fn score(asset: &Asset, requirements: &Requirements) -> Result<Candidate, MatchError> {
    let disqualified = || Candidate {
        name: asset.name.clone(),
        score: 0,
        qualified: false,
    };

    let mut total = 0_i64;
    for hint in &requirements.hints {
        let matched = hint.matches(&asset.name)?;
        match hint.match_type()? {
            MatchType::Required if !matched => return Ok(disqualified()),
            MatchType::Excluded if matched => return Ok(disqualified()),
            MatchType::Weighted if matched => total += hint.weight()?,
            _ => {}
        }
    }

    let parsed = Platform::parse(&asset.name);
    let Some(platform) = requirements.platform.score(&parsed) else {
        trace!(asset = %asset.name, parsed = %parsed, "Platform mismatch");
        return Ok(disqualified());
    };
    total += i64::from(platform);

    trace!(asset = %asset.name, score = total, "Scored asset");
    Ok(Candidate {
        name: asset.name.clone(),
        score: total,
        qualified: true,
    })
}

/// Compare a file name against an extension filter.
///
/// Filters with more than one dot are suffix matches; others compare with
/// the final dot-suffix of the name.
#[must_use]
pub fn has_extension(name: &str, filter: &str) -> bool {
    let name = name.to_lowercase();
    let mut filter = filter.trim().to_lowercase();
    if !filter.is_empty() && !filter.starts_with('.') {
        filter.insert(0, '.');
    }
    if filter.matches('.').count() > 1 {
        return name.ends_with(&filter);
    }
    final_extension(&name) == filter
}

fn final_extension(name: &str) -> &str {
    name.rfind('.').map_or("", |i| &name[i..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Arch, ArchType, Os};

    fn assets(names: &[&str]) -> Vec<Asset> {
        names.iter().map(|n| Asset::new(*n)).collect()
    }

    fn linux_amd64() -> Requirements {
        Requirements {
            platform: Platform::new(Os::Linux, Arch::new(ArchType::Amd64)),
            hints: Vec::new(),
        }
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension("tool.tar.gz", ".tar.gz"));
        assert!(has_extension("tool.tar.gz", ".gz"));
        assert!(!has_extension("tool.tar.gz", ".tar"));
        assert!(has_extension("tool.zip", "zip"));
        assert!(has_extension("tool", ""));
        assert!(!has_extension("tool.zip", ""));
    }

    #[test]
    fn test_extension_filter_empties_list() {
        let err = select(
            &assets(&["tool-linux-amd64.zip"]),
            &linux_amd64(),
            &[".tar.gz".to_string()],
        )
        .unwrap_err();
        assert_eq!(err, MatchError::NoMatches);
    }

    #[test]
    fn test_excluded_hint() {
        let mut req = linux_amd64();
        req.hints
            .push(Hint::new(".sbom", HintType::Contains).excluded());
        let picked = select(
            &assets(&["tool-linux-amd64.tar.gz.sbom", "tool-linux-amd64.tar.gz"]),
            &req,
            &[],
        )
        .unwrap();
        assert_eq!(picked.name, "tool-linux-amd64.tar.gz");
    }

    #[test]
    fn test_weighted_hint_breaks_tie() {
        let mut req = linux_amd64();
        req.hints
            .push(Hint::new(".tar.gz", HintType::EndsWith).with_weight(2));
        let picked = select(
            &assets(&["tool-linux-amd64.zip", "tool-linux-amd64.tar.gz"]),
            &req,
            &[],
        )
        .unwrap();
        assert_eq!(picked.name, "tool-linux-amd64.tar.gz");
    }

    #[test]
    fn test_messages_carry_hint_lines() {
        let err = select(&assets(&["a-darwin-arm64"]), &linux_amd64(), &[]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("no qualified matches"));
        assert!(msg.contains("a-darwin-arm64 (disqualified)"));
        assert!(msg.ends_with("** check settings **"));

        let err = select(
            &assets(&["a-linux-amd64.zip", "a-linux-amd64.tar.gz"]),
            &linux_amd64(),
            &[],
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("ambiguous matches found"));
        assert!(msg.ends_with("** try to tune weights **"));
    }
}
