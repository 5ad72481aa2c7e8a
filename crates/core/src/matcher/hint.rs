use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::MatchError;
use crate::template::Template;

/// How a hint pattern is compared with an asset name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HintType {
    Glob,
    Globstar,
    Regex,
    #[serde(alias = "starts_with")]
    StartsWith,
    #[serde(alias = "ends_with")]
    EndsWith,
    #[default]
    Contains,
}

/// What a matching hint does to an asset's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Add the hint's weight on match.
    #[default]
    Weighted,
    /// Disqualify assets that do not match.
    Required,
    /// Disqualify assets that match.
    Excluded,
}

impl FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "weighted" => Ok(Self::Weighted),
            "required" => Ok(Self::Required),
            "excluded" => Ok(Self::Excluded),
            other => Err(format!("unknown match type '{other}'")),
        }
    }
}

/// A pattern that nudges or constrains asset selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Hint {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Template::is_unset")]
    pub weight: Template<i64>,
    #[serde(default, rename = "type")]
    pub kind: HintType,
    #[serde(default, rename = "match", skip_serializing_if = "Template::is_unset")]
    pub matching: Template<MatchType>,
}

impl Hint {
    #[must_use]
    pub fn new(pattern: impl Into<String>, kind: HintType) -> Self {
        Self {
            pattern: pattern.into(),
            kind,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.matching = Template::new("required");
        self
    }

    #[must_use]
    pub fn excluded(mut self) -> Self {
        self.matching = Template::new("excluded");
        self
    }

    #[must_use]
    pub fn with_weight(mut self, weight: i64) -> Self {
        self.weight = Template::new(weight.to_string());
        self
    }

    /// Rendered weight, the literal weight, or 1 when unset.
    ///
    /// A literal that is not an integer is an error; a template that
    /// rendered empty counts as unset.
    pub fn weight(&self) -> Result<i64, MatchError> {
        if let Some(weight) = self.weight.get() {
            return Ok(*weight);
        }
        let source = self.weight.source().trim();
        if source.is_empty() || source.contains("{{") {
            return Ok(1);
        }
        source.parse().map_err(|e| MatchError::InvalidHint {
            pattern: self.pattern.clone(),
            message: format!("weight {source:?}: {e}"),
        })
    }

    /// Rendered match kind, the literal kind, or weighted when unset.
    pub fn match_type(&self) -> Result<MatchType, MatchError> {
        if let Some(kind) = self.matching.get() {
            return Ok(*kind);
        }
        let source = self.matching.source().trim();
        if source.contains("{{") {
            return Ok(MatchType::Weighted);
        }
        source.parse().map_err(|message| MatchError::InvalidHint {
            pattern: self.pattern.clone(),
            message,
        })
    }

    /// Whether `name` matches this hint's pattern.
    pub fn matches(&self, name: &str) -> Result<bool, MatchError> {
        let invalid = |message: String| MatchError::InvalidHint {
            pattern: self.pattern.clone(),
            message,
        };
        Ok(match self.kind {
            HintType::Glob => glob::Pattern::new(&self.pattern)
                .map_err(|e| invalid(e.to_string()))?
                .matches(name),
            HintType::Globstar => globset::Glob::new(&self.pattern)
                .map_err(|e| invalid(e.to_string()))?
                .compile_matcher()
                .is_match(name),
            HintType::Regex => Regex::new(&self.pattern)
                .map_err(|e| invalid(e.to_string()))?
                .is_match(name),
            HintType::StartsWith => name.starts_with(&self.pattern),
            HintType::EndsWith => name.ends_with(&self.pattern),
            HintType::Contains => name.contains(&self.pattern),
        })
    }
}
