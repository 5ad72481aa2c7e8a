//! Include/exclude tag filtering.

use crate::{Error, Result};

/// Tags selected on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl TagFilter {
    #[must_use]
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    /// Check a tool's tags (which already include its name).
    pub fn check(&self, tags: &[String]) -> Result<()> {
        let has = |wanted: &String| tags.iter().any(|t| t == wanted);

        if !self.include.is_empty() && !self.include.iter().any(has) {
            return Err(Error::DoesNotHaveTags {
                required: self.include.clone(),
            });
        }
        if self.exclude.iter().any(has) {
            return Err(Error::DoesHaveTags {
                excluded: self.exclude.clone(),
            });
        }
        Ok(())
    }
}
