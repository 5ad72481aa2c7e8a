use std::str::FromStr;

use super::{Distribution, Os};

/// C runtime library an executable links against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Library {
    #[default]
    Unknown,
    Gnu,
    Musl,
    Msvc,
    Android,
}

string_serde!(Library);

const ALIASES: &[(Library, &[&str])] = &[
    (Library::Musl, &["musl"]),
    (Library::Gnu, &["gnu", "glibc"]),
    (Library::Msvc, &["msvc"]),
    (Library::Android, &["android"]),
];

impl Library {
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Default library for a host.
    #[must_use]
    pub const fn default_for(os: Os, distribution: Distribution) -> Self {
        match (os, distribution) {
            (Os::Windows, _) => Self::Msvc,
            (Os::Android, _) => Self::Android,
            (Os::Linux, Distribution::Alpine) => Self::Musl,
            (Os::Linux, _) => Self::Gnu,
            _ => Self::Unknown,
        }
    }

    /// Find the library mentioned in a lowercased asset name.
    #[must_use]
    pub fn from_asset_name(lower: &str) -> Self {
        ALIASES
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|alias| lower.contains(alias)))
            .map_or(Self::Unknown, |(library, _)| *library)
    }

    /// Whether a binary linked against `other` can run with `self`.
    ///
    /// On linux gnu and musl accept each other; an msvc host accepts gnu.
    #[must_use]
    pub fn is_compatible_with(self, other: Self, os: Os) -> bool {
        if self.is_unknown() || other.is_unknown() || self == other {
            return true;
        }
        matches!(
            (self, other, os),
            (Self::Gnu, Self::Musl, Os::Linux)
                | (Self::Musl, Self::Gnu, Os::Linux)
                | (Self::Msvc, Self::Gnu, _)
        )
    }

    /// Score an asset library: +1 exact, 0 compatible or unset, -1 otherwise.
    #[must_use]
    pub fn score(self, other: Self, os: Os) -> i32 {
        if self.is_unknown() || other.is_unknown() {
            return 0;
        }
        if self == other {
            return 1;
        }
        if self.is_compatible_with(other, os) {
            0
        } else {
            -1
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "",
            Self::Gnu => "gnu",
            Self::Musl => "musl",
            Self::Msvc => "msvc",
            Self::Android => "android",
        }
    }
}

impl FromStr for Library {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if lower.is_empty() {
            return Ok(Self::Unknown);
        }
        ALIASES
            .iter()
            .find(|(_, aliases)| aliases.contains(&lower.as_str()))
            .map(|(library, _)| *library)
            .ok_or_else(|| format!("unknown library '{s}'"))
    }
}

impl std::fmt::Display for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_for() {
        assert_eq!(
            Library::default_for(Os::Linux, Distribution::Ubuntu),
            Library::Gnu
        );
        assert_eq!(
            Library::default_for(Os::Linux, Distribution::Alpine),
            Library::Musl
        );
        assert_eq!(
            Library::default_for(Os::Windows, Distribution::Unknown),
            Library::Msvc
        );
        assert_eq!(
            Library::default_for(Os::Darwin, Distribution::Unknown),
            Library::Unknown
        );
    }

    #[test]
    fn test_compatibility_is_not_symmetric() {
        assert!(Library::Msvc.is_compatible_with(Library::Gnu, Os::Windows));
        assert!(!Library::Gnu.is_compatible_with(Library::Msvc, Os::Windows));
        assert!(Library::Musl.is_compatible_with(Library::Gnu, Os::Linux));
    }

    #[test]
    fn test_score() {
        assert_eq!(Library::Gnu.score(Library::Gnu, Os::Linux), 1);
        assert_eq!(Library::Gnu.score(Library::Musl, Os::Linux), 0);
        assert_eq!(Library::Gnu.score(Library::Msvc, Os::Linux), -1);
        assert_eq!(Library::Gnu.score(Library::Unknown, Os::Linux), 0);
    }
}
