use std::str::FromStr;

/// Operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Os {
    #[default]
    Unknown,
    Linux,
    Darwin,
    Windows,
    FreeBsd,
    NetBsd,
    OpenBsd,
    Android,
}

string_serde!(Os);

/// Aliases checked in order: `(os, substrings, tokens)`.
///
/// Substrings match anywhere in an asset name. Tokens are short enough to
/// occur inside unrelated words, so they only match when not flanked by
/// letters (`mac-arm64`, `win64` but not `docker-machine`, `pineapple`).
/// Darwin precedes windows so that `darwin` never reads as `win`; android
/// precedes linux.
const ALIASES: &[(Os, &[&str], &[&str])] = &[
    (Os::Darwin, &["darwin", "macos"], &["osx", "apple", "mac"]),
    (Os::Android, &["android"], &[]),
    (Os::Windows, &["windows"], &["win"]),
    (Os::Linux, &["linux"], &[]),
    (Os::FreeBsd, &["freebsd"], &[]),
    (Os::NetBsd, &["netbsd"], &[]),
    (Os::OpenBsd, &["openbsd"], &[]),
];

/// Whether `token` occurs in `haystack` without a letter on either side.
fn contains_token(haystack: &str, token: &str) -> bool {
    haystack.match_indices(token).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + token.len()..].chars().next();
        !before.is_some_and(char::is_alphabetic) && !after.is_some_and(char::is_alphabetic)
    })
}

impl Os {
    /// The OS this binary was compiled for.
    #[must_use]
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Self::Linux,
            "macos" => Self::Darwin,
            "windows" => Self::Windows,
            "freebsd" => Self::FreeBsd,
            "netbsd" => Self::NetBsd,
            "openbsd" => Self::OpenBsd,
            "android" => Self::Android,
            _ => Self::Unknown,
        }
    }

    /// Find the OS mentioned in a lowercased asset name.
    #[must_use]
    pub fn from_asset_name(lower: &str) -> Self {
        ALIASES
            .iter()
            .find(|(_, substrings, tokens)| {
                substrings.iter().any(|alias| lower.contains(alias))
                    || tokens.iter().any(|token| contains_token(lower, token))
            })
            .map_or(Self::Unknown, |(os, _, _)| *os)
    }

    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Types must match exactly; an unset side accepts anything.
    #[must_use]
    pub fn is_compatible_with(self, other: Self) -> bool {
        self.is_unknown() || other.is_unknown() || self == other
    }

    /// Suffix appended to executable names.
    #[must_use]
    pub const fn exe_extension(self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            _ => "",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "",
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Windows => "windows",
            Self::FreeBsd => "freebsd",
            Self::NetBsd => "netbsd",
            Self::OpenBsd => "openbsd",
            Self::Android => "android",
        }
    }
}

impl FromStr for Os {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if lower.is_empty() {
            return Ok(Self::Unknown);
        }
        ALIASES
            .iter()
            .find(|(_, substrings, tokens)| {
                substrings.contains(&lower.as_str()) || tokens.contains(&lower.as_str())
            })
            .map(|(os, _, _)| *os)
            .ok_or_else(|| format!("unknown operating system '{s}'"))
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_aliases() {
        assert_eq!("macos".parse::<Os>(), Ok(Os::Darwin));
        assert_eq!("Linux".parse::<Os>(), Ok(Os::Linux));
        assert_eq!("win".parse::<Os>(), Ok(Os::Windows));
        assert_eq!("".parse::<Os>(), Ok(Os::Unknown));
        assert!("plan9".parse::<Os>().is_err());
    }

    #[test]
    fn test_from_asset_name() {
        assert_eq!(Os::from_asset_name("tool-darwin-arm64"), Os::Darwin);
        assert_eq!(Os::from_asset_name("tool_windows_amd64.zip"), Os::Windows);
        assert_eq!(Os::from_asset_name("tool-aarch64-linux-android"), Os::Android);
        assert_eq!(Os::from_asset_name("tool.tar.gz"), Os::Unknown);
    }

    #[test]
    fn test_short_aliases_need_word_boundaries() {
        assert_eq!(
            Os::from_asset_name("docker-machine-linux-x86_64"),
            Os::Linux
        );
        assert_eq!(Os::from_asset_name("pineapple-linux-amd64"), Os::Linux);
        assert_eq!(Os::from_asset_name("tool-mac-arm64.zip"), Os::Darwin);
        assert_eq!(Os::from_asset_name("tool_x86_64-apple-darwin"), Os::Darwin);
        assert_eq!(Os::from_asset_name("tool_macosx_universal"), Os::Darwin);
        assert_eq!(Os::from_asset_name("tool-win64.zip"), Os::Windows);
        assert_eq!(Os::from_asset_name("twine-1.0"), Os::Unknown);
    }

    #[test]
    fn test_compatibility_is_type_equality() {
        assert!(Os::Linux.is_compatible_with(Os::Linux));
        assert!(!Os::Linux.is_compatible_with(Os::Darwin));
        assert!(Os::Linux.is_compatible_with(Os::Unknown));
    }
}
