use std::str::FromStr;

use super::Os;

/// Linux distribution family, as reported by `/etc/os-release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Distribution {
    #[default]
    Unknown,
    Debian,
    Ubuntu,
    Alpine,
    Fedora,
    Arch,
    CentOs,
    RedHat,
}

string_serde!(Distribution);

impl Distribution {
    /// Detect the running distribution; unset outside linux.
    #[must_use]
    pub fn current(os: Os) -> Self {
        if os != Os::Linux {
            return Self::Unknown;
        }
        sysinfo::System::distribution_id()
            .parse()
            .unwrap_or_default()
    }

    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    #[must_use]
    pub fn is_compatible_with(self, other: Self) -> bool {
        self.is_unknown() || other.is_unknown() || self == other
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "",
            Self::Debian => "debian",
            Self::Ubuntu => "ubuntu",
            Self::Alpine => "alpine",
            Self::Fedora => "fedora",
            Self::Arch => "arch",
            Self::CentOs => "centos",
            Self::RedHat => "rhel",
        }
    }
}

impl FromStr for Distribution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" => Ok(Self::Unknown),
            "debian" => Ok(Self::Debian),
            "ubuntu" => Ok(Self::Ubuntu),
            "alpine" => Ok(Self::Alpine),
            "fedora" => Ok(Self::Fedora),
            "arch" | "archlinux" => Ok(Self::Arch),
            "centos" => Ok(Self::CentOs),
            "rhel" | "redhat" => Ok(Self::RedHat),
            _ => Err(format!("unknown distribution '{s}'")),
        }
    }
}

impl std::fmt::Display for Distribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
