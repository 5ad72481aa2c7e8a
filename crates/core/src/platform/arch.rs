use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::Os;

/// Architecture family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArchType {
    #[default]
    Unknown,
    Amd64,
    I386,
    Arm64,
    Arm,
    Mips,
    Ppc64,
    Riscv64,
}

/// Substring aliases, checked in order. 64-bit names come first so that
/// `x86_64` is never read as `x86` and `arm64` never as `arm`.
const ALIASES: &[(ArchType, &[&str])] = &[
    (ArchType::Amd64, &["amd64", "x86_64", "x86-64", "x64", "win64"]),
    (ArchType::Arm64, &["arm64", "aarch64", "armv8"]),
    (ArchType::I386, &["i386", "i686", "386", "686", "x86", "win32"]),
    (
        ArchType::Arm,
        &["armv7", "armv6", "armv5", "armhf", "armel", "arm"],
    ),
    (ArchType::Mips, &["mips"]),
    (ArchType::Ppc64, &["ppc64"]),
    (ArchType::Riscv64, &["riscv64"]),
];

static ARM_VERSION: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"armv(\d)").ok());

impl ArchType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "",
            Self::Amd64 => "amd64",
            Self::I386 => "386",
            Self::Arm64 => "arm64",
            Self::Arm => "arm",
            Self::Mips => "mips",
            Self::Ppc64 => "ppc64",
            Self::Riscv64 => "riscv64",
        }
    }
}

impl std::fmt::Display for ArchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CPU architecture with an optional ARM version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Arch {
    pub kind: ArchType,
    pub version: Option<u8>,
}

string_serde!(Arch);

impl Arch {
    #[must_use]
    pub const fn new(kind: ArchType) -> Self {
        Self {
            kind,
            version: None,
        }
    }

    #[must_use]
    pub const fn with_version(kind: ArchType, version: u8) -> Self {
        Self {
            kind,
            version: Some(version),
        }
    }

    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self.kind, ArchType::Unknown)
    }

    /// Detect the host architecture.
    ///
    /// Uses the kernel-reported architecture and, on linux, downgrades to the
    /// 32-bit family when the user-land is 32-bit.
    #[must_use]
    pub fn current(os: Os) -> Self {
        let kernel = sysinfo::System::cpu_arch();
        let mut arch = Self::from_asset_name(&kernel.to_lowercase());
        if arch.is_unknown() {
            arch = Self::from_asset_name(std::env::consts::ARCH);
        }

        if os == Os::Linux && userland_bits() == Some(32) {
            arch = match arch.kind {
                ArchType::Amd64 => Self::new(ArchType::I386),
                ArchType::Arm64 => Self::with_version(ArchType::Arm, 7),
                _ => arch,
            };
        }

        if arch.kind == ArchType::Arm && arch.version.is_none() {
            arch.version = Some(7);
        }
        arch
    }

    /// Find the architecture mentioned in a lowercased asset name.
    #[must_use]
    pub fn from_asset_name(lower: &str) -> Self {
        let Some(kind) = ALIASES
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|alias| lower.contains(alias)))
            .map(|(kind, _)| *kind)
        else {
            return Self::default();
        };

        let version = if kind == ArchType::Arm {
            arm_version(lower)
        } else {
            None
        };
        Self { kind, version }
    }

    /// Whether an asset built for `other` runs on `self`.
    #[must_use]
    pub fn is_compatible_with(&self, other: &Self, os: Os) -> bool {
        self.score(other, os).is_some()
    }

    /// Score an asset architecture against this requirement.
    ///
    /// `None` disqualifies the asset.
    #[must_use]
    pub fn score(&self, other: &Self, os: Os) -> Option<i32> {
        if self.is_unknown() || other.is_unknown() {
            return Some(0);
        }

        if self.kind == other.kind {
            if self.kind != ArchType::Arm {
                return Some(1);
            }
            return match (self.version, other.version) {
                (Some(host), Some(asset)) if asset > host => None,
                (Some(host), Some(asset)) if asset == host => Some(2),
                _ => Some(1),
            };
        }

        if os == Os::Windows && self.kind == ArchType::Amd64 && other.kind == ArchType::I386 {
            return Some(-1);
        }

        None
    }
}

fn arm_version(lower: &str) -> Option<u8> {
    if let Some(captures) = ARM_VERSION.as_ref().and_then(|re| re.captures(lower))
        && let Some(version) = captures.get(1)
    {
        return version.as_str().parse().ok();
    }
    if lower.contains("armhf") {
        return Some(7);
    }
    if lower.contains("armel") {
        return Some(5);
    }
    None
}

/// Bit width of the user-land, via `getconf LONG_BIT`.
fn userland_bits() -> Option<u32> {
    let output = std::process::Command::new("getconf")
        .arg("LONG_BIT")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let bits = String::from_utf8_lossy(&output.stdout).trim().parse().ok();
    debug!(?bits, "Detected user-land bit width");
    bits
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if lower.is_empty() {
            return Ok(Self::default());
        }
        let arch = Self::from_asset_name(&lower);
        if arch.is_unknown() {
            return Err(format!("unknown architecture '{s}'"));
        }
        Ok(arch)
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.kind, self.version) {
            (ArchType::Arm, Some(version)) => write!(f, "armv{version}"),
            (kind, _) => f.write_str(kind.as_str()),
        }
    }
}
