//! Host platform detection and asset-name parsing.
//!
//! A [`Platform`] describes either the host (via [`Platform::detect`]) or the
//! platform an asset was built for (via [`Platform::parse`]). Every component
//! exposes an `is_compatible_with` relation; scoring an asset against a host
//! requirement is done by [`Platform::score`].

/// Serialize through `Display` and deserialize through `FromStr`.
macro_rules! string_serde {
    ($ty:ty) => {
        impl ::serde::Serialize for $ty {
            fn serialize<S: ::serde::Serializer>(
                &self,
                serializer: S,
            ) -> ::std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $ty {
            fn deserialize<D: ::serde::Deserializer<'de>>(
                deserializer: D,
            ) -> ::std::result::Result<Self, D::Error> {
                let raw = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                raw.parse().map_err(::serde::de::Error::custom)
            }
        }
    };
}

mod arch;
mod distribution;
mod library;
mod os;

pub use arch::{Arch, ArchType};
pub use distribution::Distribution;
pub use library::Library;
pub use os::Os;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Operating system, architecture, C library and distribution of a target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Platform {
    #[serde(default, skip_serializing_if = "Os::is_unknown")]
    pub os: Os,
    #[serde(default, skip_serializing_if = "Arch::is_unknown")]
    pub architecture: Arch,
    #[serde(default, skip_serializing_if = "Library::is_unknown")]
    pub library: Library,
    #[serde(default, skip_serializing_if = "Distribution::is_unknown")]
    pub distribution: Distribution,
    /// Executable suffix, `.exe` on windows.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extension: String,
}

impl Platform {
    /// Create a platform from its OS and architecture, deriving the rest.
    #[must_use]
    pub fn new(os: Os, architecture: Arch) -> Self {
        let mut platform = Self {
            os,
            architecture,
            ..Self::default()
        };
        platform.complete();
        platform
    }

    /// Detect the host platform.
    #[must_use]
    pub fn detect() -> Self {
        let os = Os::current();
        let mut platform = Self {
            os,
            architecture: Arch::current(os),
            distribution: Distribution::current(os),
            ..Self::default()
        };
        platform.complete();
        debug!(platform = %platform, "Detected host platform");
        platform
    }

    /// Parse the platform an asset targets from its file name.
    ///
    /// Unrecognised components are left unset.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        let lower = name.to_lowercase();
        Self {
            os: Os::from_asset_name(&lower),
            architecture: Arch::from_asset_name(&lower),
            library: Library::from_asset_name(&lower),
            ..Self::default()
        }
    }

    /// Fill derived fields: library from `(os, distribution)` and the
    /// executable extension.
    pub fn complete(&mut self) {
        if self.library.is_unknown() {
            self.library = Library::default_for(self.os, self.distribution);
        }
        if self.extension.is_empty() {
            self.extension = self.os.exe_extension().to_string();
        }
    }

    /// Fill every unset field from `other`.
    pub fn merge(&mut self, other: &Self) {
        if self.os.is_unknown() {
            self.os = other.os;
        }
        if self.architecture.is_unknown() {
            self.architecture = other.architecture;
        }
        if self.library.is_unknown() {
            self.library = other.library;
        }
        if self.distribution.is_unknown() {
            self.distribution = other.distribution;
        }
        if self.extension.is_empty() {
            self.extension.clone_from(&other.extension);
        }
    }

    /// Whether an asset for `other` can run on `self`.
    #[must_use]
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        self.score(other).is_some()
    }

    /// Score an asset platform against this requirement.
    ///
    /// Returns `None` when the asset is disqualified.
    #[must_use]
    pub fn score(&self, asset: &Self) -> Option<i32> {
        if !self.os.is_compatible_with(asset.os) {
            return None;
        }
        let arch = self.architecture.score(&asset.architecture, self.os)?;
        let library = self.library.score(asset.library, self.os);
        Some(arch + library)
    }

    /// Values exposed to templates.
    #[must_use]
    pub fn template_values(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("OS", self.os.to_string()),
            ("ARCH", self.architecture.kind.to_string()),
            (
                "ARCH_VERSION",
                self.architecture
                    .version
                    .map_or_else(String::new, |v| v.to_string()),
            ),
            ("ARCH_LONG", self.architecture.to_string()),
            ("LIBRARY", self.library.to_string()),
            ("EXTENSION", self.extension.clone()),
            ("DISTRIBUTION", self.distribution.to_string()),
        ])
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if !self.library.is_unknown() {
            write!(f, "/{}", self.library)?;
        }
        if !self.distribution.is_unknown() {
            write!(f, " ({})", self.distribution)?;
        }
        Ok(())
    }
}
