//! Target Framework Moniker (TFM) parsing and compatibility.
//!
//! NuGet assets are grouped by a short framework identifier such as
//! `net8.0`, `netstandard2.0`, or the legacy `net472`. Compatibility between
//! two TFMs is a partial order, not an equality check: a package built for
//! `netstandard2.0` satisfies a `net8.0` project, but not vice versa.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameworkError {
    #[error("unrecognized target framework moniker: {0}")]
    Parse(String),
}

/// A dotted `major.minor` framework version, e.g. `8.0` or `2.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameworkVersion {
    pub major: u32,
    pub minor: u32,
}

impl FrameworkVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for FrameworkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// The identifier family of a Target Framework Moniker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tfm {
    /// Modern unified platform: `net5.0` and above.
    NetCoreUnified(FrameworkVersion),
    /// `netcoreappX.Y`, pre-`net5.0` .NET Core.
    NetCoreApp(FrameworkVersion),
    /// `netstandardX.Y`.
    NetStandard(FrameworkVersion),
    /// Legacy .NET Framework, `netXXX` (e.g. `net472` => 4.7.2 folded into major.minor).
    NetFramework(FrameworkVersion),
    /// `Any`/`Agnostic` placeholders used by some metadata feeds for
    /// framework-independent assets.
    Any,
    /// A moniker this crate doesn't recognize; carried through as opaque
    /// text so reports can still surface it.
    Unsupported(String),
}

impl Tfm {
    pub fn parse(raw: &str) -> Result<Self, FrameworkError> {
        let s = raw.trim();
        let lower = s.to_ascii_lowercase();

        if lower == "any" || lower.is_empty() {
            return Ok(Tfm::Any);
        }
        if lower == "agnostic" {
            return Ok(Tfm::Any);
        }

        if let Some(rest) = lower.strip_prefix("netstandard") {
            return parse_dotted_version(rest)
                .map(Tfm::NetStandard)
                .ok_or_else(|| FrameworkError::Parse(raw.to_string()));
        }

        if let Some(rest) = lower.strip_prefix("netcoreapp") {
            return parse_dotted_version(rest)
                .map(Tfm::NetCoreApp)
                .ok_or_else(|| FrameworkError::Parse(raw.to_string()));
        }

        if let Some(rest) = lower.strip_prefix("net") {
            // Disambiguate unified net5.0+ from legacy net4xx/net35/net20 etc.
            // Unified monikers always carry a dot (net5.0, net8.0, net10.0);
            // legacy ones are either 2-3 bare digits (net472, net48, net45)
            // or a dotted pair below 5.0 that never existed (kept as legacy
            // for safety since .NET never shipped netX.Y < 5.0 unified).
            if rest.contains('.') {
                if let Some(v) = parse_dotted_version(rest) {
                    if v.major >= 5 {
                        return Ok(Tfm::NetCoreUnified(v));
                    }
                    return Ok(Tfm::NetFramework(v));
                }
                return Err(FrameworkError::Parse(raw.to_string()));
            }
            if let Some(v) = parse_compact_legacy_version(rest) {
                return Ok(Tfm::NetFramework(v));
            }
            return Err(FrameworkError::Parse(raw.to_string()));
        }

        Ok(Tfm::Unsupported(raw.to_string()))
    }

    /// The short folder name NuGet uses for this TFM, as it would appear
    /// under a `lib/<tfm>/` asset path.
    pub fn short_folder_name(&self) -> String {
        match self {
            Tfm::NetCoreUnified(v) => format!("net{v}"),
            Tfm::NetCoreApp(v) => format!("netcoreapp{v}"),
            Tfm::NetStandard(v) => format!("netstandard{v}"),
            Tfm::NetFramework(v) => {
                if v.minor == 0 {
                    format!("net{}", v.major)
                } else {
                    format!("net{}{}", v.major, v.minor)
                }
            }
            Tfm::Any => "any".to_string(),
            Tfm::Unsupported(raw) => raw.clone(),
        }
    }

    fn rank(&self) -> Option<(u8, FrameworkVersion)> {
        match self {
            Tfm::NetFramework(v) => Some((0, *v)),
            Tfm::NetStandard(v) => Some((1, *v)),
            Tfm::NetCoreApp(v) => Some((2, *v)),
            Tfm::NetCoreUnified(v) => Some((3, *v)),
            Tfm::Any | Tfm::Unsupported(_) => None,
        }
    }

    /// Whether an asset built for `self` can be consumed by a project whose
    /// target framework is `project`.
    ///
    /// `Any` is compatible with everything; `Unsupported` is compatible with
    /// nothing (per spec: unknown monikers never match); same-family
    /// monikers are compatible when the asset version is less than or equal
    /// to the project version; `netstandard` assets are additionally
    /// compatible with any `netcoreapp`/unified project, since both
    /// implement the `netstandard` surface.
    pub fn is_compatible_with(&self, project: &Tfm) -> bool {
        if matches!(self, Tfm::Any) {
            return true;
        }
        if matches!(self, Tfm::Unsupported(_)) || matches!(project, Tfm::Unsupported(_)) {
            return false;
        }
        if matches!(project, Tfm::Any) {
            return true;
        }

        match (self, project) {
            (Tfm::NetStandard(a), Tfm::NetStandard(b)) => a <= b,
            (Tfm::NetStandard(a), Tfm::NetCoreApp(b)) => netstandard_satisfies_netcoreapp(*a, *b),
            (Tfm::NetStandard(a), Tfm::NetCoreUnified(_)) => a.major <= 2,
            (Tfm::NetFramework(a), Tfm::NetFramework(b)) => a <= b,
            (Tfm::NetCoreApp(a), Tfm::NetCoreApp(b)) => a <= b,
            (Tfm::NetCoreUnified(a), Tfm::NetCoreUnified(b)) => a <= b,
            _ => self.rank().zip(project.rank()).is_some_and(|(a, b)| a == b),
        }
    }
}

fn netstandard_satisfies_netcoreapp(ns: FrameworkVersion, core: FrameworkVersion) -> bool {
    // netstandard2.1 requires netcoreapp3.0+; netstandard2.0 and below are
    // supported by all netcoreapp versions NuGet still resolves against.
    if ns.major == 2 && ns.minor == 1 {
        core >= FrameworkVersion::new(3, 0)
    } else {
        true
    }
}

fn parse_dotted_version(s: &str) -> Option<FrameworkVersion> {
    let (major, minor) = s.split_once('.')?;
    Some(FrameworkVersion::new(major.parse().ok()?, minor.parse().ok()?))
}

/// Parses `net472`, `net48`, `net20` style compact legacy digit runs into a
/// `major.minor[.patch folded into minor-of-two-digits]` pair. NuGet folds
/// each digit after the first into its own version component, so `472`
/// becomes `4.7.2` collapsed to the `(4, 72)` ordering pair used here purely
/// for comparison purposes (folder-name rendering special-cases it back).
fn parse_compact_legacy_version(s: &str) -> Option<FrameworkVersion> {
    let digits: Vec<char> = s.chars().collect();
    if digits.is_empty() || !digits.iter().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let major: u32 = digits[0].to_digit(10)?;
    let rest: String = digits[1..].iter().collect();
    let minor: u32 = if rest.is_empty() { 0 } else { rest.parse().ok()? };
    Some(FrameworkVersion::new(major, minor))
}
