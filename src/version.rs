//! NuGet version and version-range algebra.
//!
//! NuGet versions extend SemVer with an optional fourth "revision" segment
//! inherited from `System.Version` (`major.minor.patch.revision`), and NuGet
//! compares prerelease labels as opaque, dot-separated identifiers rather
//! than following SemVer's precedence rules to the letter. Ranges follow the
//! interval notation from the NuGet versioning docs: `[1.0.0,2.0.0)`,
//! `(1.0.0,)`, `[1.0.0]`, or a bare `1.0.0` meaning "at least this version".

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by version and range parsing/intersection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid version string: {0}")]
    Parse(String),
    #[error("invalid version range: {0}")]
    ParseRange(String),
    #[error("version ranges do not intersect")]
    EmptyIntersection,
}

/// A NuGet-flavored version: `major.minor.patch[.revision][-prerelease][+build]`.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub revision: u64,
    pub prerelease: Option<String>,
    pub build_metadata: Option<String>,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64, revision: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            revision,
            prerelease: None,
            build_metadata: None,
        }
    }

    pub fn with_prerelease(mut self, prerelease: impl Into<String>) -> Self {
        self.prerelease = Some(prerelease.into());
        self
    }

    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// The `major.minor.patch` triple, ignoring revision and prerelease.
    pub fn release_triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::Parse("empty version string".to_string()));
        }

        let (rest, build_metadata) = match s.split_once('+') {
            Some((a, b)) => (a, Some(b.to_string())),
            None => (s, None),
        };
        let (core, prerelease) = match rest.split_once('-') {
            Some((a, b)) => (a, Some(b.to_string())),
            None => (rest, None),
        };

        let mut segments = core.split('.');
        let mut next_segment = |label: &str| -> Result<u64, VersionError> {
            match segments.next() {
                Some(part) => part
                    .parse::<u64>()
                    .map_err(|_| VersionError::Parse(format!("invalid {label} in {s:?}"))),
                None => Ok(0),
            }
        };

        let major = next_segment("major")?;
        let minor = next_segment("minor")?;
        let patch = next_segment("patch")?;
        let revision = next_segment("revision")?;

        if segments.next().is_some() {
            return Err(VersionError::Parse(format!(
                "too many numeric segments in {s:?}"
            )));
        }

        Ok(Version {
            major,
            minor,
            patch,
            revision,
            prerelease,
            build_metadata,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.revision != 0 {
            write!(f, "{}.{}.{}.{}", self.major, self.minor, self.patch, self.revision)?;
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        }
        if let Some(pre) = &self.prerelease {
            write!(f, "-{pre}")?;
        }
        if let Some(build) = &self.build_metadata {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch, self.revision)
            .cmp(&(other.major, other.minor, other.patch, other.revision))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                // A release is always newer than any prerelease of the same numeric version.
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => compare_prerelease(a, b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compares two prerelease labels identifier-by-identifier. Numeric
/// identifiers compare numerically and sort below alphanumeric ones; ties
/// fall back to a case-insensitive lexicographic compare, as dot-separated
/// build identifiers commonly do.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut ai = a.split('.');
    let mut bi = b.split('.');
    loop {
        match (ai.next(), bi.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(a_part), Some(b_part)) => {
                let ordering = match (a_part.parse::<u64>(), b_part.parse::<u64>()) {
                    (Ok(an), Ok(bn)) => an.cmp(&bn),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => a_part.to_lowercase().cmp(&b_part.to_lowercase()),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

/// One endpoint of a [`VersionRange`] interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bound {
    Inclusive(Version),
    Exclusive(Version),
}

impl Bound {
    pub fn version(&self) -> &Version {
        match self {
            Bound::Inclusive(v) | Bound::Exclusive(v) => v,
        }
    }

    fn into_version(self) -> Version {
        match self {
            Bound::Inclusive(v) | Bound::Exclusive(v) => v,
        }
    }
}

/// A floating-version template such as `1.2.*`, matching by numeric prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatTemplate {
    pub prefix: Vec<u64>,
}

impl FloatTemplate {
    fn matches(&self, v: &Version) -> bool {
        let segments = [v.major, v.minor, v.patch, v.revision];
        self.prefix
            .iter()
            .zip(segments.iter())
            .all(|(p, s)| p == s)
    }
}

/// A half-open interval of [`Version`]s, optionally "floating" on a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    pub min: Option<Bound>,
    pub max: Option<Bound>,
    pub float: Option<FloatTemplate>,
}

impl VersionRange {
    pub fn universal() -> Self {
        Self {
            min: None,
            max: None,
            float: None,
        }
    }

    pub fn exact(v: Version) -> Self {
        Self {
            min: Some(Bound::Inclusive(v.clone())),
            max: Some(Bound::Inclusive(v)),
            float: None,
        }
    }

    /// The bare-version form: `>= v`, open above. This is how NuGet treats a
    /// `Version` metadata value with no bracket syntax.
    pub fn at_least(v: Version) -> Self {
        Self {
            min: Some(Bound::Inclusive(v)),
            max: None,
            float: None,
        }
    }

    pub fn is_floating(&self) -> bool {
        self.float.is_some()
    }

    pub fn contains(&self, v: &Version) -> bool {
        if let Some(float) = &self.float {
            return float.matches(v);
        }
        let min_ok = match &self.min {
            None => true,
            Some(Bound::Inclusive(m)) => v >= m,
            Some(Bound::Exclusive(m)) => v > m,
        };
        let max_ok = match &self.max {
            None => true,
            Some(Bound::Inclusive(m)) => v <= m,
            Some(Bound::Exclusive(m)) => v < m,
        };
        min_ok && max_ok
    }

    /// Intersects two ranges. Floating ranges cannot be tightened further by
    /// another range's bounds (NuGet never needs to — a floating range only
    /// ever appears on a direct dependency, not as a transitive constraint),
    /// so the intersection of a floating range with a compatible bound range
    /// keeps the float behavior; an incompatible pairing is an empty
    /// intersection.
    pub fn intersect(&self, other: &VersionRange) -> Result<VersionRange, VersionError> {
        if let Some(float) = &self.float {
            return intersect_floating(float, self, other);
        }
        if let Some(float) = &other.float {
            return intersect_floating(float, other, self);
        }

        let min = tighter_min(self.min.as_ref(), other.min.as_ref());
        let max = tighter_max(self.max.as_ref(), other.max.as_ref());

        if let (Some(min_b), Some(max_b)) = (&min, &max) {
            let min_v = min_b.version();
            let max_v = max_b.version();
            let violates = match (min_b, max_b) {
                (Bound::Inclusive(_), Bound::Inclusive(_)) => min_v > max_v,
                _ => min_v >= max_v,
            };
            if violates {
                return Err(VersionError::EmptyIntersection);
            }
        }

        Ok(VersionRange {
            min,
            max,
            float: None,
        })
    }

    /// Lowest version in `candidates` satisfying this range, or (for a
    /// floating range) the highest version matching the float template.
    pub fn best_match(&self, candidates: &[Version]) -> Option<Version> {
        if let Some(float) = &self.float {
            return candidates.iter().filter(|v| float.matches(v)).max().cloned();
        }
        candidates
            .iter()
            .filter(|v| self.contains(v))
            .min()
            .cloned()
    }

    /// Fallback pin used when no candidate satisfies the range: the range's
    /// minimum bound, or its maximum bound when only an upper bound exists.
    pub fn fallback(&self) -> Option<Version> {
        self.min
            .clone()
            .or_else(|| self.max.clone())
            .map(Bound::into_version)
    }
}

fn intersect_floating(
    float: &FloatTemplate,
    floating: &VersionRange,
    other: &VersionRange,
) -> Result<VersionRange, VersionError> {
    if other.min.is_none() && other.max.is_none() {
        return Ok(floating.clone());
    }
    // A floating range intersected with a concrete range: keep whichever
    // bound further restricts the result, but preserve the float so
    // `best_match` still prefers the highest matching version.
    let min = tighter_min(floating.min.as_ref(), other.min.as_ref());
    let max = tighter_max(floating.max.as_ref(), other.max.as_ref());
    if let (Some(min_b), Some(max_b)) = (&min, &max)
        && min_b.version() > max_b.version()
    {
        return Err(VersionError::EmptyIntersection);
    }
    Ok(VersionRange {
        min,
        max,
        float: Some(float.clone()),
    })
}

fn tighter_min(a: Option<&Bound>, b: Option<&Bound>) -> Option<Bound> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) => Some(x.clone()),
        (None, Some(y)) => Some(y.clone()),
        (Some(x), Some(y)) => Some(if x.version() >= y.version() {
            x.clone()
        } else {
            y.clone()
        }),
    }
}

fn tighter_max(a: Option<&Bound>, b: Option<&Bound>) -> Option<Bound> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) => Some(x.clone()),
        (None, Some(y)) => Some(y.clone()),
        (Some(x), Some(y)) => Some(if x.version() <= y.version() {
            x.clone()
        } else {
            y.clone()
        }),
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(VersionRange::universal());
        }

        if let Some(prefix) = s.strip_suffix(".*") {
            let prefix: Result<Vec<u64>, _> = prefix
                .split('.')
                .map(|p| {
                    p.parse::<u64>()
                        .map_err(|_| VersionError::ParseRange(format!("bad float template {s:?}")))
                })
                .collect();
            return Ok(VersionRange {
                min: None,
                max: None,
                float: Some(FloatTemplate { prefix: prefix? }),
            });
        }

        if let Some(inner) = s
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            if !inner.contains(',') {
                let v = Version::from_str(inner.trim())?;
                return Ok(VersionRange::exact(v));
            }
        }

        if (s.starts_with('[') || s.starts_with('('))
            && (s.ends_with(')') || s.ends_with(']'))
        {
            let min_inclusive = s.starts_with('[');
            let max_inclusive = s.ends_with(']');
            let inner = &s[1..s.len() - 1];
            let (min_str, max_str) = inner
                .split_once(',')
                .ok_or_else(|| VersionError::ParseRange(format!("missing ',' in {s:?}")))?;
            let min_str = min_str.trim();
            let max_str = max_str.trim();

            let min = if min_str.is_empty() {
                None
            } else {
                let v = Version::from_str(min_str)?;
                Some(if min_inclusive {
                    Bound::Inclusive(v)
                } else {
                    Bound::Exclusive(v)
                })
            };
            let max = if max_str.is_empty() {
                None
            } else {
                let v = Version::from_str(max_str)?;
                Some(if max_inclusive {
                    Bound::Inclusive(v)
                } else {
                    Bound::Exclusive(v)
                })
            };

            return Ok(VersionRange {
                min,
                max,
                float: None,
            });
        }

        // Bare version: NuGet's "minimum version" shorthand, equivalent to `[v,)`.
        let v = Version::from_str(s)?;
        Ok(VersionRange::at_least(v))
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(float) = &self.float {
            let prefix = float
                .prefix
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(".");
            return write!(f, "{prefix}.*");
        }
        match (&self.min, &self.max) {
            (None, None) => write!(f, "*"),
            (Some(Bound::Inclusive(v)), None) => write!(f, "{v}"),
            (min, max) => {
                let open = match min {
                    Some(Bound::Exclusive(_)) => '(',
                    _ => '[',
                };
                let close = match max {
                    Some(Bound::Inclusive(_)) => ']',
                    _ => ')',
                };
                let min_str = min.as_ref().map(|b| b.version().to_string()).unwrap_or_default();
                let max_str = max.as_ref().map(|b| b.version().to_string()).unwrap_or_default();
                write!(f, "{open}{min_str},{max_str}{close}")
            }
        }
    }
}
