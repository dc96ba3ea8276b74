//! Manifest discovery and classification.
//!
//! Given a project directory, exactly one of five mutually-exclusive
//! strategies applies; `detect_strategy` picks it by checking for sibling
//! files in priority order. Each reader emits its own result type (a
//! pre-pinned [`crate::graph::Graph`] for the two lockfile formats, a list
//! of [`DirectDependency`] for the other three) that [`crate::scanner`]
//! feeds to the flat or tree resolver, or uses directly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::framework::Tfm;
use crate::version::VersionRange;

pub mod assets_json;
pub mod lock_json;
pub mod packages_config;
pub mod project_file;
pub mod project_json;

/// Flags carried on a [`DirectDependency`], mirroring MSBuild's
/// `PrivateAssets`/`IncludeAssets`/`ExcludeAssets` metadata and
/// `developmentDependency` from `packages.config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DependencyFlags {
    pub development_only: bool,
    /// `PrivateAssets=all`: the dependency is used to build this project but
    /// does not flow to its own consumers, and per spec does not appear in
    /// the emitted report at all.
    pub private_assets_all: bool,
}

/// A dependency explicitly named in the project's manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectDependency {
    pub id: String,
    pub range: VersionRange,
    pub framework: Option<Tfm>,
    pub flags: DependencyFlags,
}

impl DirectDependency {
    pub fn new(id: impl Into<String>, range: VersionRange) -> Self {
        Self {
            id: id.into(),
            range,
            framework: None,
            flags: DependencyFlags::default(),
        }
    }

    /// Whether this dependency should appear in the resolved graph at all.
    pub fn is_visible(&self) -> bool {
        !self.flags.private_assets_all
    }
}

/// The five resolution strategies, in detection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    AssetsJson,
    LockJson,
    PackagesConfig,
    ProjectJson,
    ProjectFile,
}

impl Strategy {
    /// The stable `datasource_id` recorded on the report for this strategy.
    pub fn datasource_id(self) -> &'static str {
        match self {
            Strategy::AssetsJson => "dotnet-project.assets.json",
            Strategy::LockJson => "dotnet-project.lock.json",
            Strategy::PackagesConfig => "nuget-packages.config",
            Strategy::ProjectJson => "dotnet-project.json",
            Strategy::ProjectFile => "dotnet-project-reference",
        }
    }
}

/// Detects which strategy applies for a project directory, per spec.md
/// §4.4's fixed priority order. The first existing candidate file wins.
pub fn detect_strategy(project_dir: &Path) -> Strategy {
    if project_dir.join("obj").join("project.assets.json").is_file() {
        return Strategy::AssetsJson;
    }
    if project_dir.join("project.lock.json").is_file() {
        return Strategy::LockJson;
    }
    if project_dir.join("packages.config").is_file() {
        return Strategy::PackagesConfig;
    }
    if project_dir.join("project.json").is_file() {
        return Strategy::ProjectJson;
    }
    Strategy::ProjectFile
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest not found at {0}")]
    NotFound(PathBuf),
    #[error("failed to parse manifest {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Parses a `projectFileDependencyGroups`/`packages.config`-style
/// relational constraint string like `">= 1.2.3"` or `"4.3.4"` into a
/// [`VersionRange`]. Per spec.md §9's open question, two-sided constraints
/// (`>= 1.2.3 < 2.0.0`) are not modeled by the reference tool's line parser;
/// this crate follows suit and only inspects the first relational clause,
/// treating anything after it as ignored trailing text.
pub fn parse_relational_constraint(raw: &str) -> Option<VersionRange> {
    let raw = raw.trim();
    for (op, build) in [
        (">=", VersionRange::at_least as fn(crate::version::Version) -> VersionRange),
        ("<=", at_most),
        (">", above),
        ("<", below),
    ] {
        if let Some(rest) = raw.strip_prefix(op) {
            let version_str = rest.split_whitespace().next()?;
            let version = version_str.parse().ok()?;
            return Some(build(version));
        }
    }
    raw.parse::<VersionRange>().ok()
}

fn at_most(v: crate::version::Version) -> VersionRange {
    VersionRange {
        min: None,
        max: Some(crate::version::Bound::Inclusive(v)),
        float: None,
    }
}

fn above(v: crate::version::Version) -> VersionRange {
    VersionRange {
        min: Some(crate::version::Bound::Exclusive(v)),
        max: None,
        float: None,
    }
}

fn below(v: crate::version::Version) -> VersionRange {
    VersionRange {
        min: None,
        max: Some(crate::version::Bound::Exclusive(v)),
        float: None,
    }
}
