//! Registry clients for fetching NuGet package metadata.

use serde::{Deserialize, Serialize};

use crate::framework::Tfm;
use crate::version::{Version, VersionRange};

/// One dependency entry inside a [`DependencyGroup`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDependency {
    pub id: String,
    pub range: VersionRange,
}

/// Dependencies that apply when a package version is consumed under a
/// compatible target framework.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyGroup {
    pub target_framework: Tfm,
    pub dependencies: Vec<PackageDependency>,
}

/// Metadata for a single listed version of a package, as served by the v3
/// registration resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub version: Version,
    pub listed: bool,
    pub description: Option<String>,
    pub project_url: Option<String>,
    pub license_expression: Option<String>,
    pub license_url: Option<String>,
    pub authors: Option<String>,
    pub owners: Option<String>,
    pub tags: Option<String>,
    pub deprecated: bool,
    pub published: Option<chrono::DateTime<chrono::Utc>>,
    pub dependency_groups: Vec<DependencyGroup>,
}

impl PackageMetadata {
    pub fn is_prerelease(&self) -> bool {
        self.version.is_prerelease()
    }

    /// Selects the dependency group whose TFM is compatible with
    /// `project_tfm` and most specific (closest in version to the
    /// project's), falling back to an `Any` group when present.
    pub fn dependencies_for(&self, project_tfm: &Tfm) -> Vec<PackageDependency> {
        let mut any_group: Option<&DependencyGroup> = None;
        let mut best: Option<&DependencyGroup> = None;

        for group in &self.dependency_groups {
            if matches!(group.target_framework, Tfm::Any) {
                any_group = Some(group);
                continue;
            }
            if !group.target_framework.is_compatible_with(project_tfm) {
                continue;
            }
            best = match best {
                None => Some(group),
                Some(current) => {
                    if is_more_specific(&group.target_framework, &current.target_framework) {
                        Some(group)
                    } else {
                        Some(current)
                    }
                }
            };
        }

        best.or(any_group)
            .map(|g| g.dependencies.clone())
            .unwrap_or_default()
    }
}

/// Picks the candidate TFM closer to the project's, i.e. the higher of the
/// two still-compatible versions, so that `dependencies_for` selects the
/// nearest compatible group rather than the first one encountered.
fn is_more_specific(candidate: &Tfm, current: &Tfm) -> bool {
    use Tfm::*;
    match (candidate, current) {
        (NetCoreUnified(a), NetCoreUnified(b)) => a > b,
        (NetCoreApp(a), NetCoreApp(b)) => a > b,
        (NetStandard(a), NetStandard(b)) => a > b,
        (NetFramework(a), NetFramework(b)) => a > b,
        _ => false,
    }
}

/// Errors from a single registry endpoint; non-fatal, aggregated by the
/// caller and attached to the scan as warnings when every endpoint fails.
#[derive(Debug, Clone)]
pub struct EndpointError {
    pub endpoint: String,
    pub message: String,
}

impl std::fmt::Display for EndpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.endpoint, self.message)
    }
}

/// A v3 registry endpoint: discovers the registration resource from a
/// service index and fetches package metadata from it.
#[allow(async_fn_in_trait)]
pub trait Registry: Send + Sync {
    /// Fetches every listed (and unlisted, for enrichment callers) version
    /// of `package_id`, including each version's dependency groups.
    async fn fetch_versions(&self, package_id: &str) -> anyhow::Result<Vec<PackageMetadata>>;
}

pub mod client;
pub mod http_client;
pub mod nuget;
