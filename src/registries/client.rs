//! Multi-feed registry client with compute-at-most-once memoization.
//!
//! Wraps one or more [`Registry`] endpoints (typically one per configured
//! NuGet feed) behind a single facade that callers query by package id.
//! An optional [`HybridCache`] provides cross-scan persistence; within a
//! single scan, results are further memoized per lowercased id in a
//! [`DashMap`] of [`tokio::sync::OnceCell`]s: the first caller for an id
//! performs the fetch, every other concurrent caller for the same id awaits
//! that same cell instead of issuing a duplicate request.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::cache::HybridCache;
use crate::framework::Tfm;
use crate::version::{Version, VersionRange};

use super::{DependencyGroup, EndpointError, PackageDependency, PackageMetadata, Registry};

type VersionsCell = Arc<OnceCell<Arc<Vec<PackageMetadata>>>>;

/// Facade over one or more registry endpoints, memoizing per-package
/// version lookups and aggregating per-endpoint failures as warnings.
///
/// Generic over the endpoint type rather than boxing `dyn Registry`:
/// `Registry::fetch_versions` is a native `async fn in trait`, which is not
/// object-safe, so endpoints are monomorphized instead of type-erased.
pub struct RegistryClient<R: Registry> {
    endpoints: Vec<R>,
    in_flight: DashMap<String, VersionsCell>,
    cache: Option<HybridCache>,
    /// Endpoint failures accumulated across the client's lifetime, surfaced
    /// by the scanner as scan-level warnings.
    endpoint_errors: DashMap<String, Vec<EndpointError>>,
}

impl<R: Registry> RegistryClient<R> {
    pub fn new(endpoints: Vec<R>) -> Self {
        Self {
            endpoints,
            in_flight: DashMap::new(),
            cache: None,
            endpoint_errors: DashMap::new(),
        }
    }

    pub fn with_cache(endpoints: Vec<R>, cache: HybridCache) -> Self {
        Self {
            endpoints,
            in_flight: DashMap::new(),
            cache: Some(cache),
            endpoint_errors: DashMap::new(),
        }
    }

    /// Drains and returns all endpoint errors recorded so far, keyed by
    /// package id.
    pub fn take_endpoint_errors(&self) -> Vec<(String, EndpointError)> {
        self.endpoint_errors
            .iter()
            .flat_map(|entry| {
                let id = entry.key().clone();
                entry.value().iter().cloned().map(move |e| (id.clone(), e)).collect::<Vec<_>>()
            })
            .collect()
    }

    /// All known versions for `id`, queried from every configured endpoint
    /// in order and aggregated. A failing endpoint is recorded as a warning
    /// and does not stop the remaining endpoints from being queried.
    ///
    /// Checks the persistent cache before touching the network; the
    /// in-process `in_flight` table ensures concurrent callers for the same
    /// id share one fetch rather than issuing duplicate requests.
    pub async fn find_versions(&self, id: &str) -> Arc<Vec<PackageMetadata>> {
        let key = id.to_lowercase();

        if let Some(cache) = &self.cache
            && let Some(cached) = cache.get(&key)
        {
            debug!(package = %key, "registry cache hit");
            return Arc::new(cached);
        }

        let cell = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell
            .get_or_init(|| async { Arc::new(self.fetch_all_endpoints(&key).await) })
            .await
            .clone();

        if let Some(cache) = &self.cache {
            cache.insert(key, result.as_ref().clone());
        }

        result
    }

    async fn fetch_all_endpoints(&self, id: &str) -> Vec<PackageMetadata> {
        let mut merged: Vec<PackageMetadata> = Vec::new();
        for (i, endpoint) in self.endpoints.iter().enumerate() {
            match endpoint.fetch_versions(id).await {
                Ok(versions) => merged.extend(versions),
                Err(e) => {
                    warn!(package = id, endpoint = i, error = %e, "registry endpoint failed");
                    self.endpoint_errors.entry(id.to_string()).or_default().push(EndpointError {
                        endpoint: format!("endpoint[{i}]"),
                        message: e.to_string(),
                    });
                }
            }
        }
        merged
    }

    /// The lowest version satisfying `range` among listed, non-prerelease
    /// candidates for `id` (per spec: prerelease candidates are pruned from
    /// resolution unless the range itself targets a prerelease version).
    pub async fn find_best_version(&self, id: &str, range: &VersionRange) -> Option<Version> {
        let versions = self.find_versions(id).await;
        let allow_prerelease = range_targets_prerelease(range);
        let candidates: Vec<Version> = versions
            .iter()
            .filter(|m| m.listed)
            .filter(|m| allow_prerelease || !m.is_prerelease())
            .map(|m| m.version.clone())
            .collect();
        range.best_match(&candidates)
    }

    /// The dependency set for `(id, version)` under `project_tfm`, selecting
    /// the nearest compatible dependency group.
    pub async fn dependencies_for(
        &self,
        id: &str,
        version: &Version,
        project_tfm: &Tfm,
    ) -> Vec<PackageDependency> {
        let versions = self.find_versions(id).await;
        versions
            .iter()
            .find(|m| &m.version == version)
            .map(|m| m.dependencies_for(project_tfm))
            .unwrap_or_default()
    }

    /// Full metadata record for `(id, version)`, used by the enrichment
    /// pass to fill in descriptive report fields.
    pub async fn metadata_for(&self, id: &str, version: &Version) -> Option<PackageMetadata> {
        let versions = self.find_versions(id).await;
        versions.iter().find(|m| &m.version == version).cloned()
    }
}

fn range_targets_prerelease(range: &VersionRange) -> bool {
    range
        .min
        .as_ref()
        .map(|b| b.version().is_prerelease())
        .unwrap_or(false)
        || range
            .max
            .as_ref()
            .map(|b| b.version().is_prerelease())
            .unwrap_or(false)
}
