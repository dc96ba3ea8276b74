//! # NuGet v3 registry client
//!
//! Implements a client for the [NuGet v3 API](https://learn.microsoft.com/en-us/nuget/api/overview),
//! the package metadata protocol used by nuget.org and any compatible feed
//! (private Azure Artifacts/MyGet/GitHub Packages feeds included).
//!
//! ## Discovery
//!
//! Every v3 feed publishes a **service index** at its configured URL: a JSON
//! document with a `resources[]` array of `{ "@id", "@type" }` pairs. This
//! client locates the `RegistrationsBaseUrl` (or any of its versioned
//! variants, e.g. `RegistrationsBaseUrl/3.6.0`) and uses it as the base for
//! per-package registration lookups.
//!
//! ## Package registration
//!
//! - **Endpoint**: `GET {registrationsBaseUrl}/{id-lower}/index.json`
//! - **Response**: paginated; each page either embeds its `items[]` leaves
//!   directly or must be re-fetched from its own `@id` when large.
//! - Each leaf's `catalogEntry` carries `version`, `description`,
//!   `projectUrl`, `licenseExpression`/`licenseUrl`, `listed`, `deprecation`,
//!   `published`, and `dependencyGroups[]` (each with an optional
//!   `targetFramework` and a `dependencies[]` list of `{id, range}`).
//!
//! ## Authentication
//!
//! Credentials resolved from `nuget.config` (see [`crate::nuget_config`]) are
//! applied as HTTP Basic auth via `reqwest`'s built-in support, matching how
//! private feeds such as Azure Artifacts expect credentials to travel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::framework::Tfm;
use crate::version::{Version, VersionRange};

use super::http_client::create_shared_client;
use super::{DependencyGroup, PackageDependency, PackageMetadata, Registry};

/// Optional Basic-auth credentials for a single feed, as resolved from
/// `nuget.config`'s `packageSourceCredentials` section.
#[derive(Debug, Clone)]
pub struct FeedCredentials {
    pub username: String,
    pub password: String,
}

/// Client for one NuGet v3 feed, identified by its service-index URL.
pub struct NuGetRegistry {
    client: Arc<Client>,
    service_index_url: String,
    credentials: Option<FeedCredentials>,
}

impl NuGetRegistry {
    pub fn new(service_index_url: impl Into<String>) -> Self {
        Self::with_client(
            create_shared_client().expect("failed to create HTTP client"),
            service_index_url,
        )
    }

    pub fn with_client(client: Arc<Client>, service_index_url: impl Into<String>) -> Self {
        Self {
            client,
            service_index_url: service_index_url.into(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: FeedCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.get(url);
        match &self.credentials {
            Some(creds) => builder.basic_auth(&creds.username, Some(&creds.password)),
            None => builder,
        }
    }

    /// Resolves the feed's registration base URL from its service index.
    /// Accepts any `@type` beginning with `RegistrationsBaseUrl`, preferring
    /// the unversioned `RegistrationsBaseUrl/3.6.0` variant when several are
    /// advertised (it carries SemVer 2.0.0 prerelease/build metadata in
    /// responses, which nuget.org's catalog entries commonly use).
    async fn registrations_base_url(&self) -> anyhow::Result<String> {
        let response = self.request(&self.service_index_url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!(
                "service index {} returned {}",
                self.service_index_url,
                response.status()
            );
        }
        let index: ServiceIndex = response.json().await?;

        let mut fallback: Option<String> = None;
        for resource in &index.resources {
            if resource.kind.starts_with("RegistrationsBaseUrl") {
                if resource.kind == "RegistrationsBaseUrl/3.6.0" {
                    return Ok(resource.id.trim_end_matches('/').to_string());
                }
                fallback.get_or_insert_with(|| resource.id.trim_end_matches('/').to_string());
            }
        }
        fallback.ok_or_else(|| anyhow::anyhow!("no RegistrationsBaseUrl resource advertised"))
    }
}

#[derive(Debug, Deserialize)]
struct ServiceIndex {
    resources: Vec<ServiceIndexResource>,
}

#[derive(Debug, Deserialize)]
struct ServiceIndexResource {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct RegistrationResponse {
    items: Vec<RegistrationPage>,
}

#[derive(Debug, Deserialize)]
struct RegistrationPage {
    items: Option<Vec<RegistrationLeaf>>,
    #[serde(rename = "@id")]
    id: String,
}

#[derive(Debug, Deserialize, Clone)]
struct RegistrationLeaf {
    #[serde(rename = "catalogEntry")]
    catalog_entry: CatalogEntry,
}

#[derive(Debug, Deserialize, Clone)]
struct CatalogEntry {
    version: String,
    description: Option<String>,
    #[serde(rename = "projectUrl")]
    project_url: Option<String>,
    #[serde(rename = "licenseExpression")]
    license_expression: Option<String>,
    #[serde(rename = "licenseUrl")]
    license_url: Option<String>,
    authors: Option<String>,
    owners: Option<String>,
    tags: Option<String>,
    #[serde(default)]
    listed: Option<bool>,
    #[serde(default)]
    deprecation: Option<serde_json::Value>,
    published: Option<String>,
    #[serde(rename = "dependencyGroups", default)]
    dependency_groups: Vec<CatalogDependencyGroup>,
}

#[derive(Debug, Deserialize, Clone)]
struct CatalogDependencyGroup {
    #[serde(rename = "targetFramework")]
    target_framework: Option<String>,
    #[serde(default)]
    dependencies: Vec<CatalogDependency>,
}

#[derive(Debug, Deserialize, Clone)]
struct CatalogDependency {
    id: String,
    range: Option<String>,
}

impl Registry for NuGetRegistry {
    async fn fetch_versions(&self, package_id: &str) -> anyhow::Result<Vec<PackageMetadata>> {
        let base_url = self.registrations_base_url().await?;
        let id_lower = package_id.to_lowercase();
        let url = format!("{base_url}/{id_lower}/index.json");

        let response = self.request(&url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!(
                "failed to fetch registration for {}: {}",
                package_id,
                response.status()
            );
        }
        let registration: RegistrationResponse = response.json().await?;

        let mut entries: Vec<CatalogEntry> = Vec::new();
        for page in registration.items {
            if let Some(items) = page.items {
                entries.extend(items.into_iter().map(|leaf| leaf.catalog_entry));
            } else {
                let page_response = self.request(&page.id).send().await?;
                if page_response.status().is_success() {
                    let page_data: RegistrationPage = page_response.json().await?;
                    if let Some(items) = page_data.items {
                        entries.extend(items.into_iter().map(|leaf| leaf.catalog_entry));
                    }
                }
            }
        }

        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let version = match entry.version.parse::<Version>() {
                Ok(v) => v,
                Err(_) => continue,
            };
            let published = entry
                .published
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));

            let dependency_groups = entry
                .dependency_groups
                .into_iter()
                .map(|g| {
                    let tfm = g
                        .target_framework
                        .as_deref()
                        .filter(|s| !s.is_empty())
                        .map(Tfm::parse)
                        .transpose()
                        .ok()
                        .flatten()
                        .unwrap_or(Tfm::Any);
                    let dependencies = g
                        .dependencies
                        .into_iter()
                        .filter_map(|d| {
                            let range = match &d.range {
                                Some(r) => r.parse::<VersionRange>().ok()?,
                                None => VersionRange::universal(),
                            };
                            Some(PackageDependency { id: d.id, range })
                        })
                        .collect();
                    DependencyGroup {
                        target_framework: tfm,
                        dependencies,
                    }
                })
                .collect();

            out.push(PackageMetadata {
                version,
                listed: entry.listed.unwrap_or(true),
                description: entry.description,
                project_url: entry.project_url,
                license_expression: entry.license_expression,
                license_url: entry.license_url,
                authors: entry.authors,
                owners: entry.owners,
                tags: entry.tags,
                deprecated: entry.deprecation.is_some(),
                published,
                dependency_groups,
            });
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_dependency_without_range_is_universal() {
        let range: VersionRange = "".parse().unwrap_or_else(|_| VersionRange::universal());
        assert!(range.contains(&"1.0.0".parse().unwrap()));
    }
}
