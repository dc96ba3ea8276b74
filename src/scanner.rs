//! Ties manifest detection, resolution, and report assembly into one
//! entry point: [`ProjectScanner::scan`].
//!
//! The five manifest strategies fall into two shapes once read: the two
//! lockfile formats (`project.assets.json`, `project.lock.json`) already
//! carry a pinned [`Graph`] and need no resolver at all; the other three
//! (`packages.config`, `project.json`, the project file itself) only name
//! direct dependencies and are handed to [`resolve_flat`] or
//! [`resolve_tree`] depending on discipline. Either way the scanner ends up
//! with one `Graph` and builds the report from it the same way.

use std::path::{Path, PathBuf};

use futures::future::join_all;

use crate::error::ScanStatus;
use crate::framework::Tfm;
use crate::manifest::{
    self, assets_json::AssetsJsonReader, lock_json::LockJsonReader,
    packages_config::PackagesConfigReader,
    project_file::{ProjectFileReader, XmlFallbackReader},
    project_json::ProjectJsonReader, Strategy,
};
use crate::registries::client::RegistryClient;
use crate::registries::Registry;
use crate::report::{build_tree, Header, Package, ProjectReport};
use crate::resolver::{flat::resolve_flat, tree::resolve_tree, ResolveContext};
use crate::version::Version;

/// Everything a scan needs to know before it touches the filesystem.
pub struct ScanRequest {
    pub project_dir: PathBuf,
    /// Caller-forced target framework, taking priority over anything
    /// discovered in the project file.
    pub target_framework: Option<Tfm>,
    /// Fetch descriptive metadata (authors, license, homepage, ...) for
    /// every resolved package after the graph is built.
    pub with_details: bool,
    /// Fall back to the line-oriented [`XmlFallbackReader`] when the
    /// structured project-file reader fails to parse.
    pub with_fallback: bool,
}

pub struct ProjectScanner;

impl ProjectScanner {
    /// Runs one scan to completion. Never returns an `Err`: failures that
    /// would abort a stricter tool are instead recorded as report-level
    /// `errors` and reflected in `status`, per spec's non-fatal scanning
    /// policy — a caller always gets a report back, even an empty one.
    pub async fn scan<R: Registry>(request: ScanRequest, client: &RegistryClient<R>) -> ProjectReport {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let project_file = find_project_file(&request.project_dir);
        let project_name = project_file
            .as_deref()
            .and_then(|p| p.file_stem())
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| {
                request
                    .project_dir
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or("project")
                    .to_string()
            });

        let strategy = manifest::detect_strategy(&request.project_dir);

        let (project_tfm, tfm_from_caller) = match &request.target_framework {
            Some(tfm) => (tfm.clone(), true),
            None => {
                let discovered = project_file
                    .as_deref()
                    .and_then(|p| ProjectFileReader::read(p).ok())
                    .and_then(|r| r.project_tfm);
                (discovered.unwrap_or(Tfm::Any), false)
            }
        };
        if !tfm_from_caller && matches!(project_tfm, Tfm::Any) {
            warnings.push("no target framework specified or discovered; treating all dependency groups as compatible".to_string());
        }

        let mut project_version: Option<Version> = None;

        let graph = match strategy {
            Strategy::AssetsJson => {
                let path = request.project_dir.join("obj").join("project.assets.json");
                match AssetsJsonReader::read(&path, &project_tfm) {
                    Ok(result) => {
                        project_version = result.project_version;
                        warnings.extend(result.warnings);
                        Some(result.graph)
                    }
                    Err(e) => {
                        errors.push(e.to_string());
                        None
                    }
                }
            }
            Strategy::LockJson => {
                let path = request.project_dir.join("project.lock.json");
                match LockJsonReader::read(&path, &project_tfm) {
                    Ok(result) => {
                        project_version = result.project_version;
                        warnings.extend(result.warnings);
                        Some(result.graph)
                    }
                    Err(e) => {
                        errors.push(e.to_string());
                        None
                    }
                }
            }
            Strategy::PackagesConfig => {
                let path = request.project_dir.join("packages.config");
                match PackagesConfigReader::read(&path, &project_tfm) {
                    Ok((direct, reader_warnings)) => {
                        warnings.extend(reader_warnings);
                        let ctx = ResolveContext { client, project_tfm: &project_tfm };
                        match resolve_flat(&direct, &ctx).await {
                            Ok(outcome) => {
                                warnings.extend(outcome.warnings);
                                Some(outcome.graph)
                            }
                            Err(e) => {
                                errors.push(e.to_string());
                                None
                            }
                        }
                    }
                    Err(e) => {
                        errors.push(e.to_string());
                        None
                    }
                }
            }
            Strategy::ProjectJson => {
                let path = request.project_dir.join("project.json");
                match ProjectJsonReader::read(&path, &project_tfm) {
                    Ok(result) => {
                        project_version = result.project_version;
                        warnings.extend(result.warnings);
                        let ctx = ResolveContext { client, project_tfm: &project_tfm };
                        let outcome = resolve_tree(&result.dependencies, &ctx).await;
                        warnings.extend(outcome.warnings);
                        Some(outcome.graph)
                    }
                    Err(e) => {
                        errors.push(e.to_string());
                        None
                    }
                }
            }
            Strategy::ProjectFile => match &project_file {
                None => {
                    errors.push(format!(
                        "no project file (.csproj/.fsproj/.vbproj) found in {}",
                        request.project_dir.display()
                    ));
                    None
                }
                Some(path) => {
                    let read_result = ProjectFileReader::read(path).or_else(|e| {
                        if request.with_fallback {
                            warnings.push(format!("structured project file read failed ({e}), falling back to line scan"));
                            XmlFallbackReader::read(path)
                        } else {
                            Err(e)
                        }
                    });
                    match read_result {
                        Ok(result) => {
                            project_version = result.project_version;
                            warnings.extend(result.warnings);
                            let ctx = ResolveContext { client, project_tfm: &project_tfm };
                            let outcome = resolve_tree(&result.dependencies, &ctx).await;
                            warnings.extend(outcome.warnings);
                            Some(outcome.graph)
                        }
                        Err(e) => {
                            errors.push(e.to_string());
                            None
                        }
                    }
                }
            },
        };

        let mut dependencies = match &graph {
            Some(g) => build_tree(g, strategy.datasource_id(), Some(&project_tfm)),
            None => Vec::new(),
        };

        if request.with_details {
            let visited = std::sync::Mutex::new(std::collections::HashSet::new());
            enrich_tree(client, &mut dependencies, &visited).await;
        }

        for (id, error) in client.take_endpoint_errors() {
            warnings.push(format!("{id}: {error}"));
        }

        let status = if graph.is_none() {
            ScanStatus::Error
        } else if !warnings.is_empty() || !errors.is_empty() {
            ScanStatus::PartialSuccess
        } else {
            ScanStatus::Success
        };

        let header_options = describe_options(&request);
        let mut report = ProjectReport {
            headers: vec![Header::new(header_options)],
            name: project_name,
            version: project_version.map(|v| v.to_string()),
            framework: project_tfm.short_folder_name(),
            datasource_id: strategy.datasource_id(),
            dependencies,
            packages: Vec::new(),
            warnings,
            errors,
            status,
        };
        report.finalize();
        report
    }
}

fn describe_options(request: &ScanRequest) -> Vec<String> {
    let mut options = vec![format!("project={}", request.project_dir.display())];
    if let Some(tfm) = &request.target_framework {
        options.push(format!("target-framework={}", tfm.short_folder_name()));
    }
    if request.with_details {
        options.push("with-details".to_string());
    }
    if request.with_fallback {
        options.push("with-fallback".to_string());
    }
    options
}

fn find_project_file(project_dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(project_dir).ok()?;
    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("csproj" | "fsproj" | "vbproj")
            )
        })
}

type EnrichmentIdentity = (String, String, Option<String>);

/// Fills in each node's [`crate::report::PackageMetadataFields`] from the
/// registry's full metadata record. A node whose metadata can't be fetched
/// keeps empty fields and gets a warning instead of aborting the walk —
/// enrichment is best-effort by design. `visited` dedupes by the
/// `(name, version, framework)` identity tuple so a node shared by a diamond
/// is only fetched and warned about once, no matter how many tree positions
/// it occupies.
fn enrich_tree<'a, R: Registry>(
    client: &'a RegistryClient<R>,
    packages: &'a mut [Package],
    visited: &'a std::sync::Mutex<std::collections::HashSet<EnrichmentIdentity>>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + 'a>> {
    Box::pin(async move {
        let futures = packages.iter_mut().map(|pkg| enrich_one(client, pkg, visited));
        join_all(futures).await;
    })
}

async fn enrich_one<R: Registry>(
    client: &RegistryClient<R>,
    pkg: &mut Package,
    visited: &std::sync::Mutex<std::collections::HashSet<EnrichmentIdentity>>,
) {
    let identity = (pkg.name.to_lowercase(), pkg.version.to_lowercase(), pkg.framework.clone());
    let first_visit = visited.lock().unwrap().insert(identity);
    if !first_visit {
        return;
    }

    match pkg.version.parse::<Version>() {
        Ok(version) => match client.metadata_for(&pkg.name, &version).await {
            Some(meta) => apply_metadata(pkg, meta),
            None => pkg.warnings.push(format!("metadata unavailable for {}@{}", pkg.name, pkg.version)),
        },
        Err(e) => pkg.warnings.push(format!("could not re-parse resolved version {}: {e}", pkg.version)),
    }
    enrich_tree(client, &mut pkg.dependencies, visited).await;
}

fn apply_metadata(pkg: &mut Package, meta: crate::registries::PackageMetadata) {
    pkg.metadata.authors = meta.authors;
    pkg.metadata.keywords = meta
        .tags
        .map(|t| t.split(", ").map(str::to_string).collect())
        .unwrap_or_default();
    pkg.metadata.description = meta.description;
    pkg.metadata.homepage_url = meta.project_url;

    let mut declared_licenses = Vec::new();
    if let Some(expr) = &meta.license_expression {
        declared_licenses.push(expr.clone());
    }
    if let Some(url) = &meta.license_url {
        declared_licenses.push(url.clone());
    }
    pkg.metadata.license_expression = meta.license_expression;
    pkg.metadata.declared_licenses = declared_licenses;

    if meta.deprecated {
        pkg.warnings.push(format!("{}@{} is marked deprecated on its registry", pkg.name, pkg.version));
    }
    if !meta.listed {
        pkg.warnings.push(format!("{}@{} is unlisted", pkg.name, pkg.version));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::FrameworkVersion;
    use crate::registries::PackageMetadata;

    struct FakeRegistry {
        metadata: Vec<PackageMetadata>,
    }

    impl Registry for FakeRegistry {
        async fn fetch_versions(&self, _package_id: &str) -> anyhow::Result<Vec<PackageMetadata>> {
            Ok(self.metadata.clone())
        }
    }

    fn meta(version: &str) -> PackageMetadata {
        PackageMetadata {
            version: version.parse().unwrap(),
            listed: true,
            description: Some("a sample package".to_string()),
            project_url: Some("https://example.com".to_string()),
            license_expression: Some("MIT".to_string()),
            license_url: None,
            authors: Some("Someone".to_string()),
            owners: None,
            tags: Some("json, serialization".to_string()),
            deprecated: false,
            published: None,
            dependency_groups: vec![],
        }
    }

    #[tokio::test]
    async fn scan_reports_error_when_no_manifest_present() {
        let dir = tempfile::tempdir().unwrap();
        let client: RegistryClient<FakeRegistry> = RegistryClient::new(vec![FakeRegistry { metadata: vec![] }]);
        let request = ScanRequest {
            project_dir: dir.path().to_path_buf(),
            target_framework: Some(Tfm::NetCoreUnified(FrameworkVersion::new(8, 0))),
            with_details: false,
            with_fallback: false,
        };
        let report = ProjectScanner::scan(request, &client).await;
        assert_eq!(report.status, ScanStatus::Error);
        assert!(!report.errors.is_empty());
    }

    #[tokio::test]
    async fn scan_resolves_packages_config_flat() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("packages.config"),
            r#"<packages><package id="Newtonsoft.Json" version="13.0.3" targetFramework="net472" /></packages>"#,
        )
        .unwrap();

        let client: RegistryClient<FakeRegistry> =
            RegistryClient::new(vec![FakeRegistry { metadata: vec![meta("13.0.3")] }]);
        let request = ScanRequest {
            project_dir: dir.path().to_path_buf(),
            target_framework: Some(Tfm::NetFramework(FrameworkVersion::new(4, 72))),
            with_details: true,
            with_fallback: false,
        };
        let report = ProjectScanner::scan(request, &client).await;
        assert_eq!(report.status, ScanStatus::Success);
        assert_eq!(report.packages.len(), 1);
        assert_eq!(report.packages[0].name, "Newtonsoft.Json");
        assert_eq!(report.packages[0].metadata.authors.as_deref(), Some("Someone"));
        assert_eq!(report.packages[0].metadata.keywords, vec!["json", "serialization"]);
    }
}
