//! End-to-end scenarios: a fake NuGet v3 feed served by `wiremock`, real
//! manifest fixtures on disk via `tempfile`, driven through
//! [`ProjectScanner::scan`] exactly as the CLI would.

use dotnet_depgraph::cache::HybridCache;
use dotnet_depgraph::error::ScanStatus;
use dotnet_depgraph::framework::{FrameworkVersion, Tfm};
use dotnet_depgraph::registries::client::RegistryClient;
use dotnet_depgraph::registries::nuget::NuGetRegistry;
use dotnet_depgraph::scanner::{ProjectScanner, ScanRequest};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Stands up a fake v3 feed whose service index advertises a
/// `RegistrationsBaseUrl` pointing back at the same server, and seeds a
/// registration response for `id` built from `(version, listed, dependencies)`
/// triples.
async fn feed_with_package(
    server: &MockServer,
    id: &str,
    versions: &[(&str, bool, Vec<(&str, &str)>)],
) {
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": [
                { "@id": format!("{base}/registrations"), "@type": "RegistrationsBaseUrl/3.6.0" }
            ]
        })))
        .mount(server)
        .await;

    let items: Vec<_> = versions
        .iter()
        .map(|(version, listed, deps)| {
            json!({
                "catalogEntry": {
                    "version": version,
                    "listed": listed,
                    "dependencyGroups": [{
                        "dependencies": deps.iter().map(|(dep_id, range)| json!({
                            "id": dep_id,
                            "range": range,
                        })).collect::<Vec<_>>()
                    }]
                }
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path(format!("/registrations/{}/index.json", id.to_lowercase())))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "@id": format!("{base}/registrations/{id}/page0"), "items": items }]
        })))
        .mount(server)
        .await;
}

fn client_for(server: &MockServer) -> RegistryClient<NuGetRegistry> {
    let registry = NuGetRegistry::new(format!("{}/index.json", server.uri()));
    RegistryClient::with_cache(vec![registry], HybridCache::memory_only())
}

#[tokio::test]
async fn flat_single_chain_pins_lowest_satisfying_transitive() {
    let server = MockServer::start().await;
    feed_with_package(&server, "foo", &[("1.0.0", true, vec![("bar", "[2.0.0,3.0.0)")])]).await;
    feed_with_package(&server, "bar", &[("2.0.0", true, vec![]), ("2.1.0", true, vec![])]).await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("packages.config"),
        r#"<packages><package id="foo" version="1.0.0" targetFramework="net46" /></packages>"#,
    )
    .unwrap();

    let client = client_for(&server);
    let request = ScanRequest {
        project_dir: dir.path().to_path_buf(),
        target_framework: Some(Tfm::NetFramework(FrameworkVersion::new(4, 6))),
        with_details: false,
        with_fallback: false,
    };
    let report = ProjectScanner::scan(request, &client).await;

    assert_eq!(report.status, ScanStatus::Success);
    assert_eq!(report.datasource_id, "nuget-packages.config");
    assert_eq!(report.dependencies.len(), 1);
    assert_eq!(report.dependencies[0].name, "foo");
    assert_eq!(report.dependencies[0].dependencies.len(), 1);
    assert_eq!(report.dependencies[0].dependencies[0].name, "bar");
    assert_eq!(report.dependencies[0].dependencies[0].version, "2.0.0");
    assert_eq!(report.packages.len(), 2);
}

#[tokio::test]
async fn diamond_shares_a_single_resolved_node() {
    let server = MockServer::start().await;
    feed_with_package(&server, "a", &[("1.0.0", true, vec![("c", "[1.0.0,2.0.0)")])]).await;
    feed_with_package(&server, "b", &[("1.0.0", true, vec![("c", "[1.1.0,2.0.0)")])]).await;
    feed_with_package(
        &server,
        "c",
        &[("1.0.0", true, vec![]), ("1.1.0", true, vec![]), ("1.2.0", true, vec![])],
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("demo.csproj"),
        r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup><TargetFramework>net8.0</TargetFramework></PropertyGroup>
  <ItemGroup>
    <PackageReference Include="a" Version="[1,2)" />
    <PackageReference Include="b" Version="[1,2)" />
  </ItemGroup>
</Project>"#,
    )
    .unwrap();

    let client = client_for(&server);
    let request = ScanRequest {
        project_dir: dir.path().to_path_buf(),
        target_framework: None,
        with_details: false,
        with_fallback: false,
    };
    let report = ProjectScanner::scan(request, &client).await;

    assert_eq!(report.status, ScanStatus::Success);
    assert_eq!(report.datasource_id, "dotnet-project-reference");
    assert_eq!(report.packages.len(), 3);
    let c_nodes: Vec<_> = report.packages.iter().filter(|p| p.name.eq_ignore_ascii_case("c")).collect();
    assert_eq!(c_nodes.len(), 1);
    assert_eq!(c_nodes[0].version, "1.1.0");
}

#[tokio::test]
async fn missing_version_pins_range_minimum_with_a_warning() {
    let server = MockServer::start().await;
    feed_with_package(&server, "x", &[("4.9.0", true, vec![])]).await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("demo.csproj"),
        r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup><TargetFramework>net8.0</TargetFramework></PropertyGroup>
  <ItemGroup><PackageReference Include="x" Version="[5.0.0,6.0.0)" /></ItemGroup>
</Project>"#,
    )
    .unwrap();

    let client = client_for(&server);
    let request = ScanRequest {
        project_dir: dir.path().to_path_buf(),
        target_framework: None,
        with_details: false,
        with_fallback: false,
    };
    let report = ProjectScanner::scan(request, &client).await;

    assert_eq!(report.status, ScanStatus::PartialSuccess);
    assert!(!report.warnings.is_empty());
    assert_eq!(report.dependencies.len(), 1);
    assert_eq!(report.dependencies[0].name, "x");
    assert_eq!(report.dependencies[0].version, "5.0.0");
}

#[tokio::test]
async fn incompatible_framework_entry_is_skipped() {
    let server = MockServer::start().await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("packages.config"),
        r#"<packages><package id="Legacy" version="1.0.0" targetFramework="net20" /></packages>"#,
    )
    .unwrap();

    let client = client_for(&server);
    let request = ScanRequest {
        project_dir: dir.path().to_path_buf(),
        target_framework: Some(Tfm::NetCoreUnified(FrameworkVersion::new(6, 0))),
        with_details: false,
        with_fallback: false,
    };
    let report = ProjectScanner::scan(request, &client).await;

    assert_eq!(report.status, ScanStatus::PartialSuccess);
    assert!(report.dependencies.is_empty());
    assert!(report.warnings.iter().any(|w| w.contains("Legacy")));
}

#[tokio::test]
async fn failing_endpoint_does_not_change_the_resolved_graph() {
    let healthy = MockServer::start().await;
    feed_with_package(&healthy, "foo", &[("1.0.0", true, vec![])]).await;

    let down = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&down)
        .await;

    let endpoints = vec![
        NuGetRegistry::new(format!("{}/index.json", down.uri())),
        NuGetRegistry::new(format!("{}/index.json", healthy.uri())),
    ];
    let client = RegistryClient::with_cache(endpoints, HybridCache::memory_only());

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("packages.config"),
        r#"<packages><package id="foo" version="1.0.0" targetFramework="net8.0" /></packages>"#,
    )
    .unwrap();

    let request = ScanRequest {
        project_dir: dir.path().to_path_buf(),
        target_framework: Some(Tfm::NetCoreUnified(FrameworkVersion::new(8, 0))),
        with_details: false,
        with_fallback: false,
    };
    let report = ProjectScanner::scan(request, &client).await;

    assert_eq!(report.status, ScanStatus::PartialSuccess);
    assert_eq!(report.packages.len(), 1);
    assert_eq!(report.packages[0].name, "foo");
    assert_eq!(report.packages[0].version, "1.0.0");
    assert!(!report.warnings.is_empty(), "the downed endpoint's failure should surface as a warning");
}

#[tokio::test]
async fn lockfile_pass_through_needs_no_registry_call() {
    // No mocks are registered at all: any request against this server fails
    // the test by returning a 404 that the reader would have to reach for.
    let server = MockServer::start().await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("obj")).unwrap();
    std::fs::write(
        dir.path().join("obj").join("project.assets.json"),
        json!({
            "targets": {
                "net8.0": {
                    "Foo/1.0.0": { "type": "package", "dependencies": { "Bar": "[2.0.0, )" } },
                    "Bar/2.0.0": { "type": "package" }
                }
            },
            "project": {
                "version": "3.1.4",
                "frameworks": { "net8.0": { "dependencies": { "Foo": { "version": "[1.0.0, )" } } } }
            }
        })
        .to_string(),
    )
    .unwrap();

    let client = client_for(&server);
    let request = ScanRequest {
        project_dir: dir.path().to_path_buf(),
        target_framework: Some(Tfm::NetCoreUnified(FrameworkVersion::new(8, 0))),
        with_details: false,
        with_fallback: false,
    };
    let report = ProjectScanner::scan(request, &client).await;

    assert_eq!(report.status, ScanStatus::Success);
    assert_eq!(report.datasource_id, "dotnet-project.assets.json");
    assert_eq!(report.version.as_deref(), Some("3.1.4"));
    assert_eq!(report.packages.len(), 2);
}
