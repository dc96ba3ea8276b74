//! The immutable report tree handed back to callers: a root [`ProjectReport`]
//! wrapping a tree of [`Package`] nodes, built once per scan from the
//! resolved [`crate::graph::Graph`] and never mutated afterward.
//!
//! Deep-clone semantics fall out of `#[derive(Clone)]` on every type here —
//! there is no interior mutability anywhere in the tree, so a `.clone()`
//! is already a correct snapshot.

use serde::{Deserialize, Serialize};

use crate::error::ScanStatus;
use crate::framework::Tfm;
use crate::graph::Graph;
use crate::version::Version;

/// Descriptive metadata a [`Package`] carries once enrichment (`with_details`)
/// has filled it in. Left entirely `None`/empty when enrichment is off or a
/// node's metadata fetch failed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageMetadataFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_expression: Option<String>,
    /// Every declared license-related line seen on the record: the
    /// aggregated `LicenseUrl`/`LicenseType`/`License`/`LicenseExpression`
    /// bag the spec calls for, kept rather than collapsed to one field so a
    /// record with both an expression and a legacy URL doesn't lose either.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub declared_licenses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_data_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha512: Option<String>,
}

/// One node in the report's dependency tree: a resolved package plus
/// whatever descriptive metadata enrichment found for it, its own
/// `warnings`/`errors`, and (for the tree view) nested children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    pub datasource_id: &'static str,
    pub purl: String,
    #[serde(flatten)]
    pub metadata: PackageMetadataFields,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub dependencies: Vec<Package>,
}

impl Package {
    pub fn new(name: impl Into<String>, version: &Version, datasource_id: &'static str) -> Self {
        let name = name.into();
        let purl = format!("pkg:nuget/{}@{version}", name.to_lowercase());
        Self {
            name,
            version: version.to_string(),
            framework: None,
            datasource_id,
            purl,
            metadata: PackageMetadataFields::default(),
            warnings: Vec::new(),
            errors: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// The `(type, namespace, name, version, qualifiers, subpath)` sort key
    /// mandated by spec.md §4.8/§8, lowercased. This crate only ever emits
    /// the `nuget` purl type with no namespace/qualifiers/subpath, so the
    /// key collapses to `(name, version)`, both lowercased.
    fn sort_key(&self) -> (String, String) {
        (self.name.to_lowercase(), self.version.to_lowercase())
    }

    /// Recursively sorts this node's children (and their children, ...) by
    /// [`Self::sort_key`], matching spec.md's "a sort MUST be performed
    /// before emission" at every level.
    pub fn sort_recursive(&mut self) {
        self.dependencies.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        for dep in &mut self.dependencies {
            dep.sort_recursive();
        }
    }
}

/// The header block every report carries, analogous to ScanCode-style
/// toolkit headers: tool identity, the options the scan ran with, and the
/// scan-level warnings/errors that don't belong to any one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub tool_name: &'static str,
    pub tool_version: &'static str,
    pub options: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub notice: &'static str,
}

impl Header {
    pub fn new(options: Vec<String>) -> Self {
        Self {
            tool_name: env!("CARGO_PKG_NAME"),
            tool_version: env!("CARGO_PKG_VERSION"),
            options,
            warnings: Vec::new(),
            errors: Vec::new(),
            notice: "Dependency graph computed against the NuGet v3 registry API; \
                     no build was executed and no packages were restored to disk.",
        }
    }
}

/// The root of a scan's output: the project itself, its effective
/// framework, the strategy that produced its dependency data, the full
/// tree, and a flattened, deduplicated view of the same nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectReport {
    pub headers: Vec<Header>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub framework: String,
    pub datasource_id: &'static str,
    pub dependencies: Vec<Package>,
    /// The same resolved set as `dependencies`, deduplicated by identity and
    /// sorted flat, independent of tree position.
    pub packages: Vec<Package>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    #[serde(default)]
    pub status: ScanStatus,
}

impl ProjectReport {
    /// Sorts the full tree and rebuilds the flattened `packages` view from
    /// it, per spec.md §4.8's "a sort MUST be performed before emission."
    pub fn finalize(&mut self) {
        for dep in &mut self.dependencies {
            dep.sort_recursive();
        }
        self.dependencies
            .sort_by(|a, b| (a.name.to_lowercase(), a.version.to_lowercase()).cmp(&(b.name.to_lowercase(), b.version.to_lowercase())));

        let mut flat: std::collections::BTreeMap<(String, String), Package> = std::collections::BTreeMap::new();
        let mut stack: Vec<&Package> = self.dependencies.iter().collect();
        while let Some(pkg) = stack.pop() {
            let key = (pkg.name.to_lowercase(), pkg.version.to_lowercase());
            if !flat.contains_key(&key) {
                let mut leaf = pkg.clone();
                leaf.dependencies.clear();
                flat.insert(key, leaf);
            }
            stack.extend(pkg.dependencies.iter());
        }
        self.packages = flat.into_values().collect();
    }
}

/// Walks a resolved [`Graph`] and builds a [`Package`] tree from its roots,
/// defensively guarding against cycles (the spec notes a valid NuGet graph
/// never has one, but a buggy or adversarial registry response could still
/// produce one): a node already on the current path is emitted as a
/// childless leaf carrying a warning instead of being re-descended into.
pub fn build_tree(graph: &Graph, datasource_id: &'static str, framework: Option<&Tfm>) -> Vec<Package> {
    graph
        .roots()
        .iter()
        .map(|&idx| build_node(graph, idx, datasource_id, framework, &mut Vec::new()))
        .collect()
}

fn build_node(
    graph: &Graph,
    idx: petgraph::graph::NodeIndex,
    datasource_id: &'static str,
    framework: Option<&Tfm>,
    path: &mut Vec<petgraph::graph::NodeIndex>,
) -> Package {
    let node = graph.node(idx);
    let mut pkg = Package::new(node.name.clone(), &node.version, datasource_id);
    pkg.framework = framework.map(|f| f.short_folder_name());
    pkg.warnings.extend(node.warnings.iter().cloned());

    if path.contains(&idx) {
        pkg.warnings.push(format!("cycle detected at {}@{}, not expanding further", node.name, node.version));
        return pkg;
    }

    path.push(idx);
    pkg.dependencies = graph
        .children(idx)
        .map(|child| build_node(graph, child, datasource_id, framework, path))
        .collect();
    path.pop();

    pkg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ResolvedNode;

    #[test]
    fn purl_is_lowercased_name_with_original_version_case() {
        let v: Version = "1.2.3".parse().unwrap();
        let pkg = Package::new("Newtonsoft.Json", &v, "dotnet-project-reference");
        assert_eq!(pkg.purl, "pkg:nuget/newtonsoft.json@1.2.3");
    }

    #[test]
    fn build_tree_breaks_cycles() {
        let mut graph = Graph::new();
        let a = graph.upsert(ResolvedNode::new("A", "1.0.0".parse().unwrap()));
        let b = graph.upsert(ResolvedNode::new("B", "1.0.0".parse().unwrap()));
        graph.add_edge(a, b);
        graph.add_edge(b, a);
        graph.mark_root(a);

        let tree = build_tree(&graph, "dotnet-project-reference", None);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].dependencies.len(), 1);
        assert!(tree[0].dependencies[0].dependencies[0].warnings.iter().any(|w| w.contains("cycle")));
    }

    #[test]
    fn finalize_sorts_and_dedupes_flat_view() {
        let mut report = ProjectReport {
            headers: vec![Header::new(vec![])],
            name: "demo".to_string(),
            version: None,
            framework: "net8.0".to_string(),
            datasource_id: "dotnet-project-reference",
            dependencies: vec![
                Package::new("Zeta", &"1.0.0".parse().unwrap(), "dotnet-project-reference"),
                Package::new("Alpha", &"1.0.0".parse().unwrap(), "dotnet-project-reference"),
            ],
            packages: vec![],
            warnings: vec![],
            errors: vec![],
            status: ScanStatus::default(),
        };
        report.finalize();
        assert_eq!(report.dependencies[0].name, "Alpha");
        assert_eq!(report.packages.len(), 2);
    }
}
