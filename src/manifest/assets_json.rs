//! Reader for the modern `obj/project.assets.json` lockfile produced by
//! `dotnet restore`.
//!
//! Shape (elided to what this reader uses):
//!
//! ```json
//! {
//!   "targets": {
//!     "net8.0": {
//!       "Newtonsoft.Json/13.0.3": {
//!         "type": "package",
//!         "dependencies": { "System.Text.Json": "[8.0.0, )" }
//!       }
//!     }
//!   },
//!   "project": {
//!     "version": "1.0.0",
//!     "frameworks": {
//!       "net8.0": { "dependencies": { "Newtonsoft.Json": { "version": "[13.0.3, )" } } }
//!     }
//!   }
//! }
//! ```
//!
//! Every library key is `"{id}/{version}"`; its `dependencies` map gives
//! ranges that are resolved against the *other* library versions present in
//! the same target (the lockfile already pinned a concrete graph, so no
//! registry call is needed), falling back to the range's minimum with a
//! warning when nothing in the target satisfies it.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::framework::Tfm;
use crate::graph::{Graph, NodeIdentity, ResolvedNode};
use crate::version::{Version, VersionRange};

use super::ManifestError;

pub struct AssetsJsonReader;

pub struct AssetsJsonResult {
    pub graph: Graph,
    pub project_version: Option<Version>,
    pub warnings: Vec<String>,
}

impl AssetsJsonReader {
    pub fn read(path: &Path, project_tfm: &Tfm) -> Result<AssetsJsonResult, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|_| ManifestError::NotFound(path.to_path_buf()))?;
        let value: Value = serde_json::from_str(&content).map_err(|e| ManifestError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(parse_lockfile(&value, project_tfm))
    }
}

/// Shared between `project.assets.json` and the legacy `project.lock.json`:
/// both store their pinned graph under `targets.<tfm>.<id>/<version>`.
pub(super) fn parse_lockfile(value: &Value, project_tfm: &Tfm) -> AssetsJsonResult {
    let mut warnings = Vec::new();
    let mut graph = Graph::new();

    let target_key = select_target_key(value, project_tfm);
    let Some(target_key) = target_key else {
        warnings.push("no matching target framework section in lockfile".to_string());
        return AssetsJsonResult { graph, project_version: None, warnings };
    };

    let libraries = value
        .get("targets")
        .and_then(|t| t.get(&target_key))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    // Index of every version available per package id within this target,
    // used to resolve each library's dependency ranges to concrete pins.
    let mut versions_by_id: HashMap<String, Vec<Version>> = HashMap::new();
    for key in libraries.keys() {
        if let Some((id, version)) = split_library_key(key)
            && let Ok(v) = version.parse::<Version>()
        {
            versions_by_id.entry(id.to_lowercase()).or_default().push(v);
        }
    }

    let mut identities: HashMap<String, NodeIdentity> = HashMap::new();
    for key in libraries.keys() {
        if let Some((id, version)) = split_library_key(key)
            && let Ok(v) = version.parse::<Version>()
        {
            identities.insert(id.to_lowercase(), NodeIdentity::new(id, v));
        }
    }

    let mut indices = HashMap::new();
    for (id_lower, identity) in &identities {
        let idx = graph.upsert(ResolvedNode::new(identity.name.clone(), identity.version.clone()));
        indices.insert(id_lower.clone(), idx);
    }

    for (key, entry) in &libraries {
        let Some((id, _version)) = split_library_key(key) else { continue };
        let Some(&from_idx) = indices.get(&id.to_lowercase()) else { continue };

        let deps = entry
            .get("dependencies")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        for (dep_id, range_value) in deps {
            let range_str = range_value.as_str().unwrap_or("*");
            let range: VersionRange = range_str.parse().unwrap_or_else(|_| VersionRange::universal());
            let dep_key = dep_id.to_lowercase();

            let pin = versions_by_id
                .get(&dep_key)
                .and_then(|candidates| range.best_match(candidates));

            let pin = match pin {
                Some(v) => v,
                None => {
                    let Some(fallback) = range.fallback() else { continue };
                    warnings.push(format!(
                        "{id} -> {dep_id}: no version in lockfile target satisfies {range}, pinning to {fallback}"
                    ));
                    fallback
                }
            };

            let to_idx = if let Some(&idx) = indices.get(&dep_key) {
                idx
            } else {
                let idx = graph.upsert(ResolvedNode::new(dep_id.clone(), pin));
                indices.insert(dep_key, idx);
                idx
            };
            graph.add_edge(from_idx, to_idx);
        }
    }

    let roots = root_dependency_ids(value, &target_key);
    for root_id in &roots {
        if let Some(&idx) = indices.get(&root_id.to_lowercase()) {
            graph.mark_root(idx);
        }
    }
    if roots.is_empty() {
        // No project-section roots found (e.g. minimal fixture): treat every
        // library as a root so the graph is still usable.
        for idx in graph.all_nodes().collect::<Vec<_>>() {
            graph.mark_root(idx);
        }
    }

    let project_version = value
        .get("project")
        .and_then(|p| p.get("version"))
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok());

    AssetsJsonResult { graph, project_version, warnings }
}

fn select_target_key(value: &Value, project_tfm: &Tfm) -> Option<String> {
    let targets = value.get("targets")?.as_object()?;
    let wanted = project_tfm.short_folder_name();
    if targets.contains_key(&wanted) {
        return Some(wanted);
    }
    // `targets` keys can carry an RID suffix like "net8.0/win-x64"; match the
    // TFM prefix before the slash.
    targets
        .keys()
        .find(|k| k.split('/').next() == Some(wanted.as_str()))
        .cloned()
        .or_else(|| targets.keys().next().cloned())
}

fn split_library_key(key: &str) -> Option<(&str, &str)> {
    key.split_once('/')
}

fn root_dependency_ids(value: &Value, target_key: &str) -> Vec<String> {
    let tfm_only = target_key.split('/').next().unwrap_or(target_key);
    value
        .get("project")
        .and_then(|p| p.get("frameworks"))
        .and_then(|f| f.get(tfm_only))
        .and_then(|f| f.get("dependencies"))
        .and_then(Value::as_object)
        .map(|deps| deps.keys().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_assets_json() {
        let json = serde_json::json!({
            "targets": {
                "net8.0": {
                    "Foo/1.0.0": {
                        "type": "package",
                        "dependencies": { "Bar": "[2.0.0, )" }
                    },
                    "Bar/2.0.0": { "type": "package" }
                }
            },
            "project": {
                "version": "1.0.0",
                "frameworks": {
                    "net8.0": { "dependencies": { "Foo": { "version": "[1.0.0, )" } } }
                }
            }
        });

        let net8 = Tfm::parse("net8.0").unwrap();
        let result = parse_lockfile(&json, &net8);
        assert_eq!(result.graph.len(), 2);
        assert_eq!(result.graph.roots().len(), 1);
        assert_eq!(result.project_version, Some("1.0.0".parse().unwrap()));
    }

    #[test]
    fn falls_back_to_range_minimum_when_unsatisfied() {
        let json = serde_json::json!({
            "targets": {
                "net8.0": {
                    "Foo/1.0.0": {
                        "type": "package",
                        "dependencies": { "Missing": "[9.9.9, )" }
                    }
                }
            },
            "project": { "frameworks": { "net8.0": { "dependencies": {} } } }
        });
        let net8 = Tfm::parse("net8.0").unwrap();
        let result = parse_lockfile(&json, &net8);
        assert!(!result.warnings.is_empty());
    }
}
