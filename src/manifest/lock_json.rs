//! Reader for the legacy `project.lock.json` format (pre-SDK-style NuGet
//! restore lockfile, predating `obj/project.assets.json`).
//!
//! Shares the same `targets.<tfm>.<id>/<version>.dependencies` shape as
//! `project.assets.json`, so the library-graph construction is delegated to
//! [`super::assets_json::parse_lockfile`]. The one structural difference
//! this reader handles itself is the root-dependency source: instead of
//! `project.frameworks.<tfm>.dependencies`, legacy lockfiles list roots
//! under `projectFileDependencyGroups` as raw `"Id OP Version"` strings
//! keyed by the *framework display name* (e.g.
//! `".NETFramework,Version=v4.6.1"`), parsed with the same four relational
//! operators used by `packages.config`'s sibling constraints.

use std::path::Path;

use petgraph::graph::NodeIndex;
use serde_json::Value;

use crate::framework::Tfm;
use crate::graph::Graph;
use crate::version::Version;

use super::ManifestError;

pub struct LockJsonReader;

pub struct LockJsonResult {
    pub graph: Graph,
    pub project_version: Option<Version>,
    pub warnings: Vec<String>,
}

impl LockJsonReader {
    pub fn read(path: &Path, project_tfm: &Tfm) -> Result<LockJsonResult, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|_| ManifestError::NotFound(path.to_path_buf()))?;
        let value: Value = serde_json::from_str(&content).map_err(|e| ManifestError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut result = super::assets_json::parse_lockfile(&value, project_tfm);

        if let Some(groups) = value.get("projectFileDependencyGroups").and_then(Value::as_object) {
            let root_ids = collect_root_ids(groups);
            let mut matched_any = false;
            for root_id in &root_ids {
                if let Some(idx) = find_by_name(&result.graph, root_id) {
                    result.graph.mark_root(idx);
                    matched_any = true;
                }
            }
            if !root_ids.is_empty() && !matched_any {
                result.warnings.push(
                    "projectFileDependencyGroups named no library present in targets".to_string(),
                );
            }
        }

        Ok(LockJsonResult {
            graph: result.graph,
            project_version: result.project_version,
            warnings: result.warnings,
        })
    }
}

fn collect_root_ids(groups: &serde_json::Map<String, Value>) -> Vec<String> {
    let mut ids = Vec::new();
    for constraints in groups.values().filter_map(Value::as_array) {
        for c in constraints.iter().filter_map(Value::as_str) {
            if let Some(id) = c.split_whitespace().next() {
                ids.push(id.to_string());
            }
        }
    }
    ids
}

fn find_by_name(graph: &Graph, name: &str) -> Option<NodeIndex> {
    graph
        .all_nodes()
        .find(|&idx| graph.node(idx).name.eq_ignore_ascii_case(name))
}


#[cfg(test)]
impl LockJsonReader {
    fn parse_value(value: &Value, project_tfm: &Tfm) -> LockJsonResult {
        let mut result = super::assets_json::parse_lockfile(value, project_tfm);
        if let Some(groups) = value.get("projectFileDependencyGroups").and_then(Value::as_object) {
            for root_id in collect_root_ids(groups) {
                if let Some(idx) = find_by_name(&result.graph, &root_id) {
                    result.graph.mark_root(idx);
                }
            }
        }
        LockJsonResult {
            graph: result.graph,
            project_version: result.project_version,
            warnings: result.warnings,
        }
    }
}
