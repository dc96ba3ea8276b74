//! Reader for the pre-SDK `project.json` manifest (the original
//! `dotnet`/`xproj` dependency format, superseded by `PackageReference` in
//! csproj). Unlike the two lockfile formats, `project.json` is a *manifest*
//! — it names direct dependencies and ranges but carries no pre-pinned
//! graph, so its output feeds the tree resolver exactly like
//! `PackageReference` does.
//!
//! ```json
//! {
//!   "version": "1.0.0-*",
//!   "dependencies": {
//!     "Newtonsoft.Json": "9.0.1",
//!     "Microsoft.NETCore.App": { "version": "1.0.0", "type": "platform" }
//!   },
//!   "frameworks": {
//!     "netcoreapp1.0": { "dependencies": { "SomeLib": "2.0.0" } }
//!   }
//! }
//! ```

use std::path::Path;

use serde_json::Value;

use crate::framework::Tfm;
use crate::version::{Version, VersionRange};

use super::{DependencyFlags, DirectDependency, ManifestError};

pub struct ProjectJsonReader;

pub struct ProjectJsonResult {
    pub dependencies: Vec<DirectDependency>,
    pub project_version: Option<Version>,
    pub warnings: Vec<String>,
}

impl ProjectJsonReader {
    pub fn read(path: &Path, project_tfm: &Tfm) -> Result<ProjectJsonResult, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|_| ManifestError::NotFound(path.to_path_buf()))?;
        let value: Value = serde_json::from_str(&content).map_err(|e| ManifestError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self::parse_value(&value, project_tfm))
    }

    fn parse_value(value: &Value, project_tfm: &Tfm) -> ProjectJsonResult {
        let mut warnings = Vec::new();
        let mut dependencies = Vec::new();

        if let Some(deps) = value.get("dependencies").and_then(Value::as_object) {
            collect_dependencies(deps, None, &mut dependencies, &mut warnings);
        }

        if let Some(frameworks) = value.get("frameworks").and_then(Value::as_object) {
            let wanted = project_tfm.short_folder_name();
            if let Some(section) = frameworks.get(&wanted)
                && let Some(deps) = section.get("dependencies").and_then(Value::as_object)
            {
                collect_dependencies(deps, Some(*project_tfm), &mut dependencies, &mut warnings);
            }
        }

        let project_version = value
            .get("version")
            .and_then(Value::as_str)
            .and_then(|s| s.split('-').next())
            .and_then(|s| s.parse().ok());

        ProjectJsonResult { dependencies, project_version, warnings }
    }
}

fn collect_dependencies(
    deps: &serde_json::Map<String, Value>,
    framework: Option<Tfm>,
    out: &mut Vec<DirectDependency>,
    warnings: &mut Vec<String>,
) {
    for (id, spec) in deps {
        let (version_str, is_platform) = match spec {
            Value::String(s) => (s.clone(), false),
            Value::Object(obj) => {
                let is_platform = obj.get("type").and_then(Value::as_str) == Some("platform");
                let version = obj
                    .get("version")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_default();
                (version, is_platform)
            }
            _ => {
                warnings.push(format!("unrecognized dependency spec for {id}"));
                continue;
            }
        };

        if is_platform {
            // Platform references (e.g. Microsoft.NETCore.App) describe the
            // runtime, not a package to resolve.
            continue;
        }

        let range: VersionRange = if version_str.is_empty() {
            VersionRange::universal()
        } else {
            version_str.parse().unwrap_or_else(|_| {
                warnings.push(format!("invalid version range {version_str:?} for {id}"));
                VersionRange::universal()
            })
        };

        out.push(DirectDependency {
            id: id.clone(),
            range,
            framework,
            flags: DependencyFlags::default(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_top_level_and_framework_dependencies() {
        let json = serde_json::json!({
            "version": "1.0.0-beta",
            "dependencies": {
                "Newtonsoft.Json": "9.0.1",
                "Microsoft.NETCore.App": { "version": "1.0.0", "type": "platform" }
            },
            "frameworks": {
                "netcoreapp1.0": { "dependencies": { "SomeLib": "2.0.0" } }
            }
        });
        let tfm = Tfm::parse("netcoreapp1.0").unwrap();
        let result = ProjectJsonReader::parse_value(&json, &tfm);
        assert_eq!(result.dependencies.len(), 2);
        assert!(result.dependencies.iter().any(|d| d.id == "Newtonsoft.Json"));
        assert!(result.dependencies.iter().any(|d| d.id == "SomeLib"));
        assert!(!result.dependencies.iter().any(|d| d.id == "Microsoft.NETCore.App"));
        assert_eq!(result.project_version, Some("1.0.0".parse().unwrap()));
    }
}
