//! Flat resolver: `packages.config` discipline, one version per id across
//! the whole project.
//!
//! Implements the fixed-point algorithm described by spec.md's resolver
//! section literally: a table of per-id rows tracks each id's externally
//! pinned range (if any) plus the ranges its current pin's own
//! dependencies impose on other ids; `resolve` repins an id whenever the
//! registry's best match for the combined intersection changes, until no
//! row's pin changes anymore.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::error::CoreError;
use crate::graph::{Graph, ResolvedNode};
use crate::manifest::DirectDependency;
use crate::registries::Registry;
use crate::version::{Version, VersionRange};

use super::{ResolveContext, ResolveOutcome, MAX_RESOLUTION_STEPS};

struct Row {
    name: String,
    external_range: Option<VersionRange>,
    pinned_version: Option<Version>,
    dependencies: HashMap<String, VersionRange>,
}

impl Row {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            external_range: None,
            pinned_version: None,
            dependencies: HashMap::new(),
        }
    }
}

pub async fn resolve_flat<R: Registry>(
    direct: &[DirectDependency],
    ctx: &ResolveContext<'_, R>,
) -> Result<ResolveOutcome, CoreError> {
    let mut table: HashMap<String, Row> = HashMap::new();
    let mut warnings = Vec::new();
    let mut steps = 0usize;

    for dep in direct.iter().filter(|d| d.is_visible()) {
        resolve(&mut table, ctx, &dep.id, Some(dep.range.clone()), &mut warnings, &mut steps).await?;
    }

    let root_ids: std::collections::HashSet<String> = direct
        .iter()
        .filter(|d| d.is_visible())
        .map(|d| d.id.to_lowercase())
        .collect();

    let mut graph = Graph::new();
    let mut indices = HashMap::new();
    for (id_lower, row) in &table {
        let Some(version) = &row.pinned_version else { continue };
        let idx = graph.upsert(ResolvedNode::new(row.name.clone(), version.clone()));
        indices.insert(id_lower.clone(), idx);
        if root_ids.contains(id_lower) {
            graph.mark_root(idx);
        }
    }
    for (id_lower, row) in &table {
        let Some(&from_idx) = indices.get(id_lower) else { continue };
        for dep_id in row.dependencies.keys() {
            if let Some(&to_idx) = indices.get(dep_id) {
                graph.add_edge(from_idx, to_idx);
            }
        }
    }

    Ok(ResolveOutcome { graph, warnings })
}

/// Re-resolves `id` against the table's combined constraints. Recursive
/// (each newly-discovered sub-dependency triggers its own `resolve` call),
/// so it's boxed to erase the otherwise-infinite `async fn` future type.
fn resolve<'a, R: Registry>(
    table: &'a mut HashMap<String, Row>,
    ctx: &'a ResolveContext<'_, R>,
    id: &'a str,
    override_range: Option<VersionRange>,
    warnings: &'a mut Vec<String>,
    steps: &'a mut usize,
) -> Pin<Box<dyn Future<Output = Result<(), CoreError>> + 'a>> {
    Box::pin(async move {
        if *steps >= MAX_RESOLUTION_STEPS {
            warnings.push(format!("resolution step budget exhausted at {id}"));
            return Ok(());
        }
        *steps += 1;

        let id_lower = id.to_lowercase();

        {
            let row = table.entry(id_lower.clone()).or_insert_with(|| Row::new(id));
            if let Some(r) = &override_range {
                match &row.external_range {
                    Some(existing) if existing.to_string() != r.to_string() => {
                        return Err(CoreError::MultipleExternalRanges {
                            id: id.to_string(),
                            ranges: format!("{existing} and {r}"),
                        });
                    }
                    None => row.external_range = Some(r.clone()),
                    _ => {}
                }
            }
        }

        let intersection = intersect_for(table, &id_lower, warnings);

        let best = ctx.client.find_best_version(id, &intersection).await;

        let new_pin = {
            let row = table.get_mut(&id_lower).expect("row inserted above");
            match best {
                None => {
                    let fallback = intersection.fallback();
                    warnings.push(format!("no version of {id} satisfies {intersection}"));
                    row.pinned_version = fallback;
                    return Ok(());
                }
                Some(v) if row.pinned_version.as_ref() == Some(&v) => return Ok(()),
                Some(v) => {
                    row.pinned_version = Some(v.clone());
                    row.dependencies.clear();
                    v
                }
            }
        };

        let deps = ctx.client.dependencies_for(id, &new_pin, ctx.project_tfm).await;
        let mut to_recurse = Vec::with_capacity(deps.len());
        {
            let row = table.get_mut(&id_lower).expect("row inserted above");
            for d in deps {
                row.dependencies.insert(d.id.to_lowercase(), d.range.clone());
                to_recurse.push((d.id, d.range));
            }
        }

        for (dep_id, dep_range) in to_recurse {
            resolve(table, ctx, &dep_id, Some(dep_range), warnings, steps).await?;
        }
        Ok(())
    })
}

/// Intersects `id`'s externally pinned range (if any) with every range any
/// other row's resolved dependencies currently impose on it.
fn intersect_for(table: &HashMap<String, Row>, id_lower: &str, warnings: &mut Vec<String>) -> VersionRange {
    let mut acc = VersionRange::universal();

    let mut ranges = Vec::new();
    if let Some(row) = table.get(id_lower)
        && let Some(r) = &row.external_range
    {
        ranges.push(r.clone());
    }
    for row in table.values() {
        if let Some(r) = row.dependencies.get(id_lower) {
            ranges.push(r.clone());
        }
    }

    for r in ranges {
        match acc.intersect(&r) {
            Ok(next) => acc = next,
            Err(_) => warnings.push(format!(
                "conflicting version ranges for {id_lower}, ignoring the narrower constraint"
            )),
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::{FrameworkVersion, Tfm};
    use crate::registries::client::RegistryClient;
    use crate::registries::{DependencyGroup, PackageDependency, PackageMetadata};

    struct FakeRegistry {
        table: HashMap<String, Vec<PackageMetadata>>,
    }

    impl Registry for FakeRegistry {
        async fn fetch_versions(&self, package_id: &str) -> anyhow::Result<Vec<PackageMetadata>> {
            Ok(self.table.get(&package_id.to_lowercase()).cloned().unwrap_or_default())
        }
    }

    fn meta(version: &str, deps: Vec<PackageDependency>) -> PackageMetadata {
        PackageMetadata {
            version: version.parse().unwrap(),
            listed: true,
            description: None,
            project_url: None,
            license_expression: None,
            license_url: None,
            authors: None,
            owners: None,
            tags: None,
            deprecated: false,
            published: None,
            dependency_groups: vec![DependencyGroup {
                target_framework: Tfm::Any,
                dependencies: deps,
            }],
        }
    }

    #[tokio::test]
    async fn repins_when_a_deeper_dependency_tightens_the_range() {
        let mut table = HashMap::new();
        table.insert(
            "top".to_string(),
            vec![meta(
                "1.0.0",
                vec![PackageDependency { id: "shared".to_string(), range: VersionRange::universal() }],
            )],
        );
        table.insert(
            "other".to_string(),
            vec![meta(
                "1.0.0",
                vec![PackageDependency {
                    id: "shared".to_string(),
                    range: ">= 2.0.0".parse().unwrap(),
                }],
            )],
        );
        table.insert(
            "shared".to_string(),
            vec![meta("1.0.0", vec![]), meta("2.0.0", vec![])],
        );

        let client = RegistryClient::new(vec![FakeRegistry { table }]);
        let tfm = Tfm::NetCoreUnified(FrameworkVersion::new(8, 0));
        let ctx = ResolveContext { client: &client, project_tfm: &tfm };

        let direct = vec![
            DirectDependency::new("top", VersionRange::universal()),
            DirectDependency::new("other", VersionRange::universal()),
        ];
        let outcome = resolve_flat(&direct, &ctx).await.unwrap();

        let shared = outcome
            .graph
            .all_nodes()
            .map(|idx| outcome.graph.node(idx))
            .find(|n| n.name == "shared")
            .unwrap();
        assert_eq!(shared.version, "2.0.0".parse().unwrap());
    }

    #[tokio::test]
    async fn conflicting_external_ranges_fail_fatally() {
        let client: RegistryClient<FakeRegistry> = RegistryClient::new(vec![FakeRegistry { table: HashMap::new() }]);
        let tfm = Tfm::NetCoreUnified(FrameworkVersion::new(8, 0));
        let ctx = ResolveContext { client: &client, project_tfm: &tfm };

        let mut table = HashMap::new();
        let mut warnings = Vec::new();
        let mut steps = 0;
        resolve(&mut table, &ctx, "foo", Some("1.0.0".parse().unwrap()), &mut warnings, &mut steps)
            .await
            .unwrap();
        let err = resolve(&mut table, &ctx, "foo", Some("2.0.0".parse().unwrap()), &mut warnings, &mut steps)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MultipleExternalRanges { .. }));
    }
}
