//! Tree resolver: `PackageReference`/`project.json` discipline.
//!
//! Nearest-wins, BFS from the direct dependencies: the first version pinned
//! for an id sticks as long as later constraints on the same id are
//! already satisfied by it. A later, unsatisfied constraint does force a
//! repin (the spec doesn't special-case this — an upgrade is preferable to
//! a silent constraint violation), but because direct deps are seeded
//! first and the worklist is processed breadth-first, the common case
//! keeps the version closest to the root.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::graph::{Graph, ResolvedNode};
use crate::manifest::DirectDependency;
use crate::registries::Registry;
use crate::version::Version;

use super::{ResolveContext, ResolveOutcome, MAX_RESOLUTION_STEPS};

pub async fn resolve_tree<R: Registry>(
    direct: &[DirectDependency],
    ctx: &ResolveContext<'_, R>,
) -> ResolveOutcome {
    let mut resolved: HashMap<String, (String, Version)> = HashMap::new();
    let mut warnings = Vec::new();
    let mut edges: Vec<(String, String)> = Vec::new();

    let mut queue: VecDeque<(String, crate::version::VersionRange, Option<String>)> = VecDeque::new();
    for dep in direct.iter().filter(|d| d.is_visible()) {
        queue.push_back((dep.id.clone(), dep.range.clone(), None));
    }

    let mut steps = 0usize;
    while let Some((id, range, parent)) = queue.pop_front() {
        if steps >= MAX_RESOLUTION_STEPS {
            warnings.push(format!("resolution step budget exhausted at {id}"));
            break;
        }
        steps += 1;

        let id_lower = id.to_lowercase();
        if let Some(parent_lower) = &parent {
            edges.push((parent_lower.clone(), id_lower.clone()));
        }

        let satisfies_existing = resolved
            .get(&id_lower)
            .map(|(_, v)| range.contains(v))
            .unwrap_or(false);
        if satisfies_existing {
            continue;
        }

        let best = ctx.client.find_best_version(&id, &range).await;
        let pin = match best {
            Some(v) => v,
            None => match range.fallback() {
                Some(fallback) => {
                    warnings.push(format!("no version of {id} satisfies {range}, pinning to {fallback}"));
                    fallback
                }
                None => {
                    warnings.push(format!("no version of {id} satisfies {range}"));
                    continue;
                }
            },
        };

        resolved.insert(id_lower.clone(), (id.clone(), pin.clone()));

        let deps = ctx.client.dependencies_for(&id, &pin, ctx.project_tfm).await;
        for d in deps {
            queue.push_back((d.id, d.range, Some(id_lower.clone())));
        }
    }

    let mut graph = Graph::new();
    let mut indices = HashMap::new();
    for (id_lower, (name, version)) in &resolved {
        let idx = graph.upsert(ResolvedNode::new(name.clone(), version.clone()));
        indices.insert(id_lower.clone(), idx);
    }

    let mut has_incoming: HashSet<String> = HashSet::new();
    for (parent_lower, child_lower) in &edges {
        if let (Some(&from), Some(&to)) = (indices.get(parent_lower), indices.get(child_lower)) {
            graph.add_edge(from, to);
            has_incoming.insert(child_lower.clone());
        }
    }

    for dep in direct.iter().filter(|d| d.is_visible()) {
        let lower = dep.id.to_lowercase();
        if !has_incoming.contains(&lower)
            && let Some(&idx) = indices.get(&lower)
        {
            graph.mark_root(idx);
        }
    }

    ResolveOutcome { graph, warnings }
}
