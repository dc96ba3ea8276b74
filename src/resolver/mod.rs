//! Turns a project's direct dependencies into a pinned [`Graph`], under one
//! of two disciplines depending on the manifest strategy that produced
//! them: [`flat`] for `packages.config` (single version per id, globally),
//! [`tree`] for `PackageReference`/`project.json` (nearest-wins, multiple
//! versions of the same id may coexist in different subtrees).
//!
//! Both resolvers share the registry client and project TFM, and both
//! protect against runaway recursion with the same step budget — a
//! malformed or adversarial dependency graph (or a registry bug that keeps
//! returning "new" versions) must not hang a scan.

pub mod flat;
pub mod tree;

use crate::framework::Tfm;
use crate::registries::client::RegistryClient;
use crate::registries::Registry;

/// Upper bound on `resolve` calls/worklist pops per scan. Generous enough
/// for any real dependency tree; exists only to turn a pathological input
/// into a bounded error rather than an unbounded hang.
pub const MAX_RESOLUTION_STEPS: usize = 50_000;

/// Shared inputs threaded through both resolver disciplines.
pub struct ResolveContext<'a, R: Registry> {
    pub client: &'a RegistryClient<R>,
    pub project_tfm: &'a Tfm,
}

/// Everything a resolver pass produces: the pinned graph plus any
/// non-fatal issues recorded along the way (unsatisfiable ranges, fallback
/// pins, step-budget exhaustion).
pub struct ResolveOutcome {
    pub graph: crate::graph::Graph,
    pub warnings: Vec<String>,
}
