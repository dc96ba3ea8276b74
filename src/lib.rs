//! Transitive NuGet dependency graph resolver for .NET project manifests.
//!
//! Given a project directory, determines the applicable manifest strategy
//! (`project.assets.json`, `project.lock.json`, `packages.config`,
//! `project.json`, or the project file itself), resolves the full
//! transitive dependency graph against one or more NuGet v3 feeds, and
//! emits a deterministic, sorted report. See [`scanner::ProjectScanner`]
//! for the entry point.

pub mod cache;
pub mod config;
pub mod error;
pub mod framework;
pub mod graph;
pub mod manifest;
pub mod nuget_config;
pub mod registries;
pub mod report;
pub mod resolver;
pub mod scanner;
pub mod version;
