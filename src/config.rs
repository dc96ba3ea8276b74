//! Scan-level configuration: cache behavior and the default registry feed,
//! plus an explicit, immutable tracing configuration threaded through at
//! construction rather than toggled through global state.

use serde::Deserialize;

/// Default cache TTL (1 hour), mirrored from [`crate::cache::sqlite::SqliteCache`]'s
/// own default.
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

const DEFAULT_NUGET_ORG_SERVICE_INDEX: &str = "https://api.nuget.org/v3/index.json";

/// Scan configuration: how long cached registry responses stay fresh,
/// whether the persistent SQLite tier is used at all, and which feed a
/// scan queries when no `nuget.config` names one.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache TTL in seconds, applied to both the in-memory and SQLite
    /// cache tiers.
    pub cache_ttl_secs: u64,
    /// Persist registry responses to `~/.cache/dotnet-depgraph/cache.db`
    /// across runs. Disabling falls back to an in-process-only cache.
    pub use_sqlite_cache: bool,
    /// Service index URL queried when no feed is configured via
    /// `nuget.config` and `--no-nuget-org` was not passed.
    pub default_service_index_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            use_sqlite_cache: true,
            default_service_index_url: DEFAULT_NUGET_ORG_SERVICE_INDEX.to_string(),
        }
    }
}

impl Config {
    /// Parses configuration from a JSON value (e.g. a `--config` file),
    /// falling back to defaults for missing or unparseable input.
    pub fn from_json(value: Option<serde_json::Value>) -> Self {
        match value {
            Some(v) => serde_json::from_value(v).unwrap_or_default(),
            None => Self::default(),
        }
    }
}

/// How verbose `tracing` output should be. Passed explicitly into
/// [`TraceConfig::env_filter`] rather than read from ambient global state,
/// so a scan's log verbosity is reproducible from its inputs alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceVerbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

/// Immutable logging configuration built once at startup and handed to
/// `tracing_subscriber` during initialization.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceConfig {
    pub verbosity: TraceVerbosity,
}

impl TraceConfig {
    pub fn new(verbosity: TraceVerbosity) -> Self {
        Self { verbosity }
    }

    /// The `tracing_subscriber::EnvFilter` directive this configuration
    /// maps to. `RUST_LOG`, when set, always takes precedence.
    pub fn filter_directive(&self) -> &'static str {
        match self.verbosity {
            TraceVerbosity::Quiet => "warn",
            TraceVerbosity::Normal => "info",
            TraceVerbosity::Verbose => "debug",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_config_uses_nuget_org_and_sqlite() {
        let config = Config::default();
        assert_eq!(config.cache_ttl_secs, DEFAULT_CACHE_TTL_SECS);
        assert!(config.use_sqlite_cache);
        assert_eq!(config.default_service_index_url, DEFAULT_NUGET_ORG_SERVICE_INDEX);
    }

    #[test]
    fn parses_partial_overrides_from_json() {
        let config = Config::from_json(Some(json!({ "use_sqlite_cache": false })));
        assert!(!config.use_sqlite_cache);
        assert_eq!(config.cache_ttl_secs, DEFAULT_CACHE_TTL_SECS);
    }

    #[test]
    fn invalid_json_falls_back_to_defaults() {
        let config = Config::from_json(Some(json!("not an object")));
        assert_eq!(config.cache_ttl_secs, DEFAULT_CACHE_TTL_SECS);
    }

    #[test]
    fn trace_verbosity_maps_to_filter_directives() {
        assert_eq!(TraceConfig::new(TraceVerbosity::Quiet).filter_directive(), "warn");
        assert_eq!(TraceConfig::new(TraceVerbosity::Normal).filter_directive(), "info");
        assert_eq!(TraceConfig::new(TraceVerbosity::Verbose).filter_directive(), "debug");
    }
}
