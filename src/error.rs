//! Crate-wide error kinds and the scan status they map to.

use thiserror::Error;

use crate::version::VersionError;

/// Errors that can cross the library boundary out of [`crate::scanner::ProjectScanner`].
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest not found at {0}")]
    ManifestNotFound(String),

    #[error("failed to parse manifest {path}: {reason}")]
    ManifestParseError { path: String, reason: String },

    #[error("unsupported target framework: {0}")]
    UnsupportedFramework(String),

    #[error("package {id} has conflicting externally-pinned ranges: {ranges}")]
    MultipleExternalRanges { id: String, ranges: String },

    #[error("no available version of {id} satisfies {range}")]
    NoVersionSatisfies { id: String, range: String },

    #[error("registry endpoint failed: {0}")]
    RegistryEndpointFailure(String),

    #[error("failed to fetch metadata for {id}: {reason}")]
    MetadataFetchFailure { id: String, reason: String },

    #[error("failed to evaluate project file {path}: {reason}")]
    ProjectFileEvaluationFailure { path: String, reason: String },

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Framework(#[from] crate::framework::FrameworkError),
}

/// Top-level outcome attached to a [`crate::report::ProjectReport`], mapped
/// to a process exit code at the CLI boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    #[default]
    Success,
    PartialSuccess,
    Error,
}

impl ScanStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            ScanStatus::Success | ScanStatus::PartialSuccess => 0,
            ScanStatus::Error => 1,
        }
    }
}
