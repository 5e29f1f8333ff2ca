//! Typed failures that callers (and tests) may want to tell apart.
//!
//! Most functions in this crate return [`anyhow::Result`] and attach the name of the
//! failing operation with [`anyhow::Context`]. The variants below are what ends up
//! at the bottom of that chain, reachable with `err.downcast_ref::<ZgoError>()`.

use std::path::PathBuf;
use std::process::ExitStatus;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum ZgoError {
    #[error("malformed configuration file '{}'", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(
        "macOS target requires the Xcode SDK license to be accepted, \
        set `acceptXCodeLicense = true` in zgo.toml or ZGO_ACCEPT_XCODE_LICENSE=true"
    )]
    LicenseNotAccepted,

    #[error("unsupported {kind} '{value}'")]
    UnsupportedPlatform { kind: &'static str, value: String },

    #[error("'{name}' is not installed (zgo is configured to use the system installation)")]
    ToolchainNotFound { name: String },

    #[error("unable to resolve the latest nightly version from '{url}'")]
    ResolutionFailed {
        url: String,
        #[source]
        source: BoxedError,
    },

    #[error("failed to download '{url}'")]
    Network {
        url: String,
        #[source]
        source: BoxedError,
    },

    #[error("'{}' is not a supported archive format", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to extract '{}': {reason}", archive.display())]
    Extraction { archive: PathBuf, reason: String },

    #[error("`{command}` failed: {reason}")]
    SourceControl { command: String, reason: String },

    #[error("`{command}` exited with {status}")]
    BuildFailed { command: String, status: ExitStatus },

    #[error("{0}")]
    Usage(String),
}

impl ZgoError {
    pub(crate) fn network<E>(url: impl ToString, source: E) -> Self
    where
        E: Into<BoxedError>,
    {
        Self::Network {
            url: url.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn resolution<E>(url: impl ToString, source: E) -> Self
    where
        E: Into<BoxedError>,
    {
        Self::ResolutionFailed {
            url: url.to_string(),
            source: source.into(),
        }
    }
}
