//! Acquire and cache Zig toolchains under `<dir>/zig/<version>`.

use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Deserialize;
use url::Url;

use crate::error::ZgoError;
use crate::triple::{Os, Platform};
use crate::utils::{self, Extractable, TempFileGuard, Transport};

/// Kind tag of the toolchain, used as directory name and executable name.
pub const ZIG: &str = "zig";
pub const NIGHTLY_INDEX_URL: &str = "https://ziglang.org/download/index.json";
pub const DOWNLOAD_BASE_URL: &str = "https://ziglang.org/builds/";

const TEMP_ARCHIVE_STEM: &str = "download.tmp";
const STAGING_SUFFIX: &str = "partial";

/// Which Zig the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolchainVersion {
    /// Whatever `zig` is on `PATH`, never downloaded.
    System,
    /// Resolve the latest nightly build from the download index.
    LatestNightly,
    Pinned(String),
}

impl ToolchainVersion {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "system" => Self::System,
            "" => Self::LatestNightly,
            v => Self::Pinned(v.to_string()),
        }
    }
}

impl fmt::Display for ToolchainVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::LatestNightly => f.write_str("latest nightly"),
            Self::Pinned(v) => f.write_str(v),
        }
    }
}

/// A usable Zig installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Absolute path to the `zig` executable.
    pub exe: PathBuf,
    /// The concrete version, or `system`.
    pub version: String,
}

impl Toolchain {
    /// Directory holding the executable, which goes first on `PATH`.
    pub fn bin_dir(&self) -> &Path {
        self.exe.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// How Zig releases are packaged for a given host OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLayout {
    pub extension: &'static str,
    /// Leading path components to drop from every archive entry.
    pub strip_components: usize,
}

/// The host decides the archive format, not the target.
pub fn archive_layout(host: Os) -> ArchiveLayout {
    match host {
        // zip releases have no top-level directory
        Os::Windows => ArchiveLayout {
            extension: "zip",
            strip_components: 0,
        },
        Os::Linux | Os::Darwin => ArchiveLayout {
            extension: "tar.xz",
            strip_components: 1,
        },
    }
}

#[derive(Deserialize)]
struct DownloadIndex {
    master: IndexEntry,
}

#[derive(Deserialize)]
struct IndexEntry {
    version: String,
}

/// Ensure Zig toolchains exist on disk.
pub struct ToolchainCache<'a, T: Transport + ?Sized> {
    /// `<dir>/zig`
    root: PathBuf,
    host: Platform,
    transport: &'a T,
    index_url: Url,
    download_base: Url,
    quiet: bool,
}

impl<'a, T: Transport + ?Sized> ToolchainCache<'a, T> {
    pub fn new(cache_dir: &Path, host: Platform, transport: &'a T) -> Result<Self> {
        Ok(Self {
            root: cache_dir.join(ZIG),
            host,
            transport,
            index_url: utils::parse_url(NIGHTLY_INDEX_URL)?,
            download_base: utils::parse_url(DOWNLOAD_BASE_URL)?,
            quiet: false,
        })
    }

    /// Do not draw extraction progress bars.
    pub fn quiet(mut self, yes: bool) -> Self {
        self.quiet = yes;
        self
    }

    /// Use another location for the nightly index, such as a mirror.
    pub fn index_url(mut self, url: Url) -> Self {
        self.index_url = url;
        self
    }

    /// Use another server to download releases from.
    pub fn download_base(mut self, url: Url) -> Self {
        self.download_base = url;
        self
    }

    fn exe_name(&self) -> String {
        format!("{ZIG}{}", self.host.os.exe_suffix())
    }

    /// Directory a given version gets extracted into.
    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.root.join(version)
    }

    /// Where a version is extracted to before it is moved into place.
    pub fn staging_dir(&self, version: &str) -> PathBuf {
        self.root.join(format!("{version}.{STAGING_SUFFIX}"))
    }

    /// Where the archive is downloaded to before extraction.
    pub fn temp_archive_path(&self) -> PathBuf {
        let layout = archive_layout(self.host.os);
        self.root
            .join(format!("{TEMP_ARCHIVE_STEM}.{}", layout.extension))
    }

    /// Release archive of `version` for the host platform.
    pub fn download_url(&self, version: &str) -> Result<Url> {
        let layout = archive_layout(self.host.os);
        let file = format!(
            "{ZIG}-{}-{}-{version}.{}",
            self.host.os.zig_name(),
            self.host.arch.zig_name(),
            layout.extension
        );
        self.download_base
            .join(&file)
            .with_context(|| format!("unable to build download url for '{file}'"))
    }

    /// Ask the download index for the latest nightly version.
    pub fn resolve_latest_nightly(&self) -> Result<String> {
        let url = &self.index_url;
        let body = self
            .transport
            .get_text(url)
            .map_err(|e| ZgoError::resolution(url, e))?;
        let index: DownloadIndex =
            serde_json::from_str(&body).map_err(|e| ZgoError::resolution(url, e))?;
        info!("latest nightly zig version is {}", index.master.version);
        Ok(index.master.version)
    }

    /// Make sure the requested toolchain is available and return it.
    ///
    /// `path_var` is the `PATH` used to look for a `system` installation.
    pub fn ensure(
        &self,
        version: &ToolchainVersion,
        path_var: Option<&OsStr>,
    ) -> Result<Toolchain> {
        match version {
            ToolchainVersion::System => {
                let exe = utils::find_executable(&self.exe_name(), path_var).ok_or_else(|| {
                    ZgoError::ToolchainNotFound {
                        name: ZIG.to_string(),
                    }
                })?;
                info!(
                    "configured to use system zig installation ({})",
                    exe.display()
                );
                Ok(Toolchain {
                    exe: utils::to_nomalized_abspath(exe)?,
                    version: "system".to_string(),
                })
            }
            ToolchainVersion::LatestNightly => {
                let resolved = self.resolve_latest_nightly()?;
                self.ensure_version(&resolved)
            }
            ToolchainVersion::Pinned(v) => self.ensure_version(v),
        }
    }

    /// Download and extract `version` unless it is already in the cache.
    ///
    /// A cached version without its executable is installed again.
    pub fn ensure_version(&self, version: &str) -> Result<Toolchain> {
        validate_version(version)?;
        let dir = self.version_dir(version);
        let exe = dir.join(self.exe_name());
        if !exe.is_file() {
            if dir.exists() {
                warn!("'{}' is missing, installing zig {version} again", exe.display());
                utils::remove(&dir)?;
            }
            self.download_extract(version, &dir)
                .with_context(|| format!("failed to install zig {version}"))?;
        }

        Ok(Toolchain {
            exe: utils::to_nomalized_abspath(exe)?,
            version: version.to_string(),
        })
    }

    fn download_extract(&self, version: &str, dest: &Path) -> Result<()> {
        let url = self.download_url(version)?;
        // removed on every return path below
        let archive = TempFileGuard::new(self.temp_archive_path())?;

        self.transport.download_file(&url, archive.path())?;

        // `dest` only ever appears complete, an interrupted run leaves the staging dir behind
        let staging = self.staging_dir(version);
        utils::remove(&staging)?;
        let installed = self.extract_checked(archive.path(), &staging).and_then(|()| {
            fs::rename(&staging, dest).with_context(|| {
                format!(
                    "unable to move '{}' to '{}'",
                    staging.display(),
                    dest.display()
                )
            })
        });
        if installed.is_err() {
            if let Err(e) = utils::remove(&staging) {
                warn!("{e:#}");
            }
        }
        installed
    }

    fn extract_checked(&self, archive: &Path, dest: &Path) -> Result<()> {
        let layout = archive_layout(self.host.os);
        Extractable::load(archive)?
            .quiet(self.quiet)
            .extract_to(dest, layout.strip_components)?;

        let exe_name = self.exe_name();
        if !dest.join(&exe_name).is_file() {
            return Err(ZgoError::Extraction {
                archive: archive.to_path_buf(),
                reason: format!("no '{exe_name}' at the top of the extracted release"),
            }
            .into());
        }
        Ok(())
    }
}

/// A version ends up as a directory name, so it must be a single plain path component.
fn validate_version(version: &str) -> Result<()> {
    let mut comps = Path::new(version).components();
    match (comps.next(), comps.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ZgoError::Usage(format!("invalid zig version '{version}'")).into()),
    }
}
