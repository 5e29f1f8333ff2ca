//! The macOS SDK needed to link darwin binaries, kept as a pinned git checkout.

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{debug, info, warn};

use crate::error::ZgoError;
use crate::utils;

pub const XCODE_LICENSE_URL: &str = "https://www.apple.com/legal/sla/docs/xcode.pdf";

/// The operations needed to keep a checkout at a given revision.
pub trait SourceControl {
    fn clone_repo(&self, remote: &str, dir: &Path) -> Result<()>;
    /// Full hash of the currently checked out commit.
    fn head(&self, dir: &Path) -> Result<String>;
    fn reset_hard(&self, dir: &Path, rev: &str) -> Result<()>;
    fn fetch(&self, dir: &Path) -> Result<()>;
}

/// [`SourceControl`] using the `git` command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl GitCli {
    const PROGRAM: &'static str = "git";

    fn run(&self, args: &[&str], cwd: Option<&Path>) -> Result<()> {
        let status = utils::execute_streamed(
            Self::PROGRAM,
            args,
            std::iter::empty::<(&str, &str)>(),
            cwd,
        )?;
        if status.success() {
            Ok(())
        } else {
            Err(ZgoError::SourceControl {
                command: utils::format_cmd_line(Self::PROGRAM, args),
                reason: status.to_string(),
            }
            .into())
        }
    }
}

impl SourceControl for GitCli {
    fn clone_repo(&self, remote: &str, dir: &Path) -> Result<()> {
        let dir = dir.to_string_lossy();
        self.run(&["clone", "-c", "core.longpaths=true", remote, &*dir], None)
    }

    fn head(&self, dir: &Path) -> Result<String> {
        let args = ["rev-parse", "HEAD"];
        utils::execute_for_output(Self::PROGRAM, &args, Some(dir)).map_err(|e| {
            ZgoError::SourceControl {
                command: utils::format_cmd_line(Self::PROGRAM, &args),
                reason: format!("{e:#}"),
            }
            .into()
        })
    }

    fn reset_hard(&self, dir: &Path, rev: &str) -> Result<()> {
        self.run(&["reset", "--quiet", "--hard", rev], Some(dir))
    }

    fn fetch(&self, dir: &Path) -> Result<()> {
        self.run(&["fetch"], Some(dir))
    }
}

/// A git repository to check out at one exact commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompanionSdk {
    pub name: &'static str,
    pub remote: &'static str,
    pub revision: &'static str,
}

pub const MACOS_SDK: CompanionSdk = CompanionSdk {
    name: "sdk-macos-12.0",
    remote: "https://github.com/hexops/sdk-macos-12.0",
    revision: "14613b4917c7059dad8f3789f55bb13a2548f83d",
};

impl CompanionSdk {
    /// Checkout location inside the cache directory.
    pub fn dir(&self, cache_dir: &Path) -> PathBuf {
        cache_dir.join(self.name)
    }

    /// Clone or repair the checkout, returning its absolute path.
    pub fn ensure<G: SourceControl + ?Sized>(&self, git: &G, cache_dir: &Path) -> Result<PathBuf> {
        let dir = utils::to_nomalized_abspath(self.dir(cache_dir))?;
        ensure_cloned(git, self.remote, self.revision, &dir)?;
        Ok(dir)
    }
}

/// Make sure `dir` is a checkout of `remote` with `rev` as HEAD.
///
/// A drifted checkout is hard reset. If the revision is unknown locally the
/// remote is fetched once and the reset retried once.
pub fn ensure_cloned<G: SourceControl + ?Sized>(
    git: &G,
    remote: &str,
    rev: &str,
    dir: &Path,
) -> Result<()> {
    if !dir.exists() {
        info!("cloning '{remote}' into '{}'", dir.display());
        utils::ensure_parent_dir(dir)?;
        git.clone_repo(remote, dir)?;
    }

    let head = git.head(dir)?;
    if head == rev {
        debug!("'{}' already at {rev}", dir.display());
        return Ok(());
    }

    info!("updating '{}' from {head} to {rev}", dir.display());
    if let Err(e) = git.reset_hard(dir, rev) {
        warn!("{e:#}, fetching and trying again");
        git.fetch(dir)?;
        git.reset_hard(dir, rev)?;
    }
    Ok(())
}
