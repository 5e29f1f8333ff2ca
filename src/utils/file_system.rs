use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub fn mkdirs<P: AsRef<Path>>(path: P) -> Result<()> {
    fs::create_dir_all(path.as_ref()).with_context(|| {
        format!(
            "unable to create specified directory '{}'",
            path.as_ref().display()
        )
    })
}

/// Create a directory (and its parents) if it does not exist yet.
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    if !path.as_ref().is_dir() {
        mkdirs(path)?;
    }
    Ok(())
}

/// Make sure the parent directory of `path` exists.
pub fn ensure_parent_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

/// Remove a file or a directory, doing nothing if the path does not exist.
pub fn remove<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    let res = if path.is_dir() {
        fs::remove_dir_all(path)
    } else if path.exists() {
        fs::remove_file(path)
    } else {
        return Ok(());
    };
    res.with_context(|| format!("unable to remove '{}'", path.display()))
}

/// Wrapper to [`std::fs::read_to_string`] but with additional error context.
///
/// Returns `Ok(None)` when the file does not exist.
pub fn read_to_string_opt<P: AsRef<Path>>(path: P) -> Result<Option<String>> {
    match fs::read_to_string(path.as_ref()) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => {
            Err(e).with_context(|| format!("failed to read '{}'", path.as_ref().display()))
        }
    }
}

pub fn to_nomalized_abspath<P: AsRef<Path> + Into<PathBuf>>(path: P) -> Result<PathBuf> {
    let raw = if path.as_ref().is_absolute() {
        path.into()
    } else {
        env::current_dir()
            .context("current directory cannot be determined")
            .map(|mut cd| {
                cd.push(path);
                cd
            })?
    };
    // Remove any `.` and `..` from origin path
    let mut nomalized_path = PathBuf::new();
    for path_component in raw.components() {
        match path_component {
            Component::CurDir => (),
            Component::ParentDir => {
                nomalized_path.pop();
            }
            _ => nomalized_path.push(path_component),
        }
    }

    Ok(nomalized_path)
}

/// A file that gets removed once this guard goes out of scope,
/// no matter which path the current function returns by.
#[derive(Debug)]
pub struct TempFileGuard(PathBuf);

impl TempFileGuard {
    /// Removes any stale leftover at `path` and starts guarding it.
    pub fn new(path: PathBuf) -> Result<Self> {
        remove(&path)?;
        ensure_parent_dir(&path)?;
        Ok(Self(path))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Err(e) = remove(&self.0) {
            log::warn!("{e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_removes_dots() {
        let base = if cfg!(windows) { "C:\\a" } else { "/a" };
        let p = PathBuf::from(base).join("b").join("..").join(".").join("c");
        assert_eq!(
            to_nomalized_abspath(p).unwrap(),
            PathBuf::from(base).join("c")
        );
    }

    #[test]
    fn temp_file_guard_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("download.tmp.zip");
        {
            let guard = TempFileGuard::new(path.clone()).unwrap();
            fs::write(guard.path(), b"partial").unwrap();
            assert!(path.is_file());
        }
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_to_string_opt(dir.path().join("nope.toml"))
            .unwrap()
            .is_none());
    }
}
