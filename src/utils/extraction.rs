use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use log::{info, warn};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use xz2::read::XzDecoder;
use zip::ZipArchive;

use super::progress_bar::{CliProgress, Style};
use crate::error::ZgoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    TarGz,
    TarXz,
    Zip,
}

impl ArchiveFormat {
    /// Pick a format purely from the suffix of the file name.
    fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.xz") {
            Some(Self::TarXz)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// An archive on disk whose format has been recognized.
pub struct Extractable<'a> {
    path: &'a Path,
    format: ArchiveFormat,
    indicator: Option<CliProgress>,
}

impl<'a> Extractable<'a> {
    pub fn load(path: &'a Path) -> Result<Self> {
        let format = ArchiveFormat::from_path(path).ok_or_else(|| ZgoError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;
        info!("loading {format:?} archive '{}'", path.display());
        Ok(Self {
            path,
            format,
            indicator: Some(CliProgress::new()),
        })
    }

    /// Do not draw progress bars.
    pub fn quiet(mut self, yes: bool) -> Self {
        if yes {
            self.indicator = None;
        }
        self
    }

    /// Extract current file into `root`, dropping the first `strip_components`
    /// path components of every entry.
    ///
    /// Entries that have nothing left after stripping (such as the top-level
    /// directory itself) are skipped.
    pub fn extract_to(&self, root: &Path, strip_components: usize) -> Result<()> {
        info!("extracting '{}' > '{}'", self.path.display(), root.display());
        let helper = ExtractHelper {
            file_path: self.path,
            output_dir: root,
            strip_components,
            indicator: self.indicator.clone(),
        };

        let res = match self.format {
            ArchiveFormat::TarGz => helper.extract_tar(GzDecoder::new),
            ArchiveFormat::TarXz => helper.extract_tar(XzDecoder::new),
            ArchiveFormat::Zip => helper.extract_zip(),
        };
        res.map_err(|e| {
            ZgoError::Extraction {
                archive: self.path.to_path_buf(),
                reason: format!("{e:#}"),
            }
            .into()
        })
    }
}

/// Drop the first `n` components of an archive entry name.
///
/// Returns `Ok(None)` if nothing remains, and an error if the name would
/// escape the output directory.
fn strip_components(name: &Path, n: usize) -> Result<Option<PathBuf>> {
    let mut normals = Vec::new();
    for comp in name.components() {
        match comp {
            Component::Normal(part) => normals.push(part),
            Component::CurDir => (),
            _ => bail!("entry '{}' points outside of the archive", name.display()),
        }
    }
    let stripped: PathBuf = normals.into_iter().skip(n).collect();
    Ok((stripped != PathBuf::new()).then_some(stripped))
}

/// Wraps a reader and reports the number of bytes read so far.
struct ProgressReader<R> {
    inner: R,
    read: u64,
    bar: indicatif::ProgressBar,
    update: fn(&indicatif::ProgressBar, u64),
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read += n as u64;
        (self.update)(&self.bar, self.read);
        Ok(n)
    }
}

struct ExtractHelper<'a> {
    file_path: &'a Path,
    output_dir: &'a Path,
    strip_components: usize,
    indicator: Option<CliProgress>,
}

fn no_progress(_: &indicatif::ProgressBar, _: u64) {}

impl ExtractHelper<'_> {
    fn start_progress_bar(&self, len: u64, style: Style) -> Result<indicatif::ProgressBar> {
        match &self.indicator {
            Some(indicator) => (indicator.start)(
                len,
                format!("extracting file '{}'", self.file_path.display()),
                style,
            ),
            None => Ok(indicatif::ProgressBar::hidden()),
        }
    }

    fn progress_update(&self) -> fn(&indicatif::ProgressBar, u64) {
        self.indicator
            .as_ref()
            .map_or(no_progress as fn(&indicatif::ProgressBar, u64), |i| i.update)
    }

    fn end_progress_bar(&self, bar: &indicatif::ProgressBar) {
        if let Some(indicator) = &self.indicator {
            (indicator.stop)(bar, "extraction complete.".into());
        }
    }

    fn out_path(&self, name: &Path) -> Result<Option<PathBuf>> {
        Ok(strip_components(name, self.strip_components)?.map(|p| self.output_dir.join(p)))
    }

    fn extract_tar<D, F>(&self, decoder: F) -> Result<()>
    where
        D: Read,
        F: FnOnce(ProgressReader<File>) -> D,
    {
        let file = File::open(self.file_path)
            .with_context(|| format!("unable to open '{}'", self.file_path.display()))?;
        let total = file.metadata()?.len();
        let bar = self.start_progress_bar(total, Style::Bytes)?;

        let reader = ProgressReader {
            inner: file,
            read: 0,
            bar: bar.clone(),
            update: self.progress_update(),
        };
        let mut archive = tar::Archive::new(decoder(reader));
        #[cfg(unix)]
        archive.set_preserve_permissions(true);

        for maybe_entry in archive.entries()? {
            let mut entry = maybe_entry?;
            let entry_path = entry.path()?.into_owned();
            let Some(out_path) = self.out_path(&entry_path)? else {
                continue;
            };

            let entry_type = entry.header().entry_type();
            if entry_type.is_dir() {
                super::ensure_dir(&out_path)?;
            } else if entry_type.is_file() || entry_type.is_symlink() {
                super::ensure_parent_dir(&out_path)?;
                // `unpack` also applies the mode stored in the header
                entry.unpack(&out_path).with_context(|| {
                    format!("unable to write '{}'", out_path.display())
                })?;
            } else {
                warn!(
                    "skipping entry '{}' of unsupported type {entry_type:?}",
                    entry_path.display()
                );
            }
        }

        self.end_progress_bar(&bar);
        Ok(())
    }

    fn extract_zip(&self) -> Result<()> {
        let file = File::open(self.file_path)
            .with_context(|| format!("unable to open '{}'", self.file_path.display()))?;
        let mut archive = ZipArchive::new(file)?;
        let zip_len = archive.len();

        let bar = self.start_progress_bar(zip_len.try_into()?, Style::Len)?;

        for i in 0..zip_len {
            let mut zip_file = archive.by_index(i)?;
            let Some(name) = zip_file.enclosed_name() else {
                bail!("entry '{}' points outside of the archive", zip_file.name());
            };
            let Some(out_path) = self.out_path(&name)? else {
                continue;
            };

            if zip_file.is_dir() {
                super::ensure_dir(&out_path)?;
            } else {
                super::ensure_parent_dir(&out_path)?;
                let mut out_file = File::create(&out_path)
                    .with_context(|| format!("unable to create '{}'", out_path.display()))?;
                io::copy(&mut zip_file, &mut out_file)?;
            }

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = zip_file.unix_mode() {
                    std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode))?;
                }
            }

            (self.progress_update())(&bar, u64::try_from(i)? + 1);
        }
        self.end_progress_bar(&bar);

        Ok(())
    }
}
