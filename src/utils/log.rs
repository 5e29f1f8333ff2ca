use anyhow::Result;
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Logger {
    log_dir: Option<PathBuf>,
    dispatcher_: fern::Dispatch,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    pub fn new() -> Self {
        Self {
            log_dir: None,
            dispatcher_: fern::Dispatch::new().level(LevelFilter::Info),
        }
    }
    /// Set verbose output, this will print `debug!` messages as well.
    pub fn verbose(mut self, v: bool) -> Self {
        if v {
            self.dispatcher_ = self.dispatcher_.level(LevelFilter::Debug);
        }
        self
    }
    /// Ignore most output, keep only the `error` messages.
    pub fn quiet(mut self, q: bool) -> Self {
        if q {
            self.dispatcher_ = self.dispatcher_.level(LevelFilter::Error);
        }
        self
    }
    /// Also write every message into a dated log file inside `dir`.
    pub fn log_dir<P: Into<PathBuf>>(mut self, dir: Option<P>) -> Self {
        self.log_dir = dir.map(Into::into);
        self
    }

    /// Setup logger using [`log`] and [`fern`], this must be called first before
    /// any of the `info!`, `warn!`, `trace!`, `debug!`, `error!` macros.
    ///
    /// Messages go to `stderr`, leaving `stdout` to the commands we run.
    pub fn setup(self) -> Result<()> {
        let console = fern::Dispatch::new()
            .format(|out, msg, rec| {
                out.finish(format_args!(
                    "{}: {}: {msg}",
                    env!("CARGO_PKG_NAME"),
                    ColoredLevelConfig::new()
                        .info(Color::BrightBlue)
                        .debug(Color::Magenta)
                        .color(rec.level())
                        .to_string()
                        .to_lowercase(),
                ));
            })
            .chain(io::stderr());
        let mut root = self.dispatcher_.chain(console);

        if let Some(dir) = self.log_dir {
            let file_config = fern::Dispatch::new()
                .format(|out, msg, rec| {
                    out.finish(format_args!(
                        "[{} {} {}] {msg}",
                        Local::now().to_rfc3339(),
                        rec.level(),
                        rec.target(),
                    ))
                })
                .chain(fern::log_file(log_file_path(&dir)?)?);
            root = root.chain(file_config);
        }

        root.apply()?;
        Ok(())
    }
}

/// Get the path to log file to write, creating `dir` if needed.
///
/// Note: the log file might not exists.
pub fn log_file_path(dir: &Path) -> Result<PathBuf> {
    super::ensure_dir(dir)?;
    Ok(dir.join(format!(
        "{}-{}.log",
        env!("CARGO_PKG_NAME"),
        Local::now().date_naive()
    )))
}
