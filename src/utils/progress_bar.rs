//! Progress bar indicator for commandline user interface.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressState, ProgressStyle};

/// Convinent struct with methods that are useful to indicate download/extraction progress.
#[derive(Debug, Clone, Copy)]
pub struct ProgressIndicator<T: Sized> {
    /// A start/initializing function which will be called once before the work starts.
    pub start: fn(u64, String, Style) -> Result<T>,
    /// A update function that will be called after each processed chunk.
    pub update: fn(&T, u64),
    /// A function that will be called once after the work is done.
    pub stop: fn(&T, String),
}

#[derive(Debug, Default, Clone, Copy)]
pub enum Style {
    /// Display the progress base on number of bytes.
    Bytes,
    #[default]
    /// Display the progress base on position & length parameters.
    Len,
}

impl Style {
    fn template_str(&self) -> &str {
        match self {
            Style::Bytes => "{bytes}/{total_bytes}",
            Style::Len => "{pos}/{len}",
        }
    }
}

pub type CliProgress = ProgressIndicator<ProgressBar>;

impl ProgressIndicator<ProgressBar> {
    /// Create a new progress bar drawn on `stderr`.
    pub fn new() -> Self {
        fn start(total: u64, msg: String, style: Style) -> Result<ProgressBar> {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::with_template(
                    &format!("{{msg}}\n{{spinner:.green}} [{{elapsed_precise}}] [{{wide_bar:.cyan/blue}}] {} ({{eta}})", style.template_str())
                )?
                .with_key("eta", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                })
                .progress_chars("#>-")
            );
            pb.set_message(msg);
            Ok(pb)
        }
        fn update(pb: &ProgressBar, pos: u64) {
            pb.set_position(pos);
        }
        fn stop(pb: &ProgressBar, msg: String) {
            pb.finish_with_message(msg);
        }

        ProgressIndicator {
            start,
            update,
            stop,
        }
    }
}

impl Default for ProgressIndicator<ProgressBar> {
    fn default() -> Self {
        Self::new()
    }
}
