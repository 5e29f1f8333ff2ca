use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use log::info;
use reqwest::blocking::{Client, ClientBuilder};
use reqwest::header::USER_AGENT;
use url::Url;

use super::progress_bar::{CliProgress, Style};
use crate::error::ZgoError;

/// Everything zgo needs from the network.
///
/// Kept behind a trait so the toolchain and build logic can be exercised
/// without touching the network.
pub trait Transport {
    /// Fetch the body of `url` as text.
    fn get_text(&self, url: &Url) -> Result<String>;
    /// Download `url` into the file at `dest`, replacing any existing content.
    fn download_file(&self, url: &Url, dest: &Path) -> Result<()>;
}

fn client_builder() -> ClientBuilder {
    // No timeout, wrap the whole process with one if needed.
    Client::builder()
        .timeout(None::<Duration>)
        .connection_verbose(false)
}

/// [`Transport`] backed by a blocking [`reqwest`] client.
pub struct HttpTransport {
    client: Client,
    indicator: Option<CliProgress>,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: client_builder()
                .build()
                .context("unable to build http client")?,
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

    fn send(&self, url: &Url) -> Result<reqwest::blocking::Response> {
        let resp = self
            .client
            .get(url.as_ref())
            .header(USER_AGENT, env!("CARGO_PKG_NAME"))
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            bail!("bad response status: {status}");
        }
        Ok(resp)
    }

    fn write_body(&self, url: &Url, dest: &Path) -> Result<()> {
        if url.scheme() == "file" {
            let src = url
                .to_file_path()
                .map_err(|_| anyhow!("unable to convert to file path for url '{url}'"))?;
            fs::copy(src, dest)?;
            return Ok(());
        }

        let mut resp = self.send(url)?;
        let maybe_bar = match (&self.indicator, resp.content_length()) {
            (Some(indicator), Some(total)) => {
                (indicator.start)(total, format!("downloading '{url}'"), Style::Bytes).ok()
            }
            _ => None,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(dest)
            .with_context(|| format!("unable to create '{}'", dest.display()))?;

        let mut buffer = vec![0u8; 65535];
        let mut downloaded_len: u64 = 0;
        loop {
            let bytes_read = io::Read::read(&mut resp, &mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            file.write_all(&buffer[..bytes_read])?;
            downloaded_len += bytes_read as u64;
            if let (Some(indicator), Some(bar)) = (&self.indicator, &maybe_bar) {
                (indicator.update)(bar, downloaded_len);
            }
        }
        if let (Some(indicator), Some(bar)) = (&self.indicator, &maybe_bar) {
            (indicator.stop)(bar, "download finished".into());
        }
        Ok(())
    }
}

impl Transport for HttpTransport {
    fn get_text(&self, url: &Url) -> Result<String> {
        let res = if url.scheme() == "file" {
            url.to_file_path()
                .map_err(|_| anyhow!("unable to convert to file path for url '{url}'"))
                .and_then(|p| Ok(fs::read_to_string(p)?))
        } else {
            self.send(url).and_then(|resp| Ok(resp.text()?))
        };
        res.map_err(|e| ZgoError::network(url, e).into())
    }

    fn download_file(&self, url: &Url, dest: &Path) -> Result<()> {
        info!("downloading: {url} > {}", dest.display());
        self.write_body(url, dest)
            .map_err(|e| ZgoError::network(url, e).into())
    }
}
