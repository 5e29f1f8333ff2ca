#![allow(dead_code)]

use std::cell::Cell;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use url::Url;
use zgo::utils::Transport;

pub struct Entry<'a> {
    pub name: &'a str,
    pub mode: u32,
    /// `None` for a directory.
    pub content: Option<&'a [u8]>,
}

pub fn file<'a>(name: &'a str, mode: u32, content: &'a [u8]) -> Entry<'a> {
    Entry {
        name,
        mode,
        content: Some(content),
    }
}

pub fn dir(name: &str) -> Entry<'_> {
    Entry {
        name,
        mode: 0o755,
        content: None,
    }
}

pub fn zip_bytes(entries: &[Entry]) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    let mut zip = zip::ZipWriter::new(&mut buf);
    for entry in entries {
        let opts = zip::write::SimpleFileOptions::default().unix_permissions(entry.mode);
        match entry.content {
            Some(content) => {
                zip.start_file(entry.name, opts).unwrap();
                zip.write_all(content).unwrap();
            }
            None => zip.add_directory(entry.name, opts).unwrap(),
        }
    }
    zip.finish().unwrap();
    buf.into_inner()
}

fn append_tar<W: Write>(tar: &mut tar::Builder<W>, entries: &[Entry]) {
    for entry in entries {
        let mut header = tar::Header::new_gnu();
        header.set_mode(entry.mode);
        match entry.content {
            Some(content) => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_size(content.len() as u64);
                header.set_cksum();
                tar.append_data(&mut header, entry.name, content).unwrap();
            }
            None => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_size(0);
                header.set_cksum();
                tar.append_data(&mut header, entry.name, std::io::empty())
                    .unwrap();
            }
        }
    }
}

pub fn tar_gz_bytes(entries: &[Entry]) -> Vec<u8> {
    let enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut tar = tar::Builder::new(enc);
    append_tar(&mut tar, entries);
    tar.into_inner().unwrap().finish().unwrap()
}

pub fn tar_xz_bytes(entries: &[Entry]) -> Vec<u8> {
    let enc = xz2::write::XzEncoder::new(Vec::new(), 6);
    let mut tar = tar::Builder::new(enc);
    append_tar(&mut tar, entries);
    tar.into_inner().unwrap().finish().unwrap()
}

/// Serves a zig release whose `zig` is the given shell script, and counts requests.
pub struct FakeZigServer {
    pub script: &'static str,
    pub downloads: Cell<usize>,
    pub queries: Cell<usize>,
}

impl FakeZigServer {
    pub fn new(script: &'static str) -> Self {
        Self {
            script,
            downloads: Cell::new(0),
            queries: Cell::new(0),
        }
    }

    pub fn requests(&self) -> usize {
        self.downloads.get() + self.queries.get()
    }
}

impl Transport for FakeZigServer {
    fn get_text(&self, _url: &Url) -> Result<String> {
        self.queries.set(self.queries.get() + 1);
        Ok(r#"{"master": {"version": "0.12.0-dev.1"}}"#.to_string())
    }

    fn download_file(&self, url: &Url, dest: &Path) -> Result<()> {
        self.downloads.set(self.downloads.get() + 1);
        let body = self.script.as_bytes();
        let bytes = if url.path().ends_with(".zip") {
            zip_bytes(&[file("zig.exe", 0o755, body)])
        } else {
            tar_xz_bytes(&[dir("zig-release/"), file("zig-release/zig", 0o755, body)])
        };
        fs::write(dest, bytes)?;
        Ok(())
    }
}
