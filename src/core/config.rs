//! Operator settings, read from `zgo.toml` with `ZGO_*` environment overrides.
//!
//! For every field the precedence is: value in the file, then the environment
//! variable, then the built-in default.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;

use crate::error::ZgoError;
use crate::utils;

pub const DEFAULT_CONFIG_FILE: &str = "zgo.toml";
pub const DEFAULT_DIR: &str = ".zgo";

const ENV_PREFIX: &str = "ZGO";

/// The raw file content, every key is optional.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    version: Option<String>,
    verbose: Option<bool>,
    dir: Option<PathBuf>,
    #[serde(rename = "acceptXCodeLicense")]
    accept_xcode_license: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The Zig version to use, e.g. `0.11.0` or `0.11.0-dev.1615+f62e3b8c0`.
    ///
    /// `system` means the `zig` found on `PATH`, an empty string means the
    /// latest nightly build.
    pub version: String,
    /// Print debug messages.
    pub verbose: bool,
    /// Where the Zig toolchain and the macOS SDK get downloaded to.
    pub dir: PathBuf,
    /// The macOS SDK is distributed under the terms of the Xcode and Apple SDKs
    /// agreement (<https://www.apple.com/legal/sla/docs/xcode.pdf>), which must
    /// be accepted before it is downloaded.
    pub accept_xcode_license: bool,
    /// Problems found while loading, to be reported once logging is set up.
    pub warnings: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: String::new(),
            verbose: false,
            dir: PathBuf::from(DEFAULT_DIR),
            accept_xcode_license: false,
            warnings: Vec::new(),
        }
    }
}

fn env_key(name: &str) -> String {
    format!("{ENV_PREFIX}_{name}")
}

/// Parse a boolean the way Go's `strconv.ParseBool` does.
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration from the file at `path` and the variables returned by `var`.
    ///
    /// A missing file is fine, defaults and environment variables still apply.
    ///
    /// # Errors
    ///
    /// Fails with [`ZgoError::Config`] if the file exists but cannot be parsed.
    pub fn load<F>(path: &Path, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match utils::read_to_string_opt(path)? {
            Some(content) => toml::from_str::<ConfigFile>(&content).map_err(|source| {
                ZgoError::Config {
                    path: path.to_path_buf(),
                    source,
                }
            })?,
            None => ConfigFile::default(),
        };
        Ok(Self::merge(file, var))
    }

    /// Same as [`Config::load`], reading the process environment.
    pub fn load_from_env(path: &Path) -> Result<Self> {
        Self::load(path, |k| std::env::var(k).ok())
    }

    /// Messages about ignored settings, such as a `ZGO_*` boolean that is not one.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn merge<F>(file: ConfigFile, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| var(&env_key(name)).filter(|v| !v.is_empty());
        let mut warnings = Vec::new();
        let mut bool_var = |name: &str| {
            let raw = var(name)?;
            let parsed = parse_bool(&raw);
            if parsed.is_none() {
                warnings.push(format!(
                    "ignoring {}='{raw}', expecting a boolean",
                    env_key(name)
                ));
            }
            parsed
        };
        let verbose = file.verbose.or_else(|| bool_var("VERBOSE"));
        let accept_xcode_license = file
            .accept_xcode_license
            .or_else(|| bool_var("ACCEPT_XCODE_LICENSE"));
        let default = Self::default();

        Self {
            version: file
                .version
                .filter(|v| !v.is_empty())
                .or_else(|| var("VERSION"))
                .unwrap_or(default.version),
            verbose: verbose.unwrap_or(default.verbose),
            dir: file
                .dir
                .filter(|d| !d.as_os_str().is_empty())
                .or_else(|| var("DIR").map(PathBuf::from))
                .unwrap_or(default.dir),
            accept_xcode_license: accept_xcode_license.unwrap_or(default.accept_xcode_license),
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("zgo.toml"), vars(&[])).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.dir, PathBuf::from(".zgo"));
    }

    #[test]
    fn missing_file_still_reads_env() {
        let dir = tempfile::tempdir().unwrap();
        let env = vars(&[
            ("ZGO_VERSION", "0.11.0"),
            ("ZGO_VERBOSE", "true"),
            ("ZGO_DIR", "/tmp/zgo-cache"),
            ("ZGO_ACCEPT_XCODE_LICENSE", "1"),
        ]);
        let cfg = Config::load(&dir.path().join("zgo.toml"), env).unwrap();
        assert_eq!(
            cfg,
            Config {
                version: "0.11.0".into(),
                verbose: true,
                dir: "/tmp/zgo-cache".into(),
                accept_xcode_license: true,
                warnings: vec![],
            }
        );
    }

    #[test]
    fn file_values_win_over_env() {
        let (_dir, path) = write_config(
            r#"
version = "0.10.1"
verbose = false
dir = "cache"
acceptXCodeLicense = false
"#,
        );
        let env = vars(&[
            ("ZGO_VERSION", "0.11.0"),
            ("ZGO_VERBOSE", "true"),
            ("ZGO_DIR", "elsewhere"),
            ("ZGO_ACCEPT_XCODE_LICENSE", "true"),
        ]);
        let cfg = Config::load(&path, env).unwrap();
        assert_eq!(cfg.version, "0.10.1");
        assert!(!cfg.verbose);
        assert_eq!(cfg.dir, PathBuf::from("cache"));
        assert!(!cfg.accept_xcode_license);
    }

    #[test]
    fn env_fills_keys_missing_from_file() {
        let (_dir, path) = write_config("acceptXCodeLicense = true\n");
        let cfg = Config::load(&path, vars(&[("ZGO_VERSION", "system")])).unwrap();
        assert_eq!(cfg.version, "system");
        assert!(cfg.accept_xcode_license);
        assert_eq!(cfg.dir, PathBuf::from(DEFAULT_DIR));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let (_dir, path) = write_config("version = [not toml");
        let err = Config::load(&path, vars(&[])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ZgoError>(),
            Some(ZgoError::Config { .. })
        ));
    }

    #[test]
    fn go_style_booleans() {
        for t in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(t), Some(true));
        }
        for f in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(f), Some(false));
        }
        assert_eq!(parse_bool("yes"), None);
    }

    #[test]
    fn bad_env_booleans_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let env = vars(&[("ZGO_VERBOSE", "yes"), ("ZGO_ACCEPT_XCODE_LICENSE", "true")]);
        let cfg = Config::load(&dir.path().join("zgo.toml"), env).unwrap();
        assert!(!cfg.verbose);
        assert!(cfg.accept_xcode_license);
        assert_eq!(
            cfg.warnings(),
            ["ignoring ZGO_VERBOSE='yes', expecting a boolean"]
        );

        let cfg = Config::load(&dir.path().join("zgo.toml"), vars(&[])).unwrap();
        assert!(cfg.warnings().is_empty());
    }
}
