//! The environment handed to every process zgo spawns.

use std::env;
use std::ffi::OsString;
use std::path::Path;

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;

use crate::triple::TargetTriple;

pub const PATH: &str = "PATH";

/// Environment variables for the child processes, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnvironment {
    vars: IndexMap<String, String>,
}

impl BuildEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment.
    ///
    /// Variables whose name or value is not valid unicode are left out, child
    /// processes still inherit them since they are never cleared.
    pub fn from_process() -> Self {
        env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set `key`, keeping its position if it already exists.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Value of the search path variable, honoring the host's case rules.
    pub fn path_var(&self) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| is_path_key(k))
            .map(|(_, v)| v.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BuildEnvironment {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a BuildEnvironment {
    type Item = (&'a String, &'a String);
    type IntoIter = indexmap::map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.iter()
    }
}

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        // variable names are case-insensitive on windows, `Path` is common
        fn is_path_key(key: &str) -> bool {
            key.eq_ignore_ascii_case(PATH)
        }
    } else {
        fn is_path_key(key: &str) -> bool {
            key == PATH
        }
    }
}

/// Return a copy of `base` where `bin_dir` comes first on `PATH`.
///
/// Everything else is passed through untouched. If `base` has no `PATH` at
/// all, nothing is added.
pub fn compose_env(base: &BuildEnvironment, bin_dir: &Path) -> Result<BuildEnvironment> {
    let mut composed = base.clone();
    for (key, value) in composed.vars.iter_mut().filter(|(k, _)| is_path_key(k.as_str())) {
        let dirs = std::iter::once(bin_dir.to_path_buf()).chain(env::split_paths(value.as_str()));
        let joined: OsString = env::join_paths(dirs).with_context(|| {
            format!(
                "unable to add '{}' to {key}, it contains a path separator",
                bin_dir.display()
            )
        })?;
        *value = joined.to_string_lossy().into_owned();
    }
    Ok(composed)
}

/// Which compiler driver of the toolchain to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerKind {
    C,
    Cxx,
}

impl CompilerKind {
    /// `zig` subcommand for this kind of compiler.
    pub fn subcommand(self) -> &'static str {
        match self {
            CompilerKind::C => "cc",
            CompilerKind::Cxx => "c++",
        }
    }

    /// Environment variable `go` reads this compiler from.
    pub fn env_var(self) -> &'static str {
        match self {
            CompilerKind::C => "CC",
            CompilerKind::Cxx => "CXX",
        }
    }
}

/// Build the value of `CC`/`CXX`: `<zig> cc -target <triple> <flags...>`.
///
/// `go` splits this value into words itself, so every word is quoted when it
/// needs to be.
pub fn compose_compiler_invocation(
    kind: CompilerKind,
    zig_exe: &Path,
    triple: &TargetTriple,
    extra_flags: &[String],
) -> Result<String> {
    let zig = zig_exe.display().to_string();
    let words = [
        zig.as_str(),
        kind.subcommand(),
        "-target",
        triple.as_str(),
    ]
    .into_iter()
    .chain(extra_flags.iter().map(String::as_str));

    let mut quoted = Vec::new();
    for word in words {
        quoted.push(quote_word(word)?);
    }
    Ok(quoted.join(" "))
}

/// Quote a single word so that `go`'s word splitter (see `cmd/internal/quoted`)
/// gives it back unchanged.
///
/// That splitter knows single and double quotes but no escapes, so a word
/// containing both kinds of quotes cannot be represented.
pub fn quote_word(word: &str) -> Result<String> {
    let needs_quotes =
        word.is_empty() || word.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"');
    if !needs_quotes {
        return Ok(word.to_string());
    }
    if !word.contains('\'') {
        Ok(format!("'{word}'"))
    } else if !word.contains('"') {
        Ok(format!("\"{word}\""))
    } else {
        bail!("`{word}` contains both single and double quotes and cannot be quoted")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triple::{Arch, Os, Platform};
    use std::path::PathBuf;

    /// Same word splitting as `go` does on `CC`/`CXX`.
    fn split_words(s: &str) -> Result<Vec<String>> {
        let mut words = Vec::new();
        let mut chars = s.chars().peekable();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                chars.next();
                continue;
            }
            let mut word = String::new();
            if c == '\'' || c == '"' {
                chars.next();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == c {
                        closed = true;
                        break;
                    }
                    word.push(inner);
                }
                if !closed {
                    bail!("unterminated {c} quote in `{s}`");
                }
            } else {
                while let Some(&inner) = chars.peek() {
                    if inner.is_whitespace() {
                        break;
                    }
                    word.push(inner);
                    chars.next();
                }
            }
            words.push(word);
        }
        Ok(words)
    }

    fn sep() -> char {
        if cfg!(windows) {
            ';'
        } else {
            ':'
        }
    }

    #[test]
    fn path_gets_exactly_one_dir_prepended() {
        let base: BuildEnvironment = [
            ("HOME", "/home/gopher"),
            ("PATH", &*format!("/usr/bin{}/bin", sep())),
            ("GOFLAGS", "-trimpath"),
        ]
        .into_iter()
        .collect();
        let composed = compose_env(&base, Path::new("/cache/zig/0.11.0")).unwrap();

        assert_eq!(
            composed.get("PATH").unwrap(),
            format!("/cache/zig/0.11.0{0}/usr/bin{0}/bin", sep())
        );
        assert_eq!(composed.get("HOME"), base.get("HOME"));
        assert_eq!(composed.get("GOFLAGS"), base.get("GOFLAGS"));
        assert_eq!(composed.len(), base.len());
        // order is preserved
        let keys: Vec<_> = composed.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["HOME", "PATH", "GOFLAGS"]);
    }

    #[test]
    fn path_look_alikes_are_untouched() {
        let base: BuildEnvironment = [("PATHEXT", ".EXE"), ("GOPATH", "/go")]
            .into_iter()
            .collect();
        let composed = compose_env(&base, Path::new("/zig")).unwrap();
        assert_eq!(composed, base);
    }

    #[test]
    fn no_path_means_no_change() {
        let base: BuildEnvironment = [("HOME", "/root")].into_iter().collect();
        let composed = compose_env(&base, Path::new("/zig")).unwrap();
        assert_eq!(composed, base);
    }

    #[test]
    fn compiler_invocation_for_linux() {
        let triple = Platform::new(Os::Linux, Arch::X86_64).triple();
        let cc = compose_compiler_invocation(CompilerKind::C, Path::new("zig"), &triple, &[])
            .unwrap();
        assert_eq!(cc, "zig cc -target x86_64-linux-musl");
        let cxx = compose_compiler_invocation(CompilerKind::Cxx, Path::new("zig"), &triple, &[])
            .unwrap();
        assert_eq!(cxx, "zig c++ -target x86_64-linux-musl");
    }

    #[test]
    fn c_and_cxx_share_flags() {
        let triple = Platform::new(Os::Darwin, Arch::Aarch64).triple();
        let flags = Os::Darwin.compiler_flags(Path::new("/sdk"));
        let cc = compose_compiler_invocation(CompilerKind::C, Path::new("zig"), &triple, &flags)
            .unwrap();
        let cxx =
            compose_compiler_invocation(CompilerKind::Cxx, Path::new("zig"), &triple, &flags)
                .unwrap();
        assert_eq!(
            cc.replacen(" cc ", " ", 1),
            cxx.replacen(" c++ ", " ", 1),
        );
    }

    #[test]
    fn paths_with_spaces_survive_word_splitting() {
        let zig = PathBuf::from("/Users/Jane Doe/.zgo/zig/0.11.0/zig");
        let sdk = PathBuf::from("/Users/Jane Doe/.zgo/sdk-macos-12.0");
        let triple = Platform::new(Os::Darwin, Arch::X86_64).triple();
        let flags = Os::Darwin.compiler_flags(&sdk);

        let cc = compose_compiler_invocation(CompilerKind::C, &zig, &triple, &flags).unwrap();
        let words = split_words(&cc).unwrap();

        let mut expected = vec![
            zig.display().to_string(),
            "cc".to_string(),
            "-target".to_string(),
            "x86_64-macos".to_string(),
        ];
        expected.extend(flags);
        assert_eq!(words, expected);
    }

    #[test]
    fn quoting_rules() {
        assert_eq!(quote_word("plain").unwrap(), "plain");
        assert_eq!(quote_word("a b").unwrap(), "'a b'");
        assert_eq!(quote_word("it's").unwrap(), "\"it's\"");
        assert_eq!(quote_word("").unwrap(), "''");
        assert!(quote_word("both ' and \"").is_err());
    }
}
