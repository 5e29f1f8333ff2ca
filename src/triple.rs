use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::ZgoError;

/// Operating systems zgo knows how to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Windows,
    Linux,
    Darwin,
}

/// CPU architectures zgo knows how to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    Aarch64,
}

/// How the compiler flags of an OS are derived.
#[derive(Debug, Clone, Copy)]
enum CompilerFlags {
    Fixed(&'static [&'static str]),
    /// `-F <sdk>/root/System/Library/Frameworks --sysroot <sdk>/root`
    SdkSysroot,
}

/// Everything that differs between target operating systems.
#[derive(Debug)]
pub struct OsProfile {
    zig_name: &'static str,
    abi_suffix: &'static str,
    compiler_flags: CompilerFlags,
    linker_flags: &'static [&'static str],
    build_mode_flags: &'static [&'static str],
    requires_sdk: bool,
}

static WINDOWS: OsProfile = OsProfile {
    zig_name: "windows",
    abi_suffix: "-gnu",
    compiler_flags: CompilerFlags::Fixed(&["-Wno-dll-attribute-on-redeclaration"]),
    linker_flags: &[],
    build_mode_flags: &[],
    requires_sdk: false,
};

// Linux targets link against musl so the output runs on any distribution.
static LINUX: OsProfile = OsProfile {
    zig_name: "linux",
    abi_suffix: "-musl",
    compiler_flags: CompilerFlags::Fixed(&[]),
    linker_flags: &[],
    build_mode_flags: &[],
    requires_sdk: false,
};

static DARWIN: OsProfile = OsProfile {
    zig_name: "macos",
    abi_suffix: "",
    compiler_flags: CompilerFlags::SdkSysroot,
    linker_flags: &["-s", "-w", "-linkmode", "external"],
    build_mode_flags: &["-buildmode=pie"],
    requires_sdk: true,
};

impl Os {
    pub fn profile(self) -> &'static OsProfile {
        match self {
            Os::Windows => &WINDOWS,
            Os::Linux => &LINUX,
            Os::Darwin => &DARWIN,
        }
    }

    /// Name used by Zig, both in target triples and in release file names.
    pub fn zig_name(self) -> &'static str {
        self.profile().zig_name
    }

    /// Name used by `GOOS`.
    pub fn go_name(self) -> &'static str {
        match self {
            Os::Windows => "windows",
            Os::Linux => "linux",
            Os::Darwin => "darwin",
        }
    }

    /// Extra flags passed to both `zig cc` and `zig c++`.
    ///
    /// `sdk_dir` is only consulted by targets that need the companion SDK.
    pub fn compiler_flags(self, sdk_dir: &Path) -> Vec<String> {
        match self.profile().compiler_flags {
            CompilerFlags::Fixed(flags) => flags.iter().map(|f| f.to_string()).collect(),
            CompilerFlags::SdkSysroot => {
                let root = sdk_dir.join("root");
                let frameworks = root.join("System").join("Library").join("Frameworks");
                vec![
                    "-F".to_string(),
                    frameworks.display().to_string(),
                    "--sysroot".to_string(),
                    root.display().to_string(),
                ]
            }
        }
    }

    /// Extra flags for `go build -ldflags`, space separated.
    pub fn linker_flags(self) -> String {
        self.profile().linker_flags.join(" ")
    }

    pub fn build_mode_flags(self) -> Vec<String> {
        self.profile()
            .build_mode_flags
            .iter()
            .map(|f| f.to_string())
            .collect()
    }

    /// Whether building for this OS needs the license-gated companion SDK.
    pub fn requires_companion_sdk(self) -> bool {
        self.profile().requires_sdk
    }

    /// Suffix of executables built for (and running on) this OS.
    pub fn exe_suffix(self) -> &'static str {
        match self {
            Os::Windows => ".exe",
            Os::Linux | Os::Darwin => "",
        }
    }
}

impl FromStr for Os {
    type Err = ZgoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "windows" => Ok(Os::Windows),
            "linux" => Ok(Os::Linux),
            "darwin" | "macos" => Ok(Os::Darwin),
            _ => Err(ZgoError::UnsupportedPlatform {
                kind: "operating system",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.go_name())
    }
}

impl Arch {
    pub fn zig_name(self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
        }
    }

    /// Name used by `GOARCH`.
    pub fn go_name(self) -> &'static str {
        match self {
            Arch::X86_64 => "amd64",
            Arch::Aarch64 => "arm64",
        }
    }
}

impl FromStr for Arch {
    type Err = ZgoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "amd64" | "x86_64" => Ok(Arch::X86_64),
            "arm64" | "aarch64" => Ok(Arch::Aarch64),
            _ => Err(ZgoError::UnsupportedPlatform {
                kind: "architecture",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.go_name())
    }
}

/// An OS + architecture pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Parse a platform from Go style names, e.g. `("linux", "amd64")`.
    pub fn parse(os: &str, arch: &str) -> Result<Self, ZgoError> {
        Ok(Self {
            os: os.parse()?,
            arch: arch.parse()?,
        })
    }

    /// The platform this binary was compiled for.
    pub fn host() -> Result<Self, ZgoError> {
        Self::parse(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// The platform `go build` is going to target.
    ///
    /// Just like `go` itself, `GOOS` and `GOARCH` override the host values.
    pub fn target<F>(var: F) -> Result<Self, ZgoError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let os = match var("GOOS").filter(|s| !s.is_empty()) {
            Some(goos) => goos.parse()?,
            None => Self::host()?.os,
        };
        let arch = match var("GOARCH").filter(|s| !s.is_empty()) {
            Some(goarch) => goarch.parse()?,
            None => Self::host()?.arch,
        };
        Ok(Self { os, arch })
    }

    pub fn triple(&self) -> TargetTriple {
        TargetTriple::new(*self)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// A Zig target triple, such as `x86_64-linux-musl`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetTriple(String);

impl TargetTriple {
    pub fn new(platform: Platform) -> Self {
        let profile = platform.os.profile();
        Self(format!(
            "{}-{}{}",
            platform.arch.zig_name(),
            profile.zig_name,
            profile.abi_suffix
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for TargetTriple {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for TargetTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
