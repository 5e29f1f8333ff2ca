//! Drives a `zgo build` invocation, from the loaded configuration to `go build`.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use super::config::Config;
use super::env::{compose_compiler_invocation, compose_env, BuildEnvironment, CompilerKind};
use super::sdk::{SourceControl, MACOS_SDK, XCODE_LICENSE_URL};
use super::toolchain::{Toolchain, ToolchainCache, ToolchainVersion};
use crate::error::ZgoError;
use crate::triple::{Os, Platform, TargetTriple};
use crate::utils::{self, Transport};

pub const BUILD_ZIG: &str = "build.zig";
const GO: &str = "go";
const LDFLAGS: &str = "-ldflags";

/// The steps of a build, attached to errors as context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadConfig,
    CheckLicense,
    PrepareSdk,
    PrepareToolchain,
    ComposeEnv,
    PreBuildHook,
    InvokeBuild,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::LoadConfig => "failed to load configuration",
            Stage::CheckLicense => "license check failed",
            Stage::PrepareSdk => "failed to prepare the macOS SDK",
            Stage::PrepareToolchain => "failed to prepare the zig toolchain",
            Stage::ComposeEnv => "failed to compose the build environment",
            Stage::PreBuildHook => "`zig build` hook failed",
            Stage::InvokeBuild => "`go build` failed",
        };
        f.write_str(s)
    }
}

/// Everything needed to run the build commands.
#[derive(Debug, Clone)]
pub struct PreparedBuild {
    pub target: Platform,
    pub triple: TargetTriple,
    pub toolchain: Toolchain,
    /// Environment of every process spawned from here on.
    pub env: BuildEnvironment,
}

pub struct Orchestrator<'a, T: ?Sized, G: ?Sized> {
    config: Config,
    host: Platform,
    target: Platform,
    base_env: BuildEnvironment,
    work_dir: PathBuf,
    quiet: bool,
    transport: &'a T,
    git: &'a G,
}

impl<'a, T, G> Orchestrator<'a, T, G>
where
    T: Transport + ?Sized,
    G: SourceControl + ?Sized,
{
    /// Starts out with an empty base environment in the current directory.
    pub fn new(
        config: Config,
        host: Platform,
        target: Platform,
        transport: &'a T,
        git: &'a G,
    ) -> Self {
        Self {
            config,
            host,
            target,
            base_env: BuildEnvironment::new(),
            work_dir: PathBuf::from("."),
            quiet: false,
            transport,
            git,
        }
    }

    /// Set up for the current process: host detection, `GOOS`/`GOARCH`,
    /// inherited environment and working directory.
    pub fn from_process(config: Config, transport: &'a T, git: &'a G) -> Result<Self> {
        let base_env = BuildEnvironment::from_process();
        let host = Platform::host()?;
        let target = Platform::target(|k| base_env.get(k).map(str::to_string))?;
        let work_dir = std::env::current_dir().context("unable to get current directory")?;
        Ok(Self::new(config, host, target, transport, git)
            .base_env(base_env)
            .work_dir(work_dir))
    }

    pub fn base_env(mut self, env: BuildEnvironment) -> Self {
        self.base_env = env;
        self
    }

    pub fn work_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.work_dir = dir.into();
        self
    }

    /// Do not draw progress bars while preparing the toolchain.
    pub fn quiet(mut self, yes: bool) -> Self {
        self.quiet = yes;
        self
    }

    /// The cache directory, relative paths being resolved against the working directory.
    fn cache_dir(&self) -> Result<PathBuf> {
        utils::to_nomalized_abspath(self.work_dir.join(&self.config.dir))
    }

    /// Refuse to target macOS unless the Xcode SDK license was accepted.
    pub fn check_license(&self) -> Result<()> {
        if self.target.os.requires_companion_sdk() && !self.config.accept_xcode_license {
            warn!(
                "macOS target requires a copy of the macOS Xcode SDK, which is distributed \
                under the terms at {XCODE_LICENSE_URL}"
            );
            return Err(ZgoError::LicenseNotAccepted.into());
        }
        Ok(())
    }

    /// Get the SDK and the toolchain ready and compose the build environment.
    pub fn prepare(&self) -> Result<PreparedBuild> {
        self.check_license().context(Stage::CheckLicense)?;
        let cache_dir = self.cache_dir()?;

        let sdk_dir = if self.target.os.requires_companion_sdk() {
            let dir = MACOS_SDK
                .ensure(self.git, &cache_dir)
                .context(Stage::PrepareSdk)?;
            Some(dir)
        } else {
            None
        };

        let version = ToolchainVersion::parse(&self.config.version);
        let path_var = self.base_env.path_var().map(OsStr::new);
        let toolchain = ToolchainCache::new(&cache_dir, self.host, self.transport)
            .and_then(|cache| cache.quiet(self.quiet).ensure(&version, path_var))
            .context(Stage::PrepareToolchain)?;

        let triple = self.target.triple();
        info!("building for {triple} (zig version={})", toolchain.version);

        let env = self
            .compose(&toolchain, &triple, sdk_dir.as_deref())
            .context(Stage::ComposeEnv)?;

        Ok(PreparedBuild {
            target: self.target,
            triple,
            toolchain,
            env,
        })
    }

    fn compose(
        &self,
        toolchain: &Toolchain,
        triple: &TargetTriple,
        sdk_dir: Option<&Path>,
    ) -> Result<BuildEnvironment> {
        let mut env = compose_env(&self.base_env, toolchain.bin_dir())?;
        let flags = self
            .target
            .os
            .compiler_flags(sdk_dir.unwrap_or_else(|| Path::new("")));
        for kind in [CompilerKind::C, CompilerKind::Cxx] {
            let value = compose_compiler_invocation(kind, &toolchain.exe, triple, &flags)?;
            debug!("export {}='{value}'", kind.env_var());
            env.set(kind.env_var(), value);
        }
        Ok(env)
    }

    /// Run `zig build` for the target if the working directory has a `build.zig`.
    ///
    /// Returns whether the hook ran.
    pub fn run_pre_build_hook(&self, prepared: &PreparedBuild) -> Result<bool> {
        if !self.work_dir.join(BUILD_ZIG).is_file() {
            return Ok(false);
        }
        let args = ["build".to_string(), format!("-Dtarget={}", prepared.triple)];
        run_checked(&prepared.toolchain.exe, &args, &prepared.env, &self.work_dir)
            .context(Stage::PreBuildHook)?;
        Ok(true)
    }

    /// Invoke `go build` with `caller_args`.
    pub fn invoke_build(&self, prepared: &PreparedBuild, caller_args: &[String]) -> Result<()> {
        let args = go_build_args(prepared.target.os, caller_args)?;
        run_checked(GO, &args, &prepared.env, &self.work_dir).context(Stage::InvokeBuild)
    }

    /// The whole sequence, stopping at the first failure.
    pub fn run(&self, caller_args: &[String]) -> Result<()> {
        let prepared = self.prepare()?;
        self.run_pre_build_hook(&prepared)?;
        self.invoke_build(&prepared, caller_args)
    }
}

fn run_checked<P: AsRef<OsStr>>(
    program: P,
    args: &[String],
    env: &BuildEnvironment,
    cwd: &Path,
) -> Result<()> {
    let status = utils::execute_streamed(&program, args, env, Some(cwd))?;
    if !status.success() {
        return Err(ZgoError::BuildFailed {
            command: utils::format_cmd_line(&program, args),
            status,
        }
        .into());
    }
    Ok(())
}

/// Arguments of `go`: `build`, the OS build mode flags, then the caller's
/// arguments with the OS linker flags merged in.
pub fn go_build_args(os: Os, caller_args: &[String]) -> Result<Vec<String>> {
    let mut args = vec!["build".to_string()];
    args.extend(os.build_mode_flags());
    args.extend(merge_ldflags(caller_args, &os.linker_flags())?);
    Ok(args)
}

/// Append `generated` to every `-ldflags` value in `caller_args`.
///
/// Both `-ldflags <v>` and `-ldflags=<v>` are recognized, with one or two dashes.
/// If there is none, a `-ldflags <generated>` pair is put in front, since `go`
/// stops parsing flags at the first package argument.
pub fn merge_ldflags(caller_args: &[String], generated: &str) -> Result<Vec<String>> {
    let mut merged = Vec::with_capacity(caller_args.len() + 2);
    let mut found = false;
    let mut iter = caller_args.iter();

    while let Some(arg) = iter.next() {
        let Some(flag) = arg.strip_prefix('-') else {
            merged.push(arg.clone());
            continue;
        };
        let flag = flag.strip_prefix('-').unwrap_or(flag);
        if flag == &LDFLAGS[1..] {
            let value = iter.next().ok_or_else(|| {
                ZgoError::Usage(format!("flag needs an argument: {arg}"))
            })?;
            merged.push(arg.clone());
            merged.push(join_flags(value, generated));
            found = true;
        } else if let Some(value) = flag
            .strip_prefix(&LDFLAGS[1..])
            .and_then(|rest| rest.strip_prefix('='))
        {
            let name = &arg[..arg.len() - value.len() - 1];
            merged.push(format!("{name}={}", join_flags(value, generated)));
            found = true;
        } else {
            merged.push(arg.clone());
        }
    }

    if !found {
        let mut with_ldflags = vec![LDFLAGS.to_string(), generated.to_string()];
        with_ldflags.append(&mut merged);
        return Ok(with_ldflags);
    }
    Ok(merged)
}

fn join_flags(caller: &str, generated: &str) -> String {
    [caller.trim(), generated.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
