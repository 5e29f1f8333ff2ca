#![deny(unused_must_use)]

pub mod cli;
pub mod core;
pub mod error;
pub mod triple;
pub mod utils;

// Exports
pub use crate::core::build::{go_build_args, merge_ldflags, Orchestrator, PreparedBuild, Stage};
pub use crate::core::config::Config;
pub use crate::core::env::{compose_compiler_invocation, compose_env, BuildEnvironment, CompilerKind};
pub use crate::core::sdk::{ensure_cloned, CompanionSdk, GitCli, SourceControl, MACOS_SDK};
pub use crate::core::toolchain::{Toolchain, ToolchainCache, ToolchainVersion};
pub use error::ZgoError;
pub use triple::{Arch, Os, Platform, TargetTriple};
