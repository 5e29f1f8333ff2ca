//! Core functionalities of this program
//!
//! Including configuration, toolchain and SDK management, build environment and
//! the build itself.

pub mod build;
pub mod config;
pub mod env;
pub mod sdk;
pub mod toolchain;
