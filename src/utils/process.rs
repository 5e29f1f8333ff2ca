use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};
use log::{debug, info};

macro_rules! exec_err {
    ($p:expr, $args:expr, $ext_msg:expr) => {
        anyhow::anyhow!(
            "error occured when executing command `{}`{}",
            $crate::utils::format_cmd_line($p, $args),
            $ext_msg
        )
    };
}

/// Render a command line for humans, quoting arguments that contain spaces.
pub fn format_cmd_line<P, A>(program: P, args: &[A]) -> String
where
    P: AsRef<OsStr>,
    A: AsRef<OsStr>,
{
    std::iter::once(program.as_ref())
        .chain(args.iter().map(AsRef::as_ref))
        .map(|oss| {
            let s = oss.to_string_lossy();
            if s.contains(' ') {
                format!("'{s}'")
            } else {
                s.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Look for an executable named `name` in each directory of `path_var`
/// (a `PATH`-like list), returning the first match.
pub fn find_executable(name: &str, path_var: Option<&OsStr>) -> Option<PathBuf> {
    let path_var = path_var?;
    env::split_paths(path_var)
        .map(|p| p.join(name))
        .find(|p| p.is_file())
}

/// Run a program to completion, streaming its output to ours.
///
/// Variables in `envs` are set on top of the inherited environment and
/// `cwd` (if any) becomes its working directory.
///
/// # Errors
///
/// This only fails if the program could not be started, the caller
/// decides what a non-successful [`ExitStatus`] means.
pub fn execute_streamed<'a, P, A, I, K, V>(
    program: P,
    args: &[A],
    envs: I,
    cwd: Option<&Path>,
) -> Result<ExitStatus>
where
    P: AsRef<OsStr>,
    A: AsRef<OsStr>,
    I: IntoIterator<Item = (&'a K, &'a V)>,
    K: AsRef<OsStr> + ?Sized + 'a,
    V: AsRef<OsStr> + ?Sized + 'a,
{
    info!("$ {}", format_cmd_line(&program, args));
    let mut command = Command::new(program.as_ref());
    command
        .args(args)
        .envs(envs.into_iter().map(|(k, v)| (k.as_ref(), v.as_ref())))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    command
        .status()
        .with_context(|| exec_err!(&program, args, ""))
}

/// Run a program and capture its standard output, trimmed.
///
/// # Errors
///
/// This will return errors if:
/// 1. The specific command cannot be execute.
/// 2. The command was executed but failed, in which case its `stderr` is
///    included in the message.
pub fn execute_for_output<P, A>(program: P, args: &[A], cwd: Option<&Path>) -> Result<String>
where
    P: AsRef<OsStr>,
    A: AsRef<OsStr>,
{
    debug!("$ {}", format_cmd_line(&program, args));
    let mut command = Command::new(program.as_ref());
    command.args(args).stdin(Stdio::null());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let output = command
        .output()
        .with_context(|| exec_err!(&program, args, ""))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(exec_err!(
            &program,
            args,
            format!(" ({}): {}", output.status, stderr.trim())
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmd_line_quotes_spaces() {
        let line = format_cmd_line("go", &["build", "-ldflags", "-s -w"]);
        assert_eq!(line, "go build -ldflags '-s -w'");
    }

    #[test]
    fn find_executable_walks_path_list() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        std::fs::write(b.path().join("zig"), b"").unwrap();
        let path_var = env::join_paths([a.path(), b.path()]).unwrap();

        assert_eq!(
            find_executable("zig", Some(path_var.as_os_str())),
            Some(b.path().join("zig"))
        );
        assert_eq!(find_executable("go", Some(path_var.as_os_str())), None);
        assert_eq!(find_executable("zig", None), None);
    }

    #[cfg(unix)]
    #[test]
    fn captured_output_is_trimmed() {
        let out = execute_for_output("sh", &["-c", "echo '  abc  '"], None).unwrap();
        assert_eq!(out, "abc");
    }

    #[cfg(unix)]
    #[test]
    fn failing_capture_reports_stderr() {
        let err = execute_for_output("sh", &["-c", "echo nope >&2; exit 3"], None).unwrap_err();
        assert!(format!("{err:#}").contains("nope"));
    }

    #[cfg(unix)]
    #[test]
    fn streamed_run_sees_extra_env() {
        let envs = [("ZGO_PROCESS_TEST", "42")];
        let status = execute_streamed(
            "sh",
            &["-c", "test \"$ZGO_PROCESS_TEST\" = 42"],
            envs.iter().map(|(k, v)| (*k, *v)),
            None,
        )
        .unwrap();
        assert!(status.success());
    }
}
