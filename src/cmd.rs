use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

use crate::{Error, Result};

/// Executes external programs on behalf of a command-driven backend.
pub trait Runner: Send + Sync {
    /// Run `program` to completion and return its stdout.
    ///
    /// A program that cannot be launched yields [`Error::Spawn`]; one that
    /// exits non-zero yields [`Error::Exit`].
    fn output(&self, program: &Path, args: &[&str]) -> Result<String>;
}

/// Runs programs on the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn output(&self, program: &Path, args: &[&str]) -> Result<String> {
        run_output(program, args)
    }
}

pub fn run_output<I, S>(program: &Path, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args.into_iter().collect();
    let args_str: Vec<_> = args.iter().map(|s| s.as_ref().to_string_lossy()).collect();

    tracing::debug!("> {} {}", program.display(), args_str.join(" "));

    let output = Command::new(program)
        .args(&args)
        .output()
        .map_err(|source| Error::Spawn {
            program: program.display().to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(Error::Exit {
            program: program.display().to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout() {
        let out = run_output(Path::new("/bin/sh"), ["-c", "echo hello"]).unwrap();
        assert_eq!(out, "hello\n");
    }

    #[test]
    fn nonzero_exit_is_exit_error() {
        let err = run_output(Path::new("/bin/sh"), ["-c", "echo oops >&2; exit 3"]).unwrap_err();
        match err {
            Error::Exit { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "oops");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let err = SystemRunner
            .output(Path::new("/nonexistent/initmgr-test-binary"), &[])
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }
}
