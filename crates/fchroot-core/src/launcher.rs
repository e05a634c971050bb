//! Confined command execution via the `chroot` binary.
//!
//! The child inherits stdin, stdout, and stderr, and receives `SIGTERM`
//! when the controlling process dies so it cannot keep the mounts busy.

use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use fchroot_common::constants::{CHROOT_BINARY, EXIT_FAILURE, SIGNAL_EXIT_BASE};
use fchroot_common::error::{FchrootError, Result};

/// Runs a command confined to a chroot root.
pub trait Launcher {
    /// Runs `command` inside `root`, optionally as `user_spec`, and waits
    /// for it to finish.
    ///
    /// Returns the command's exit code.
    ///
    /// # Errors
    ///
    /// Returns [`FchrootError::Launch`] if the command cannot be started.
    fn launch(&self, root: &Path, user_spec: Option<&str>, command: &[String]) -> Result<i32>;
}

/// Launcher that shells out to `chroot(8)`.
#[derive(Debug, Clone)]
pub struct ChrootLauncher {
    program: String,
}

impl ChrootLauncher {
    /// Creates a launcher using the `chroot` binary from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_program(CHROOT_BINARY)
    }

    /// Creates a launcher using an alternative confinement binary.
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ChrootLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl Launcher for ChrootLauncher {
    fn launch(&self, root: &Path, user_spec: Option<&str>, command: &[String]) -> Result<i32> {
        let program = which::which(&self.program).map_err(|e| FchrootError::Launch {
            program: self.program.clone(),
            message: e.to_string(),
        })?;
        let args = chroot_args(root, user_spec, command);
        tracing::info!(
            program = %program.display(),
            args = ?args,
            "executing"
        );

        let mut cmd = Command::new(&program);
        let _ = cmd
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        set_parent_death_signal(&mut cmd);

        let status = cmd.status().map_err(|e| FchrootError::Launch {
            program: self.program.clone(),
            message: e.to_string(),
        })?;

        let code = exit_code(status);
        if status.success() {
            tracing::info!("chroot completed successfully");
        } else {
            tracing::warn!(code, "chroot exited with non-zero status");
        }
        Ok(code)
    }
}

/// Builds the argument list passed to the confinement binary.
#[must_use]
pub fn chroot_args(root: &Path, user_spec: Option<&str>, command: &[String]) -> Vec<OsString> {
    let mut args = Vec::with_capacity(command.len() + 3);
    if let Some(spec) = user_spec {
        args.push(OsString::from("--userspec"));
        args.push(OsString::from(spec));
    }
    args.push(root.as_os_str().to_owned());
    args.extend(command.iter().map(OsString::from));
    args
}

/// Maps a child's exit status to a process exit code.
///
/// Death by signal `N` is reported as `128 + N`.
#[must_use]
pub fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status.code().unwrap_or_else(|| {
        status
            .signal()
            .map_or(EXIT_FAILURE, |signal| SIGNAL_EXIT_BASE + signal)
    })
}

#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
fn set_parent_death_signal(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;

    // SAFETY: the hook runs between fork and exec and only calls prctl(2),
    // which is async-signal-safe and touches no shared state.
    let _ = unsafe {
        cmd.pre_exec(|| {
            nix::sys::prctl::set_pdeathsig(nix::sys::signal::Signal::SIGTERM)
                .map_err(std::io::Error::from)
        })
    };
}

#[cfg(not(target_os = "linux"))]
fn set_parent_death_signal(_cmd: &mut Command) {}
