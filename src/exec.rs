//! Shell command execution for `POST /api/exec`
//!
//! Trusted local tool: commands run unsandboxed with the server's own
//! privileges and working directory. The listener only binds loopback
//! addresses (see `Settings::validate`).

use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

use crate::{FileServerError, Result};

/// Build a platform shell invocation of `command`
pub fn shell_command(command: &str) -> Command {
    #[cfg(windows)]
    let mut cmd = {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    };
    #[cfg(not(windows))]
    let mut cmd = {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    };
    cmd.stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    cmd
}

/// Run `command` through the shell and wait for it to finish.
///
/// Output goes to the server's own stdout/stderr. Fails with
/// [`FileServerError::Exec`] when the command cannot be spawned or exits
/// unsuccessfully.
pub async fn run_shell_command(command: &str) -> Result<()> {
    let status = shell_command(command)
        .status()
        .await
        .map_err(|e| FileServerError::Exec {
            command: command.to_string(),
            message: e.to_string(),
        })?;
    check_status(command, status)
}

pub(crate) fn check_status(command: &str, status: ExitStatus) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(FileServerError::Exec {
            command: command.to_string(),
            message: format!("exited with {}", status),
        })
    }
}
