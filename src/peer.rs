//! Peer process spawning for the command-line binary.
//!
//! The library itself never manages processes; this module only exists so
//! the binary can launch a peer and hand its stdio to a [`Client`](crate::Client).
//! Peers are spawned with `kill_on_drop(true)` and all three standard
//! streams piped.

use std::path::PathBuf;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::info;

use crate::{Result, RpcError};

/// What to launch.
#[derive(Debug, Clone)]
pub struct PeerCommand {
    /// Program to run.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory; inherits the current one when `None`.
    pub current_dir: Option<PathBuf>,
}

/// A running peer and its piped standard streams.
///
/// Keep `child` alive for as long as the peer is needed; dropping it kills
/// the process.
#[derive(Debug)]
pub struct PeerProcess {
    /// Process handle.
    pub child: Child,
    /// Peer's stdin: the outbound stream.
    pub stdin: ChildStdin,
    /// Peer's stdout: the primary inbound stream.
    pub stdout: ChildStdout,
    /// Peer's stderr: the diagnostic inbound stream.
    pub stderr: ChildStderr,
}

/// Spawn `command` with piped stdio.
///
/// # Errors
///
/// [`RpcError::Transport`] if the process cannot be started or a standard
/// stream cannot be captured.
pub fn spawn_peer(command: &PeerCommand) -> Result<PeerProcess> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &command.current_dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd
        .spawn()
        .map_err(|err| RpcError::Transport(format!("failed to spawn peer: {err}")))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| RpcError::Transport("failed to capture peer stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| RpcError::Transport("failed to capture peer stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| RpcError::Transport("failed to capture peer stderr".into()))?;

    info!(
        program = command.program.as_str(),
        pid = child.id(),
        "peer process spawned"
    );

    Ok(PeerProcess {
        child,
        stdin,
        stdout,
        stderr,
    })
}
