//! Mesh transport backed by the `BlueZ` `meshctl` command line tool

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{MeshCommand, MeshTransport, TransportError};

/// Runs `<program> send <node> vendor <opcode> <r> <g> <b>` per command
#[derive(Debug, Clone)]
pub struct MeshctlTransport {
    program: PathBuf,
}

impl MeshctlTransport {
    /// Create a transport invoking `program`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Program this transport invokes
    #[must_use]
    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    /// Resolve the program on `PATH` if it is a bare name
    ///
    /// Returns `None` if it cannot be found, in which case every command
    /// will fail as unavailable.
    #[must_use]
    pub fn resolve(&self) -> Option<PathBuf> {
        which::which(&self.program).ok()
    }

    /// Command-line arguments for a mesh command
    #[must_use]
    pub fn args(command: &MeshCommand) -> Vec<String> {
        vec![
            "send".to_string(),
            command.node_id.to_string(),
            "vendor".to_string(),
            command.kind.opcode().to_string(),
            command.rgb.r.to_string(),
            command.rgb.g.to_string(),
            command.rgb.b.to_string(),
        ]
    }
}

#[async_trait]
impl MeshTransport for MeshctlTransport {
    async fn run_command(
        &self,
        command: &MeshCommand,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        let child = Command::new(&self.program)
            .args(Self::args(command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TransportError::Unavailable(format!(
                    "failed to spawn {}: {e}",
                    self.program.display()
                ))
            })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| TransportError::Unavailable(format!("timed out after {timeout:?}")))?
            .map_err(|e| TransportError::Unavailable(format!("process error: {e}")))?;

        if !output.stdout.is_empty() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            tracing::trace!(node_id = command.node_id, stdout = %stdout.trim(), "meshctl stdout");
        }

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            Some(code) => Err(TransportError::Rejected(if stderr.is_empty() {
                format!("exit code {code}")
            } else {
                format!("exit code {code}: {stderr}")
            })),
            // Killed by a signal
            None => Err(TransportError::Unavailable(format!(
                "terminated abnormally ({})",
                output.status
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::Rgb;

    fn purple_for(node_id: u32) -> MeshCommand {
        MeshCommand::set_color(node_id, Rgb::new(128, 0, 128))
    }

    #[test]
    fn builds_vendor_set_color_args() {
        let args = MeshctlTransport::args(&purple_for(17));
        assert_eq!(args, vec!["send", "17", "vendor", "1", "128", "0", "128"]);
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let transport = MeshctlTransport::new("/nonexistent/parkin-meshctl");
        assert_eq!(transport.program(), std::path::Path::new("/nonexistent/parkin-meshctl"));
        assert!(transport.resolve().is_none());

        let result = transport
            .run_command(&purple_for(1), Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(TransportError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn zero_exit_is_success() {
        let transport = MeshctlTransport::new("true");
        let result = transport
            .run_command(&purple_for(1), Duration::from_secs(5))
            .await;
        tokio_test::assert_ok!(result);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_rejected() {
        let transport = MeshctlTransport::new("false");
        let result = transport
            .run_command(&purple_for(1), Duration::from_secs(5))
            .await;
        assert!(matches!(result, Err(TransportError::Rejected(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-meshctl");
        std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let transport = MeshctlTransport::new(script.clone());
        let result = transport
            .run_command(&purple_for(1), Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(TransportError::Unavailable(_))));
    }
}
