
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::{ProvisionError, Result};

/// Exit status plus stdout and stderr interleaved line by line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub output: String,
}

impl CommandOutput {
    #[inline]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turn a non-zero exit into [`ProvisionError::Execution`].
    #[inline]
    pub fn into_result(self) -> Result<String> {
        if self.success() {
            Ok(self.output)
        } else {
            Err(ProvisionError::Execution {
                exit_code: self.exit_code,
                output: self.output,
            })
        }
    }
}

/// Access to running containers.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Names of running containers matching `name_filter`.
    async fn list_running(&self, name_filter: &str) -> Result<Vec<String>>;

    /// Run `script` with `/bin/sh -c` inside `container` as root.
    async fn exec(&self, container: &str, script: &str) -> Result<CommandOutput>;
}

/// Access to the local shell.
#[async_trait]
pub trait HostShell: Send + Sync {
    /// Run `script` with `/bin/sh -c`.
    async fn run(&self, script: &str) -> Result<CommandOutput>;
}

/// Spawn `command`, log every output line as it arrives, and wait for exit.
///
/// There is no timeout: package installs and compiles run to completion.
#[inline]
pub async fn run_captured(mut command: Command, source: &str) -> Result<CommandOutput> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn()?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("child stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("child stderr was not captured"))?;

    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();
    let mut output = String::new();
    let mut stdout_open = true;
    let mut stderr_open = true;

    while stdout_open || stderr_open {
        let line = tokio::select! {
            line = stdout_lines.next_line(), if stdout_open => {
                let line = line?;
                stdout_open = line.is_some();
                line
            }
            line = stderr_lines.next_line(), if stderr_open => {
                let line = line?;
                stderr_open = line.is_some();
                line
            }
        };

        if let Some(line) = line {
            info!(source = %source, "{}", line);
            output.push_str(&line);
            output.push('\n');
        }
    }

    let status = child.wait().await?;
    debug!(source = %source, "exited with {}", status);

    Ok(CommandOutput {
        exit_code: status.code(),
        output,
    })
}

/// The `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    #[inline]
    pub fn new() -> Self {
        Self {
            program: "docker".to_string(),
        }
    }

    /// Use a docker-compatible binary such as `podman`.
    #[inline]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn list_running(&self, name_filter: &str) -> Result<Vec<String>> {
        let mut command = Command::new(&self.program);
        command
            .arg("ps")
            .arg("--format")
            .arg("{{.Names}}")
            .arg("--filter")
            .arg(format!("name={name_filter}"));

        let output = run_captured(command, "docker ps").await?.into_result()?;

        Ok(output
            .lines()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn exec(&self, container: &str, script: &str) -> Result<CommandOutput> {
        let mut command = Command::new(&self.program);
        command
            .arg("exec")
            .arg("-u")
            .arg("root")
            .arg(container)
            .arg("/bin/sh")
            .arg("-c")
            .arg(script);

        run_captured(command, container).await
    }
}

/// `/bin/sh` on the local machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShell;

#[async_trait]
impl HostShell for SystemShell {
    async fn run(&self, script: &str) -> Result<CommandOutput> {
        let mut command = Command::new("/bin/sh");
        command.arg("-c").arg(script);
        run_captured(command, "host").await
    }
}
