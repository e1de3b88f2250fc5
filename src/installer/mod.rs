//! pgvector installation
//!
//! One strategy per [`EnvironmentKind`]. Strategies reach the operating
//! system only through [`ContainerRuntime`] and [`HostShell`], so the
//! branching can be exercised without a container runtime.

mod containerized;
pub mod os_family;
pub mod runner;
mod sandbox_linux;
mod sandbox_windows;


use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::config::InstallerConfig;
use crate::database::Session;
use crate::{ProvisionError, Result};

pub use os_family::{OsFamily, Privilege};
pub use runner::{CommandOutput, ContainerRuntime, DockerCli, HostShell, SystemShell};

/// Where the database server runs; chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentKind {
    /// Inside a Docker container
    #[value(name = "docker")]
    Containerized,
    /// Directly on a Linux host
    SandboxLinux,
    /// Directly on a Windows host
    SandboxWindows,
}

impl fmt::Display for EnvironmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Containerized => "docker",
            Self::SandboxLinux => "sandbox-linux",
            Self::SandboxWindows => "sandbox-windows",
        };
        f.write_str(name)
    }
}

/// Collaborators and settings a strategy needs.
pub struct InstallContext<'a> {
    pub runtime: &'a dyn ContainerRuntime,
    pub shell: &'a dyn HostShell,
    pub settings: &'a InstallerConfig,
    /// Container name filter from the request, if any.
    pub container_hint: Option<&'a str>,
}

impl InstallContext<'_> {
    fn container_filter(&self) -> &str {
        self.container_hint
            .filter(|hint| !hint.trim().is_empty())
            .unwrap_or(self.settings.default_container_filter.as_str())
    }
}

impl EnvironmentKind {
    /// Install the extension's native component for this environment.
    #[inline]
    pub async fn install(self, ctx: &InstallContext<'_>) -> Result<()> {
        info!("Installing pgvector for environment {}", self);
        match self {
            Self::Containerized => containerized::install(ctx).await,
            Self::SandboxLinux => sandbox_linux::install(ctx).await,
            Self::SandboxWindows => sandbox_windows::install(ctx),
        }
    }
}

/// Outcome of [`ensure_vector_extension`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionStatus {
    /// The dialect has no extension to install
    NotRequired,
    /// Found in the catalog; nothing was run
    AlreadyPresent,
    /// Built, installed and enabled during this request
    Installed,
}

impl fmt::Display for ExtensionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotRequired => "not required",
            Self::AlreadyPresent => "already present",
            Self::Installed => "installed",
        };
        f.write_str(text)
    }
}

/// Install and enable the dialect's vector extension unless the catalog
/// already lists it.
#[inline]
pub async fn ensure_vector_extension(
    session: &Session<'_>,
    environment: EnvironmentKind,
    ctx: &InstallContext<'_>,
) -> Result<ExtensionStatus> {
    let Some(extension) = session.capabilities().extension else {
        return Ok(ExtensionStatus::NotRequired);
    };

    if session.database.fetch_count(extension.installed_check).await? > 0 {
        info!("{} extension is already installed.", extension.name);
        return Ok(ExtensionStatus::AlreadyPresent);
    }

    environment.install(ctx).await?;

    session
        .database
        .execute(extension.enable)
        .await
        .map_err(|e| {
            ProvisionError::Sql(format!(
                "Failed to enable {} extension in the database: {e}",
                extension.name
            ))
        })?;
    info!(
        "Successfully enabled {} extension in the database.",
        extension.name
    );

    Ok(ExtensionStatus::Installed)
}
