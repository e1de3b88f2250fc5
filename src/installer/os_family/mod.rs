
use std::fmt;

use crate::config::InstallerConfig;
use crate::{ProvisionError, Result};

/// Package-manager family of a Linux distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    /// Debian, Ubuntu (apt)
    Debian,
    /// Alpine (apk)
    Alpine,
    /// Arch, Manjaro (pacman)
    Arch,
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debian => "debian",
            Self::Alpine => "alpine",
            Self::Arch => "arch",
        };
        f.write_str(name)
    }
}

/// Where the build runs, which decides whether privileged steps need `sudo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Already root, e.g. `docker exec -u root`
    Root,
    /// Local user; escalate with `sudo`
    Sudo,
}

impl Privilege {
    fn prefix(self) -> &'static str {
        match self {
            Self::Root => "",
            Self::Sudo => "sudo ",
        }
    }
}

/// OS name from `/etc/os-release`: `PRETTY_NAME`, else `ID`, else `Unknown`.
#[inline]
pub fn parse_os_release(content: &str) -> String {
    let value_of = |key: &str| {
        content.lines().find_map(|line| {
            line.trim()
                .strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('='))
                .map(|value| value.trim().replace(['"', '\''], ""))
        })
    };

    value_of("PRETTY_NAME")
        .or_else(|| value_of("ID"))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Unknown".to_string())
}

impl OsFamily {
    /// Classify an OS name; anything unrecognised is [`ProvisionError::UnsupportedOs`].
    #[inline]
    pub fn detect(os_name: &str) -> Result<Self> {
        let lower = os_name.to_lowercase();

        if lower.contains("debian") || lower.contains("ubuntu") {
            Ok(Self::Debian)
        } else if lower.contains("alpine") {
            Ok(Self::Alpine)
        } else if lower.contains("arch") || lower.contains("manjaro") {
            Ok(Self::Arch)
        } else {
            Err(ProvisionError::UnsupportedOs(os_name.to_string()))
        }
    }

    /// Ordered steps: refresh/install prerequisites, fetch the pinned source, build and install.
    #[inline]
    pub fn install_commands(self, settings: &InstallerConfig, privilege: Privilege) -> Vec<String> {
        let sudo = privilege.prefix();
        let build_dir = &settings.build_dir;

        let mut commands = match self {
            Self::Debian => vec![
                format!("{sudo}apt-get update"),
                format!("{sudo}apt-get install -y git build-essential postgresql-server-dev-all"),
            ],
            Self::Alpine => vec![format!(
                "{sudo}apk add --no-cache git build-base postgresql-dev"
            )],
            Self::Arch => vec![
                format!("{sudo}pacman -Syu --noconfirm"),
                format!(
                    "{sudo}pacman -S --needed --noconfirm base-devel git postgresql-libs postgresql"
                ),
            ],
        };

        commands.push(format!(
            "rm -rf {build_dir} && git clone --branch {} {} {build_dir}",
            settings.pgvector_version, settings.pgvector_repository
        ));
        commands.push(format!("cd {build_dir} && make && {sudo}make install"));

        commands
    }
}

/// The single shell invocation a command sequence runs as.
#[inline]
pub fn join_commands(commands: &[String]) -> String {
    commands.join(" && ")
}
