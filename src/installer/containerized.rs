use tracing::{error, info};

use crate::installer::InstallContext;
use crate::installer::os_family::{OsFamily, Privilege, join_commands, parse_os_release};
use crate::{ProvisionError, Result};

/// Build pgvector inside the running database container.
pub(crate) async fn install(ctx: &InstallContext<'_>) -> Result<()> {
    let container = resolve_container(ctx).await?;

    let os_release = ctx
        .runtime
        .exec(&container, "cat /etc/os-release")
        .await?
        .into_result()?;
    let os_name = parse_os_release(&os_release);
    info!("OS inside the Docker container: {}", os_name);

    let family = OsFamily::detect(&os_name)?;
    let script = join_commands(&family.install_commands(ctx.settings, Privilege::Root));

    let output = ctx.runtime.exec(&container, &script).await?;
    if !output.success() {
        error!(
            "Installing pgvector in container {} failed with exit code {:?}",
            container, output.exit_code
        );
    }
    output.into_result()?;

    info!("Installed pgvector in container {}", container);
    Ok(())
}

/// Exactly one running container must match the filter; with several, an
/// exact name match wins.
async fn resolve_container(ctx: &InstallContext<'_>) -> Result<String> {
    let filter = ctx.container_filter();
    let mut names = ctx.runtime.list_running(filter).await?;

    match names.len() {
        0 => Err(ProvisionError::ContainerNotFound(format!(
            "no running container matches '{filter}'"
        ))),
        1 => Ok(names.remove(0)),
        _ => names
            .iter()
            .find(|name| name.as_str() == filter)
            .cloned()
            .ok_or_else(|| {
                ProvisionError::ContainerNotFound(format!(
                    "'{filter}' matches several containers: {}",
                    names.join(", ")
                ))
            }),
    }
}
