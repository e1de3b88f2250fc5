use tracing::{error, info};

use crate::Result;
use crate::installer::InstallContext;
use crate::installer::os_family::{OsFamily, Privilege, join_commands, parse_os_release};

/// Build pgvector on the local Linux host, escalating with `sudo`.
pub(crate) async fn install(ctx: &InstallContext<'_>) -> Result<()> {
    let os_release = ctx.shell.run("cat /etc/os-release").await?.into_result()?;
    let distro = parse_os_release(&os_release);
    info!("Linux distribution detected: {}", distro);

    let family = OsFamily::detect(&distro)?;
    let script = join_commands(&family.install_commands(ctx.settings, Privilege::Sudo));

    let output = ctx.shell.run(&script).await?;
    if !output.success() {
        error!(
            "Installing pgvector on the host failed with exit code {:?}",
            output.exit_code
        );
    }
    output.into_result()?;

    info!("Installed pgvector on the host system");
    Ok(())
}
