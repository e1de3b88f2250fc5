use tracing::info;

use crate::installer::InstallContext;
use crate::{ProvisionError, Result};

pub(crate) fn install(_ctx: &InstallContext<'_>) -> Result<()> {
    info!("Attempting to install pgvector on Windows...");

    Err(ProvisionError::NotImplemented(
        "installing pgvector on Windows is not supported; build it manually with \
         `nmake /F Makefile.win` from https://github.com/pgvector/pgvector and rerun"
            .to_string(),
    ))
}
