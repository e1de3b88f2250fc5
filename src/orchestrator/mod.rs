//! Request orchestration
//!
//! [`Provisioner`] runs one request through every stage in a fixed order
//! and stops at the first failure. Nothing is rolled back: an enabled
//! extension, a created table or rows inserted before the failure remain.


use serde::Serialize;
use tracing::{error, info};

use crate::Result;
use crate::config::Config;
use crate::database::{Connector, Dialect, Session, SqlxConnector, TargetDatabase};
use crate::embeddings::{EmbeddingProvider, provider_from_config};
use crate::installer::{
    ContainerRuntime, DockerCli, EnvironmentKind, ExtensionStatus, HostShell, InstallContext,
    SystemShell, ensure_vector_extension,
};
use crate::request::{ProvisionRequest, TableTarget};
use crate::{pipeline, schema};

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub dialect: Dialect,
    pub extension: ExtensionStatus,
    pub companion_table: String,
    pub rows_processed: u64,
}

/// Owns the collaborators for provisioning requests.
pub struct Provisioner {
    config: Config,
    connector: Box<dyn Connector>,
    runtime: Box<dyn ContainerRuntime>,
    shell: Box<dyn HostShell>,
    embedder: Box<dyn EmbeddingProvider>,
}

impl Provisioner {
    /// Real collaborators: sqlx pools, the `docker` CLI, `/bin/sh` and the
    /// configured embedding provider.
    #[inline]
    pub fn from_config(config: Config) -> Result<Self> {
        let embedder = provider_from_config(&config)?;
        let connector = Box::new(SqlxConnector::new(config.database.clone()));
        Ok(Self {
            config,
            connector,
            runtime: Box::new(DockerCli::new()),
            shell: Box::new(SystemShell),
            embedder,
        })
    }

    #[inline]
    #[must_use]
    pub fn with_connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Box::new(connector);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_runtime(mut self, runtime: impl ContainerRuntime + 'static) -> Self {
        self.runtime = Box::new(runtime);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_shell(mut self, shell: impl HostShell + 'static) -> Self {
        self.shell = Box::new(shell);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_embedder(mut self, embedder: impl EmbeddingProvider + 'static) -> Self {
        self.embedder = Box::new(embedder);
        self
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validate, check the embedding provider, connect, detect the dialect, ensure the extension, create
    /// the companion table and ingest every row.
    ///
    /// The connection pool is closed on every path once it has been opened.
    #[inline]
    pub async fn run(
        &self,
        request: &ProvisionRequest,
        environment: EnvironmentKind,
    ) -> Result<ProvisionReport> {
        let target = request.validate()?;
        info!(
            "Provisioning embeddings for {} ({}) via {}",
            target.table, target.id_column, environment
        );

        self.embedder.check_ready().await?;

        let database = self.connector.connect(request).await?;
        let result = self
            .provision(database.as_ref(), &target, request, environment)
            .await;
        database.close().await;

        if let Err(e) = &result {
            error!("Provisioning {} failed: {}", target.table, e);
        }
        result
    }

    async fn provision(
        &self,
        database: &dyn TargetDatabase,
        target: &TableTarget,
        request: &ProvisionRequest,
        environment: EnvironmentKind,
    ) -> Result<ProvisionReport> {
        let session = Session::open(database, target).await?;

        let ctx = InstallContext {
            runtime: self.runtime.as_ref(),
            shell: self.shell.as_ref(),
            settings: &self.config.installer,
            container_hint: request.docker_container_name.as_deref(),
        };
        let extension = ensure_vector_extension(&session, environment, &ctx).await?;

        schema::create_companion_table(&session, self.embedder.dimension()).await?;
        let rows_processed = pipeline::run(&session, self.embedder.as_ref()).await?;

        Ok(ProvisionReport {
            dialect: session.dialect,
            extension,
            companion_table: target.companion_table().to_string(),
            rows_processed,
        })
    }
}
