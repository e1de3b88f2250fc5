use anyhow::{Context, Result};
use console::style;
use dialoguer::Password;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::database::Dialect;
use crate::installer::EnvironmentKind;
use crate::orchestrator::{ProvisionReport, Provisioner};
use crate::request::{Identifier, ProvisionRequest, TableTarget};

/// Read a JSON request body such as `{"url": ..., "tableName": ..., ...}`.
#[inline]
pub fn load_request(path: &Path) -> Result<ProvisionRequest> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse request file: {}", path.display()))
}

/// Ask for the database password when none was given and a terminal is attached.
#[inline]
pub fn prompt_password(request: &mut ProvisionRequest) -> Result<()> {
    if request.password.is_some() || !console::user_attended() {
        return Ok(());
    }

    let prompt = match &request.username {
        Some(user) => format!("Password for {user}"),
        None => "Database password".to_string(),
    };
    let password = Password::new()
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()
        .context("Failed to read password")?;
    request.password = Some(password);
    Ok(())
}

/// Run one provisioning request with the configured collaborators.
#[inline]
pub async fn provision(
    config: Config,
    request: &ProvisionRequest,
    environment: EnvironmentKind,
) -> Result<ProvisionReport> {
    let provisioner = Provisioner::from_config(config).context("Failed to process data")?;

    let report = provisioner
        .run(request, environment)
        .await
        .context("Failed to process data")?;

    print_report(&report);
    Ok(report)
}

fn print_report(report: &ProvisionReport) {
    println!("{}", style("Data processed successfully").bold().green());
    println!("  Dialect: {}", style(report.dialect).cyan());
    println!("  Vector extension: {}", style(report.extension).cyan());
    println!("  Companion table: {}", style(&report.companion_table).cyan());
    println!("  Rows embedded: {}", style(report.rows_processed).cyan());
}

/// The DDL that would create the companion table, without connecting.
#[inline]
pub fn companion_schema(
    dialect: Dialect,
    table: &str,
    id_column: &str,
    dimension: usize,
) -> Result<String> {
    let target = TableTarget {
        table: Identifier::parse(table)?,
        id_column: Identifier::parse(id_column)?,
        fields: Vec::new(),
    };
    Ok(dialect.create_companion_table_sql(&target, dimension))
}

#[inline]
pub fn show_schema(
    dialect: Dialect,
    table: &str,
    id_column: &str,
    dimension: Option<usize>,
) -> Result<()> {
    let dimension = match dimension {
        Some(dimension) => dimension,
        None => Config::load_default()?.embedding_dimension(),
    };
    println!("{};", companion_schema(dialect, table, id_column, dimension)?);
    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    println!("{}", style("Current Configuration").bold().cyan());
    println!();

    println!("{}", style("Embedding:").bold().yellow());
    println!(
        "  Provider: {}",
        style(format!("{:?}", config.embedding.provider)).cyan()
    );
    println!("  Dimension: {}", style(config.embedding.dimension).cyan());
    match config.ollama_url() {
        Ok(url) => println!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => println!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }
    println!("  Ollama model: {}", style(&config.embedding.ollama.model).cyan());

    println!();
    println!("{}", style("Installer:").bold().yellow());
    println!(
        "  pgvector: {} @ {}",
        config.installer.pgvector_repository,
        style(&config.installer.pgvector_version).cyan()
    );
    println!("  Build directory: {}", style(&config.installer.build_dir).cyan());
    println!(
        "  Container filter: {}",
        style(&config.installer.default_container_filter).cyan()
    );

    println!();
    println!("{}", style("Database:").bold().yellow());
    println!(
        "  Max connections: {}",
        style(config.database.max_connections).cyan()
    );
    println!(
        "  Acquire timeout: {}s",
        style(config.database.acquire_timeout_secs).cyan()
    );

    println!();
    println!("Config file: {}", style(config.config_file_path().display()).dim());
    Ok(())
}

/// Write the default config file unless one already exists.
#[inline]
pub fn init_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir)?;
    let path = config.config_file_path();

    if path.exists() {
        println!("Config file already exists: {}", style(path.display()).dim());
        return Ok(());
    }

    config.save()?;
    info!("Wrote default configuration to {}", path.display());
    println!("{} {}", style("Created").green(), path.display());
    Ok(())
}
