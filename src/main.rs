use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;
use table_vectorizer::commands::{
    init_config, load_request, prompt_password, provision, show_config, show_schema,
};
use table_vectorizer::config::{Config, get_config_dir};
use table_vectorizer::database::Dialect;
use table_vectorizer::installer::EnvironmentKind;
use table_vectorizer::request::ProvisionRequest;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "table-vectorizer")]
#[command(about = "Add a vector embedding table next to an existing database table")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install pgvector if needed, create <table>_vector and embed every row
    Provision {
        /// Where the database server runs
        #[arg(value_enum)]
        environment: EnvironmentKind,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Print the companion table DDL for a dialect without connecting
    Schema {
        #[arg(long, value_enum)]
        dialect: Dialect,
        /// Source table name
        #[arg(long)]
        table: String,
        /// Integer primary key column of the source table
        #[arg(long)]
        id_column: String,
        /// Embedding length; defaults to the configured dimension
        #[arg(long)]
        dimension: Option<usize>,
    },
    /// Show or initialize the configuration file
    Config {
        /// Show current configuration
        #[arg(long, conflicts_with = "init")]
        show: bool,
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(Args)]
struct RequestArgs {
    /// JSON request file with url, username, password, tableName, idName, fields
    #[arg(long, conflicts_with_all = ["url", "table", "id_column", "fields"])]
    request: Option<PathBuf>,
    /// Connection URL, e.g. postgresql://localhost:5432/shop
    #[arg(long, required_unless_present = "request")]
    url: Option<String>,
    #[arg(long)]
    username: Option<String>,
    /// Prompted for when omitted and a terminal is attached
    #[arg(long)]
    password: Option<String>,
    /// Source table name
    #[arg(long, required_unless_present = "request")]
    table: Option<String>,
    /// Integer primary key column of the source table
    #[arg(long, required_unless_present = "request")]
    id_column: Option<String>,
    /// Text column to embed; repeat for several, in order
    #[arg(long = "field", required_unless_present = "request")]
    fields: Vec<String>,
    /// Name filter for the database container (docker only)
    #[arg(long)]
    container: Option<String>,
}

impl RequestArgs {
    /// Flags given alongside `--request` override the file's values.
    fn into_request(self) -> Result<ProvisionRequest> {
        let Self {
            request,
            url,
            username,
            password,
            table,
            id_column,
            fields,
            container,
        } = self;

        let mut built = match request {
            Some(path) => load_request(&path)?,
            None => ProvisionRequest {
                url: url.unwrap_or_default(),
                table_name: table.unwrap_or_default(),
                id_name: id_column.unwrap_or_default(),
                fields,
                ..ProvisionRequest::default()
            },
        };

        if username.is_some() {
            built.username = username;
        }
        if password.is_some() {
            built.password = password;
        }
        if container.is_some() {
            built.docker_container_name = container;
        }
        Ok(built)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Provision {
            environment,
            request,
        } => {
            let config = Config::load_default()?;
            let mut request = request.into_request()?;
            prompt_password(&mut request)?;
            provision(config, &request, environment).await?;
        }
        Commands::Schema {
            dialect,
            table,
            id_column,
            dimension,
        } => {
            show_schema(dialect, &table, &id_column, dimension)?;
        }
        Commands::Config { init, .. } => {
            if init {
                init_config(&get_config_dir()?)?;
            } else {
                show_config()?;
            }
        }
    }

    Ok(())
}
