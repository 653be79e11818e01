//! pg-explain-capture - safe EXPLAIN plan capture for observed PostgreSQL queries.

use pg_explain_capture::batch::{read_samples, write_samples};
use pg_explain_capture::cli::Cli;
use pg_explain_capture::config::{Config, ServerConfig};
use pg_explain_capture::db::PostgresConnector;
use pg_explain_capture::error::{CaptureError, Result};
use pg_explain_capture::{logging, run_explain, CaptureOptions};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    match cli.log_path() {
        Some(path) => logging::init_file_logging(&path, cli.verbose),
        None => logging::init_stderr_logging(cli.verbose),
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;

    if let Some(concurrency) = cli.concurrency {
        config.explain.concurrency = concurrency;
    }
    config.validate()?;

    let server = resolve_server(&cli, &config)?;
    info!("Server: {}", server.display_string());

    let samples = read_samples(&cli.input)?;
    info!("Read {} samples", samples.len());

    let options = CaptureOptions {
        monitored: server.monitored_databases(),
        system_type: server.system_type,
        concurrency: config.explain.concurrency,
    };
    let connector = PostgresConnector::new(server);

    let (mut samples, _) = run_explain(&connector, samples, &options).await;

    if cli.mark_explained {
        samples.iter_mut().for_each(|s| s.mark_explained());
    }

    write_samples(cli.output.as_deref(), &samples, cli.pretty)
}

/// Resolves the server configuration from CLI args, config file, and environment.
///
/// Precedence: connection string argument, then the `[server]` section,
/// then PG* environment variables.
fn resolve_server(cli: &Cli, config: &Config) -> Result<ServerConfig> {
    let mut server = config.server.clone();

    if let Some(from_cli) = cli.to_server_config()? {
        server.merge(&from_cli);
    }
    if let Some(system_type) = cli.system_type()? {
        server.system_type = system_type;
    }

    server.apply_env_defaults();

    if server.dbname.is_none() && !server.db_all_names && server.db_extra_names.is_empty() {
        return Err(CaptureError::config(
            "No database configured. Set server.dbname, PGDATABASE, or pass a connection string",
        ));
    }

    Ok(server)
}
