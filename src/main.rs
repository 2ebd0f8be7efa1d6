use anyhow::{Context, Result};
use careflow::{
    api::routes::build_app,
    cli::{
        init::{self, InitConfig, InitResult},
        output::Output,
        Cli, Commands,
    },
    orders::spawn_retention_sweeper,
    utils::{
        logging::init_tracing,
        toml_config::{CareflowConfig, ConfigError, ConfigManager},
    },
    AppState,
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = cli.output();

    if let Err(e) = run(cli, &output).await {
        output.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    match &cli.command {
        None | Some(Commands::Serve) => serve(&cli).await,
        Some(Commands::Init { path, force }) => {
            match init::run(
                InitConfig {
                    path: path.clone(),
                    force: *force,
                },
                output,
            ) {
                InitResult::Success | InitResult::AlreadyExists => Ok(()),
                InitResult::Error(e) => Err(anyhow::anyhow!(e)),
            }
        }
        Some(Commands::Config { validate }) => show_config(&cli, output, *validate),
        Some(Commands::Inventory) => show_inventory(&cli, output),
    }
}

/// Load the configuration manager, falling back to built-in defaults when
/// the file does not exist. The flag reports whether the file was found.
fn load_config(cli: &Cli) -> Result<(ConfigManager, bool)> {
    match ConfigManager::new(&cli.config) {
        Ok(manager) => Ok((manager, true)),
        Err(ConfigError::FileNotFound(_)) => Ok((
            ConfigManager::from_config(CareflowConfig::default()),
            false,
        )),
        Err(e) => Err(e).with_context(|| format!("loading {}", cli.config.display())),
    }
}

async fn serve(cli: &Cli) -> Result<()> {
    // Logging settings live in the config file, so load it first
    let (mut manager, found) = load_config(cli)?;
    init_tracing(&manager.config().server, cli.verbose);

    if found {
        if let Err(e) = manager.start_watching() {
            warn!("Config hot reload disabled: {}", e);
        }
    } else {
        warn!(
            "{} not found, using built-in defaults (run `careflow-server init` to create one)",
            cli.config.display()
        );
    }

    let config = manager.config();
    for warning in config.validate_with_warnings()? {
        warn!("{}", warning);
    }

    let state = AppState::from_config(manager)?;
    info!(
        "Loaded {} inventory records, model {}",
        state.inventory.list(&Default::default()).await?.len(),
        state.llm.model_name()
    );

    let config_manager = Arc::clone(&state.config_manager);
    let sweeper = spawn_retention_sweeper(
        Arc::clone(&state.sessions),
        config.orders.sweep_interval(),
        move || config_manager.config().orders.retention_policy(),
    );

    let app = build_app(state);
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {}", address))?;
    info!("Careflow listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweeper.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn show_config(cli: &Cli, output: &Output, validate: bool) -> Result<()> {
    let config = CareflowConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    output.header("Configuration");
    output.kv("file", &cli.config.display().to_string());
    output.kv("listen", &config.bind_address());
    output.kv("log level", &config.server.log_level);
    output.kv("seed records", &config.inventory.records().len().to_string());
    output.kv("history window", &config.sessions.history_window.to_string());
    output.kv("model", &format!("{:?}", config.llm.provider));

    if validate {
        output.header("Validation");
        let warnings = config.validate_with_warnings()?;
        for warning in &warnings {
            output.warning(&warning.to_string());
        }
        output.success(&format!("Configuration valid ({} warning(s))", warnings.len()));
    }
    Ok(())
}

fn show_inventory(cli: &Cli, output: &Output) -> Result<()> {
    let config = match CareflowConfig::load(&cli.config) {
        Ok(config) => config,
        Err(ConfigError::FileNotFound(_)) => CareflowConfig::default(),
        Err(e) => return Err(e).with_context(|| format!("loading {}", cli.config.display())),
    };

    output.header("Starting inventory");
    output.table_header(&["Location", "Item", "Quantity", "Minimum"]);
    for record in config.inventory.records() {
        let quantity = format!("{} {}", record.quantity, record.unit);
        let minimum = record.min_threshold.to_string();
        output.table_row(
            &[&record.location, &record.item, &quantity, &minimum],
            record.is_low(),
        );
    }
    Ok(())
}
