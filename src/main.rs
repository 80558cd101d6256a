use anyhow::Context;
use clap::{Parser, Subcommand};
use query_alert_engine::{
    alerts::{AlertCache, AlertScanner, AlertService, CachedAlertStore},
    authz::CollectionGrants,
    config::{Config, LogFormat, ObservabilityConfig},
    messaging::create_publisher,
    metrics,
    models::{AlertId, Role, RoleId},
    scheduler::{init_scheduler_metrics, register_default_jobs, SchedulerService},
    search::{EntityDocument, IndexManager, TantivyIndexClient},
    shutdown::create_shutdown_token,
    state::{create_cache_store, create_store, RoleStore},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "query-alert-engine")]
#[command(about = "Saved-query alerting engine", version, long_about = None)]
struct Cli {
    /// Configuration file layered over the built-in defaults
    #[arg(short, long, env = "CONFIG_PATH", default_value = "config/default.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler until SIGINT/SIGTERM
    Run,

    /// Run one scan cycle and print its report
    Check {
        /// Also print Prometheus metrics
        #[arg(short, long)]
        metrics: bool,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Index entities from a file of JSON documents
    Ingest {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Manage roles
    #[command(subcommand)]
    Role(RoleCommands),

    /// Manage alerts
    #[command(subcommand)]
    Alert(AlertCommands),
}

#[derive(Subcommand)]
enum RoleCommands {
    /// Create a role
    Create {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: Option<String>,

        #[arg(long)]
        admin: bool,
    },
}

#[derive(Subcommand)]
enum AlertCommands {
    /// Create an alert for a role
    Create {
        #[arg(short, long)]
        role: RoleId,

        #[arg(short, long)]
        query: String,
    },

    /// Replace an alert's query
    Update {
        #[arg(value_name = "ALERT_ID")]
        id: AlertId,

        #[arg(short, long)]
        query: String,
    },

    /// Show an alert's cached snapshot
    Get {
        #[arg(value_name = "ALERT_ID")]
        id: AlertId,
    },

    /// List a role's alerts
    List {
        #[arg(short, long)]
        role: RoleId,
    },

    /// Delete an alert
    Delete {
        #[arg(value_name = "ALERT_ID")]
        id: AlertId,
    },
}

/// Everything the commands need, wired from configuration
struct Engine {
    roles: Arc<dyn RoleStore>,
    alerts: AlertService,
    index: Arc<IndexManager>,
    scanner: Arc<AlertScanner>,
}

impl Engine {
    async fn build(config: &Config) -> anyhow::Result<Self> {
        let stores = create_store(&config.state).await?;

        let cache = AlertCache::new(create_cache_store(&config.cache).await?, &config.cache);
        let alerts = CachedAlertStore::new(stores.alerts.clone(), cache);

        let index = Arc::new(IndexManager::new(config.search.clone()).await?);
        let client = Arc::new(TantivyIndexClient::new(index.clone(), config.scanner.index.clone()));

        let authz = Arc::new(CollectionGrants::from_config(&config.authz));
        let publisher = create_publisher(&config.messaging).await?;

        let scanner = Arc::new(AlertScanner::new(
            &config.scanner,
            Arc::new(alerts.clone()),
            stores.roles.clone(),
            authz,
            client,
            publisher,
        ));

        Ok(Self {
            roles: stores.roles.clone(),
            alerts: AlertService::new(alerts, stores.roles),
            index,
            scanner,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;

    init_tracing(&config.observability);

    if let Commands::Config = cli.command {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    if config.observability.prometheus_enabled {
        if let Err(e) = metrics::init_metrics() {
            tracing::warn!(error = %e, "Failed to initialize metrics, continuing without them");
        }
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting query alert engine");
    let engine = Engine::build(&config).await?;

    match cli.command {
        Commands::Config => {}

        Commands::Run => run(&config, &engine).await?,

        Commands::Check { metrics: show_metrics } => {
            let report = engine.scanner.run(&CancellationToken::new()).await;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if show_metrics {
                println!("{}", metrics::gather_metrics());
            }
        }

        Commands::Ingest { path } => {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;

            let documents = serde_json::Deserializer::from_str(&text)
                .into_iter::<EntityDocument>()
                .collect::<Result<Vec<_>, _>>()
                .context("Invalid entity document")?;

            let indexed = engine.index.index_documents(&documents).await?;
            engine.index.commit().await?;
            println!("Indexed {} entities", indexed);
        }

        Commands::Role(RoleCommands::Create { name, email, admin }) => {
            let mut role = Role::new(name, String::new());
            role.email = email;
            role.is_admin = admin;

            engine.roles.save_role(&role).await?;
            println!("{}", serde_json::to_string_pretty(&role)?);
        }

        Commands::Alert(command) => alert_command(&engine.alerts, command).await?,
    }

    Ok(())
}

async fn run(config: &Config, engine: &Engine) -> anyhow::Result<()> {
    let shutdown = create_shutdown_token();

    init_scheduler_metrics();
    let mut scheduler = SchedulerService::new(config.scheduler.clone(), shutdown.clone()).await?;
    register_default_jobs(&scheduler, &config.scheduler, engine.scanner.clone()).await?;
    scheduler.start().await?;

    tracing::info!(
        schedule = %config.scheduler.jobs.check_alerts.schedule,
        "Alert engine running, press Ctrl+C to stop"
    );

    shutdown.cancelled().await;

    scheduler.shutdown().await?;
    tracing::info!("Alert engine stopped");

    Ok(())
}

async fn alert_command(service: &AlertService, command: AlertCommands) -> anyhow::Result<()> {
    match command {
        AlertCommands::Create { role, query } => {
            let alert = service.create_alert(role, query).await?;
            println!("{}", serde_json::to_string_pretty(&alert)?);
        }

        AlertCommands::Update { id, query } => {
            let alert = service.update_query(&id, query).await?;
            println!("{}", serde_json::to_string_pretty(&alert)?);
        }

        AlertCommands::Get { id } => match service.get_alert(&id).await? {
            Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            None => anyhow::bail!("Alert {} not found", id),
        },

        AlertCommands::List { role } => {
            let alerts = service.list_alerts(&role).await?;
            println!("{}", serde_json::to_string_pretty(&alerts)?);
        }

        AlertCommands::Delete { id } => {
            if !service.delete_alert(&id).await? {
                anyhow::bail!("Alert {} not found", id);
            }
            println!("Deleted alert {}", id);
        }
    }

    Ok(())
}

/// Logs go to stderr so command output on stdout stays parseable
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
