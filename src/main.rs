use clap::Parser;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt}; // for .with() on registry

use transfer_saga::cli::{self, AccountCommands, Cli, Commands, DbCommands, TxCommands};
use transfer_saga::config::{Config, LogFormat, StoreBackend};
use transfer_saga::workflow::EventPublisher;
use transfer_saga::{AppState, create_app, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config),
        Commands::Account(command) => {
            cli::require_persistent_backend(&config, "account")?;
            let state = build_state(&config).await?;
            match command {
                AccountCommands::Create {
                    account_number,
                    name,
                    balance,
                } => cli::handle_account_create(&state.service, &account_number, &name, balance).await,
                AccountCommands::Show { account_number } => {
                    cli::handle_account_show(&state.service, &account_number).await
                }
            }
        }
        Commands::Tx(command) => {
            cli::require_persistent_backend(&config, "tx")?;
            let state = build_state(&config).await?;
            match command {
                TxCommands::Show { transaction_id } => cli::handle_tx_show(&state.service, &transaction_id).await,
                TxCommands::Stuck { older_than_secs } => {
                    cli::handle_tx_stuck(&state.service, &config, older_than_secs).await
                }
            }
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Fmt => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let events = EventPublisher::new(config.event_channel_capacity);
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; balances are lost on exit");
            Ok(AppState::in_memory(events))
        }
        StoreBackend::Postgres => {
            let pool = db::create_pool(config.require_database_url()?, config.db_max_connections).await?;
            db::run_migrations(&pool).await?;
            Ok(AppState::postgres(pool, events))
        }
    }
}

async fn serve(config: &Config) -> anyhow::Result<()> {
    let state = build_state(config).await?;
    let mut activity = state.delegate.events().subscribe();
    tokio::spawn(async move {
        loop {
            match activity.recv().await {
                Ok(event) => tracing::info!(
                    event_type = %event.event_type,
                    process_instance_id = %event.process_instance_id,
                    activity_id = %event.activity_id,
                    status = ?event.status,
                    duration_ms = event.duration_ms,
                    "Activity event"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Activity event logger lagged")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
