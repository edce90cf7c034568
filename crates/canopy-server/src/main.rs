use std::net::SocketAddr;
use std::sync::Arc;

use canopy_config::{cli::Cli as ConfigCli, load_config, PartialConfig};
use canopy_datalayer::{Connection, InMemoryConnection, SqliteConnection};
use canopy_devices::{handle_device_socket, DeviceSessionTable};
use canopy_jobserver::{JobServer, LoggingMailer, UserCtx};
use canopy_pigeon::PigeonClient;
use canopy_rest::{router, RestState, SessionStore};
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Flattens the shared option set from [`canopy_config::cli::Cli`] with the
/// one flag this binary adds on top: where to persist the datalayer.
#[derive(Debug, Parser)]
#[command(name = "canopy-server", version, about = "Canopy IoT cloud backend")]
struct Cli {
    #[command(flatten)]
    config: ConfigCli,

    /// SQLite database path. Omit to run against an in-memory datalayer,
    /// useful for development and tests but not for a second process to
    /// see the same state.
    #[arg(long = "sqlite-path", env = "CANOPY_SQLITE_PATH")]
    sqlite_path: Option<String>,
}

fn init_telemetry() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry();

    let cli = Cli::parse();
    let partial: PartialConfig = cli.config.into();
    let config = Arc::new(load_config(partial)?);

    info!(config = %config.dump_to_string(), "canopy-server starting");

    let datalayer: Arc<dyn Connection> = match &cli.sqlite_path {
        Some(path) => {
            let pool = SqlitePoolOptions::new()
                .max_connections(5)
                .connect(&format!("sqlite://{path}?mode=rwc"))
                .await?;
            SqliteConnection::init(&pool).await?;
            Arc::new(SqliteConnection::new(pool))
        },
        None => Arc::new(InMemoryConnection::new()),
    };

    let hostname = if config.hostname.is_empty() {
        hostname::get()?.to_string_lossy().into_owned()
    } else {
        config.hostname.clone()
    };

    let metrics_handle = canopy_metrics::install();

    let sessions = DeviceSessionTable::new();
    let pigeon_client = PigeonClient::new(Arc::clone(&datalayer));
    let user_ctx = UserCtx::new(
        Arc::clone(&config),
        Arc::new(LoggingMailer),
        Arc::clone(&datalayer),
        pigeon_client.clone(),
    );
    let mut job_server = JobServer::new(hostname.clone(), user_ctx);

    canopy_rest::jobs::register_all(&mut job_server);
    canopy_devices::register_device_control(&mut job_server, Arc::clone(&sessions));

    let bus_datalayer = Arc::clone(&datalayer);
    tokio::spawn(async move {
        let addr = format!("0.0.0.0:{}", canopy_pigeon::DEFAULT_PORT);
        if let Err(e) = job_server.bind(bus_datalayer, &addr).await {
            tracing::error!(error = %e, "pigeon bus exited");
        }
    });

    let rest_state = RestState { pigeon: pigeon_client, sessions: SessionStore::new() };

    let cors = canopy_rest::server::build_cors_layer(&config.allow_origin);
    let app = canopy_rest::server::apply_middleware_stack(router(rest_state), cors)
        .route(
            "/ws/device",
            axum::routing::get({
                let datalayer = Arc::clone(&datalayer);
                let sessions = Arc::clone(&sessions);
                let hostname = hostname.clone();
                move |ws: axum::extract::WebSocketUpgrade| {
                    let datalayer = Arc::clone(&datalayer);
                    let sessions = Arc::clone(&sessions);
                    let hostname = hostname.clone();
                    async move {
                        ws.on_upgrade(move |socket| {
                            handle_device_socket(socket, datalayer, sessions, hostname)
                        })
                    }
                }
            }),
        )
        .route(
            "/metrics",
            axum::routing::get(move || {
                let handle = metrics_handle.clone();
                async move { handle.render() }
            }),
        );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!(%addr, "http listener starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
