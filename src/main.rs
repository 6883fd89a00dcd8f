mod api;
mod gateway;
mod ingest;

use clap::{Parser, Subcommand};
use hybridflow_channels::{EvolutionClient, SocketRegistry};
use hybridflow_core::{
    config::{self, shellexpand, Config, ServerConfig},
    traits::ReplyHook,
};
use hybridflow_providers::{ProviderRegistry, WorkflowHook};
use hybridflow_store::Store;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "hybridflow",
    version,
    about = "HybridFlow: WhatsApp automation with human takeover"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook/API server and the socket channel.
    Serve,
    /// Print config, store and provider status.
    Status,
    /// Run one auto-resume sweep and exit.
    Resume,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;
    let _guard = init_logging(&cfg.server)?;

    match cli.command {
        Commands::Serve => serve(cfg).await?,
        Commands::Status => status(&cli.config, &cfg).await?,
        Commands::Resume => {
            let store = Store::new(&cfg.store).await?;
            let report = gateway::resume::run_once(&store, &cfg.resume).await?;
            println!(
                "Resumed {} session(s) idle since {}",
                report.resumed_count,
                report.cutoff_time.to_rfc3339()
            );
            println!(
                "Purged {} ledger row(s) older than {}",
                report.cleaned_up_events,
                report.ledger_cutoff.to_rfc3339()
            );
        }
    }

    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over `server.log_level`.
/// With `log_dir` set, logs go to a daily rolling file instead of stdout and
/// the returned guard must live as long as the process.
fn init_logging(server: &ServerConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level))
    };
    let json = server.log_format == "json";

    match server.log_dir.as_deref().filter(|d| !d.is_empty()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(shellexpand(dir), "hybridflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let builder = tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(writer)
                .with_ansi(false);
            if json {
                builder.json().try_init()
            } else {
                builder.try_init()
            }
            .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
            Ok(Some(guard))
        }
        None => {
            let builder = tracing_subscriber::fmt().with_env_filter(filter());
            if json {
                builder.json().try_init()
            } else {
                builder.try_init()
            }
            .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
            Ok(None)
        }
    }
}

async fn serve(cfg: Config) -> anyhow::Result<()> {
    let store = Store::new(&cfg.store).await?;
    for seed in &cfg.tenants {
        let tenant = store.upsert_tenant(seed).await?;
        info!("tenant '{}' ready (id {})", tenant.instance_name, tenant.id);
    }

    let providers = ProviderRegistry::from_config(&cfg.provider)?;
    let evolution = Arc::new(EvolutionClient::from_config(
        &cfg.evolution,
        cfg.reply.alternate_suffixes.clone(),
    ));
    let hook: Option<Arc<dyn ReplyHook>> = if cfg.workflow.enabled {
        let hook = WorkflowHook::from_config(&cfg.workflow)?;
        info!("workflow mode: replies delegated to {}", hook.url());
        Some(Arc::new(hook))
    } else {
        None
    };
    if cfg.evolution.signature_required() {
        info!("webhook signatures enforced");
    } else {
        warn!("webhook secret not configured; signatures are not checked");
    }

    let gateway = Arc::new(gateway::Gateway::new(
        store.clone(),
        providers,
        evolution,
        hook,
        cfg.reply.clone(),
    ));

    let (sockets, socket_events) = SocketRegistry::new(cfg.socket.clone());
    let sockets = Arc::new(sockets);
    let _adapter = ingest::socket::run_socket_adapter(socket_events, Arc::clone(&gateway));
    if cfg.socket.enabled && cfg.socket.mode == "global" {
        let url = first_non_empty(&cfg.socket.server_url, &cfg.evolution.server_url);
        let key = first_non_empty(&cfg.socket.api_key, &cfg.evolution.api_key);
        match sockets.connect_global(url, key).await {
            Ok(status) => info!("global socket connected to {}", status.server_url),
            // The API can retry via /api/websocket/connect.
            Err(e) => warn!("global socket not connected: {e}"),
        }
    }

    let _sweeper = gateway::resume::spawn_sweeper(store, cfg.resume.clone());

    let state = api::ApiState::new(gateway, Arc::clone(&sockets), Arc::new(cfg));
    tokio::select! {
        result = api::serve(state) => result?,
        _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
    }

    let stopped = sockets.disconnect_all().await;
    if stopped > 0 {
        info!("closed {stopped} socket connection(s)");
    }
    Ok(())
}

fn first_non_empty<'a>(preferred: &'a str, fallback: &'a str) -> &'a str {
    if preferred.is_empty() {
        fallback
    } else {
        preferred
    }
}

async fn status(config_path: &str, cfg: &Config) -> anyhow::Result<()> {
    println!("HybridFlow status\n");
    println!("Config: {config_path}");
    println!("Listen: {}:{}", cfg.server.host, cfg.server.port);
    println!(
        "Gateway: {}",
        if cfg.evolution.server_url.is_empty() {
            "not configured"
        } else {
            cfg.evolution.server_url.as_str()
        }
    );
    println!(
        "Webhook signatures: {}",
        if cfg.evolution.signature_required() {
            "enforced"
        } else {
            "not checked"
        }
    );
    println!(
        "Workflow mode: {}",
        if cfg.workflow.enabled { "enabled" } else { "disabled" }
    );
    println!(
        "Socket: {}",
        if cfg.socket.enabled {
            cfg.socket.mode.as_str()
        } else {
            "disabled"
        }
    );
    println!();

    match ProviderRegistry::from_config(&cfg.provider) {
        Ok(registry) => {
            println!("Default provider: {}", registry.default_name());
            for name in registry.names() {
                let ready = match registry.resolve(name) {
                    Ok(p) => p.is_available().await,
                    Err(_) => false,
                };
                println!("  {name}: {}", if ready { "available" } else { "missing api key" });
            }
        }
        Err(e) => println!("Providers: {e}"),
    }
    println!();

    let store = Store::new(&cfg.store).await?;
    let (total, paused) = store.session_counts().await?;
    let tenants = store.list_tenants().await?;
    println!("Store: {}", cfg.store.db_path);
    println!("  sessions: {total} ({paused} paused)");
    println!("  tenants: {}", tenants.len());
    for tenant in tenants {
        println!(
            "    {} (provider: {})",
            tenant.instance_name,
            tenant.provider_or(&cfg.provider.default)
        );
    }

    Ok(())
}
