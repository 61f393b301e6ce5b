use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use deploycast::config::{AgeSource, BroadcastConfig, DEFAULT_LOG_TAIL_LINES};
use deploycast::controller::WatchController;
use deploycast::event::ResourceRef;
use deploycast::hub::Hub;
use deploycast::k8s::store::{KubeStore, ResourceStore};
use deploycast::k8s::{client, deployments, USER_AGENT};
use deploycast::sink::forward_json_lines;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream deployment change events as JSON lines
    Watch(WatchArgs),
    /// Print the current event for one deployment
    Get {
        #[arg(short, long)]
        namespace: String,
        name: String,
        #[arg(long, default_value = "created")]
        age_source: AgeSource,
    },
    /// List deployment names in a namespace
    List {
        #[arg(short, long)]
        namespace: String,
    },
    /// Print the tail of the logs of a deployment's first running pod
    Logs {
        #[arg(short, long)]
        namespace: String,
        name: String,
        #[arg(long, default_value_t = DEFAULT_LOG_TAIL_LINES)]
        tail: i64,
    },
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Namespace to watch; all namespaces when omitted
    #[arg(short, long)]
    namespace: Option<String>,
    /// Outbound queue bound per subscriber
    #[arg(long)]
    capacity: Option<usize>,
    /// Resync period in seconds, 0 disables resync
    #[arg(long)]
    resync_secs: Option<u64>,
    #[arg(long, default_value = "created")]
    age_source: AgeSource,
}

impl WatchArgs {
    fn config(&self) -> deploycast::error::Result<BroadcastConfig> {
        let mut config = BroadcastConfig {
            age_source: self.age_source,
            ..BroadcastConfig::default()
        };
        if let Some(capacity) = self.capacity {
            config.subscriber_capacity = capacity;
        }
        if let Some(secs) = self.resync_secs {
            config.resync_period = (secs > 0).then(|| Duration::from_secs(secs));
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("deploycast=info".parse()?))
        .init();

    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();
    match cli.command {
        Command::Watch(args) => watch(args).await?,
        Command::Get {
            namespace,
            name,
            age_source,
        } => {
            let store = KubeStore::new(client::new(Some(USER_AGENT)).await?, None, None);
            let event =
                deployments::get_event(&store, &ResourceRef::new(namespace, name), age_source)
                    .await?;
            println!("{}", event.to_json()?);
        }
        Command::List { namespace } => {
            let names = deployments::list_names(client::new(Some(USER_AGENT)).await?, &namespace).await?;
            println!("{}", k8s_openapi::serde_json::to_string(&names)?);
        }
        Command::Logs {
            namespace,
            name,
            tail,
        } => {
            let client = client::new(Some(USER_AGENT)).await?;
            let logs = deployments::tail_logs(client, &ResourceRef::new(namespace, name), tail).await?;
            print!("{logs}");
        }
    }

    Ok(())
}

async fn watch(args: WatchArgs) -> Result<()> {
    let config = args.config()?;
    let client = client::new(Some(USER_AGENT)).await?;
    let store: Arc<dyn ResourceStore> = Arc::new(KubeStore::new(
        client,
        args.namespace.clone(),
        config.resync_period,
    ));

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!("Error waiting for shutdown signal: {}", e);
        }
        info!("Shutdown signal received");
        signal_token.cancel();
    });

    let hub = Arc::new(Hub::new(&config));
    let subscription = hub.subscribe().await?;
    let controller = WatchController::new(hub, &config).spawn(store, shutdown.clone());

    info!(
        namespace = args.namespace.as_deref().unwrap_or("<all>"),
        "Streaming deployment changes"
    );
    let reason = forward_json_lines(subscription, tokio::io::stdout()).await?;
    info!(?reason, "Stdout subscriber closed");

    shutdown.cancel();
    controller.await?;
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
