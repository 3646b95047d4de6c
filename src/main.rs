use anyhow::Context;
use clap::Parser;
use kafka_producer_proxy::{Config, Gateway};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "kafka-producer-proxy")]
#[command(about = "HTTP to Kafka publishing gateway", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let loaded = Config::from_file(&args.config);
    let debug = loaded.as_ref().map(|cfg| cfg.debug).unwrap_or(false);

    init_logging(args.json_logs, args.verbose || debug);

    info!("Starting kafka-producer-proxy");
    info!("Loading configuration from {:?}", args.config);

    let config = match loaded {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e).context("loading configuration");
        }
    };

    config.validate().context("validating configuration")?;

    info!(
        server_port = %config.server.port,
        enable_tls = config.server.enable_tls,
        enable_api_auth = config.server.enable_api_auth,
        kafka_clusters = ?config.kafka.clusters,
        kafka_cert_auth = config.kafka.use_cert_auth,
        kafka_health_topic = ?config.kafka.health_topic,
        rebuild_on_reload = config.kafka.rebuild_on_reload,
        secrets_path = %config.secrets.path.display(),
        "Configuration summary"
    );

    Gateway::new(config)
        .run()
        .await
        .context("running gateway")
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("kafka_producer_proxy=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("kafka_producer_proxy=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
