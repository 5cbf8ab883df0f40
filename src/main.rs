use anyhow::{anyhow, Result};
use is_terminal::IsTerminal;
use oobcrab::notify::{message, Format, Notifier, TelegramBackend};
use oobcrab::{Config, SharedConfig, Sink};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let mut first_args = std::env::args().take(2);
    let (program_name, config_file) = (
        first_args.next().unwrap_or("oobcrab".to_string()),
        first_args.next(),
    );

    let config = config_init(&program_name, config_file)?;
    let record_store = oobcrab::record_store::open(config.record_store_path.as_deref()).await?;
    let geolocator = oobcrab::geo::from_config(&config.geolocation)?;

    let backend = TelegramBackend::new(&config.notify)?;
    let notifier = Arc::new(Notifier::new(Box::new(backend), config.notify.interval));
    notifier
        .send(
            &message::startup(env!("CARGO_PKG_VERSION"), &config),
            Format::Markdown,
        )
        .await?;
    let sink = Arc::new(Sink::new(geolocator, record_store, notifier));

    if std::io::stdout().is_terminal() {
        println!("{}", oobcrab::crab::CRAB);
    }

    tracing::info!("DNS listening on UDP {}", &config.dns_udp_bind_addr);
    let dns_server = oobcrab::dns::new(config.clone(), sink.clone()).await?;
    let dns_handle = tokio::spawn(dns_server.block_until_done());

    tracing::info!("API listening on {}", &config.api_bind_addr);
    let api_server = oobcrab::api::new(config.clone(), sink.clone())?;
    let api_handle = tokio::spawn(api_server);

    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("quitting from signal");
        },
        dns_res = dns_handle => {
            dns_res?;
            return Err(anyhow!("DNS server stopped"));
        }
        Ok(api_res) = api_handle => {
            if let Err(err) = api_res {
                return Err(err.into())
            }
        }
    }
    tracing::info!("goodbye");
    Ok(())
}

fn tracing_init() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oobcrab=info".into()),
        )
        .init();
}

fn config_init(program_name: &str, config_file: Option<String>) -> Result<SharedConfig> {
    match config_file {
        None => Err(anyhow!("usage: {program_name} /path/to/config.json")),
        Some(config_file) => {
            tracing::debug!("loaded config from {config_file}");
            let config = Config::try_from_file(&config_file)?;
            Ok(Arc::new(config))
        }
    }
}
