//! DNSSEC-signing seeder nameserver
//!
//! Answers A/AAAA queries for one zone with addresses of known peers,
//! optionally filtered by a service-flags subdomain (`x<flags>.<zone>`),
//! and signs every answer with the zone's ZSK and KSK.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use seeder::address_pool::StaticAddressPool;
use seeder::config::SeederConfig;
use seeder::dnssec::{DigestType, SigningContext, ds_presentation};
use seeder::graceful_shutdown::GracefulShutdown;
use seeder::responder::Responder;
use seeder::server::run_udp_server;
use tokio::net::UdpSocket;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Authoritative, DNSSEC-signing DNS seeder
#[derive(Parser, Debug)]
#[command(name = "seeder")]
#[command(version)]
#[command(about = "Serves signed peer addresses for a seeder zone", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "seeder.toml")]
    config: PathBuf,

    /// Zone this server is authoritative for
    #[arg(long)]
    zone: Option<String>,

    /// Nameserver host name published in NS and SOA answers
    #[arg(long)]
    nameserver: Option<String>,

    /// UDP address to listen on
    #[arg(long)]
    bind_addr: Option<std::net::SocketAddr>,

    /// Directory holding the BIND key files
    #[arg(long)]
    key_dir: Option<PathBuf>,

    /// Zone signing key file base name, e.g. Kexample.org.+010+12345
    #[arg(long)]
    zsk: Option<String>,

    /// Key signing key file base name
    #[arg(long)]
    ksk: Option<String>,

    /// Queries handled concurrently before the receive loop waits
    #[arg(long)]
    max_concurrent_queries: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn apply_to(&self, mut config: SeederConfig) -> SeederConfig {
        if let Some(zone) = &self.zone {
            config.zone = zone.clone();
        }
        if let Some(nameserver) = &self.nameserver {
            config.nameserver = nameserver.clone();
        }
        if let Some(bind_addr) = self.bind_addr {
            config.bind_addr = bind_addr;
        }
        if let Some(key_dir) = &self.key_dir {
            config.key_dir = key_dir.clone();
        }
        if let Some(zsk) = &self.zsk {
            config.zsk = zsk.clone();
        }
        if let Some(ksk) = &self.ksk {
            config.ksk = ksk.clone();
        }
        if let Some(max) = self.max_concurrent_queries {
            config.max_concurrent_queries = max;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .init();

    info!("Starting seeder v{}", env!("CARGO_PKG_VERSION"));

    let config = if args.config.exists() {
        SeederConfig::load(&args.config)?
    } else {
        warn!("Config file {} not found, using defaults", args.config.display());
        SeederConfig::default()
    };
    let config = args.apply_to(config.apply_env()?).normalize();
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    let validity = config.signature_validity.resolve()?;
    let zone = config.zone_labels();
    let ctx = SigningContext::load(&zone, &config.key_dir, &config.zsk, &config.ksk, validity)?;
    info!(
        "Publish at the parent: {}",
        ds_presentation(ctx.zone(), &ctx.ds_record(DigestType::Sha256))
    );

    let pool = Arc::new(StaticAddressPool::new(
        config.peers.clone(),
        config.max_addresses,
    ));
    info!("Loaded {} peer addresses", pool.len());

    let responder = Arc::new(Responder::new(
        Arc::new(ctx),
        pool,
        config.responder_settings(),
    ));

    let sock = Arc::new(UdpSocket::bind(config.bind_addr).await?);
    let query_semaphore = Arc::new(Semaphore::new(config.max_concurrent_queries));
    info!(
        "Serving {} on {} (max {} concurrent queries)",
        config.zone, config.bind_addr, config.max_concurrent_queries
    );

    let mut shutdown = GracefulShutdown::new(DRAIN_TIMEOUT);
    let shutdown_rx = shutdown.subscribe();
    let udp_handle = tokio::spawn(async move {
        if let Err(e) = run_udp_server(sock, responder, query_semaphore, shutdown_rx).await {
            error!("UDP server error: {}", e);
        }
    });
    shutdown.register("udp", udp_handle);

    shutdown.wait_for_ctrl_c().await;
    Ok(())
}
