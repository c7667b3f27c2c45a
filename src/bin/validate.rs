//! Checks a seeder zone's DNSSEC chain of trust through the local resolver.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use seeder::dns::common::{fqdn, parse_name};
use seeder::validator::{self, DnsClient, ResolverConfig, resolv};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "seeder-validate")]
#[command(version)]
#[command(about = "Validate the DNSSEC chain of trust of a seeder zone", long_about = None)]
struct Args {
    /// Zone whose DS, DNSKEY and SOA sets are checked
    #[arg(long)]
    zone: String,

    /// Host whose A/AAAA answers are checked; defaults to the zone
    #[arg(long)]
    host: Option<String>,

    /// resolv.conf listing the nameservers to ask
    #[arg(long, default_value = resolv::DEFAULT_RESOLV_CONF)]
    resolv_conf: PathBuf,

    /// Port the nameservers listen on
    #[arg(long, default_value_t = resolv::DEFAULT_DNS_PORT)]
    port: u16,

    /// Per-query timeout
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .init();

    let resolver = match ResolverConfig::load(&args.resolv_conf, args.port) {
        Ok(resolver) => resolver,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let client = DnsClient::new(
        resolver.socket_addrs(),
        Duration::from_secs(args.timeout_secs),
    );

    let zone = parse_name(&args.zone.to_ascii_lowercase());
    let host = args
        .host
        .as_deref()
        .map(|host| parse_name(&host.to_ascii_lowercase()))
        .unwrap_or_else(|| zone.clone());

    match validator::validate(&client, &zone, &host).await {
        Ok(chain) => {
            info!(
                "{} A, {} AAAA, {} DNSKEY, {} DS records checked",
                chain.a.len(),
                chain.aaaa.len(),
                chain.dnskey.len(),
                chain.ds.len()
            );
            println!("{}: chain of trust OK", fqdn(&zone));
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}: {}", fqdn(&zone), e);
            ExitCode::FAILURE
        }
    }
}
