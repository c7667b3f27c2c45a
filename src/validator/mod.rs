//! Chain-of-trust checker for a seeder zone.
//!
//! Queries the zone's SOA, DS and DNSKEY sets plus the host's addresses
//! through an ordinary resolver, then verifies the signatures and the
//! DS digest with the same DNSSEC primitives the responder signs with.

pub mod chain;
pub mod client;
pub mod resolv;

use std::net::SocketAddr;

use thiserror::Error;
use tracing::{debug, info};

use crate::dns::{
    ParseError,
    common::fqdn,
    enums::{DNSResourceType, ResponseCode},
};
use crate::dnssec::DnsSecError;

pub use chain::{ChainOfTrust, Record, ValidationKeys};
pub use client::{DEFAULT_QUERY_TIMEOUT, DnsClient};
pub use resolv::ResolverConfig;

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No reply from {0} before the timeout")]
    Timeout(SocketAddr),
    #[error("No name server to answer the question")]
    NoNameserverAnswered,
    #[error("Name does not exist: {0}")]
    NameError(String),
    #[error("Malformed DNS message: {0}")]
    Dns(#[from] ParseError),
    #[error("Validation failed: {0}")]
    Verification(#[from] DnsSecError),
    #[error("Resolver configuration: {0}")]
    ResolverConfig(String),
}

/// Fetch everything the chain needs and verify it.
///
/// Any NXDOMAIN aborts the walk; a NOERROR reply with no answers simply
/// leaves that set empty.
pub async fn validate(
    client: &DnsClient,
    zone: &[String],
    host: &[String],
) -> Result<ChainOfTrust, ValidatorError> {
    let mut chain = ChainOfTrust::new(zone.to_vec());

    let queries: [(&[String], DNSResourceType); 5] = [
        (zone, DNSResourceType::SOA),
        (zone, DNSResourceType::DS),
        (zone, DNSResourceType::DNSKEY),
        (host, DNSResourceType::A),
        (host, DNSResourceType::AAAA),
    ];

    for (name, qtype) in queries {
        let response = client.query(name, qtype).await?;
        if response.header.rcode == ResponseCode::NameError.to_u8() {
            return Err(ValidatorError::NameError(format!("{} {}", fqdn(name), qtype)));
        }
        info!(
            "{} {}: {} answer records",
            fqdn(name),
            qtype,
            response.answers.len()
        );
        for record in &response.answers {
            debug!("  {} {} {}", record.name(), record.rtype, record.rdata.summary());
        }
        chain.absorb(response.answers);
    }

    chain.verify()?;
    info!("Chain of trust for {} is valid", fqdn(zone));
    Ok(chain)
}
