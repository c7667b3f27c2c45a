use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use resolv_conf::ScopedIp;

use super::ValidatorError;

pub const DEFAULT_RESOLV_CONF: &str = "/etc/resolv.conf";
pub const DEFAULT_DNS_PORT: u16 = 53;

/// Nameservers taken from a resolv.conf file, queried in listed order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub servers: Vec<IpAddr>,
    pub port: u16,
}

impl ResolverConfig {
    pub fn load(path: &Path, port: u16) -> Result<Self, ValidatorError> {
        let text = std::fs::read(path).map_err(|e| {
            ValidatorError::ResolverConfig(format!("{}: {}", path.display(), e))
        })?;
        Self::parse(&text, port)
    }

    pub fn parse(text: &[u8], port: u16) -> Result<Self, ValidatorError> {
        let config = resolv_conf::Config::parse(text)
            .map_err(|e| ValidatorError::ResolverConfig(e.to_string()))?;

        let servers: Vec<IpAddr> = config
            .nameservers
            .into_iter()
            .map(|ip| match ip {
                ScopedIp::V4(v4) => IpAddr::V4(v4),
                ScopedIp::V6(v6, _) => IpAddr::V6(v6),
            })
            .collect();

        if servers.is_empty() {
            return Err(ValidatorError::ResolverConfig(
                "no nameserver entries".to_string(),
            ));
        }

        Ok(Self { servers, port })
    }

    pub fn socket_addrs(&self) -> Vec<SocketAddr> {
        self.servers
            .iter()
            .map(|ip| SocketAddr::new(*ip, self.port))
            .collect()
    }
}
