use std::fmt;
use std::net::IpAddr;

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dns::enums::DNSResourceType;

/// Peer service capability bitmask advertised by network nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceFlags(pub u64);

impl ServiceFlags {
    /// Full node serving the network
    pub const NODE_NETWORK: ServiceFlags = ServiceFlags(1);

    pub fn bits(self) -> u64 {
        self.0
    }

    /// True when every bit of `required` is set in `self`
    pub fn contains(self, required: ServiceFlags) -> bool {
        self.0 & required.0 == required.0
    }
}

impl fmt::Display for ServiceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Source of publishable peer addresses.
///
/// Implementations do their own locking; the responder calls this from
/// many tasks at once.
pub trait AddressPool: Send + Sync {
    /// Addresses of the family matching `rtype` (A or AAAA) whose peers
    /// offer every service in `services`
    fn good_addresses(&self, rtype: DNSResourceType, services: ServiceFlags) -> Vec<IpAddr>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddress {
    pub address: IpAddr,
    #[serde(default = "default_services")]
    pub services: ServiceFlags,
}

fn default_services() -> ServiceFlags {
    ServiceFlags::NODE_NETWORK
}

/// In-memory pool seeded from configuration
pub struct StaticAddressPool {
    peers: RwLock<Vec<PeerAddress>>,
    max_addresses: usize,
}

impl StaticAddressPool {
    pub fn new(peers: Vec<PeerAddress>, max_addresses: usize) -> Self {
        Self {
            peers: RwLock::new(peers),
            max_addresses,
        }
    }

    /// Add a peer, replacing the services of an existing entry for the same address
    pub fn insert(&self, peer: PeerAddress) {
        let mut peers = self.peers.write();
        match peers.iter_mut().find(|p| p.address == peer.address) {
            Some(existing) => existing.services = peer.services,
            None => peers.push(peer),
        }
    }

    pub fn remove(&self, address: &IpAddr) -> bool {
        let mut peers = self.peers.write();
        let before = peers.len();
        peers.retain(|p| p.address != *address);
        peers.len() != before
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

impl AddressPool for StaticAddressPool {
    fn good_addresses(&self, rtype: DNSResourceType, services: ServiceFlags) -> Vec<IpAddr> {
        let want_v4 = match rtype {
            DNSResourceType::A => true,
            DNSResourceType::AAAA => false,
            _ => return Vec::new(),
        };

        let mut addresses: Vec<IpAddr> = self
            .peers
            .read()
            .iter()
            .filter(|peer| peer.address.is_ipv4() == want_v4 && peer.services.contains(services))
            .map(|peer| peer.address)
            .collect();

        addresses.shuffle(&mut rand::rng());
        addresses.truncate(self.max_addresses);
        debug!(
            "Address pool returned {} {} addresses for services {}",
            addresses.len(),
            rtype,
            services
        );
        addresses
    }
}
