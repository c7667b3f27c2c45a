//! Shared fixtures for the seeder integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use seeder::{
    address_pool::{PeerAddress, ServiceFlags, StaticAddressPool},
    dns::{
        DNSPacket,
        common::{name_to_wire, names_equal, parse_name},
        enums::DNSResourceType,
    },
    dnssec::{SignatureValidity, SigningContext},
    graceful_shutdown::GracefulShutdown,
    responder::{Responder, ResponderSettings},
    server::run_udp_server,
};
use tokio::net::UdpSocket;
use tokio::sync::Semaphore;

pub const ZONE: &str = "seed.example.org.";
pub const NAMESERVER: &str = "ns1.example.org.";
pub const ZSK_NAME: &str = "Kseed.example.org.+010+44213";
pub const KSK_NAME: &str = "Kseed.example.org.+010+06481";
pub const ZSK_TAG: u16 = 44213;
pub const KSK_TAG: u16 = 6481;

pub fn fixture_dir() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures"))
}

pub fn signing_context() -> SigningContext {
    let validity = SignatureValidity::fixed(1_700_000_000, 1_900_000_000).unwrap();
    SigningContext::load(&parse_name(ZONE), fixture_dir(), ZSK_NAME, KSK_NAME, validity).unwrap()
}

pub fn peer(address: &str, services: u64) -> PeerAddress {
    PeerAddress {
        address: address.parse().unwrap(),
        services: ServiceFlags(services),
    }
}

pub fn responder(peers: Vec<PeerAddress>) -> Responder {
    Responder::new(
        Arc::new(signing_context()),
        Arc::new(StaticAddressPool::new(peers, 16)),
        ResponderSettings::new(parse_name(NAMESERVER)),
    )
}

/// A DNSSEC-OK query with a 4096 byte EDNS buffer
pub fn dnssec_query(id: u16, name: &str, qtype: DNSResourceType) -> DNSPacket {
    let mut packet = DNSPacket::query(id, parse_name(name), qtype);
    packet.add_edns(4096, true);
    packet
}

pub fn src() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

/// Responder bound to an ephemeral loopback port
pub struct RunningServer {
    pub addr: SocketAddr,
    shutdown: GracefulShutdown,
}

impl RunningServer {
    pub async fn start(responder: Responder) -> Self {
        Self::start_with_permits(responder, 8).await
    }

    /// Start with `permits` queries allowed in flight at once
    pub async fn start_with_permits(responder: Responder, permits: usize) -> Self {
        let sock = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let addr = sock.local_addr().unwrap();

        let mut shutdown = GracefulShutdown::new(Duration::from_secs(1));
        let rx = shutdown.subscribe();
        let handle = tokio::spawn(async move {
            run_udp_server(sock, Arc::new(responder), Arc::new(Semaphore::new(permits)), rx)
                .await
                .unwrap();
        });
        shutdown.register("udp", handle);

        Self { addr, shutdown }
    }

    pub async fn stop(self) {
        self.shutdown.shutdown().await;
    }
}

/// Send raw bytes and wait briefly for a reply
pub async fn exchange(server: SocketAddr, request: &[u8], wait: Duration) -> Option<Vec<u8>> {
    let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sock.send_to(request, server).await.unwrap();
    let mut buf = vec![0_u8; 4096];
    match tokio::time::timeout(wait, sock.recv_from(&mut buf)).await {
        Ok(Ok((len, _))) => Some(buf[..len].to_vec()),
        _ => None,
    }
}

/// Rewrite a reply so every owner equal to the question name is a
/// pointer back to the question (offset 12)
pub fn compress_owners(reply: &[u8]) -> Vec<u8> {
    let packet = DNSPacket::parse(reply).unwrap();
    let qname = &packet.questions[0].labels;
    let question_end = 12 + name_to_wire(qname, false).len() + 4;
    let mut out = reply[..question_end].to_vec();

    for record in packet
        .answers
        .iter()
        .chain(&packet.authorities)
        .chain(&packet.resources)
    {
        let single = DNSPacket {
            answers: vec![record.clone()],
            ..Default::default()
        };
        let wire = single.serialize().unwrap();
        let body = &wire[12..];
        if names_equal(&record.labels, qname) {
            let owner_len = name_to_wire(&record.labels, false).len();
            out.extend_from_slice(&[0xc0, 0x0c]);
            out.extend_from_slice(&body[owner_len..]);
        } else {
            out.extend_from_slice(body);
        }
    }

    if packet.edns.is_some() {
        let opt_only = DNSPacket {
            edns: packet.edns.clone(),
            ..Default::default()
        };
        out.extend_from_slice(&opt_only.serialize().unwrap()[12..]);
    }
    out
}
