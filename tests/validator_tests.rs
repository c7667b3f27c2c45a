mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use seeder::dns::{
    DNSPacket,
    common::parse_name,
    enums::{DNSResourceType, ResponseCode},
    rdata::RData,
    resource::DNSResource,
};
use seeder::dnssec::{DigestType, DnsSecError};
use seeder::responder::Responder;
use seeder::validator::{DnsClient, ValidatorError, validate};
use tokio::net::UdpSocket;

#[derive(Clone, Copy, PartialEq)]
enum Behaviour {
    Honest,
    TamperedDs,
    NoDnskey,
    CompressedOwners,
    Rcode(ResponseCode),
}

/// Resolver stand-in: delegates to the responder and serves the zone's DS
async fn spawn_resolver(responder: Arc<Responder>, behaviour: Behaviour) -> SocketAddr {
    let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = sock.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0_u8; 4096];
        loop {
            let Ok((len, src)) = sock.recv_from(&mut buf).await else {
                return;
            };
            let query = DNSPacket::parse(&buf[..len]).unwrap();
            let qtype = query.questions[0].qtype;

            let reply = match behaviour {
                Behaviour::Rcode(rcode) => {
                    let mut reply = query.clone();
                    reply.header.qr = true;
                    reply.header.rcode = rcode.to_u8();
                    reply.serialize().unwrap()
                }
                _ if qtype == DNSResourceType::DS => {
                    let ctx = responder.context();
                    let mut ds = ctx.ds_record(DigestType::Sha256);
                    if behaviour == Behaviour::TamperedDs {
                        ds.digest[0] ^= 0x01;
                    }
                    let mut reply = query.clone();
                    reply.header.qr = true;
                    reply
                        .answers
                        .push(DNSResource::new(ctx.zone().to_vec(), 86400, RData::DS(ds)));
                    reply.serialize().unwrap()
                }
                _ => {
                    let bytes = responder.respond(&buf[..len], src).unwrap();
                    if behaviour == Behaviour::NoDnskey && qtype == DNSResourceType::DNSKEY {
                        let mut reply = DNSPacket::parse(&bytes).unwrap();
                        reply.answers.clear();
                        reply.serialize().unwrap()
                    } else {
                        bytes
                    }
                }
            };
            let reply = if behaviour == Behaviour::CompressedOwners {
                let compressed = compress_owners(&reply);
                assert!(compressed.len() < reply.len());
                compressed
            } else {
                reply
            };
            let _ = sock.send_to(&reply, src).await;
        }
    });

    addr
}

fn seeder() -> Arc<Responder> {
    Arc::new(responder(vec![
        peer("10.0.0.1", 1),
        peer("10.0.0.2", 1),
        peer("2001:db8::1", 1),
    ]))
}

fn client(servers: Vec<SocketAddr>) -> DnsClient {
    DnsClient::new(servers, Duration::from_secs(2))
}

#[tokio::test]
async fn test_valid_chain() {
    let resolver = spawn_resolver(seeder(), Behaviour::Honest).await;
    let zone = parse_name(ZONE);

    let chain = validate(&client(vec![resolver]), &zone, &zone)
        .await
        .unwrap();
    assert_eq!(chain.a.len(), 2);
    assert_eq!(chain.aaaa.len(), 1);
    assert_eq!(chain.dnskey.len(), 2);
    assert_eq!(chain.ds.len(), 1);
    assert_eq!(chain.soa.len(), 1);
    assert!(chain.signature(DNSResourceType::SOA).is_some());
}

#[tokio::test]
async fn test_valid_chain_with_compressed_owners() {
    let resolver = spawn_resolver(seeder(), Behaviour::CompressedOwners).await;
    let zone = parse_name(ZONE);

    let chain = validate(&client(vec![resolver]), &zone, &zone)
        .await
        .unwrap();
    assert_eq!(chain.a.len(), 2);
    assert_eq!(chain.aaaa.len(), 1);
    assert_eq!(chain.dnskey.len(), 2);
    assert!(chain.signature(DNSResourceType::DNSKEY).is_some());
}

#[tokio::test]
async fn test_tampered_ds_is_rejected() {
    let resolver = spawn_resolver(seeder(), Behaviour::TamperedDs).await;
    let zone = parse_name(ZONE);

    let err = validate(&client(vec![resolver]), &zone, &zone)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ValidatorError::Verification(DnsSecError::InvalidDs { .. })
    ));
}

#[tokio::test]
async fn test_missing_dnskey_is_rejected() {
    let resolver = spawn_resolver(seeder(), Behaviour::NoDnskey).await;
    let zone = parse_name(ZONE);

    let err = validate(&client(vec![resolver]), &zone, &zone)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ValidatorError::Verification(DnsSecError::MissingValidationKey(_))
    ));
}

#[tokio::test]
async fn test_servfail_moves_to_next_server() {
    let failing = spawn_resolver(seeder(), Behaviour::Rcode(ResponseCode::ServerFailure)).await;
    let honest = spawn_resolver(seeder(), Behaviour::Honest).await;
    let zone = parse_name(ZONE);

    validate(&client(vec![failing, honest]), &zone, &zone)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_nxdomain_aborts() {
    let nx = spawn_resolver(seeder(), Behaviour::Rcode(ResponseCode::NameError)).await;
    let honest = spawn_resolver(seeder(), Behaviour::Honest).await;
    let zone = parse_name(ZONE);

    let err = validate(&client(vec![nx, honest]), &zone, &zone)
        .await
        .unwrap_err();
    assert!(matches!(err, ValidatorError::NameError(_)));
}

#[tokio::test]
async fn test_every_server_failing() {
    let refused = spawn_resolver(seeder(), Behaviour::Rcode(ResponseCode::Refused)).await;
    let zone = parse_name(ZONE);

    let err = validate(&client(vec![refused]), &zone, &zone)
        .await
        .unwrap_err();
    assert!(matches!(err, ValidatorError::NoNameserverAnswered));
}
