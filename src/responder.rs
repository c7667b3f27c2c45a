use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, trace};

use crate::address_pool::{AddressPool, ServiceFlags};
use crate::dns::{
    DNSPacket, ParseError,
    common::{fqdn, is_subdomain, lowercase_labels, names_equal, parse_name},
    edns::EdnsOpt,
    enums::{DNSResourceType, ResponseCode},
    rdata::{RData, Soa},
    resource::DNSResource,
};
use crate::dnssec::{DnsSecError, SigningContext};

/// Standard query; every other opcode is dropped
const OPCODE_QUERY: u8 = 0;

/// Why a datagram got no reply
#[derive(Debug, Error)]
pub enum Rejection {
    #[error("malformed message: {0}")]
    Malformed(#[from] ParseError),
    #[error("message is a response, not a query")]
    NotAQuery,
    #[error("unsupported opcode {0}")]
    UnsupportedOpcode(u8),
    #[error("expected exactly one question, got {0}")]
    QuestionCount(usize),
    #[error("{0} is outside the served zone")]
    OutOfZone(String),
    #[error("invalid service flags label {0:?}")]
    BadServiceFlags(String),
    #[error("unsupported query type {0}")]
    UnsupportedType(DNSResourceType),
    #[error("failed to pack response: {0}")]
    Pack(ParseError),
}

impl Rejection {
    /// Rejections caused by garbage on the wire rather than a well-formed
    /// query we chose not to answer
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Rejection::Malformed(_) | Rejection::NotAQuery | Rejection::QuestionCount(_)
        )
    }
}

/// Fixed zone administration values for the SOA record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoaParameters {
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
    /// Responsible mailbox; `hostmaster.<zone>` when unset
    pub mbox: Option<Vec<String>>,
}

impl Default for SoaParameters {
    fn default() -> Self {
        Self {
            serial: 1,
            refresh: 604800,
            retry: 86400,
            expire: 2592000,
            minimum: 604800,
            mbox: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResponderSettings {
    pub nameserver: Vec<String>,
    pub address_ttl: u32,
    pub ns_ttl: u32,
    pub soa: SoaParameters,
}

impl ResponderSettings {
    pub fn new(nameserver: Vec<String>) -> Self {
        Self {
            nameserver: lowercase_labels(&nameserver),
            address_ttl: 30,
            ns_ttl: 86400,
            soa: SoaParameters::default(),
        }
    }
}

/// Builds signed answers for queries against the seeder zone.
///
/// Holds only read-only state, so one instance serves every datagram task.
pub struct Responder {
    ctx: Arc<SigningContext>,
    pool: Arc<dyn AddressPool>,
    settings: ResponderSettings,
}

impl Responder {
    pub fn new(ctx: Arc<SigningContext>, pool: Arc<dyn AddressPool>, settings: ResponderSettings) -> Self {
        Self { ctx, pool, settings }
    }

    pub fn context(&self) -> &SigningContext {
        &self.ctx
    }

    /// Decode one datagram and produce the bytes to send back
    pub fn respond(&self, datagram: &[u8], src: SocketAddr) -> Result<Vec<u8>, Rejection> {
        let query = DNSPacket::parse(datagram)?;
        if query.header.qr {
            return Err(Rejection::NotAQuery);
        }
        if query.header.opcode != OPCODE_QUERY {
            return Err(Rejection::UnsupportedOpcode(query.header.opcode));
        }
        let [question] = query.questions.as_slice() else {
            return Err(Rejection::QuestionCount(query.questions.len()));
        };

        let qname = lowercase_labels(&question.labels);
        let zone = self.ctx.zone();
        if !is_subdomain(&qname, zone) {
            return Err(Rejection::OutOfZone(fqdn(&question.labels)));
        }
        let services = service_selector(&qname, zone)?;

        debug!(
            "{}: query {} for {} (services {})",
            src,
            question.qtype,
            fqdn(&qname),
            services
        );

        let mut response = DNSPacket {
            header: query.header.clone(),
            questions: query.questions.clone(),
            edns: query.edns.as_ref().map(|opt| {
                let mut edns = EdnsOpt::default();
                edns.set_do_flag(opt.do_flag());
                edns
            }),
            ..Default::default()
        };
        response.header.qr = true;
        response.header.aa = true;
        response.header.tc = false;
        response.header.ra = false;
        response.header.z = 0;
        response.header.rcode = ResponseCode::NoError.to_u8();

        match question.qtype {
            qtype @ (DNSResourceType::A | DNSResourceType::AAAA) => {
                let records = self.address_records(&qname, qtype, services);
                self.push_signed(&mut response.answers, records);
                self.push_signed(&mut response.authorities, vec![self.zone_ns_record()]);
            }
            DNSResourceType::NS => {
                let ns = DNSResource::new(
                    qname.clone(),
                    self.settings.ns_ttl,
                    RData::NS(self.settings.nameserver.clone()),
                );
                self.push_signed(&mut response.answers, vec![ns]);
            }
            // Below the apex the SOA goes in the authority section as a NODATA reply
            DNSResourceType::SOA if names_equal(&qname, zone) => {
                self.push_signed(&mut response.answers, vec![self.soa_record()]);
            }
            DNSResourceType::SOA => {
                self.push_signed(&mut response.authorities, vec![self.soa_record()]);
            }
            DNSResourceType::DNSKEY => match self.ctx.signed_key_set() {
                Ok((keys, rrsig)) => {
                    response.answers.extend(keys);
                    response.answers.push(rrsig);
                }
                Err(e) => {
                    error!("{}: failed to sign DNSKEY set: {}", src, e);
                    response.answers.extend(self.ctx.published_key_set());
                }
            },
            // The DS RRset lives in the parent zone; answer NODATA
            DNSResourceType::DS => {}
            other => return Err(Rejection::UnsupportedType(other)),
        }

        let packed = response.serialize().map_err(Rejection::Pack)?;
        let limit = usize::from(query.max_udp_payload_size());
        if packed.len() > limit {
            debug!(
                "{}: response of {} bytes exceeds {} byte limit, sending TC",
                src,
                packed.len(),
                limit
            );
            return response.truncated().serialize().map_err(Rejection::Pack);
        }

        trace!(
            "{}: answering with {} answers, {} authority records, {} bytes",
            src,
            response.answers.len(),
            response.authorities.len(),
            packed.len()
        );
        Ok(packed)
    }

    fn address_records(
        &self,
        qname: &[String],
        qtype: DNSResourceType,
        services: ServiceFlags,
    ) -> Vec<DNSResource> {
        self.pool
            .good_addresses(qtype, services)
            .into_iter()
            .filter_map(|ip| match (qtype, ip) {
                (DNSResourceType::A, IpAddr::V4(v4)) => Some(RData::A(v4)),
                (DNSResourceType::AAAA, IpAddr::V6(v6)) => Some(RData::AAAA(v6)),
                _ => None,
            })
            .map(|rdata| DNSResource::new(qname.to_vec(), self.settings.address_ttl, rdata))
            .collect()
    }

    fn zone_ns_record(&self) -> DNSResource {
        DNSResource::new(
            self.ctx.zone().to_vec(),
            self.settings.ns_ttl,
            RData::NS(self.settings.nameserver.clone()),
        )
    }

    fn soa_record(&self) -> DNSResource {
        let zone = self.ctx.zone();
        let soa = &self.settings.soa;
        let rname = soa.mbox.clone().unwrap_or_else(|| {
            let mut name = parse_name("hostmaster");
            name.extend_from_slice(zone);
            name
        });

        DNSResource::new(
            zone.to_vec(),
            self.settings.ns_ttl,
            RData::SOA(Soa {
                mname: self.settings.nameserver.clone(),
                rname,
                serial: soa.serial,
                refresh: soa.refresh,
                retry: soa.retry,
                expire: soa.expire,
                minimum: soa.minimum,
            }),
        )
    }

    /// Append `rrset` and, when it can be signed, its ZSK signature
    fn push_signed(&self, section: &mut Vec<DNSResource>, rrset: Vec<DNSResource>) {
        match self.ctx.sign_with_zsk(&rrset) {
            Ok(rrsig) => {
                section.extend(rrset);
                section.push(rrsig);
            }
            Err(DnsSecError::EmptyRRSet) => {
                trace!("Nothing to sign, leaving section empty");
            }
            Err(e) => {
                error!("Failed to sign RRset, sending it unsigned: {}", e);
                section.extend(rrset);
            }
        }
    }
}

/// Service flags requested by the first label, as in `x5.seed.example.org`.
///
/// Only names strictly below the zone carry a selector; anything else asks
/// for `NODE_NETWORK`.
pub fn service_selector(qname: &[String], zone: &[String]) -> Result<ServiceFlags, Rejection> {
    if qname.len() <= zone.len() {
        return Ok(ServiceFlags::NODE_NETWORK);
    }
    match qname[0].strip_prefix('x') {
        Some(digits) if !digits.is_empty() => {
            let bad = || Rejection::BadServiceFlags(qname[0].clone());
            if !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(bad());
            }
            digits.parse::<u64>().map(ServiceFlags).map_err(|_| bad())
        }
        _ => Ok(ServiceFlags::NODE_NETWORK),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_pool::{PeerAddress, StaticAddressPool};
    use crate::dnssec::{SignatureValidity, SigningKey};

    fn responder(peers: Vec<PeerAddress>) -> Responder {
        let zsk = SigningKey::from_bind(
            include_str!("../tests/fixtures/Kseed.example.org.+010+44213.key"),
            include_str!("../tests/fixtures/Kseed.example.org.+010+44213.private"),
        )
        .unwrap();
        let ksk = SigningKey::from_bind(
            include_str!("../tests/fixtures/Kseed.example.org.+010+06481.key"),
            include_str!("../tests/fixtures/Kseed.example.org.+010+06481.private"),
        )
        .unwrap();
        let ctx = SigningContext::new(
            &parse_name("seed.example.org."),
            zsk,
            ksk,
            SignatureValidity::fixed(1_700_000_000, 1_800_000_000).unwrap(),
        )
        .unwrap();
        Responder::new(
            Arc::new(ctx),
            Arc::new(StaticAddressPool::new(peers, 16)),
            ResponderSettings::new(parse_name("ns1.example.org.")),
        )
    }

    fn query(name: &str, qtype: DNSResourceType, edns: bool) -> Vec<u8> {
        let mut packet = DNSPacket::query(42, parse_name(name), qtype);
        if edns {
            packet.add_edns(4096, true);
        }
        packet.serialize().unwrap()
    }

    fn src() -> SocketAddr {
        "127.0.0.1:5353".parse().unwrap()
    }

    fn peer(address: &str) -> PeerAddress {
        PeerAddress {
            address: address.parse().unwrap(),
            services: ServiceFlags::NODE_NETWORK,
        }
    }

    #[test]
    fn test_service_selector() {
        let zone = parse_name("seed.example.org.");
        assert_eq!(
            service_selector(&parse_name("x9.seed.example.org."), &zone).unwrap(),
            ServiceFlags(9)
        );
        assert_eq!(
            service_selector(&parse_name("seed.example.org."), &zone).unwrap(),
            ServiceFlags::NODE_NETWORK
        );
        assert_eq!(
            service_selector(&parse_name("x.seed.example.org."), &zone).unwrap(),
            ServiceFlags::NODE_NETWORK
        );
        assert_eq!(
            service_selector(&parse_name("foo.seed.example.org."), &zone).unwrap(),
            ServiceFlags::NODE_NETWORK
        );
        assert!(matches!(
            service_selector(&parse_name("xyz.seed.example.org."), &zone),
            Err(Rejection::BadServiceFlags(_))
        ));
        assert!(matches!(
            service_selector(&parse_name("x+5.seed.example.org."), &zone),
            Err(Rejection::BadServiceFlags(_))
        ));
        assert!(matches!(
            service_selector(&parse_name("x-1.seed.example.org."), &zone),
            Err(Rejection::BadServiceFlags(_))
        ));
    }

    #[test]
    fn test_non_query_opcode_dropped() {
        let responder = responder(vec![peer("10.0.0.1")]);
        let mut update = DNSPacket::query(3, parse_name("seed.example.org."), DNSResourceType::A);
        update.header.opcode = 5;
        update.add_edns(4096, true);
        assert!(matches!(
            responder.respond(&update.serialize().unwrap(), src()),
            Err(Rejection::UnsupportedOpcode(5))
        ));
    }

    #[test]
    fn test_soa_below_apex_is_nodata() {
        let responder = responder(Vec::new());
        let bytes = responder
            .respond(&query("x5.seed.example.org.", DNSResourceType::SOA, true), src())
            .unwrap();
        let response = DNSPacket::parse(&bytes).unwrap();
        assert!(response.answers.is_empty());
        assert_eq!(response.header.rcode, 0);
        assert_eq!(response.authorities.len(), 2);
        assert_eq!(response.authorities[0].rtype, DNSResourceType::SOA);
        assert_eq!(response.authorities[0].name(), "seed.example.org.");
    }

    #[test]
    fn test_address_answer_is_signed() {
        let responder = responder(vec![peer("10.0.0.1"), peer("2001:db8::1")]);
        let bytes = responder
            .respond(&query("Seed.Example.org.", DNSResourceType::A, true), src())
            .unwrap();
        let response = DNSPacket::parse(&bytes).unwrap();

        assert!(response.header.qr);
        assert!(response.header.aa);
        assert_eq!(response.header.id, 42);
        assert_eq!(response.answers.len(), 2);
        assert_eq!(response.answers[0].rdata, RData::A("10.0.0.1".parse().unwrap()));
        assert_eq!(response.answers[0].ttl, 30);
        assert_eq!(response.answers[1].rtype, DNSResourceType::RRSIG);
        assert_eq!(response.authorities.len(), 2);
        assert_eq!(response.authorities[0].rtype, DNSResourceType::NS);
        assert!(response.dnssec_requested());
    }

    #[test]
    fn test_empty_pool_gives_empty_answer() {
        let responder = responder(Vec::new());
        let bytes = responder
            .respond(&query("seed.example.org.", DNSResourceType::AAAA, true), src())
            .unwrap();
        let response = DNSPacket::parse(&bytes).unwrap();
        assert!(response.answers.is_empty());
        assert_eq!(response.authorities.len(), 2);
        assert_eq!(response.header.rcode, 0);
    }

    #[test]
    fn test_soa_ns_and_ds() {
        let responder = responder(Vec::new());

        let soa = DNSPacket::parse(
            &responder
                .respond(&query("seed.example.org.", DNSResourceType::SOA, true), src())
                .unwrap(),
        )
        .unwrap();
        let RData::SOA(data) = &soa.answers[0].rdata else {
            panic!("expected SOA data");
        };
        assert_eq!(fqdn(&data.mname), "ns1.example.org.");
        assert_eq!(fqdn(&data.rname), "hostmaster.seed.example.org.");
        assert_eq!(soa.answers[1].rtype, DNSResourceType::RRSIG);

        let ns = DNSPacket::parse(
            &responder
                .respond(&query("x5.seed.example.org.", DNSResourceType::NS, true), src())
                .unwrap(),
        )
        .unwrap();
        assert_eq!(ns.answers[0].name(), "x5.seed.example.org.");
        assert_eq!(ns.answers.len(), 2);

        let ds = DNSPacket::parse(
            &responder
                .respond(&query("seed.example.org.", DNSResourceType::DS, true), src())
                .unwrap(),
        )
        .unwrap();
        assert!(ds.answers.is_empty());
        assert!(ds.authorities.is_empty());
    }

    #[test]
    fn test_rejections() {
        let responder = responder(Vec::new());
        assert!(matches!(
            responder.respond(&query("seed.example.net.", DNSResourceType::A, true), src()),
            Err(Rejection::OutOfZone(_))
        ));
        assert!(matches!(
            responder.respond(&query("seed.example.org.", DNSResourceType::MX, true), src()),
            Err(Rejection::UnsupportedType(DNSResourceType::MX))
        ));
        assert!(matches!(
            responder.respond(&[0x00, 0x01, 0x02], src()),
            Err(Rejection::Malformed(_))
        ));

        let mut reply = DNSPacket::query(1, parse_name("seed.example.org."), DNSResourceType::A);
        reply.header.qr = true;
        assert!(matches!(
            responder.respond(&reply.serialize().unwrap(), src()),
            Err(Rejection::NotAQuery)
        ));
    }

    #[test]
    fn test_oversized_response_truncated_without_edns() {
        let responder = responder(vec![peer("10.0.0.1")]);
        let bytes = responder
            .respond(&query("seed.example.org.", DNSResourceType::A, false), src())
            .unwrap();
        assert!(bytes.len() <= 512);
        let response = DNSPacket::parse(&bytes).unwrap();
        assert!(response.header.tc);
        assert!(response.answers.is_empty());
        assert_eq!(response.questions.len(), 1);
    }
}
