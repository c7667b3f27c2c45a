use std::net::{Ipv4Addr, Ipv6Addr};

use super::{
    ParseError,
    common::{fqdn, name_to_wire, read_name_at},
    enums::DNSResourceType,
};
use crate::dnssec::calculate_key_tag;

/// Record data, decoded once into a closed set of shapes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    NS(Vec<String>),
    CNAME(Vec<String>),
    SOA(Soa),
    DS(Ds),
    DNSKEY(Dnskey),
    RRSIG(Rrsig),
    Unknown(Vec<u8>),
}

impl Default for RData {
    fn default() -> Self {
        RData::Unknown(Vec::new())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Soa {
    pub mname: Vec<String>,
    pub rname: Vec<String>,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ds {
    pub key_tag: u16,
    pub algorithm: u8,
    pub digest_type: u8,
    pub digest: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dnskey {
    pub flags: u16,
    pub protocol: u8,
    pub algorithm: u8,
    pub public_key: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rrsig {
    pub type_covered: DNSResourceType,
    pub algorithm: u8,
    pub labels: u8,
    pub original_ttl: u32,
    pub expiration: u32,
    pub inception: u32,
    pub key_tag: u16,
    pub signer_name: Vec<String>,
    pub signature: Vec<u8>,
}

impl Dnskey {
    pub const ZONE_KEY_FLAG: u16 = 0x0100;
    pub const SEP_FLAG: u16 = 0x0001;
    pub const PROTOCOL: u8 = 3;

    pub fn key_tag(&self) -> u16 {
        calculate_key_tag(self.flags, self.protocol, self.algorithm, &self.public_key)
    }

    pub fn is_zone_key(&self) -> bool {
        self.flags & Self::ZONE_KEY_FLAG != 0
    }

    pub fn is_secure_entry_point(&self) -> bool {
        self.flags & Self::SEP_FLAG != 0
    }
}

impl Rrsig {
    /// RRSIG RDATA with the signature field left out, as covered by the signature itself
    pub fn header_to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(18 + 64);
        out.extend_from_slice(&u16::from(self.type_covered).to_be_bytes());
        out.push(self.algorithm);
        out.push(self.labels);
        out.extend_from_slice(&self.original_ttl.to_be_bytes());
        out.extend_from_slice(&self.expiration.to_be_bytes());
        out.extend_from_slice(&self.inception.to_be_bytes());
        out.extend_from_slice(&self.key_tag.to_be_bytes());
        out.extend_from_slice(&name_to_wire(&self.signer_name, true));
        out
    }
}

impl RData {
    pub fn rtype(&self) -> Option<DNSResourceType> {
        match self {
            RData::A(_) => Some(DNSResourceType::A),
            RData::AAAA(_) => Some(DNSResourceType::AAAA),
            RData::NS(_) => Some(DNSResourceType::NS),
            RData::CNAME(_) => Some(DNSResourceType::CNAME),
            RData::SOA(_) => Some(DNSResourceType::SOA),
            RData::DS(_) => Some(DNSResourceType::DS),
            RData::DNSKEY(_) => Some(DNSResourceType::DNSKEY),
            RData::RRSIG(_) => Some(DNSResourceType::RRSIG),
            RData::Unknown(_) => None,
        }
    }

    /// Decode `len` bytes of RDATA at `offset`. Names may point anywhere
    /// earlier in `packet`.
    pub fn parse(
        rtype: DNSResourceType,
        packet: &[u8],
        offset: usize,
        len: usize,
    ) -> Result<Self, ParseError> {
        let data = packet
            .get(offset..offset + len)
            .ok_or(ParseError::Truncated)?;
        let invalid = || ParseError::InvalidRData(rtype);

        let rdata = match rtype {
            DNSResourceType::A => {
                let octets: [u8; 4] = data.try_into().map_err(|_| invalid())?;
                RData::A(Ipv4Addr::from(octets))
            }
            DNSResourceType::AAAA => {
                let octets: [u8; 16] = data.try_into().map_err(|_| invalid())?;
                RData::AAAA(Ipv6Addr::from(octets))
            }
            DNSResourceType::NS | DNSResourceType::CNAME => {
                let (name, used) = read_name_at(packet, offset)?;
                if used != len {
                    return Err(invalid());
                }
                if rtype == DNSResourceType::NS {
                    RData::NS(name)
                } else {
                    RData::CNAME(name)
                }
            }
            DNSResourceType::SOA => {
                let (mname, used_m) = read_name_at(packet, offset)?;
                let (rname, used_r) = read_name_at(packet, offset + used_m)?;
                let fixed = data.get(used_m + used_r..).ok_or_else(invalid)?;
                if fixed.len() != 20 {
                    return Err(invalid());
                }
                RData::SOA(Soa {
                    mname,
                    rname,
                    serial: be_u32(fixed, 0),
                    refresh: be_u32(fixed, 4),
                    retry: be_u32(fixed, 8),
                    expire: be_u32(fixed, 12),
                    minimum: be_u32(fixed, 16),
                })
            }
            DNSResourceType::DS => {
                if data.len() < 4 {
                    return Err(invalid());
                }
                RData::DS(Ds {
                    key_tag: be_u16(data, 0),
                    algorithm: data[2],
                    digest_type: data[3],
                    digest: data[4..].to_vec(),
                })
            }
            DNSResourceType::DNSKEY => {
                if data.len() < 4 {
                    return Err(invalid());
                }
                RData::DNSKEY(Dnskey {
                    flags: be_u16(data, 0),
                    protocol: data[2],
                    algorithm: data[3],
                    public_key: data[4..].to_vec(),
                })
            }
            DNSResourceType::RRSIG => {
                if data.len() < 19 {
                    return Err(invalid());
                }
                let (signer_name, used) = read_name_at(packet, offset + 18)?;
                let signature = data.get(18 + used..).ok_or_else(invalid)?.to_vec();
                RData::RRSIG(Rrsig {
                    type_covered: be_u16(data, 0).into(),
                    algorithm: data[2],
                    labels: data[3],
                    original_ttl: be_u32(data, 4),
                    expiration: be_u32(data, 8),
                    inception: be_u32(data, 12),
                    key_tag: be_u16(data, 16),
                    signer_name,
                    signature,
                })
            }
            _ => RData::Unknown(data.to_vec()),
        };

        Ok(rdata)
    }

    /// Uncompressed wire form. With `canonical` set, embedded names are
    /// lower-cased as RFC 4034 section 6.2 requires.
    pub fn to_wire(&self, canonical: bool) -> Vec<u8> {
        match self {
            RData::A(addr) => addr.octets().to_vec(),
            RData::AAAA(addr) => addr.octets().to_vec(),
            RData::NS(name) | RData::CNAME(name) => name_to_wire(name, canonical),
            RData::SOA(soa) => {
                let mut out = name_to_wire(&soa.mname, canonical);
                out.extend_from_slice(&name_to_wire(&soa.rname, canonical));
                for value in [soa.serial, soa.refresh, soa.retry, soa.expire, soa.minimum] {
                    out.extend_from_slice(&value.to_be_bytes());
                }
                out
            }
            RData::DS(ds) => {
                let mut out = Vec::with_capacity(4 + ds.digest.len());
                out.extend_from_slice(&ds.key_tag.to_be_bytes());
                out.push(ds.algorithm);
                out.push(ds.digest_type);
                out.extend_from_slice(&ds.digest);
                out
            }
            RData::DNSKEY(key) => {
                let mut out = Vec::with_capacity(4 + key.public_key.len());
                out.extend_from_slice(&key.flags.to_be_bytes());
                out.push(key.protocol);
                out.push(key.algorithm);
                out.extend_from_slice(&key.public_key);
                out
            }
            RData::RRSIG(sig) => {
                let mut out = sig.header_to_wire();
                if !canonical {
                    // header_to_wire always lower-cases; restore the original spelling
                    out.truncate(18);
                    out.extend_from_slice(&name_to_wire(&sig.signer_name, false));
                }
                out.extend_from_slice(&sig.signature);
                out
            }
            RData::Unknown(bytes) => bytes.clone(),
        }
    }

    /// Short presentation form for logs
    pub fn summary(&self) -> String {
        match self {
            RData::A(addr) => addr.to_string(),
            RData::AAAA(addr) => addr.to_string(),
            RData::NS(name) | RData::CNAME(name) => fqdn(name),
            RData::SOA(soa) => format!("{} {} {}", fqdn(&soa.mname), fqdn(&soa.rname), soa.serial),
            RData::DS(ds) => format!(
                "{} {} {} {}",
                ds.key_tag,
                ds.algorithm,
                ds.digest_type,
                hex::encode_upper(&ds.digest)
            ),
            RData::DNSKEY(key) => format!("{} {} {} tag={}", key.flags, key.protocol, key.algorithm, key.key_tag()),
            RData::RRSIG(sig) => format!(
                "{} {} tag={} signer={}",
                sig.type_covered,
                sig.algorithm,
                sig.key_tag,
                fqdn(&sig.signer_name)
            ),
            RData::Unknown(bytes) => format!("\\# {}", bytes.len()),
        }
    }
}

fn be_u16(data: &[u8], pos: usize) -> u16 {
    u16::from_be_bytes([data[pos], data[pos + 1]])
}

fn be_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}
