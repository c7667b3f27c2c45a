use std::fmt;

use ring::digest;

use super::{DnsSecError, errors::Result};
use crate::dns::{
    common::name_to_wire,
    enums::DNSResourceType,
    rdata::{Dnskey, Ds, RData},
};

/// DS digest type algorithms (RFC 4034, 4509, 6605)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DigestType {
    /// SHA-1 (RFC 3658)
    Sha1 = 1,
    /// SHA-256 (RFC 4509)
    Sha256 = 2,
    /// SHA-384 (RFC 6605)
    Sha384 = 4,
}

impl DigestType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Sha1),
            2 => Some(Self::Sha256),
            4 => Some(Self::Sha384),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        let algorithm = match self {
            Self::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
            Self::Sha256 => &digest::SHA256,
            Self::Sha384 => &digest::SHA384,
        };
        digest::digest(algorithm, data).as_ref().to_vec()
    }
}

impl fmt::Display for DigestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "SHA1"),
            Self::Sha256 => write!(f, "SHA256"),
            Self::Sha384 => write!(f, "SHA384"),
        }
    }
}

/// DS record data for `dnskey` owned by `owner` (RFC 4034 section 5.1.4):
/// digest over the canonical owner name followed by the DNSKEY RDATA.
pub fn compute_ds(owner: &[String], dnskey: &Dnskey, digest_type: DigestType) -> Ds {
    let mut data = name_to_wire(owner, true);
    data.extend_from_slice(&RData::DNSKEY(dnskey.clone()).to_wire(true));

    Ds {
        key_tag: dnskey.key_tag(),
        algorithm: dnskey.algorithm,
        digest_type: digest_type.to_u8(),
        digest: digest_type.digest(&data),
    }
}

/// Compare a published DS against the one computed from `dnskey`.
/// Digests are compared as upper-case hex.
pub fn check_ds(owner: &[String], dnskey: &Dnskey, published: &Ds) -> Result<()> {
    let digest_type = DigestType::from_u8(published.digest_type)
        .ok_or(DnsSecError::UnsupportedDigestType(published.digest_type))?;
    let computed = compute_ds(owner, dnskey, digest_type);

    let computed_hex = hex::encode_upper(&computed.digest);
    let published_hex = hex::encode_upper(&published.digest);
    if computed_hex != published_hex {
        return Err(DnsSecError::InvalidDs {
            published: published_hex,
            computed: computed_hex,
        });
    }
    Ok(())
}

/// Presentation form of a DS record, as an operator would paste it into the parent zone
pub fn ds_presentation(owner: &[String], ds: &Ds) -> String {
    format!(
        "{} IN {} {} {} {} {}",
        crate::dns::common::fqdn(owner),
        DNSResourceType::DS,
        ds.key_tag,
        ds.algorithm,
        ds.digest_type,
        hex::encode_upper(&ds.digest)
    )
}
