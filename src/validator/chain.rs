use tracing::{debug, info};

use crate::dns::{
    common::fqdn,
    enums::DNSResourceType,
    rdata::{Dnskey, Ds, RData, Rrsig},
    resource::DNSResource,
};
use crate::dnssec::{DigestType, DnsSecError, KeyRole, check_ds, verify_rrsig};

/// One answer record, sorted by what the chain needs it for
#[derive(Debug, Clone)]
pub enum Record {
    Soa(DNSResource),
    Ds(Ds),
    Dnskey(DNSResource),
    A(DNSResource),
    Aaaa(DNSResource),
    Rrsig(Rrsig),
    Other(DNSResourceType),
}

impl From<DNSResource> for Record {
    fn from(record: DNSResource) -> Self {
        match (record.rtype, &record.rdata) {
            (DNSResourceType::SOA, RData::SOA(_)) => Record::Soa(record),
            (DNSResourceType::DS, RData::DS(ds)) => Record::Ds(ds.clone()),
            (DNSResourceType::DNSKEY, RData::DNSKEY(_)) => Record::Dnskey(record),
            (DNSResourceType::A, RData::A(_)) => Record::A(record),
            (DNSResourceType::AAAA, RData::AAAA(_)) => Record::Aaaa(record),
            (DNSResourceType::RRSIG, RData::RRSIG(sig)) => Record::Rrsig(sig.clone()),
            (rtype, _) => Record::Other(rtype),
        }
    }
}

/// ZSK and KSK picked out of the zone's DNSKEY answer by flags
#[derive(Debug, Clone, Default)]
pub struct ValidationKeys {
    pub zsk: Option<Dnskey>,
    pub ksk: Option<Dnskey>,
}

impl ValidationKeys {
    /// The first key seen with each flag value is kept
    fn offer(&mut self, key: &Dnskey) {
        let slot = match KeyRole::from_flags(key.flags) {
            Some(KeyRole::Zsk) => &mut self.zsk,
            Some(KeyRole::Ksk) => &mut self.ksk,
            None => return,
        };
        if slot.is_none() {
            *slot = Some(key.clone());
        }
    }
}

/// Everything collected while walking a zone, and the checks over it
#[derive(Debug, Clone, Default)]
pub struct ChainOfTrust {
    zone: Vec<String>,
    pub soa: Vec<DNSResource>,
    pub ds: Vec<Ds>,
    pub dnskey: Vec<DNSResource>,
    pub a: Vec<DNSResource>,
    pub aaaa: Vec<DNSResource>,
    soa_rrsig: Option<Rrsig>,
    ds_rrsig: Option<Rrsig>,
    dnskey_rrsig: Option<Rrsig>,
    a_rrsig: Option<Rrsig>,
    aaaa_rrsig: Option<Rrsig>,
    pub keys: ValidationKeys,
}

impl ChainOfTrust {
    pub fn new(zone: Vec<String>) -> Self {
        Self {
            zone,
            ..Default::default()
        }
    }

    pub fn zone(&self) -> &[String] {
        &self.zone
    }

    /// File the answer section of one response
    pub fn absorb(&mut self, answers: Vec<DNSResource>) {
        for record in answers {
            match Record::from(record) {
                Record::Soa(rr) => self.soa.push(rr),
                Record::Ds(ds) => self.ds.push(ds),
                Record::Dnskey(rr) => {
                    if let RData::DNSKEY(key) = &rr.rdata {
                        self.keys.offer(key);
                    }
                    self.dnskey.push(rr);
                }
                Record::A(rr) => self.a.push(rr),
                Record::Aaaa(rr) => self.aaaa.push(rr),
                Record::Rrsig(sig) => self.store_rrsig(sig),
                Record::Other(rtype) => debug!("Ignoring {} record in answer", rtype),
            }
        }
    }

    fn store_rrsig(&mut self, sig: Rrsig) {
        let slot = match sig.type_covered {
            DNSResourceType::SOA => &mut self.soa_rrsig,
            DNSResourceType::DS => &mut self.ds_rrsig,
            DNSResourceType::DNSKEY => &mut self.dnskey_rrsig,
            DNSResourceType::A => &mut self.a_rrsig,
            DNSResourceType::AAAA => &mut self.aaaa_rrsig,
            other => {
                debug!("Ignoring RRSIG over {}", other);
                return;
            }
        };
        if slot.is_none() {
            *slot = Some(sig);
        }
    }

    /// First RRSIG seen over `rtype`
    pub fn signature(&self, rtype: DNSResourceType) -> Option<&Rrsig> {
        match rtype {
            DNSResourceType::SOA => self.soa_rrsig.as_ref(),
            DNSResourceType::DS => self.ds_rrsig.as_ref(),
            DNSResourceType::DNSKEY => self.dnskey_rrsig.as_ref(),
            DNSResourceType::A => self.a_rrsig.as_ref(),
            DNSResourceType::AAAA => self.aaaa_rrsig.as_ref(),
            _ => None,
        }
    }

    /// Walk the chain from the host's addresses up to the parent's DS.
    ///
    /// Address RRsets verify under the ZSK, the DNSKEY RRset under the
    /// KSK, and the KSK digest must equal the published DS.
    pub fn verify(&self) -> Result<(), DnsSecError> {
        self.verify_addresses(&self.a, DNSResourceType::A)?;
        self.verify_addresses(&self.aaaa, DNSResourceType::AAAA)?;

        if self.dnskey.is_empty() {
            return Err(DnsSecError::MissingValidationKey("DNSKEY"));
        }
        let ksk = self
            .keys
            .ksk
            .as_ref()
            .ok_or(DnsSecError::MissingValidationKey("KSK"))?;
        let sig = self
            .signature(DNSResourceType::DNSKEY)
            .ok_or(DnsSecError::MissingSignature(DNSResourceType::DNSKEY))?;
        verify_rrsig(sig, ksk, &self.zone, &self.dnskey)?;
        info!("DNSKEY RRset of {} verified with KSK {}", fqdn(&self.zone), ksk.key_tag());

        let published = self.published_ds(ksk).ok_or(DnsSecError::MissingDs)?;
        check_ds(&self.zone, ksk, published)?;
        info!("KSK {} matches the published DS", ksk.key_tag());

        Ok(())
    }

    fn verify_addresses(
        &self,
        rrset: &[DNSResource],
        rtype: DNSResourceType,
    ) -> Result<(), DnsSecError> {
        if rrset.is_empty() {
            return Ok(());
        }
        let zsk = self
            .keys
            .zsk
            .as_ref()
            .ok_or(DnsSecError::MissingValidationKey("ZSK"))?;
        let sig = self
            .signature(rtype)
            .ok_or(DnsSecError::MissingSignature(rtype))?;
        verify_rrsig(sig, zsk, &self.zone, rrset)?;
        info!("{} RRset verified with ZSK {}", rtype, zsk.key_tag());
        Ok(())
    }

    /// SHA-256 DS for the KSK if one is published, otherwise the first DS
    fn published_ds(&self, ksk: &Dnskey) -> Option<&Ds> {
        let tag = ksk.key_tag();
        self.ds
            .iter()
            .find(|ds| ds.key_tag == tag && ds.digest_type == DigestType::Sha256.to_u8())
            .or_else(|| self.ds.first())
    }
}
