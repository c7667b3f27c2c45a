use super::{context::SigningContext, errors::Result, signer::sign_rrset};
use crate::dns::resource::DNSResource;

impl SigningContext {
    /// The zone's DNSKEY RRset, ZSK first then KSK
    pub fn published_key_set(&self) -> Vec<DNSResource> {
        vec![self.zsk().dnskey_record(), self.ksk().dnskey_record()]
    }

    /// The DNSKEY RRset with its RRSIG made by the KSK
    pub fn signed_key_set(&self) -> Result<(Vec<DNSResource>, DNSResource)> {
        let keys = self.published_key_set();
        let rrsig = sign_rrset(&keys, self.ksk(), self.validity())?;
        Ok((keys, rrsig))
    }

    /// Sign an ordinary RRset with the ZSK
    pub fn sign_with_zsk(&self, rrset: &[DNSResource]) -> Result<DNSResource> {
        sign_rrset(rrset, self.zsk(), self.validity())
    }

    pub fn sign_with_ksk(&self, rrset: &[DNSResource]) -> Result<DNSResource> {
        sign_rrset(rrset, self.ksk(), self.validity())
    }
}
