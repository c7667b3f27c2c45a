use tracing::trace;

use super::{DnsSecError, canonical::signed_data, context::SignatureValidity, errors::Result, keys::SigningKey};
use crate::dns::{
    common::fqdn,
    rdata::{RData, Rrsig},
    resource::DNSResource,
};

/// Owner label count for an RRSIG, not counting a leading wildcard
pub fn rrsig_label_count(labels: &[String]) -> u8 {
    let count = labels.len() - usize::from(labels.first().is_some_and(|l| l == "*"));
    count as u8
}

/// Sign `rrset` with `key`, returning the RRSIG record to place next to it.
///
/// The RRSIG is owned by the RRset's owner and carries the RRset's TTL as
/// both record TTL and original TTL. An empty set yields `EmptyRRSet`.
pub fn sign_rrset(
    rrset: &[DNSResource],
    key: &SigningKey,
    validity: SignatureValidity,
) -> Result<DNSResource> {
    let first = rrset.first().ok_or(DnsSecError::EmptyRRSet)?;

    let mut rrsig = Rrsig {
        type_covered: first.rtype,
        algorithm: key.algorithm().to_u8(),
        labels: rrsig_label_count(&first.labels),
        original_ttl: first.ttl,
        expiration: validity.expiration,
        inception: validity.inception,
        key_tag: key.key_tag(),
        signer_name: key.owner().to_vec(),
        signature: Vec::new(),
    };

    let data = signed_data(&rrsig, rrset)?;
    rrsig.signature = key.sign(&data)?;
    trace!(
        "Signed {} {} ({} records) with {} {}",
        fqdn(&first.labels),
        first.rtype,
        rrset.len(),
        key.role(),
        rrsig.key_tag
    );

    Ok(DNSResource::new(first.labels.clone(), first.ttl, RData::RRSIG(rrsig)))
}
