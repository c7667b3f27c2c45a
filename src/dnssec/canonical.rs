//! Canonical RRset form covered by an RRSIG (RFC 4034 sections 3.1.8.1 and 6)

use super::{DnsSecError, errors::Result};
use crate::dns::{
    common::{name_to_wire, names_equal},
    rdata::Rrsig,
    resource::DNSResource,
};

/// Bytes a signature over `rrset` is computed on: the RRSIG RDATA without
/// the signature, followed by each record with a lower-cased owner, the
/// original TTL and canonical RDATA, in canonical RDATA order.
pub fn signed_data(rrsig: &Rrsig, rrset: &[DNSResource]) -> Result<Vec<u8>> {
    let first = rrset.first().ok_or(DnsSecError::EmptyRRSet)?;
    if rrset.iter().any(|rr| {
        rr.rtype != first.rtype || rr.rclass != first.rclass || !names_equal(&rr.labels, &first.labels)
    }) {
        return Err(DnsSecError::MixedRRSet);
    }

    let owner = name_to_wire(&first.labels, true);
    let rtype: u16 = first.rtype.into();
    let rclass: u16 = first.rclass.into();

    let mut rdatas: Vec<Vec<u8>> = rrset.iter().map(|rr| rr.rdata.to_wire(true)).collect();
    rdatas.sort();
    rdatas.dedup();

    let mut data = rrsig.header_to_wire();
    for rdata in rdatas {
        let rdlength = u16::try_from(rdata.len()).map_err(|_| crate::dns::ParseError::RDataTooLong)?;
        data.extend_from_slice(&owner);
        data.extend_from_slice(&rtype.to_be_bytes());
        data.extend_from_slice(&rclass.to_be_bytes());
        data.extend_from_slice(&rrsig.original_ttl.to_be_bytes());
        data.extend_from_slice(&rdlength.to_be_bytes());
        data.extend_from_slice(&rdata);
    }
    Ok(data)
}
