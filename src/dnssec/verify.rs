use ring::signature::{RsaPublicKeyComponents, UnparsedPublicKey};
use tracing::debug;

use super::{
    DnsSecAlgorithm, DnsSecError, canonical::signed_data, errors::Result,
    keys::rsa_public_key_parts,
};
use crate::dns::{
    common::{fqdn, names_equal},
    enums::DNSResourceType,
    rdata::{Dnskey, Rrsig},
    resource::DNSResource,
};

/// Verify `rrsig` over `rrset` with `dnskey`, owned by `key_owner`.
///
/// The RRSIG must name the key (tag, algorithm, signer) and cover the
/// RRset's type before the signature itself is checked. Validity times are
/// not compared against the clock.
pub fn verify_rrsig(
    rrsig: &Rrsig,
    dnskey: &Dnskey,
    key_owner: &[String],
    rrset: &[DNSResource],
) -> Result<()> {
    let first = rrset.first().ok_or(DnsSecError::EmptyRRSet)?;
    let covered = first.rtype;

    if rrsig.type_covered != covered {
        return Err(DnsSecError::KeyMismatch(format!(
            "RRSIG covers {}, RRset is {}",
            rrsig.type_covered, covered
        )));
    }
    if rrsig.key_tag != dnskey.key_tag() {
        return Err(DnsSecError::KeyMismatch(format!(
            "RRSIG key tag {} does not match DNSKEY {}",
            rrsig.key_tag,
            dnskey.key_tag()
        )));
    }
    if rrsig.algorithm != dnskey.algorithm {
        return Err(DnsSecError::KeyMismatch(format!(
            "RRSIG algorithm {} does not match DNSKEY algorithm {}",
            rrsig.algorithm, dnskey.algorithm
        )));
    }
    if !names_equal(&rrsig.signer_name, key_owner) {
        return Err(DnsSecError::KeyMismatch(format!(
            "signer {} is not the key owner {}",
            fqdn(&rrsig.signer_name),
            fqdn(key_owner)
        )));
    }
    if dnskey.protocol != Dnskey::PROTOCOL || !dnskey.is_zone_key() {
        return Err(DnsSecError::KeyMismatch("DNSKEY is not a zone key".to_string()));
    }

    let algorithm = DnsSecAlgorithm::from_u8(rrsig.algorithm)
        .filter(DnsSecAlgorithm::is_supported)
        .ok_or(DnsSecError::UnsupportedAlgorithm(rrsig.algorithm))?;

    let data = signed_data(rrsig, rrset)?;
    verify_signature(algorithm, &dnskey.public_key, &data, &rrsig.signature, covered)?;

    debug!(
        "Verified RRSIG over {} {} with key {}",
        fqdn(&first.labels),
        covered,
        rrsig.key_tag
    );
    Ok(())
}

fn verify_signature(
    algorithm: DnsSecAlgorithm,
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
    covered: DNSResourceType,
) -> Result<()> {
    let failed = |_: ring::error::Unspecified| DnsSecError::SignatureVerificationFailed(covered);

    if let Some(params) = algorithm.rsa_parameters() {
        let (e, n) = rsa_public_key_parts(public_key)?;
        return RsaPublicKeyComponents { n, e }
            .verify(params, message, signature)
            .map_err(failed);
    }

    let verification = algorithm
        .verification_algorithm()
        .ok_or(DnsSecError::UnsupportedAlgorithm(algorithm.to_u8()))?;
    match algorithm {
        // DNSKEY carries the bare point, ring expects the uncompressed SEC1 form
        DnsSecAlgorithm::EcdsaP256Sha256 | DnsSecAlgorithm::EcdsaP384Sha384 => {
            let mut point = Vec::with_capacity(public_key.len() + 1);
            point.push(0x04);
            point.extend_from_slice(public_key);
            UnparsedPublicKey::new(verification, point)
                .verify(message, signature)
                .map_err(failed)
        }
        _ => UnparsedPublicKey::new(verification, public_key)
            .verify(message, signature)
            .map_err(failed),
    }
}
