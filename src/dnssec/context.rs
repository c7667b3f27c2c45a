use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

use super::{
    DigestType, DnsSecError,
    digest::compute_ds,
    errors::Result,
    keys::{KeyRole, SigningKey},
};
use crate::dns::{
    common::{fqdn, lowercase_labels, names_equal},
    rdata::Ds,
};

/// Inception and expiration stamped into every RRSIG, in epoch seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureValidity {
    pub inception: u32,
    pub expiration: u32,
}

impl SignatureValidity {
    pub fn fixed(inception: u32, expiration: u32) -> Result<Self> {
        if expiration <= inception {
            return Err(DnsSecError::KeyRejected(format!(
                "signature expiration {expiration} is not after inception {inception}"
            )));
        }
        Ok(Self {
            inception,
            expiration,
        })
    }

    /// Window resolved once from the current time: starts `backdate` seconds
    /// ago and lasts `lifetime` seconds from now.
    pub fn starting_now(lifetime: u32, backdate: u32) -> Result<Self> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();
        Self::fixed(now.saturating_sub(backdate), now.saturating_add(lifetime))
    }
}

/// Key material and signing policy for one zone, shared read-only by the responder
#[derive(Debug)]
pub struct SigningContext {
    zone: Vec<String>,
    zsk: SigningKey,
    ksk: SigningKey,
    validity: SignatureValidity,
}

impl SigningContext {
    pub fn new(
        zone: &[String],
        zsk: SigningKey,
        ksk: SigningKey,
        validity: SignatureValidity,
    ) -> Result<Self> {
        for (key, role) in [(&zsk, KeyRole::Zsk), (&ksk, KeyRole::Ksk)] {
            if key.role() != role {
                return Err(DnsSecError::KeyRejected(format!(
                    "expected a {role}, got a {} (tag {})",
                    key.role(),
                    key.key_tag()
                )));
            }
            if !names_equal(key.owner(), zone) {
                return Err(DnsSecError::KeyRejected(format!(
                    "{role} is owned by {}, not {}",
                    fqdn(key.owner()),
                    fqdn(zone)
                )));
            }
        }

        Ok(Self {
            zone: lowercase_labels(zone),
            zsk,
            ksk,
            validity,
        })
    }

    /// Load both keys from BIND key files in `key_dir`
    pub fn load(
        zone: &[String],
        key_dir: &Path,
        zsk_name: &str,
        ksk_name: &str,
        validity: SignatureValidity,
    ) -> Result<Self> {
        let zsk = SigningKey::load(key_dir, zsk_name)?;
        let ksk = SigningKey::load(key_dir, ksk_name)?;
        let ctx = Self::new(zone, zsk, ksk, validity)?;
        info!(
            "Signing {} with ZSK {} and KSK {}",
            fqdn(&ctx.zone),
            ctx.zsk.key_tag(),
            ctx.ksk.key_tag()
        );
        Ok(ctx)
    }

    pub fn zone(&self) -> &[String] {
        &self.zone
    }

    pub fn zsk(&self) -> &SigningKey {
        &self.zsk
    }

    pub fn ksk(&self) -> &SigningKey {
        &self.ksk
    }

    pub fn validity(&self) -> SignatureValidity {
        self.validity
    }

    /// DS record to publish at the parent for the KSK
    pub fn ds_record(&self, digest_type: DigestType) -> Ds {
        compute_ds(&self.zone, self.ksk.dnskey(), digest_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::common::parse_name;

    fn keys() -> (SigningKey, SigningKey) {
        let zsk = SigningKey::from_bind(
            include_str!("../../tests/fixtures/Kseed.example.org.+010+44213.key"),
            include_str!("../../tests/fixtures/Kseed.example.org.+010+44213.private"),
        )
        .unwrap();
        let ksk = SigningKey::from_bind(
            include_str!("../../tests/fixtures/Kseed.example.org.+010+06481.key"),
            include_str!("../../tests/fixtures/Kseed.example.org.+010+06481.private"),
        )
        .unwrap();
        (zsk, ksk)
    }

    #[test]
    fn test_roles_must_not_be_swapped() {
        let (zsk, ksk) = keys();
        let validity = SignatureValidity::fixed(1, 2).unwrap();
        let result = SigningContext::new(&parse_name("seed.example.org."), ksk, zsk, validity);
        assert!(matches!(result, Err(DnsSecError::KeyRejected(_))));
    }

    #[test]
    fn test_keys_must_belong_to_zone() {
        let (zsk, ksk) = keys();
        let validity = SignatureValidity::fixed(1, 2).unwrap();
        let result = SigningContext::new(&parse_name("other.example.org."), zsk, ksk, validity);
        assert!(matches!(result, Err(DnsSecError::KeyRejected(_))));
    }

    #[test]
    fn test_zone_case_is_normalized() {
        let (zsk, ksk) = keys();
        let validity = SignatureValidity::fixed(1, 2).unwrap();
        let ctx = SigningContext::new(&parse_name("Seed.Example.ORG."), zsk, ksk, validity).unwrap();
        assert_eq!(fqdn(ctx.zone()), "seed.example.org.");
        assert_eq!(ctx.ds_record(DigestType::Sha256).key_tag, 6481);
    }

    #[test]
    fn test_validity_window() {
        assert!(SignatureValidity::fixed(10, 10).is_err());
        let window = SignatureValidity::starting_now(86400, 3600).unwrap();
        assert_eq!(window.expiration - window.inception, 86400 + 3600);
    }
}
