use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ring::rand::SystemRandom;
use ring::signature::RsaKeyPair;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::{BigUint, RsaPrivateKey};
use tracing::debug;

use super::{DnsSecAlgorithm, DnsSecError, errors::Result};
use crate::dns::{
    common::{fqdn, lowercase_labels, parse_name},
    rdata::{Dnskey, RData},
    resource::DNSResource,
};

/// TTL of published DNSKEY records
pub const DNSKEY_TTL: u32 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    /// Signs every RRset except DNSKEY (flags 256)
    Zsk,
    /// Signs the DNSKEY RRset, digest published as DS (flags 257)
    Ksk,
}

impl KeyRole {
    pub fn flags(self) -> u16 {
        match self {
            KeyRole::Zsk => Dnskey::ZONE_KEY_FLAG,
            KeyRole::Ksk => Dnskey::ZONE_KEY_FLAG | Dnskey::SEP_FLAG,
        }
    }

    pub fn from_flags(flags: u16) -> Option<Self> {
        match flags {
            256 => Some(KeyRole::Zsk),
            257 => Some(KeyRole::Ksk),
            _ => None,
        }
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRole::Zsk => write!(f, "ZSK"),
            KeyRole::Ksk => write!(f, "KSK"),
        }
    }
}

/// An RSA key pair for one DNSSEC role, loaded from BIND key files.
pub struct SigningKey {
    role: KeyRole,
    owner: Vec<String>,
    dnskey: Dnskey,
    algorithm: DnsSecAlgorithm,
    key_pair: RsaKeyPair,
    rng: SystemRandom,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("role", &self.role)
            .field("owner", &fqdn(&self.owner))
            .field("algorithm", &self.algorithm)
            .field("key_tag", &self.key_tag())
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Read `<base>.key` and `<base>.private` from `dir`
    pub fn load(dir: &Path, base: &str) -> Result<Self> {
        let read = |ext: &str| {
            let path = dir.join(format!("{base}.{ext}"));
            std::fs::read_to_string(&path).map_err(|source| DnsSecError::Io {
                path: path.display().to_string(),
                source,
            })
        };
        let key = Self::from_bind(&read("key")?, &read("private")?)?;
        debug!(
            "Loaded {} {} for {} (tag {})",
            key.role,
            key.algorithm,
            fqdn(&key.owner),
            key.key_tag()
        );
        Ok(key)
    }

    /// Build a key from the text of a BIND `.key` file and its `.private` companion
    pub fn from_bind(public_text: &str, private_text: &str) -> Result<Self> {
        let (owner, dnskey) = parse_public_key(public_text)?;

        let role = KeyRole::from_flags(dnskey.flags).ok_or_else(|| {
            DnsSecError::InvalidKeyFile(format!("DNSKEY flags {} are neither ZSK nor KSK", dnskey.flags))
        })?;
        if dnskey.protocol != Dnskey::PROTOCOL {
            return Err(DnsSecError::InvalidKeyFile(format!(
                "DNSKEY protocol {} is not 3",
                dnskey.protocol
            )));
        }
        let algorithm = DnsSecAlgorithm::from_u8(dnskey.algorithm)
            .filter(|alg| alg.can_sign())
            .ok_or(DnsSecError::UnsupportedAlgorithm(dnskey.algorithm))?;

        let private = PrivateKeyFields::parse(private_text)?;
        if private.algorithm != dnskey.algorithm {
            return Err(DnsSecError::InvalidKeyFile(format!(
                "private key algorithm {} does not match DNSKEY algorithm {}",
                private.algorithm, dnskey.algorithm
            )));
        }

        let (exponent, modulus) = rsa_public_key_parts(&dnskey.public_key)?;
        if strip_zeros(modulus) != strip_zeros(&private.modulus)
            || strip_zeros(exponent) != strip_zeros(&private.public_exponent)
        {
            return Err(DnsSecError::KeyRejected(
                "private key does not belong to the DNSKEY".to_string(),
            ));
        }

        let key_pair = RsaKeyPair::from_der(&private.to_pkcs1_der()?)
            .map_err(|e| DnsSecError::KeyRejected(e.to_string()))?;

        Ok(Self {
            role,
            owner: lowercase_labels(&owner),
            dnskey,
            algorithm,
            key_pair,
            rng: SystemRandom::new(),
        })
    }

    pub fn role(&self) -> KeyRole {
        self.role
    }

    pub fn owner(&self) -> &[String] {
        &self.owner
    }

    pub fn dnskey(&self) -> &Dnskey {
        &self.dnskey
    }

    pub fn algorithm(&self) -> DnsSecAlgorithm {
        self.algorithm
    }

    pub fn key_tag(&self) -> u16 {
        self.dnskey.key_tag()
    }

    /// The DNSKEY record as published in the zone
    pub fn dnskey_record(&self) -> DNSResource {
        DNSResource::new(self.owner.clone(), DNSKEY_TTL, RData::DNSKEY(self.dnskey.clone()))
    }

    /// PKCS#1 v1.5 signature over `message` with the key's hash
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let encoding = self
            .algorithm
            .signing_encoding()
            .ok_or(DnsSecError::UnsupportedAlgorithm(self.algorithm.to_u8()))?;
        let mut signature = vec![0; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(encoding, &self.rng, message, &mut signature)
            .map_err(|_| DnsSecError::SigningFailed)?;
        Ok(signature)
    }
}

/// Split an RSA DNSKEY public key (RFC 3110) into exponent and modulus
pub fn rsa_public_key_parts(public_key: &[u8]) -> Result<(&[u8], &[u8])> {
    let (exp_len, rest) = match public_key {
        [0, hi, lo, rest @ ..] => (usize::from(u16::from_be_bytes([*hi, *lo])), rest),
        [len, rest @ ..] => (usize::from(*len), rest),
        [] => return Err(DnsSecError::InvalidPublicKey),
    };
    if exp_len == 0 || rest.len() <= exp_len {
        return Err(DnsSecError::InvalidPublicKey);
    }
    Ok(rest.split_at(exp_len))
}

/// Owner name and DNSKEY RDATA from the first record line of a `.key` file
fn parse_public_key(text: &str) -> Result<(Vec<String>, Dnskey)> {
    let line = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with(';'))
        .ok_or_else(|| DnsSecError::InvalidKeyFile("no DNSKEY record found".to_string()))?;

    let tokens: Vec<&str> = line.split_whitespace().collect();
    let at = tokens
        .iter()
        .position(|token| token.eq_ignore_ascii_case("DNSKEY"))
        .filter(|&at| at > 0)
        .ok_or_else(|| DnsSecError::InvalidKeyFile(format!("not a DNSKEY record: {line}")))?;

    let field = |i: usize, name: &str| {
        tokens
            .get(at + i)
            .ok_or_else(|| DnsSecError::InvalidKeyFile(format!("DNSKEY record missing {name}")))
    };
    let bad = |name: &str| DnsSecError::InvalidKeyFile(format!("invalid DNSKEY {name}"));

    let flags = field(1, "flags")?.parse().map_err(|_| bad("flags"))?;
    let protocol = field(2, "protocol")?.parse().map_err(|_| bad("protocol"))?;
    let algorithm = field(3, "algorithm")?.parse().map_err(|_| bad("algorithm"))?;
    let encoded: String = tokens.get(at + 4..).unwrap_or_default().concat();
    let public_key = STANDARD.decode(encoded).map_err(|_| bad("public key"))?;
    if public_key.is_empty() {
        return Err(bad("public key"));
    }

    Ok((
        parse_name(tokens[0]),
        Dnskey {
            flags,
            protocol,
            algorithm,
            public_key,
        },
    ))
}

/// Fields of a `Private-key-format: v1.x` RSA key file
struct PrivateKeyFields {
    algorithm: u8,
    modulus: Vec<u8>,
    public_exponent: Vec<u8>,
    private_exponent: Vec<u8>,
    prime1: Vec<u8>,
    prime2: Vec<u8>,
    exponent1: Vec<u8>,
    exponent2: Vec<u8>,
    coefficient: Vec<u8>,
}

impl PrivateKeyFields {
    fn parse(text: &str) -> Result<Self> {
        let fields: HashMap<&str, &str> = text
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim(), value.trim()))
            .collect();

        let format = fields
            .get("Private-key-format")
            .ok_or_else(|| DnsSecError::InvalidKeyFile("missing Private-key-format".to_string()))?;
        if !format.starts_with("v1.") {
            return Err(DnsSecError::InvalidKeyFile(format!(
                "unsupported private key format {format}"
            )));
        }

        let algorithm = fields
            .get("Algorithm")
            .and_then(|value| value.split_whitespace().next())
            .and_then(|number| number.parse().ok())
            .ok_or_else(|| DnsSecError::InvalidKeyFile("missing or invalid Algorithm".to_string()))?;

        let decode = |name: &str| -> Result<Vec<u8>> {
            let value = fields
                .get(name)
                .ok_or_else(|| DnsSecError::InvalidKeyFile(format!("missing {name}")))?;
            STANDARD
                .decode(value)
                .map_err(|_| DnsSecError::InvalidKeyFile(format!("invalid base64 in {name}")))
        };

        Ok(Self {
            algorithm,
            modulus: decode("Modulus")?,
            public_exponent: decode("PublicExponent")?,
            private_exponent: decode("PrivateExponent")?,
            prime1: decode("Prime1")?,
            prime2: decode("Prime2")?,
            exponent1: decode("Exponent1")?,
            exponent2: decode("Exponent2")?,
            coefficient: decode("Coefficient")?,
        })
    }

    /// DER `RSAPrivateKey` (RFC 8017 A.1.2), the form `RsaKeyPair::from_der` accepts.
    ///
    /// The CRT values are derived from the primes and must agree with the
    /// ones stored in the file.
    fn to_pkcs1_der(&self) -> Result<Vec<u8>> {
        let uint = |bytes: &[u8]| BigUint::from_bytes_be(bytes);

        let key = RsaPrivateKey::from_components(
            uint(&self.modulus),
            uint(&self.public_exponent),
            uint(&self.private_exponent),
            vec![uint(&self.prime1), uint(&self.prime2)],
        )
        .map_err(|e| DnsSecError::KeyRejected(e.to_string()))?;
        let der = key.to_pkcs1_der().map_err(|e| DnsSecError::KeyRejected(e.to_string()))?;

        let encoded = rsa::pkcs1::RsaPrivateKey::try_from(der.as_bytes())
            .map_err(|e| DnsSecError::KeyRejected(e.to_string()))?;
        for (name, stored, derived) in [
            ("Exponent1", &self.exponent1, encoded.exponent1),
            ("Exponent2", &self.exponent2, encoded.exponent2),
            ("Coefficient", &self.coefficient, encoded.coefficient),
        ] {
            if strip_zeros(stored) != derived.as_bytes() {
                return Err(DnsSecError::KeyRejected(format!(
                    "{name} does not match the primes"
                )));
            }
        }

        Ok(der.as_bytes().to_vec())
    }
}

fn strip_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZSK_KEY: &str = include_str!("../../tests/fixtures/Kseed.example.org.+010+44213.key");
    const ZSK_PRIVATE: &str =
        include_str!("../../tests/fixtures/Kseed.example.org.+010+44213.private");
    const KSK_KEY: &str = include_str!("../../tests/fixtures/Kseed.example.org.+010+06481.key");
    const KSK_PRIVATE: &str =
        include_str!("../../tests/fixtures/Kseed.example.org.+010+06481.private");

    #[test]
    fn test_load_zsk_and_ksk() {
        let zsk = SigningKey::from_bind(ZSK_KEY, ZSK_PRIVATE).unwrap();
        assert_eq!(zsk.role(), KeyRole::Zsk);
        assert_eq!(zsk.key_tag(), 44213);
        assert_eq!(zsk.dnskey().flags, 256);
        assert_eq!(fqdn(zsk.owner()), "seed.example.org.");

        let ksk = SigningKey::from_bind(KSK_KEY, KSK_PRIVATE).unwrap();
        assert_eq!(ksk.role(), KeyRole::Ksk);
        assert_eq!(ksk.key_tag(), 6481);
        assert!(ksk.dnskey().is_secure_entry_point());
    }

    #[test]
    fn test_signature_length_matches_modulus() {
        let zsk = SigningKey::from_bind(ZSK_KEY, ZSK_PRIVATE).unwrap();
        let signature = zsk.sign(b"seed").unwrap();
        assert_eq!(signature.len(), 256);
    }

    #[test]
    fn test_mismatched_private_key_rejected() {
        let result = SigningKey::from_bind(ZSK_KEY, KSK_PRIVATE);
        assert!(matches!(result, Err(DnsSecError::KeyRejected(_))));
    }

    #[test]
    fn test_comment_lines_skipped() {
        let text = format!("; This is a zone-signing key, keyid 44213\n;\n{ZSK_KEY}");
        let zsk = SigningKey::from_bind(&text, ZSK_PRIVATE).unwrap();
        assert_eq!(zsk.key_tag(), 44213);
    }

    #[test]
    fn test_bad_flags_rejected() {
        let text = ZSK_KEY.replace("DNSKEY\t256", "DNSKEY\t384");
        assert!(matches!(
            SigningKey::from_bind(&text, ZSK_PRIVATE),
            Err(DnsSecError::InvalidKeyFile(_))
        ));
    }

    #[test]
    fn test_missing_private_field() {
        let private: String = ZSK_PRIVATE
            .lines()
            .filter(|line| !line.starts_with("Coefficient"))
            .map(|line| format!("{line}\n"))
            .collect();
        match SigningKey::from_bind(ZSK_KEY, &private) {
            Err(DnsSecError::InvalidKeyFile(msg)) => assert!(msg.contains("Coefficient")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_rsa_public_key_parts() {
        let key = [1, 3, 0xAB, 0xCD];
        let (e, n) = rsa_public_key_parts(&key).unwrap();
        assert_eq!(e, &[3]);
        assert_eq!(n, &[0xAB, 0xCD]);

        let long = [0, 0, 1, 3, 0xAB];
        let (e, n) = rsa_public_key_parts(&long).unwrap();
        assert_eq!(e, &[3]);
        assert_eq!(n, &[0xAB]);

        assert!(rsa_public_key_parts(&[4, 1, 0]).is_err());
    }

    #[test]
    fn test_crt_values_must_match_primes() {
        let exponent2 = ZSK_PRIVATE
            .lines()
            .find_map(|line| line.strip_prefix("Exponent2:"))
            .unwrap()
            .trim();
        let private: String = ZSK_PRIVATE
            .lines()
            .map(|line| {
                if line.starts_with("Exponent1:") {
                    format!("Exponent1: {exponent2}\n")
                } else {
                    format!("{line}\n")
                }
            })
            .collect();
        match SigningKey::from_bind(ZSK_KEY, &private) {
            Err(DnsSecError::KeyRejected(msg)) => assert!(msg.contains("Exponent1")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
