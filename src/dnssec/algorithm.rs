use std::fmt;

use ring::signature;

/// DNSSEC algorithm numbers (RFC 4034, 5702, 6605, 8080, 8624)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DnsSecAlgorithm {
    /// RSA/MD5 (deprecated)
    RsaMd5 = 1,
    /// RSA/SHA-1 (RFC 3110)
    RsaSha1 = 5,
    /// RSASHA1-NSEC3-SHA1 (RFC 5155)
    RsaSha1Nsec3Sha1 = 7,
    /// RSA/SHA-256 (RFC 5702)
    RsaSha256 = 8,
    /// RSA/SHA-512 (RFC 5702)
    RsaSha512 = 10,
    /// ECDSA Curve P-256 with SHA-256 (RFC 6605)
    EcdsaP256Sha256 = 13,
    /// ECDSA Curve P-384 with SHA-384 (RFC 6605)
    EcdsaP384Sha384 = 14,
    /// Ed25519 (RFC 8080)
    Ed25519 = 15,
    /// Ed448 (RFC 8080)
    Ed448 = 16,
}

impl DnsSecAlgorithm {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::RsaMd5),
            5 => Some(Self::RsaSha1),
            7 => Some(Self::RsaSha1Nsec3Sha1),
            8 => Some(Self::RsaSha256),
            10 => Some(Self::RsaSha512),
            13 => Some(Self::EcdsaP256Sha256),
            14 => Some(Self::EcdsaP384Sha384),
            15 => Some(Self::Ed25519),
            16 => Some(Self::Ed448),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Algorithms this crate can verify
    pub fn is_supported(&self) -> bool {
        self.verification_algorithm().is_some()
    }

    /// Algorithms this crate can sign with
    pub fn can_sign(&self) -> bool {
        self.signing_encoding().is_some()
    }

    /// ring verification algorithm. RSA keys below 2048 bits are rejected
    /// by ring regardless of the DNSSEC algorithm.
    pub fn verification_algorithm(&self) -> Option<&'static dyn signature::VerificationAlgorithm> {
        match self {
            Self::RsaSha1 | Self::RsaSha1Nsec3Sha1 => {
                Some(&signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY)
            }
            Self::RsaSha256 => Some(&signature::RSA_PKCS1_2048_8192_SHA256),
            Self::RsaSha512 => Some(&signature::RSA_PKCS1_2048_8192_SHA512),
            Self::EcdsaP256Sha256 => Some(&signature::ECDSA_P256_SHA256_FIXED),
            Self::EcdsaP384Sha384 => Some(&signature::ECDSA_P384_SHA384_FIXED),
            Self::Ed25519 => Some(&signature::ED25519),
            Self::RsaMd5 | Self::Ed448 => None,
        }
    }

    /// RSA parameters for verifying with a decoded (n, e) pair
    pub fn rsa_parameters(&self) -> Option<&'static signature::RsaParameters> {
        match self {
            Self::RsaSha1 | Self::RsaSha1Nsec3Sha1 => {
                Some(&signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY)
            }
            Self::RsaSha256 => Some(&signature::RSA_PKCS1_2048_8192_SHA256),
            Self::RsaSha512 => Some(&signature::RSA_PKCS1_2048_8192_SHA512),
            _ => None,
        }
    }

    pub fn signing_encoding(&self) -> Option<&'static dyn signature::RsaEncoding> {
        match self {
            Self::RsaSha256 => Some(&signature::RSA_PKCS1_SHA256),
            Self::RsaSha512 => Some(&signature::RSA_PKCS1_SHA512),
            _ => None,
        }
    }
}

impl fmt::Display for DnsSecAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RsaMd5 => write!(f, "RSAMD5"),
            Self::RsaSha1 => write!(f, "RSASHA1"),
            Self::RsaSha1Nsec3Sha1 => write!(f, "RSASHA1-NSEC3-SHA1"),
            Self::RsaSha256 => write!(f, "RSASHA256"),
            Self::RsaSha512 => write!(f, "RSASHA512"),
            Self::EcdsaP256Sha256 => write!(f, "ECDSAP256SHA256"),
            Self::EcdsaP384Sha384 => write!(f, "ECDSAP384SHA384"),
            Self::Ed25519 => write!(f, "ED25519"),
            Self::Ed448 => write!(f, "ED448"),
        }
    }
}
