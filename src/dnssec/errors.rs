use thiserror::Error;

use crate::dns::{ParseError, enums::DNSResourceType};

/// DNSSEC key loading, signing and validation errors
#[derive(Debug, Error)]
pub enum DnsSecError {
    /// Signing was asked for with no records. Callers branch on this.
    #[error("Refusing to sign an empty RRset")]
    EmptyRRSet,
    #[error("RRset mixes owner names, types or classes")]
    MixedRRSet,
    #[error("Missing validation key: {0}")]
    MissingValidationKey(&'static str),
    #[error("No RRSIG covering the {0} RRset")]
    MissingSignature(DNSResourceType),
    #[error("RRSIG over {0} failed to verify")]
    SignatureVerificationFailed(DNSResourceType),
    #[error("RRSIG does not match the validating key: {0}")]
    KeyMismatch(String),
    #[error("No DS record published for the zone")]
    MissingDs,
    #[error("DS digest {published} does not match computed {computed}")]
    InvalidDs { published: String, computed: String },
    #[error("Unsupported DNSSEC algorithm: {0}")]
    UnsupportedAlgorithm(u8),
    #[error("Unsupported digest type: {0}")]
    UnsupportedDigestType(u8),
    #[error("Invalid DNSKEY public key format")]
    InvalidPublicKey,
    #[error("Invalid key file: {0}")]
    InvalidKeyFile(String),
    #[error("Key material rejected: {0}")]
    KeyRejected(String),
    #[error("Signing failed")]
    SigningFailed,
    #[error("Failed to read key file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Encoding(#[from] ParseError),
}

pub type Result<T> = std::result::Result<T, DnsSecError>;
