pub mod algorithm;
pub mod canonical;
pub mod context;
pub mod digest;
pub mod errors;
pub mod key_tag;
pub mod keys;
pub mod publisher;
pub mod signer;
pub mod verify;

pub use algorithm::DnsSecAlgorithm;
pub use context::{SignatureValidity, SigningContext};
pub use digest::{DigestType, check_ds, compute_ds, ds_presentation};
pub use errors::DnsSecError;
pub use key_tag::calculate_key_tag;
pub use keys::{KeyRole, SigningKey};
pub use signer::sign_rrset;
pub use verify::verify_rrsig;
