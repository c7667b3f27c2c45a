use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::address_pool::PeerAddress;
use crate::dns::common::{MAX_LABEL_LEN, MAX_NAME_LEN, fqdn, parse_name};
use crate::dnssec::SignatureValidity;
use crate::error::ConfigError;
use crate::responder::{ResponderSettings, SoaParameters};

/// Seeder configuration.
///
/// Read from TOML, then overridden by `SEEDER_*` environment variables and
/// finally by command-line flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeederConfig {
    /// Zone served by the seeder, e.g. `seed.example.org.`
    pub zone: String,

    /// Authoritative nameserver published in NS and SOA records
    pub nameserver: String,

    /// Address to bind the UDP responder to
    pub bind_addr: SocketAddr,

    /// Directory holding the BIND key files
    pub key_dir: PathBuf,

    /// Base name of the zone-signing key files, e.g. `Kseed.example.org.+010+44213`
    pub zsk: String,

    /// Base name of the key-signing key files
    pub ksk: String,

    /// Max number of datagrams handled concurrently
    pub max_concurrent_queries: usize,

    /// TTL of A and AAAA answers
    pub address_ttl: u32,

    /// TTL of NS and SOA records
    pub ns_ttl: u32,

    pub soa: SoaConfig,

    pub signature_validity: SignatureValidityConfig,

    /// Max addresses in one answer
    pub max_addresses: usize,

    /// Peers published by the static address pool
    pub peers: Vec<PeerAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoaConfig {
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
    /// Responsible mailbox in domain form; `hostmaster.<zone>` when unset
    pub mbox: Option<String>,
}

impl Default for SoaConfig {
    fn default() -> Self {
        let defaults = SoaParameters::default();
        Self {
            serial: defaults.serial,
            refresh: defaults.refresh,
            retry: defaults.retry,
            expire: defaults.expire,
            minimum: defaults.minimum,
            mbox: None,
        }
    }
}

/// RRSIG validity window: fixed epoch seconds, or relative to startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignatureValidityConfig {
    Fixed {
        inception: u32,
        expiration: u32,
    },
    Relative {
        lifetime_secs: u32,
        #[serde(default)]
        backdate_secs: u32,
    },
}

impl Default for SignatureValidityConfig {
    fn default() -> Self {
        SignatureValidityConfig::Relative {
            lifetime_secs: 30 * 86400,
            backdate_secs: 3600,
        }
    }
}

impl SignatureValidityConfig {
    pub fn resolve(&self) -> Result<SignatureValidity, ConfigError> {
        let window = match *self {
            SignatureValidityConfig::Fixed {
                inception,
                expiration,
            } => SignatureValidity::fixed(inception, expiration),
            SignatureValidityConfig::Relative {
                lifetime_secs,
                backdate_secs,
            } => SignatureValidity::starting_now(lifetime_secs, backdate_secs),
        };
        window.map_err(|e| ConfigError::InvalidSignatureValidity(e.to_string()))
    }
}

impl Default for SeederConfig {
    fn default() -> Self {
        Self {
            zone: String::new(),
            nameserver: String::new(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5354)),
            key_dir: PathBuf::from("keys"),
            zsk: String::new(),
            ksk: String::new(),
            max_concurrent_queries: 1024,
            address_ttl: 30,
            ns_ttl: 86400,
            soa: SoaConfig::default(),
            signature_validity: SignatureValidityConfig::default(),
            max_addresses: 16,
            peers: Vec::new(),
        }
    }
}

impl SeederConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `SEEDER_*` overrides from the process environment
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply `SEEDER_*` overrides read through `lookup`
    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind_addr) = lookup("SEEDER_BIND_ADDR") {
            self.bind_addr = bind_addr
                .parse()
                .map_err(|_| ConfigError::InvalidBindAddress(bind_addr))?;
        }
        if let Some(zone) = lookup("SEEDER_ZONE") {
            self.zone = zone;
        }
        if let Some(nameserver) = lookup("SEEDER_NAMESERVER") {
            self.nameserver = nameserver;
        }
        if let Some(key_dir) = lookup("SEEDER_KEY_DIR") {
            self.key_dir = PathBuf::from(key_dir);
        }
        if let Some(max_concurrent) = lookup("SEEDER_MAX_CONCURRENT_QUERIES") {
            self.max_concurrent_queries =
                max_concurrent
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: "SEEDER_MAX_CONCURRENT_QUERIES",
                        value: max_concurrent.clone(),
                    })?;
        }
        Ok(self)
    }

    /// Lower-case both names and make them fully qualified
    pub fn normalize(mut self) -> Self {
        self.zone = fqdn(&parse_name(&self.zone.to_ascii_lowercase()));
        self.nameserver = fqdn(&parse_name(&self.nameserver.to_ascii_lowercase()));
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_name("zone", &self.zone)?;
        check_name("nameserver", &self.nameserver)?;

        if self.zsk.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "zsk",
                value: String::new(),
            });
        }
        if self.ksk.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "ksk",
                value: String::new(),
            });
        }
        if self.max_concurrent_queries == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        if self.max_addresses == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_addresses",
                value: "0".to_string(),
            });
        }
        if let Some(mbox) = &self.soa.mbox {
            check_name("soa.mbox", mbox)?;
        }
        if let SignatureValidityConfig::Fixed {
            inception,
            expiration,
        } = self.signature_validity
        {
            if expiration <= inception {
                return Err(ConfigError::InvalidSignatureValidity(format!(
                    "expiration {expiration} is not after inception {inception}"
                )));
            }
        }
        Ok(())
    }

    pub fn zone_labels(&self) -> Vec<String> {
        parse_name(&self.zone.to_ascii_lowercase())
    }

    pub fn responder_settings(&self) -> ResponderSettings {
        let mut settings = ResponderSettings::new(parse_name(&self.nameserver));
        settings.address_ttl = self.address_ttl;
        settings.ns_ttl = self.ns_ttl;
        settings.soa = SoaParameters {
            serial: self.soa.serial,
            refresh: self.soa.refresh,
            retry: self.soa.retry,
            expire: self.soa.expire,
            minimum: self.soa.minimum,
            mbox: self.soa.mbox.as_deref().map(parse_name),
        };
        settings
    }
}

fn check_name(key: &'static str, value: &str) -> Result<(), ConfigError> {
    let labels = parse_name(value);
    let wire_len: usize = labels.iter().map(|label| label.len() + 1).sum::<usize>() + 1;
    let valid = !labels.is_empty()
        && wire_len <= MAX_NAME_LEN
        && labels.iter().all(|label| label.len() <= MAX_LABEL_LEN && label.is_ascii());
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidName {
            key,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn minimal() -> SeederConfig {
        SeederConfig {
            zone: "seed.example.org".to_string(),
            nameserver: "ns1.example.org".to_string(),
            zsk: "Kseed.example.org.+010+44213".to_string(),
            ksk: "Kseed.example.org.+010+06481".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_needs_zone() {
        assert!(matches!(
            SeederConfig::default().validate(),
            Err(ConfigError::InvalidName { key: "zone", .. })
        ));
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn test_toml_with_fixed_window_and_peers() {
        let config = SeederConfig::from_toml_str(
            r#"
            zone = "Seed.Example.org"
            nameserver = "ns1.example.org."
            zsk = "Kzsk"
            ksk = "Kksk"
            bind_addr = "0.0.0.0:53"

            [signature_validity]
            inception = 1700000000
            expiration = 1800000000

            [soa]
            serial = 2024010101

            [[peers]]
            address = "10.0.0.1"
            services = 5

            [[peers]]
            address = "2001:db8::1"
            "#,
        )
        .unwrap()
        .normalize();

        assert_eq!(config.zone, "seed.example.org.");
        assert_eq!(config.bind_addr.port(), 53);
        assert_eq!(
            config.signature_validity,
            SignatureValidityConfig::Fixed {
                inception: 1_700_000_000,
                expiration: 1_800_000_000
            }
        );
        assert_eq!(config.soa.serial, 2024010101);
        assert_eq!(config.soa.retry, 86400);
        assert_eq!(config.peers.len(), 2);
        assert_eq!(config.peers[0].services.bits(), 5);
        assert_eq!(config.peers[1].services.bits(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_relative_window_without_backdate() {
        let config = SeederConfig::from_toml_str(
            r#"
            [signature_validity]
            lifetime_secs = 600
            "#,
        )
        .unwrap();
        assert_eq!(
            config.signature_validity,
            SignatureValidityConfig::Relative {
                lifetime_secs: 600,
                backdate_secs: 0
            }
        );
        let window = config.signature_validity.resolve().unwrap();
        assert_eq!(window.expiration - window.inception, 600);
    }

    #[test]
    fn test_inverted_window_rejected() {
        let config = SeederConfig {
            signature_validity: SignatureValidityConfig::Fixed {
                inception: 10,
                expiration: 5,
            },
            ..minimal()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSignatureValidity(_))
        ));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = SeederConfig {
            max_concurrent_queries: 0,
            ..minimal()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidConcurrency)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SEEDER_BIND_ADDR", "127.0.0.1:9953"),
            ("SEEDER_ZONE", "dnsseed.example.net"),
            ("SEEDER_MAX_CONCURRENT_QUERIES", "8"),
        ]);
        let config = minimal()
            .apply_env_with(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.bind_addr.port(), 9953);
        assert_eq!(config.zone, "dnsseed.example.net");
        assert_eq!(config.max_concurrent_queries, 8);
        assert_eq!(config.nameserver, "ns1.example.org");
    }

    #[test]
    fn test_bad_env_value() {
        let result = minimal().apply_env_with(|key| {
            (key == "SEEDER_BIND_ADDR").then(|| "not-an-address".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidBindAddress(_))));
    }

    #[test]
    fn test_responder_settings_from_config() {
        let config = SeederConfig {
            address_ttl: 60,
            soa: SoaConfig {
                mbox: Some("admin.example.org".to_string()),
                ..Default::default()
            },
            ..minimal()
        };
        let settings = config.responder_settings();
        assert_eq!(settings.address_ttl, 60);
        assert_eq!(fqdn(&settings.nameserver), "ns1.example.org.");
        assert_eq!(settings.soa.mbox.as_deref().map(fqdn).as_deref(), Some("admin.example.org."));
    }
}
