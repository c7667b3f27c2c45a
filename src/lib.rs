pub mod address_pool;
pub mod config;
pub mod dns;
pub mod dnssec;
pub mod error;
pub mod graceful_shutdown;
pub mod responder;
pub mod server;
pub mod validator;

pub use dns::DNSPacket;
