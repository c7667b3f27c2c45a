use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use super::ValidatorError;
use crate::dns::{
    DNSPacket,
    common::fqdn,
    edns::DEFAULT_EDNS_PAYLOAD,
    enums::{DNSResourceType, ResponseCode},
};

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

const RECV_BUFFER_SIZE: usize = 4096;

/// Stub client asking each configured nameserver in turn
///
/// Every query carries EDNS0 with a 4096 byte buffer and the DO bit so
/// signatures come back alongside the records.
#[derive(Debug, Clone)]
pub struct DnsClient {
    servers: Vec<SocketAddr>,
    timeout: Duration,
}

impl DnsClient {
    pub fn new(servers: Vec<SocketAddr>, timeout: Duration) -> Self {
        Self { servers, timeout }
    }

    /// Ask for `name`/`qtype`.
    ///
    /// A NOERROR or NXDOMAIN reply ends the search. Other response codes
    /// move on to the next server. A transport failure or timeout aborts
    /// the whole query.
    pub async fn query(
        &self,
        name: &[String],
        qtype: DNSResourceType,
    ) -> Result<DNSPacket, ValidatorError> {
        let id = rand::random::<u16>();
        let mut request = DNSPacket::query(id, name.to_vec(), qtype);
        request.add_edns(DEFAULT_EDNS_PAYLOAD, true);
        let wire = request.serialize()?;

        for server in &self.servers {
            debug!("Querying {} for {} {}", server, fqdn(name), qtype);
            let response = self.exchange(*server, &wire, id).await?;

            match ResponseCode::from_u8(response.header.rcode) {
                Some(ResponseCode::NoError) | Some(ResponseCode::NameError) => {
                    if response.header.tc {
                        warn!("Truncated reply from {} for {} {}", server, fqdn(name), qtype);
                    }
                    return Ok(response);
                }
                _ => debug!(
                    "{} answered {} {} with rcode {}, trying next server",
                    server,
                    fqdn(name),
                    qtype,
                    response.header.rcode
                ),
            }
        }

        Err(ValidatorError::NoNameserverAnswered)
    }

    async fn exchange(
        &self,
        server: SocketAddr,
        request: &[u8],
        id: u16,
    ) -> Result<DNSPacket, ValidatorError> {
        let local: SocketAddr = if server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let sock = UdpSocket::bind(local).await?;
        sock.connect(server).await?;
        sock.send(request).await?;

        timeout(self.timeout, recv_reply(&sock, id))
            .await
            .map_err(|_| ValidatorError::Timeout(server))?
    }
}

/// Read datagrams until one answers query `id`
async fn recv_reply(sock: &UdpSocket, id: u16) -> Result<DNSPacket, ValidatorError> {
    let mut buf = vec![0_u8; RECV_BUFFER_SIZE];
    loop {
        let len = sock.recv(&mut buf).await?;
        let response = match DNSPacket::parse(&buf[..len]) {
            Ok(response) => response,
            Err(e) => {
                debug!("Ignoring unparseable {} byte datagram: {}", len, e);
                continue;
            }
        };
        if response.header.id == id && response.header.qr {
            return Ok(response);
        }
        trace!("Ignoring reply with id {}", response.header.id);
    }
}
