use super::ParseError;

/// Buffer size advertised by this crate in outgoing OPT records
pub const DEFAULT_EDNS_PAYLOAD: u16 = 4096;
/// Largest reply allowed to a client that sent no OPT record (RFC 1035)
pub const CLASSIC_UDP_PAYLOAD: u16 = 512;

const DO_BIT: u16 = 0x8000;

/// EDNS0 OPT pseudo-record (RFC 6891)
///
/// On the wire the owner is the root, CLASS carries the requestor's payload
/// size and TTL packs extended RCODE, version and flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdnsOpt {
    pub udp_payload_size: u16,
    pub extended_rcode: u8,
    pub version: u8,
    pub flags: u16,
    pub options: Vec<EdnsOption>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdnsOption {
    pub code: u16,
    pub data: Vec<u8>,
}

impl Default for EdnsOpt {
    fn default() -> Self {
        Self::with_payload_size(DEFAULT_EDNS_PAYLOAD)
    }
}

impl EdnsOpt {
    pub fn with_payload_size(udp_payload_size: u16) -> Self {
        Self {
            udp_payload_size,
            extended_rcode: 0,
            version: 0,
            flags: 0,
            options: Vec::new(),
        }
    }

    /// DNSSEC OK
    pub fn do_flag(&self) -> bool {
        self.flags & DO_BIT != 0
    }

    pub fn set_do_flag(&mut self, value: bool) {
        if value {
            self.flags |= DO_BIT;
        } else {
            self.flags &= !DO_BIT;
        }
    }

    /// Payload size a peer may send us; values below 512 are treated as 512.
    pub fn payload_size(&self) -> u16 {
        self.udp_payload_size.max(CLASSIC_UDP_PAYLOAD)
    }

    pub fn parse_from_resource(class: u16, ttl: u32, rdata: &[u8]) -> Result<Self, ParseError> {
        let mut options = Vec::new();
        let mut pos = 0;

        while pos < rdata.len() {
            let header = rdata
                .get(pos..pos + 4)
                .ok_or(ParseError::InvalidEdnsOption)?;
            let code = u16::from_be_bytes([header[0], header[1]]);
            let len = u16::from_be_bytes([header[2], header[3]]) as usize;
            pos += 4;
            let data = rdata
                .get(pos..pos + len)
                .ok_or(ParseError::InvalidEdnsOption)?;
            options.push(EdnsOption {
                code,
                data: data.to_vec(),
            });
            pos += len;
        }

        Ok(EdnsOpt {
            udp_payload_size: class,
            extended_rcode: (ttl >> 24) as u8,
            version: (ttl >> 16) as u8,
            flags: ttl as u16,
            options,
        })
    }

    /// (CLASS, TTL, RDATA) for the OPT record carrying this state
    pub fn to_resource_format(&self) -> (u16, u32, Vec<u8>) {
        let ttl = (u32::from(self.extended_rcode) << 24)
            | (u32::from(self.version) << 16)
            | u32::from(self.flags);

        let mut rdata = Vec::new();
        for option in &self.options {
            rdata.extend_from_slice(&option.code.to_be_bytes());
            rdata.extend_from_slice(&(option.data.len() as u16).to_be_bytes());
            rdata.extend_from_slice(&option.data);
        }

        (self.udp_payload_size, ttl, rdata)
    }

    pub fn debug_info(&self) -> String {
        format!(
            "EDNS{}: payload={}, do={}, options={}",
            self.version,
            self.udp_payload_size,
            self.do_flag(),
            self.options.len()
        )
    }
}
