pub mod common;
pub mod edns;
pub mod enums;
pub mod header;
pub mod question;
pub mod rdata;
pub mod resource;

use bitstream_io::{BigEndian, BitWrite, BitWriter};
use common::{PacketComponent, WireReader};
use edns::{CLASSIC_UDP_PAYLOAD, EdnsOpt};
use enums::DNSResourceType;
use header::DNSHeader;
use question::DNSQuestion;
use resource::DNSResource;
use thiserror::Error;
use tracing::trace;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSPacket {
    pub header: DNSHeader,
    pub questions: Vec<DNSQuestion>,
    pub answers: Vec<DNSResource>,
    pub authorities: Vec<DNSResource>,
    pub resources: Vec<DNSResource>,
    /// EDNS0 OPT record if present (extracted from additional records)
    pub edns: Option<EdnsOpt>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid DNS header")]
    InvalidHeader,
    #[error("Invalid DNS label")]
    InvalidLabel,
    #[error("DNS name exceeds 255 octets")]
    NameTooLong,
    #[error("Invalid compression pointer to offset {0}")]
    InvalidCompressionPointer(usize),
    #[error("Invalid question section")]
    InvalidQuestionSection,
    #[error("Invalid {0} record data")]
    InvalidRData(DNSResourceType),
    #[error("Record data longer than 65535 octets")]
    RDataTooLong,
    #[error("Invalid EDNS option")]
    InvalidEdnsOption,
    #[error("Message truncated")]
    Truncated,
    #[error("Invalid bit stream: {0}")]
    InvalidBitStream(String),
}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ParseError::Truncated
        } else {
            ParseError::InvalidBitStream(e.to_string())
        }
    }
}

impl DNSPacket {
    /// A recursion-desired query for a single name and type
    pub fn query(id: u16, labels: Vec<String>, qtype: DNSResourceType) -> Self {
        let mut packet = DNSPacket::default();
        packet.header.id = id;
        packet.header.rd = true;
        packet.header.qdcount = 1;
        packet.questions.push(DNSQuestion::new(labels, qtype));
        packet
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        trace!("Parsing DNS packet, size: {} bytes", buf.len());
        let mut reader = WireReader::new(buf);
        let mut packet = DNSPacket::default();
        packet.header.read(&mut reader)?;

        for _ in 0..packet.header.qdcount {
            let mut question = DNSQuestion::default();
            question.read(&mut reader)?;
            packet.questions.push(question);
        }

        for _ in 0..packet.header.ancount {
            let mut answer = DNSResource::default();
            answer.read(&mut reader)?;
            packet.answers.push(answer);
        }

        for _ in 0..packet.header.nscount {
            let mut authority = DNSResource::default();
            authority.read(&mut reader)?;
            packet.authorities.push(authority);
        }

        for _ in 0..packet.header.arcount {
            let mut resource = DNSResource::default();
            resource.read(&mut reader)?;

            if resource.rtype == DNSResourceType::OPT && resource.labels.is_empty() {
                if let rdata::RData::Unknown(bytes) = &resource.rdata {
                    packet.edns = Some(EdnsOpt::parse_from_resource(
                        resource.rclass.into(),
                        resource.ttl,
                        bytes,
                    )?);
                    continue;
                }
            }

            packet.resources.push(resource);
        }

        Ok(packet)
    }

    /// Encode the packet. Section counts are taken from the sections
    /// themselves, not from `header`.
    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let mut header = self.header.clone();
        header.qdcount = count(self.questions.len())?;
        header.ancount = count(self.answers.len())?;
        header.nscount = count(self.authorities.len())?;
        header.arcount = count(self.resources.len() + usize::from(self.edns.is_some()))?;

        let mut buf = Vec::with_capacity(512);
        {
            let mut writer: BitWriter<&mut Vec<u8>, BigEndian> = BitWriter::new(&mut buf);
            header.write(&mut writer)?;

            for question in &self.questions {
                question.write(&mut writer)?;
            }
            for record in self
                .answers
                .iter()
                .chain(&self.authorities)
                .chain(&self.resources)
            {
                record.write(&mut writer)?;
            }

            if let Some(edns) = &self.edns {
                let (payload, ttl, rdata) = edns.to_resource_format();
                writer.write_var::<u8>(8, 0)?;
                writer.write_var::<u16>(16, DNSResourceType::OPT.into())?;
                writer.write_var::<u16>(16, payload)?;
                writer.write_var::<u32>(32, ttl)?;
                writer.write_var::<u16>(16, rdata.len() as u16)?;
                writer.write_bytes(&rdata)?;
            }
        }

        Ok(buf)
    }

    /// Largest UDP reply the sender of this packet accepts
    pub fn max_udp_payload_size(&self) -> u16 {
        self.edns
            .as_ref()
            .map(|edns| edns.payload_size())
            .unwrap_or(CLASSIC_UDP_PAYLOAD)
    }

    pub fn dnssec_requested(&self) -> bool {
        self.edns.as_ref().map(|edns| edns.do_flag()).unwrap_or(false)
    }

    pub fn add_edns(&mut self, payload_size: u16, do_flag: bool) {
        let mut edns = EdnsOpt::with_payload_size(payload_size);
        edns.set_do_flag(do_flag);
        self.edns = Some(edns);
    }

    /// Header-only copy with TC set, for replies that exceed the client's buffer
    pub fn truncated(&self) -> Self {
        let mut packet = DNSPacket {
            header: self.header.clone(),
            questions: self.questions.clone(),
            edns: self.edns.clone(),
            ..Default::default()
        };
        packet.header.tc = true;
        packet
    }
}

fn count(len: usize) -> Result<u16, ParseError> {
    u16::try_from(len).map_err(|_| ParseError::InvalidHeader)
}
