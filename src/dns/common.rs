use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter, Endianness};

use super::ParseError;

/// Longest name on the wire, including length octets and the root label
pub const MAX_NAME_LEN: usize = 255;
pub const MAX_LABEL_LEN: usize = 63;
const MAX_POINTER_HOPS: usize = 32;

pub trait PacketComponent {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError>;
    fn read(&mut self, reader: &mut WireReader<'_>) -> Result<(), ParseError>;

    fn write_labels<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
        labels: &[String],
    ) -> Result<(), ParseError> {
        for label in labels {
            if label.is_empty() || label.len() > MAX_LABEL_LEN {
                return Err(ParseError::InvalidLabel);
            }
            writer.write_var::<u8>(8, label.len() as u8)?;
            writer.write_bytes(label.as_bytes())?;
        }
        writer.write_var::<u8>(8, 0)?;
        Ok(())
    }
}

/// Bit reader over a whole message that remembers how far it has read, so
/// compressed names and RDATA can be resolved against the full packet.
pub struct WireReader<'a> {
    bits: BitReader<&'a [u8], BigEndian>,
    packet: &'a [u8],
    consumed_bits: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(packet: &'a [u8]) -> Self {
        Self {
            bits: BitReader::new(packet),
            packet,
            consumed_bits: 0,
        }
    }

    pub fn packet(&self) -> &'a [u8] {
        self.packet
    }

    pub fn offset(&self) -> usize {
        self.consumed_bits / 8
    }

    pub fn remaining(&self) -> usize {
        self.packet.len().saturating_sub(self.offset())
    }

    pub fn read_bits(&mut self, bits: u32) -> Result<u8, ParseError> {
        let value = self.bits.read_var::<u8>(bits)?;
        self.consumed_bits += bits as usize;
        Ok(value)
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        self.read_bits(8)
    }

    pub fn read_u16(&mut self) -> Result<u16, ParseError> {
        let value = self.bits.read_var::<u16>(16)?;
        self.consumed_bits += 16;
        Ok(value)
    }

    pub fn read_u32(&mut self) -> Result<u32, ParseError> {
        let value = self.bits.read_var::<u32>(32)?;
        self.consumed_bits += 32;
        Ok(value)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, ParseError> {
        if self.remaining() < len {
            return Err(ParseError::Truncated);
        }
        let mut buf = vec![0_u8; len];
        self.bits.read_bytes(&mut buf)?;
        self.consumed_bits += len * 8;
        Ok(buf)
    }

    pub fn read_name(&mut self) -> Result<Vec<String>, ParseError> {
        let (labels, consumed) = read_name_at(self.packet, self.offset())?;
        self.read_bytes(consumed)?;
        Ok(labels)
    }
}

/// Decode a possibly-compressed name starting at `offset`.
///
/// Returns the labels (root excluded) and the number of bytes the name
/// occupies at `offset` itself, which stops after the first pointer.
pub fn read_name_at(packet: &[u8], offset: usize) -> Result<(Vec<String>, usize), ParseError> {
    let mut labels = Vec::new();
    let mut pos = offset;
    let mut consumed = None;
    let mut hops = 0;
    let mut wire_len = 1;

    loop {
        let len = *packet.get(pos).ok_or(ParseError::Truncated)? as usize;
        match len & 0xC0 {
            0x00 if len == 0 => {
                pos += 1;
                break;
            }
            0x00 => {
                let start = pos + 1;
                let bytes = packet
                    .get(start..start + len)
                    .ok_or(ParseError::Truncated)?;
                wire_len += len + 1;
                if wire_len > MAX_NAME_LEN {
                    return Err(ParseError::NameTooLong);
                }
                let label = String::from_utf8(bytes.to_vec()).map_err(|_| ParseError::InvalidLabel)?;
                labels.push(label);
                pos = start + len;
            }
            0xC0 => {
                let low = *packet.get(pos + 1).ok_or(ParseError::Truncated)? as usize;
                let target = ((len & 0x3F) << 8) | low;
                if consumed.is_none() {
                    consumed = Some(pos + 2 - offset);
                }
                hops += 1;
                if hops > MAX_POINTER_HOPS || target >= pos {
                    return Err(ParseError::InvalidCompressionPointer(target));
                }
                pos = target;
            }
            _ => return Err(ParseError::InvalidLabel),
        }
    }

    Ok((labels, consumed.unwrap_or_else(|| pos - offset)))
}

/// Split a presentation-format name into labels, dropping the root.
pub fn parse_name(name: &str) -> Vec<String> {
    name.split('.')
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect()
}

/// Fully-qualified presentation form, always ending in a dot.
pub fn fqdn(labels: &[String]) -> String {
    if labels.is_empty() {
        return ".".to_string();
    }
    let mut name = labels.join(".");
    name.push('.');
    name
}

pub fn lowercase_labels(labels: &[String]) -> Vec<String> {
    labels.iter().map(|label| label.to_ascii_lowercase()).collect()
}

/// Uncompressed wire form of a name, optionally lower-cased (RFC 4034 6.2).
pub fn name_to_wire(labels: &[String], lowercase: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1);
    for label in labels {
        out.push(label.len() as u8);
        if lowercase {
            out.extend(label.bytes().map(|b| b.to_ascii_lowercase()));
        } else {
            out.extend_from_slice(label.as_bytes());
        }
    }
    out.push(0);
    out
}

pub fn names_equal(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_ignore_ascii_case(y))
}

/// True when `name` equals `zone` or sits below it.
pub fn is_subdomain(name: &[String], zone: &[String]) -> bool {
    name.len() >= zone.len() && names_equal(&name[name.len() - zone.len()..], zone)
}
