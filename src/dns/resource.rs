use bitstream_io::{BitWrite, BitWriter, Endianness};

use super::{
    ParseError,
    common::{PacketComponent, WireReader, fqdn},
    enums::{DNSResourceClass, DNSResourceType},
    rdata::RData,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSResource {
    pub labels: Vec<String>,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub ttl: u32,
    pub rdata: RData,
}

impl DNSResource {
    /// Build an IN-class record whose type follows from its data
    pub fn new(labels: Vec<String>, ttl: u32, rdata: RData) -> Self {
        let rtype = rdata.rtype().unwrap_or_default();
        Self {
            labels,
            rtype,
            rclass: DNSResourceClass::IN,
            ttl,
            rdata,
        }
    }

    pub fn name(&self) -> String {
        fqdn(&self.labels)
    }
}

impl PacketComponent for DNSResource {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError> {
        let rdata = self.rdata.to_wire(false);
        let rdlength = u16::try_from(rdata.len()).map_err(|_| ParseError::RDataTooLong)?;
        self.write_labels(writer, &self.labels)?;
        writer.write_var::<u16>(16, self.rtype.into())?;
        writer.write_var::<u16>(16, self.rclass.into())?;
        writer.write_var::<u32>(32, self.ttl)?;
        writer.write_var::<u16>(16, rdlength)?;
        writer.write_bytes(&rdata)?;
        Ok(())
    }

    fn read(&mut self, reader: &mut WireReader<'_>) -> Result<(), ParseError> {
        self.labels = reader.read_name()?;
        self.rtype = reader.read_u16()?.into();
        self.rclass = reader.read_u16()?.into();
        self.ttl = reader.read_u32()?;
        let rdlength = reader.read_u16()? as usize;
        let offset = reader.offset();
        if reader.remaining() < rdlength {
            return Err(ParseError::Truncated);
        }
        self.rdata = RData::parse(self.rtype, reader.packet(), offset, rdlength)?;
        reader.read_bytes(rdlength)?;
        Ok(())
    }
}
