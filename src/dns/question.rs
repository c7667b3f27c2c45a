use bitstream_io::{BitWrite, BitWriter, Endianness};

use super::{
    ParseError,
    common::{PacketComponent, WireReader, fqdn},
    enums::{DNSResourceClass, DNSResourceType},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSQuestion {
    pub labels: Vec<String>,
    pub qtype: DNSResourceType,
    pub qclass: DNSResourceClass,
}

impl DNSQuestion {
    pub fn new(labels: Vec<String>, qtype: DNSResourceType) -> Self {
        Self {
            labels,
            qtype,
            qclass: DNSResourceClass::IN,
        }
    }

    /// The queried name in presentation form, e.g. `seed.example.org.`
    pub fn name(&self) -> String {
        fqdn(&self.labels)
    }
}

impl PacketComponent for DNSQuestion {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError> {
        self.write_labels(writer, &self.labels)?;
        writer.write_var::<u16>(16, self.qtype.into())?;
        writer.write_var::<u16>(16, self.qclass.into())?;
        Ok(())
    }

    fn read(&mut self, reader: &mut WireReader<'_>) -> Result<(), ParseError> {
        let labels = reader
            .read_name()
            .map_err(|_| ParseError::InvalidQuestionSection)?;
        let qtype = reader.read_u16()?.into();
        let qclass = reader.read_u16()?.into();
        *self = DNSQuestion {
            labels,
            qtype,
            qclass,
        };
        Ok(())
    }
}
