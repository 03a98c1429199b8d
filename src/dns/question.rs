use bitstream_io::{BitRead, BitWrite, BitWriter, Endianness};
use bytes::Bytes;

use super::{
    WireReader,
    common::{PacketComponent, display_name},
    enums::{DNSResourceClass, DNSResourceType},
};
use crate::error::Result;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSQuestion {
    pub labels: Vec<Bytes>,
    pub qtype: DNSResourceType,
    pub qclass: DNSResourceClass,
}

impl DNSQuestion {
    pub fn new(name: &str, qtype: DNSResourceType) -> Self {
        Self {
            labels: name
                .split('.')
                .filter(|l| !l.is_empty())
                .map(|l| Bytes::copy_from_slice(l.as_bytes()))
                .collect(),
            qtype,
            qclass: DNSResourceClass::IN,
        }
    }

    /// Dotted name as asked, without the trailing root dot
    pub fn name(&self) -> String {
        display_name(&self.labels)
    }

    /// Labels with ASCII letters lower-cased; other octets are left alone.
    pub fn lowercase_labels(&self) -> Vec<Bytes> {
        self.labels
            .iter()
            .map(|l| Bytes::from(l.to_ascii_lowercase()))
            .collect()
    }

    /// Last label, lower-cased. Empty for the root name.
    pub fn tld(&self) -> Bytes {
        self.labels
            .last()
            .map(|l| Bytes::from(l.to_ascii_lowercase()))
            .unwrap_or_default()
    }
}

impl PacketComponent for DNSQuestion {
    fn write<E: Endianness>(&self, writer: &mut BitWriter<&mut Vec<u8>, E>) -> Result<()> {
        self.write_labels(writer, &self.labels)?;
        writer.write_var::<u16>(16, self.qtype.into())?;
        writer.write_var::<u16>(16, self.qclass.into())?;
        Ok(())
    }

    fn read(&mut self, reader: &mut WireReader<'_>, packet: &[u8]) -> Result<()> {
        let labels = self.read_labels(reader, packet)?;
        let qtype = reader.read_var::<u16>(16)?.into();
        let qclass = reader.read_var::<u16>(16)?.into();
        *self = DNSQuestion {
            labels,
            qtype,
            qclass,
        };
        Ok(())
    }
}
