use bitstream_io::{BitRead, BitWrite, BitWriter, Endianness};
use bytes::Bytes;

use super::WireReader;
use crate::error::{DnsError, Result};

pub const MAX_LABEL_LEN: usize = 63;
pub const MAX_NAME_LEN: usize = 255;

/// Upper bound on compression pointers followed for one name
const MAX_POINTER_HOPS: usize = 64;

pub trait PacketComponent {
    fn write<E: Endianness>(&self, writer: &mut BitWriter<&mut Vec<u8>, E>) -> Result<()>;

    /// `packet` is the whole message, needed to follow compression pointers.
    fn read(&mut self, reader: &mut WireReader<'_>, packet: &[u8]) -> Result<()>;

    fn read_labels(&mut self, reader: &mut WireReader<'_>, packet: &[u8]) -> Result<Vec<Bytes>> {
        let start = (reader.position_in_bits()? / 8) as usize;
        let (labels, end) = parse_name_at(packet, start)?;
        reader.skip(((end - start) * 8) as u32)?;
        Ok(labels)
    }

    fn write_labels<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
        labels: &[Bytes],
    ) -> Result<()> {
        validate_labels(labels)?;
        for label in labels {
            writer.write_var::<u8>(8, label.len() as u8)?;
            writer.write_bytes(label)?;
        }
        writer.write_var::<u8>(8, 0)?;
        Ok(())
    }
}

/// Dotted form for logs and display. Octets that are not UTF-8 show up as
/// U+FFFD.
pub fn display_name(labels: &[Bytes]) -> String {
    labels
        .iter()
        .map(|label| String::from_utf8_lossy(label))
        .collect::<Vec<_>>()
        .join(".")
}

/// Checks that `labels` can be written as a wire-format name.
pub fn validate_labels(labels: &[Bytes]) -> Result<()> {
    let mut total = 1;
    for label in labels {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(DnsError::InvalidLabelLength(label.len()));
        }
        total += label.len() + 1;
    }
    if total > MAX_NAME_LEN {
        return Err(DnsError::NameTooLong);
    }
    Ok(())
}

/// Parses the name starting at `offset`.
///
/// Labels are kept as raw octets; RFC 1035 places no charset restriction on
/// them. Returns the labels (root label omitted) and the offset just past the name
/// as it appears at `offset`, i.e. past the first compression pointer if one
/// was taken.
pub fn parse_name_at(packet: &[u8], offset: usize) -> Result<(Vec<Bytes>, usize)> {
    let mut labels = Vec::new();
    let mut pos = offset;
    let mut end = None;
    let mut hops = 0;
    let mut wire_len = 1;

    loop {
        let len = *packet.get(pos).ok_or(DnsError::InvalidLabel)? as usize;
        match len & 0xc0 {
            0x00 if len == 0 => {
                pos += 1;
                break;
            }
            0x00 => {
                let label = packet
                    .get(pos + 1..pos + 1 + len)
                    .ok_or(DnsError::InvalidLabel)?;
                wire_len += len + 1;
                if wire_len > MAX_NAME_LEN {
                    return Err(DnsError::NameTooLong);
                }
                labels.push(Bytes::copy_from_slice(label));
                pos += len + 1;
            }
            0xc0 => {
                let low = *packet.get(pos + 1).ok_or(DnsError::InvalidLabel)? as usize;
                hops += 1;
                if hops > MAX_POINTER_HOPS {
                    return Err(DnsError::CompressionLoop);
                }
                if end.is_none() {
                    end = Some(pos + 2);
                }
                pos = ((len & 0x3f) << 8) | low;
            }
            _ => return Err(DnsError::InvalidLabelLength(len)),
        }
    }

    Ok((labels, end.unwrap_or(pos)))
}
