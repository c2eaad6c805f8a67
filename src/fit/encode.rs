//! FIT file framing.
//!
//! The output follows the official FIT file layout:
//!
//! * A 14-byte header whose first byte declares its own size, followed by the
//!   protocol and profile versions, a 4-byte data payload length, the `.FIT`
//!   signature and a two-byte CRC of the preceding header bytes.
//! * A data section containing a stream of definition messages and data
//!   messages. Data messages are keyed by the local message number declared in
//!   the most recent definition message with the same local id.
//! * A trailing two-byte CRC that covers the header (including its CRC) plus
//!   the entire data section.

use crate::conversion::sequence::ActivityStream;
use crate::conversion::types::ConvertError;
use crate::fit::profile::{FitMessage, describe};
use std::collections::HashMap;

const HEADER_SIZE: u8 = 14;
const PROTOCOL_VERSION: u8 = 0x20;
const PROFILE_VERSION: u16 = 2132;
const DEFINITION_HEADER: u8 = 0x40;
const LITTLE_ENDIAN: u8 = 0;

/// Serialize an activity stream into a complete FIT file.
pub fn encode_fit(stream: &ActivityStream) -> Result<Vec<u8>, ConvertError> {
    let mut definitions: HashMap<u8, Vec<(u8, u8, u8)>> = HashMap::new();
    let mut data_section: Vec<u8> = Vec::new();

    for message in stream {
        let message = describe(message)?;
        let layout = message.layout();

        if definitions.get(&message.local) != Some(&layout) {
            write_definition(&message, &mut data_section)?;
            definitions.insert(message.local, layout);
        }
        write_data(&message, &mut data_section);
    }

    assemble_file(data_section)
}

fn write_definition(message: &FitMessage, out: &mut Vec<u8>) -> Result<(), ConvertError> {
    let field_count: u8 = message.fields.len().try_into().map_err(|_| {
        ConvertError::Encode(format!("{} has too many fields", message.name))
    })?;

    out.push(DEFINITION_HEADER | (message.local & 0x0F));
    out.push(0);
    out.push(LITTLE_ENDIAN);
    out.extend_from_slice(&message.global.to_le_bytes());
    out.push(field_count);

    for field in &message.fields {
        out.push(field.number);
        out.push(field.base_type.size());
        out.push(field.base_type.id());
    }
    Ok(())
}

fn write_data(message: &FitMessage, out: &mut Vec<u8>) {
    out.push(message.local & 0x0F);
    for field in &message.fields {
        field.base_type.write(field.raw, out);
    }
}

/// Prefix the data section with a header and append the file CRC.
fn assemble_file(data_section: Vec<u8>) -> Result<Vec<u8>, ConvertError> {
    let data_len: u32 = data_section
        .len()
        .try_into()
        .map_err(|_| ConvertError::Encode("data section too large".into()))?;

    let mut file = Vec::with_capacity(HEADER_SIZE as usize + data_section.len() + 2);
    file.push(HEADER_SIZE);
    file.push(PROTOCOL_VERSION);
    file.extend_from_slice(&PROFILE_VERSION.to_le_bytes());
    file.extend_from_slice(&data_len.to_le_bytes());
    file.extend_from_slice(b".FIT");

    let header_crc = calculate_crc(&file);
    file.extend_from_slice(&header_crc.to_le_bytes());

    file.extend_from_slice(&data_section);

    let data_crc = calculate_crc(&file);
    file.extend_from_slice(&data_crc.to_le_bytes());

    Ok(file)
}

/// Nibble lookup table of the FIT SDK CRC (`FitCRC_Get16`, reflected 0xA001).
const CRC_TABLE: [u16; 16] = [
    0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00, 0x7800,
    0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
];

/// FIT SDK CRC-16 (`FitCRC_Get16`): each byte is folded in low nibble first,
/// then high nibble. Used for both the header CRC and the trailing file CRC.
pub fn calculate_crc(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |crc, byte| crc_nibble(crc_nibble(crc, byte & 0x0F), byte >> 4))
}

fn crc_nibble(crc: u16, nibble: u8) -> u16 {
    let carry = CRC_TABLE[(crc & 0x0F) as usize];
    ((crc >> 4) & 0x0FFF) ^ carry ^ CRC_TABLE[(nibble & 0x0F) as usize]
}
