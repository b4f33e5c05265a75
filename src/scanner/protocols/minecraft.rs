use std::{
    io::{Cursor, Read},
    net::SocketAddrV4,
};

use super::{ParseResponseError, Protocol};

/// The largest packet a vanilla server will send (the max value of a 3 byte
/// varint).
const MAX_PACKET_LENGTH: i32 = 2_097_151;

#[derive(Clone, Debug)]
pub struct Minecraft {
    protocol_version: i32,
}

impl Minecraft {
    pub fn new(protocol_version: i32) -> Self {
        Self { protocol_version }
    }
}

impl Protocol for Minecraft {
    fn payload(&self, address: SocketAddrV4) -> Vec<u8> {
        build_status_request(
            &address.ip().to_string(),
            address.port(),
            self.protocol_version,
        )
    }

    fn parse_response(&self, response: &[u8]) -> Result<Vec<u8>, ParseResponseError> {
        let mut stream = Cursor::new(response);

        let packet_length = read_varint(&mut stream)?;
        if !(1..=MAX_PACKET_LENGTH).contains(&packet_length) {
            return Err(ParseResponseError::Invalid);
        }
        let packet_id = read_varint(&mut stream)?;
        if packet_id != 0x00 {
            return Err(ParseResponseError::Invalid);
        }
        let response_length = read_varint(&mut stream)?;
        if !(0..packet_length).contains(&response_length) {
            return Err(ParseResponseError::Invalid);
        }

        let position = stream.position() as usize;
        let status_buffer = &response[position..];
        // a leading byte that can't start a json object means this isn't a
        // minecraft server, no need to wait for the rest
        if status_buffer.first().is_some_and(|&b| b != b'{') {
            return Err(ParseResponseError::Invalid);
        }
        if status_buffer.len() < response_length as usize {
            return Err(ParseResponseError::Incomplete);
        }

        Ok(status_buffer[..response_length as usize].to_vec())
    }
}

/// Handshake packet with next state set to status, followed by an empty
/// status request packet.
///
/// https://github.com/kiwiyou/craftping/blob/master/src/lib.rs#L73
fn build_status_request(hostname: &str, port: u16, protocol_version: i32) -> Vec<u8> {
    // buffer for the 1st packet's data part
    let mut buffer = vec![
        // 0 for handshake packet
        0x00,
    ];

    write_varint(&mut buffer, protocol_version);

    // Some server implementations require hostname and port to be properly set (Notchian does not)
    write_varint(&mut buffer, hostname.len() as i32);
    buffer.extend_from_slice(hostname.as_bytes());
    buffer.extend_from_slice(&port.to_be_bytes());
    // next state: 1 (status)
    buffer.push(0x01);

    let mut full_buffer = vec![];
    write_varint(&mut full_buffer, buffer.len() as i32);
    full_buffer.append(&mut buffer);
    full_buffer.extend_from_slice(&[
        1,    // length of 2nd packet id + data as VarInt
        0x00, // 2nd packet id: 0 for request as VarInt
    ]);

    full_buffer
}

fn write_varint(writer: &mut Vec<u8>, value: i32) {
    // negative numbers are sent as their two's complement, always 5 bytes
    let mut value = value as u32;
    loop {
        let byte = (value & 0b0111_1111) as u8;
        value >>= 7;
        if value == 0 {
            writer.push(byte);
            return;
        }
        writer.push(byte | 0b1000_0000);
    }
}

fn read_varint(reader: &mut Cursor<&[u8]>) -> Result<i32, ParseResponseError> {
    let mut buffer = [0];
    let mut ans: u32 = 0;
    for i in 0..5 {
        reader
            .read_exact(&mut buffer)
            .map_err(|_| ParseResponseError::Incomplete)?;
        ans |= u32::from(buffer[0] & 0b0111_1111) << (7 * i);
        if buffer[0] & 0b1000_0000 == 0 {
            return Ok(ans as i32);
        }
    }
    // varints are at most 5 bytes
    Err(ParseResponseError::Invalid)
}

/// Frame `json` the way a server frames its status response.
#[cfg(test)]
pub(crate) fn status_packet(json: &str) -> Vec<u8> {
    let mut data = vec![0x00];
    write_varint(&mut data, json.len() as i32);
    data.extend_from_slice(json.as_bytes());
    let mut packet = vec![];
    write_varint(&mut packet, data.len() as i32);
    packet.extend(data);
    packet
}
