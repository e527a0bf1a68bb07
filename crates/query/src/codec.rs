//! Server List Ping framing.
//!
//! Every packet is `VarInt length | VarInt packet id | payload`. Strings are
//! `VarInt byte length | UTF-8 bytes`.

use crate::QueryError;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Protocol version sent in the handshake. Servers answer status requests
/// regardless of the version, so any recent value works.
pub const HANDSHAKE_PROTOCOL_VERSION: i32 = 47;
/// Handshake "next state" value selecting the status flow
const NEXT_STATE_STATUS: i32 = 1;
/// Largest status packet accepted
pub const MAX_PACKET_LEN: usize = 4 * 1024 * 1024;

pub fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7F == 0 {
            buf.push(value as u8);
            return;
        }
        buf.push(((value & 0x7F) | 0x80) as u8);
        value >>= 7;
    }
}

/// Decode a VarInt from the front of `input`, returning it and the bytes used
pub fn read_varint_slice(input: &[u8]) -> Result<(i32, usize), QueryError> {
    let mut result: u32 = 0;
    for (i, byte) in input.iter().enumerate().take(5) {
        result |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((result as i32, i + 1));
        }
    }
    if input.len() < 5 {
        Err(QueryError::Protocol("truncated VarInt".to_string()))
    } else {
        Err(QueryError::Protocol("VarInt longer than 5 bytes".to_string()))
    }
}

pub async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32, QueryError> {
    let mut result: u32 = 0;
    for i in 0..5 {
        let byte = reader.read_u8().await?;
        result |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(result as i32);
        }
    }
    Err(QueryError::Protocol("VarInt longer than 5 bytes".to_string()))
}

fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_varint(buf, value.len() as i32);
    buf.extend_from_slice(value.as_bytes());
}

fn frame(packet_id: i32, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 1);
    write_varint(&mut body, packet_id);
    body.extend_from_slice(payload);

    let mut packet = Vec::with_capacity(body.len() + 5);
    write_varint(&mut packet, body.len() as i32);
    packet.extend_from_slice(&body);
    packet
}

/// Handshake packet announcing a status request for `host:port`
pub fn handshake_packet(host: &str, port: u16) -> Vec<u8> {
    let mut payload = Vec::new();
    write_varint(&mut payload, HANDSHAKE_PROTOCOL_VERSION);
    write_string(&mut payload, host);
    payload.extend_from_slice(&port.to_be_bytes());
    write_varint(&mut payload, NEXT_STATE_STATUS);
    frame(0x00, &payload)
}

/// Empty status request
pub fn status_request_packet() -> Vec<u8> {
    frame(0x00, &[])
}

/// Read one status response packet and return its JSON payload
pub async fn read_status_response<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<String, QueryError> {
    let len = read_varint(reader).await?;
    if len <= 0 || len as usize > MAX_PACKET_LEN {
        return Err(QueryError::Protocol(format!("bad packet length {}", len)));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    decode_status_body(&body)
}

/// Decode a status response body (packet id + JSON string)
pub fn decode_status_body(body: &[u8]) -> Result<String, QueryError> {
    let (packet_id, used) = read_varint_slice(body)?;
    if packet_id != 0x00 {
        return Err(QueryError::Protocol(format!(
            "unexpected packet id 0x{:02x}",
            packet_id
        )));
    }
    let rest = &body[used..];
    let (str_len, used) = read_varint_slice(rest)?;
    if str_len < 0 {
        return Err(QueryError::Protocol("negative string length".to_string()));
    }
    let text = rest
        .get(used..used + str_len as usize)
        .ok_or_else(|| QueryError::Protocol("status string truncated".to_string()))?;
    String::from_utf8(text.to_vec())
        .map_err(|_| QueryError::Protocol("status string is not UTF-8".to_string()))
}
