//! Single-blob framing for compressed content handed to persistence
//!
//! Layout (little-endian):
//! `magic[4] | header_len: u32 | header | original_len: u64 | bit_len: u64 | bits`

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::huffman::{self, EncodedPayload};
use crate::error::{EngineError, Result};

const MAGIC: &[u8; 4] = b"SGH1";

/// Frame an encoded payload as one contiguous blob
pub fn to_blob(payload: &EncodedPayload) -> Bytes {
    let mut buf = BytesMut::with_capacity(4 + 4 + payload.header.len() + 16 + payload.bits.len());
    buf.put_slice(MAGIC);
    buf.put_u32_le(payload.header.len() as u32);
    buf.put_slice(&payload.header);
    buf.put_u64_le(payload.original_len);
    buf.put_u64_le(payload.bit_len);
    buf.put_slice(&payload.bits);
    buf.freeze()
}

/// Parse a blob produced by [`to_blob`]; the payload itself is not decoded
pub fn from_blob(blob: &[u8]) -> Result<EncodedPayload> {
    let mut buf = blob;

    if buf.remaining() < MAGIC.len() + 4 || &buf[..MAGIC.len()] != MAGIC {
        return Err(EngineError::malformed("missing content blob magic"));
    }
    buf.advance(MAGIC.len());

    let header_len = buf.get_u32_le() as usize;
    if buf.remaining() < header_len + 16 {
        return Err(EngineError::malformed(format!(
            "blob too short for {} byte header",
            header_len
        )));
    }
    let header = buf.copy_to_bytes(header_len);
    let original_len = buf.get_u64_le();
    let bit_len = buf.get_u64_le();
    let bits = buf.copy_to_bytes(buf.remaining());

    Ok(EncodedPayload {
        bits,
        bit_len,
        header,
        original_len,
    })
}

/// Encode and frame in one step
pub fn compress(content: &[u8]) -> Result<Bytes> {
    Ok(to_blob(&huffman::encode(content)?))
}

/// Parse and decode in one step
pub fn decompress(blob: &[u8]) -> Result<Vec<u8>> {
    huffman::decode(&from_blob(blob)?)
}
