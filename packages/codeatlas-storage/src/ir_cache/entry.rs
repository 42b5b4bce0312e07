//! Cache entry wire format.
//!
//! Fixed 26-byte header followed by a msgpack payload:
//!
//! ```text
//! magic(4) | format_version(2) | schema_version(8) | engine_version(8) | checksum(4)
//! ```
//!
//! Any header mismatch, short read or checksum failure is a miss, never an
//! error.

use byteorder::{ByteOrder, LittleEndian};
use codeatlas_ir::shared::constants::{ENGINE_VERSION, SCHEMA_VERSION};
use codeatlas_ir::IRDocument;
use sha2::{Digest, Sha256};

pub const MAGIC: [u8; 4] = *b"CAIR";
pub const FORMAT_VERSION: u16 = 1;
pub const HEADER_LEN: usize = 26;

/// Content-addressed cache key: changing the path, the file bytes, or either
/// version constant produces a different key.
pub fn cache_key(file_path: &str, content_hash_hex: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    hasher.update([0u8]);
    hasher.update(content_hash_hex.as_bytes());
    hasher.update(SCHEMA_VERSION.to_le_bytes());
    hasher.update(ENGINE_VERSION.to_le_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in &digest[..16] {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

fn payload_checksum(payload: &[u8]) -> u32 {
    let digest = Sha256::digest(payload);
    LittleEndian::read_u32(&digest[..4])
}

/// Serialize a document into header + msgpack payload.
pub fn encode(doc: &IRDocument) -> Result<Vec<u8>, String> {
    // Named-field msgpack: optional fields may be omitted on the wire.
    let payload = rmp_serde::to_vec_named(doc).map_err(|e| e.to_string())?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&MAGIC);
    let mut buf2 = [0u8; 2];
    LittleEndian::write_u16(&mut buf2, FORMAT_VERSION);
    out.extend_from_slice(&buf2);
    let mut buf8 = [0u8; 8];
    LittleEndian::write_u64(&mut buf8, SCHEMA_VERSION);
    out.extend_from_slice(&buf8);
    LittleEndian::write_u64(&mut buf8, ENGINE_VERSION);
    out.extend_from_slice(&buf8);
    let mut buf4 = [0u8; 4];
    LittleEndian::write_u32(&mut buf4, payload_checksum(&payload));
    out.extend_from_slice(&buf4);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Deserialize; `None` for anything corrupt, partial or version-mismatched.
pub fn decode(bytes: &[u8]) -> Option<IRDocument> {
    if bytes.len() < HEADER_LEN {
        return None;
    }
    if bytes[..4] != MAGIC {
        return None;
    }
    if LittleEndian::read_u16(&bytes[4..6]) != FORMAT_VERSION {
        return None;
    }
    if LittleEndian::read_u64(&bytes[6..14]) != SCHEMA_VERSION {
        return None;
    }
    if LittleEndian::read_u64(&bytes[14..22]) != ENGINE_VERSION {
        return None;
    }
    let checksum = LittleEndian::read_u32(&bytes[22..26]);
    let payload = &bytes[HEADER_LEN..];
    if payload_checksum(payload) != checksum {
        return None;
    }
    rmp_serde::from_slice(payload).ok()
}
