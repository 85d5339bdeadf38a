//! Page identifier anonymization helpers.
//!
//! Visited paths are tracked only as base64 identifiers so raw URLs never
//! enter the store. The reverse mapping is best-effort and server-side only.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Encode a pathname into its anonymized identifier.
pub fn hash_path(pathname: &str) -> String {
    STANDARD.encode(pathname)
}

/// Reverse an anonymized identifier back to the original pathname.
///
/// Falls back to percent-decoding the decoded bytes, and finally to returning
/// the identifier itself when it cannot be decoded at all.
pub fn unhash_path(hash: &str) -> String {
    match STANDARD.decode(hash) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(path) => percent_decode(&path).unwrap_or(path),
            Err(_) => hash.to_string(),
        },
        Err(_) => hash.to_string(),
    }
}

/// Decode `%xx` escapes; returns None when the input contains none or is malformed.
fn percent_decode(input: &str) -> Option<String> {
    if !input.contains('%') {
        return None;
    }

    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            let hi = (hex[0] as char).to_digit(16)?;
            let lo = (hex[1] as char).to_digit(16)?;
            out.push((hi * 16 + lo) as u8);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(out).ok()
}
