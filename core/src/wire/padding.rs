//! PKCS-style padding for the onion's inner payload (spec §6: "padding is
//! applied by the crypto layer's PKCS-style padder to the inner payload").
//!
//! Format: `data || 0x80 || 0x00..0x00`. The `0x80` marker disambiguates a
//! message that happens to end in zero bytes from the padding itself.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaddingError {
    #[error("message of {0} bytes exceeds the padding target of {1} bytes")]
    MessageTooLarge(usize, usize),
    #[error("padded buffer has no 0x80 marker")]
    InvalidPaddingFormat,
}

/// Pad `message` to exactly `target_size` bytes.
pub fn pad(message: &[u8], target_size: usize) -> Result<Vec<u8>, PaddingError> {
    if message.len() >= target_size {
        return Err(PaddingError::MessageTooLarge(message.len(), target_size));
    }

    let mut padded = Vec::with_capacity(target_size);
    padded.extend_from_slice(message);
    padded.push(0x80);
    padded.resize(target_size, 0x00);
    Ok(padded)
}

/// Recover the original message from a buffer produced by [`pad`].
pub fn unpad(padded: &[u8]) -> Result<Vec<u8>, PaddingError> {
    let marker_pos = padded
        .iter()
        .rposition(|&b| b == 0x80)
        .ok_or(PaddingError::InvalidPaddingFormat)?;

    if padded[marker_pos + 1..].iter().any(|&b| b != 0x00) {
        return Err(PaddingError::InvalidPaddingFormat);
    }

    Ok(padded[..marker_pos].to_vec())
}
