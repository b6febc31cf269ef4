//! PKCS#7 padding for block-mode schemes

use crate::error::{Error, Result};

/// PKCS#7 stores the pad length in one byte
fn check_block_size(block_size: usize) -> Result<()> {
    if !(1..=255).contains(&block_size) {
        return Err(Error::InvalidPadding(format!(
            "block size {} is outside 1..=255",
            block_size
        )));
    }
    Ok(())
}

/// Append PKCS#7 padding, always adding between 1 and `block_size` bytes
pub fn pkcs7_pad(data: &[u8], block_size: usize) -> Result<Vec<u8>> {
    check_block_size(block_size)?;
    let pad_len = block_size - (data.len() % block_size);
    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    padded.resize(data.len() + pad_len, pad_len as u8);
    Ok(padded)
}

/// Strip and validate PKCS#7 padding
pub fn pkcs7_unpad(data: &[u8], block_size: usize) -> Result<&[u8]> {
    check_block_size(block_size)?;
    if data.is_empty() || data.len() % block_size != 0 {
        return Err(Error::InvalidPadding(format!(
            "length {} is not a positive multiple of {}",
            data.len(),
            block_size
        )));
    }

    let pad_len = data[data.len() - 1] as usize;
    if pad_len == 0 || pad_len > block_size {
        return Err(Error::InvalidPadding(format!("bad pad length {}", pad_len)));
    }

    let (body, padding) = data.split_at(data.len() - pad_len);
    if padding.iter().any(|&b| b as usize != pad_len) {
        return Err(Error::InvalidPadding("inconsistent pad bytes".to_string()));
    }

    Ok(body)
}
