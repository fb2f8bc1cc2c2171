use crate::error::{HostError, Result};

/// Take `size` bytes off the front of `buffer`, returning `(field, rest)`
pub fn pop_sized(buffer: &[u8], size: usize) -> Result<(&[u8], &[u8])> {
    if buffer.len() < size {
        return Err(HostError::Protocol(format!(
            "expected {size} bytes, only {} left",
            buffer.len()
        )));
    }
    Ok(buffer.split_at(size))
}

/// Take a one-byte length prefix and that many bytes off the front of `buffer`
pub fn pop_size_prefixed(buffer: &[u8]) -> Result<(&[u8], &[u8])> {
    let (len, rest) = buffer
        .split_first()
        .ok_or_else(|| HostError::Protocol("missing length prefix".to_string()))?;
    pop_sized(rest, *len as usize)
}
