//! Transport boundary
//!
//! Everything above this module sees the device as a single
//! `exchange(header, body) -> body` call. Implementations translate link
//! failures into `HostError::Transport` and non-success status words into
//! `HostError::Peer`.

pub mod status;
pub mod tcp;

pub use status::StatusWord;
pub use tcp::TcpTransport;

use crate::error::{HostError, Result};

/// Largest body a single command frame can carry
pub const MAX_APDU_DATA_LEN: usize = 255;

/// Command header sent with every frame of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApduHeader {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
}

impl ApduHeader {
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self { cla, ins, p1, p2 }
    }
}

/// Serialize a command frame: `cla ins p1 p2 lc data`
pub fn encode_apdu(header: &ApduHeader, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_APDU_DATA_LEN {
        return Err(HostError::Encoding(format!(
            "frame body of {} bytes exceeds {MAX_APDU_DATA_LEN}",
            data.len()
        )));
    }
    let mut frame = Vec::with_capacity(5 + data.len());
    frame.extend_from_slice(&[header.cla, header.ins, header.p1, header.p2]);
    frame.push(data.len() as u8);
    frame.extend_from_slice(data);
    Ok(frame)
}

/// A half-duplex request/response channel to the peer
pub trait Exchange {
    /// Send one frame and block until its response arrives
    fn exchange(&mut self, header: &ApduHeader, data: &[u8]) -> Result<Vec<u8>>;
}

impl<T: Exchange + ?Sized> Exchange for &mut T {
    fn exchange(&mut self, header: &ApduHeader, data: &[u8]) -> Result<Vec<u8>> {
        (**self).exchange(header, data)
    }
}

impl<T: Exchange + ?Sized> Exchange for Box<T> {
    fn exchange(&mut self, header: &ApduHeader, data: &[u8]) -> Result<Vec<u8>> {
        (**self).exchange(header, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_apdu() {
        let header = ApduHeader::new(0x00, 0x03, 0x00, 0x00);
        let frame = encode_apdu(&header, &[0xaa, 0xbb]).unwrap();
        assert_eq!(frame, vec![0x00, 0x03, 0x00, 0x00, 0x02, 0xaa, 0xbb]);
    }

    #[test]
    fn test_encode_apdu_rejects_oversized_body() {
        let header = ApduHeader::new(0, 0, 0, 0);
        let result = encode_apdu(&header, &[0u8; MAX_APDU_DATA_LEN + 1]);
        assert!(matches!(result, Err(HostError::Encoding(_))));
    }
}
