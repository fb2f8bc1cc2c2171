use crate::error::{HostError, Result};
use crate::transport::{ApduHeader, Exchange};
use log::debug;

/// Stream `payloads` to the peer as consecutive raw frames
///
/// The payloads are concatenated and cut into frames of at most
/// `max_frame` bytes. Only the last response is returned. An empty payload
/// still costs one empty frame so the peer gets a round trip to answer.
pub fn send_chunks<T, P>(
    transport: &mut T,
    header: &ApduHeader,
    payloads: &[P],
    max_frame: usize,
) -> Result<Vec<u8>>
where
    T: Exchange + ?Sized,
    P: AsRef<[u8]>,
{
    if max_frame == 0 {
        return Err(HostError::Config("frame size must be positive".to_string()));
    }

    let buffer: Vec<u8> = payloads
        .iter()
        .flat_map(|payload| payload.as_ref().iter().copied())
        .collect();

    let mut frames: Vec<&[u8]> = buffer.chunks(max_frame).collect();
    if frames.is_empty() {
        frames.push(&[]);
    }

    debug!(
        "sending {} bytes as {} frame(s) to ins={:#04x}",
        buffer.len(),
        frames.len(),
        header.ins
    );

    let mut result = Vec::new();
    for frame in frames {
        result = transport.exchange(header, frame)?;
    }
    Ok(result)
}
