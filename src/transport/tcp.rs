use crate::error::{HostError, Result};
use crate::transport::status::{check, StatusWord};
use crate::transport::{encode_apdu, ApduHeader, Exchange};
use log::{debug, trace};
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

/// APDU transport over an emulator socket
///
/// Requests go out as a 4-byte big-endian length followed by the command
/// frame. Responses come back as a 4-byte big-endian body length, the body,
/// and a 2-byte status word that the length does not count.
pub struct TcpTransport {
    stream: TcpStream,
    addr: SocketAddr,
}

impl TcpTransport {
    /// Connect with `timeout` applied to the connect and to every read/write
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self> {
        let addr = addr
            .parse::<SocketAddr>()
            .map_err(|e| HostError::Config(format!("Invalid address {addr}: {e}")))?;

        let stream = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|e| HostError::Transport(format!("Failed to connect to {addr}: {e}")))?;
        Self::from_stream(stream, timeout)
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: TcpStream, timeout: Duration) -> Result<Self> {
        let addr = stream
            .peer_addr()
            .map_err(|e| HostError::Transport(format!("Failed to get peer address: {e}")))?;

        stream
            .set_read_timeout(Some(timeout))
            .map_err(|e| HostError::Transport(format!("Failed to set read timeout: {e}")))?;
        stream
            .set_write_timeout(Some(timeout))
            .map_err(|e| HostError::Transport(format!("Failed to set write timeout: {e}")))?;
        let _ = stream.set_nodelay(true);

        debug!("Connected to APDU endpoint {addr}");
        Ok(Self { stream, addr })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.stream.read_exact(buf).map_err(|e| match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                HostError::Timeout(format!("no response from {} within the round timeout", self.addr))
            }
            ErrorKind::UnexpectedEof => {
                HostError::Transport(format!("{} closed the connection", self.addr))
            }
            _ => HostError::Transport(format!("Failed to read from {}: {e}", self.addr)),
        })
    }
}

impl Exchange for TcpTransport {
    fn exchange(&mut self, header: &ApduHeader, data: &[u8]) -> Result<Vec<u8>> {
        let apdu = encode_apdu(header, data)?;
        trace!("=> {}", hex::encode(&apdu));

        let mut request = Vec::with_capacity(4 + apdu.len());
        request.extend_from_slice(&(apdu.len() as u32).to_be_bytes());
        request.extend_from_slice(&apdu);
        self.stream
            .write_all(&request)
            .and_then(|_| self.stream.flush())
            .map_err(|e| HostError::Transport(format!("Failed to send to {}: {e}", self.addr)))?;

        let mut len_bytes = [0u8; 4];
        self.read_exact(&mut len_bytes)?;
        let body_len = u32::from_be_bytes(len_bytes) as usize;
        if body_len > u16::MAX as usize {
            return Err(HostError::Transport(format!(
                "response length {body_len} is not a valid frame"
            )));
        }

        let mut body = vec![0u8; body_len + 2];
        self.read_exact(&mut body)?;
        trace!("<= {}", hex::encode(&body));

        let sw = u16::from_be_bytes([body[body_len], body[body_len + 1]]);
        body.truncate(body_len);
        check(&body, StatusWord::from(sw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn serve_once(reply: Vec<u8>) -> (SocketAddr, thread::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut len = [0u8; 4];
            stream.read_exact(&mut len).unwrap();
            let mut apdu = vec![0u8; u32::from_be_bytes(len) as usize];
            stream.read_exact(&mut apdu).unwrap();
            stream.write_all(&reply).unwrap();
            apdu
        });
        (addr, handle)
    }

    #[test]
    fn test_exchange_frames_request_and_response() {
        let mut reply = vec![0, 0, 0, 3];
        reply.extend_from_slice(&[1, 2, 3, 0x90, 0x00]);
        let (addr, handle) = serve_once(reply);

        let mut transport =
            TcpTransport::connect(&addr.to_string(), Duration::from_secs(5)).unwrap();
        let header = ApduHeader::new(0, 2, 0, 0);
        let body = transport.exchange(&header, &[0xaa]).unwrap();

        assert_eq!(body, vec![1, 2, 3]);
        assert_eq!(handle.join().unwrap(), vec![0, 2, 0, 0, 1, 0xaa]);
    }

    #[test]
    fn test_exchange_surfaces_status_word() {
        let reply = vec![0, 0, 0, 0, 0x69, 0x85];
        let (addr, handle) = serve_once(reply);

        let mut transport =
            TcpTransport::connect(&addr.to_string(), Duration::from_secs(5)).unwrap();
        let err = transport
            .exchange(&ApduHeader::new(0, 3, 0, 0), &[])
            .unwrap_err();

        assert_eq!(err.status(), Some(StatusWord::Deny));
        handle.join().unwrap();
    }

    #[test]
    fn test_closed_connection_is_transport_error() {
        let reply = vec![0, 0];
        let (addr, handle) = serve_once(reply);

        let mut transport =
            TcpTransport::connect(&addr.to_string(), Duration::from_secs(5)).unwrap();
        let err = transport
            .exchange(&ApduHeader::new(0, 0, 0, 0), &[])
            .unwrap_err();

        assert!(err.is_transport());
        handle.join().unwrap();
    }

    #[test]
    fn test_invalid_address() {
        let result = TcpTransport::connect("not-an-address", Duration::from_secs(1));
        assert!(matches!(result, Err(HostError::Config(_))));
    }
}
