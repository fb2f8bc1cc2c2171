use crate::config::Settings;
use crate::core::SendMode;
use crate::error::{HostError, Result};
use crate::transport::{ApduHeader, Exchange};
use crate::utils::{pop_size_prefixed, DerivationPath};
use log::info;
use serde::Serialize;
use std::fmt;

pub const CLA: u8 = 0x00;
pub const P1: u8 = 0x00;
pub const P2: u8 = 0x00;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Ins {
    GetVersion = 0x00,
    VerifyAddress = 0x01,
    GetPublicKey = 0x02,
    SignTx = 0x03,
}

impl TryFrom<u8> for Ins {
    type Error = HostError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Ins::GetVersion),
            0x01 => Ok(Ins::VerifyAddress),
            0x02 => Ok(Ins::GetPublicKey),
            0x03 => Ok(Ins::SignTx),
            other => Err(HostError::Protocol(format!(
                "unknown instruction {other:#04x}"
            ))),
        }
    }
}

impl Ins {
    pub fn header(self) -> ApduHeader {
        ApduHeader::new(CLA, self as u8, P1, P2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub name: String,
}

impl AppVersion {
    /// Three version bytes followed by the ASCII application name
    pub fn parse(response: &[u8]) -> Result<AppVersion> {
        if response.len() < 3 {
            return Err(HostError::Protocol(format!(
                "version response too short: {} bytes",
                response.len()
            )));
        }
        let name = String::from_utf8(response[3..].to_vec())
            .map_err(|e| HostError::Protocol(format!("application name is not text: {e}")))?;
        if !name.is_ascii() {
            return Err(HostError::Protocol(
                "application name is not ASCII".to_string(),
            ));
        }
        Ok(AppVersion {
            major: response[0],
            minor: response[1],
            patch: response[2],
            name,
        })
    }
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}.{}", self.name, self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicKeyResponse {
    #[serde(serialize_with = "hex::serde::serialize")]
    pub public_key: Vec<u8>,
    #[serde(serialize_with = "hex::serde::serialize")]
    pub chain_code: Vec<u8>,
}

impl PublicKeyResponse {
    /// Two size-prefixed fields: key, then chain code
    pub fn parse(response: &[u8]) -> Result<PublicKeyResponse> {
        let (public_key, rest) = pop_size_prefixed(response)?;
        let (chain_code, rest) = pop_size_prefixed(rest)?;
        if !rest.is_empty() {
            return Err(HostError::Protocol(format!(
                "{} trailing bytes after public key response",
                rest.len()
            )));
        }
        Ok(PublicKeyResponse {
            public_key: public_key.to_vec(),
            chain_code: chain_code.to_vec(),
        })
    }
}

/// High-level calls against the signing application
pub struct AppClient<T: Exchange> {
    transport: T,
    settings: Settings,
    mode: SendMode,
}

impl<T: Exchange> AppClient<T> {
    pub fn new(transport: T, settings: Settings) -> AppClient<T> {
        let mode = SendMode::from_flag(settings.use_block_protocol);
        AppClient {
            transport,
            settings,
            mode,
        }
    }

    pub fn send_mode(&self) -> SendMode {
        self.mode
    }

    pub fn set_send_mode(&mut self, mode: SendMode) {
        self.mode = mode;
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn send(&mut self, ins: Ins, payloads: &[Vec<u8>]) -> Result<Vec<u8>> {
        // The mode is fixed for the whole operation
        let strategy = self.mode.strategy(&self.settings);
        strategy.send(&mut self.transport, &ins.header(), payloads)
    }

    pub fn get_app_and_version(&mut self) -> Result<AppVersion> {
        let response = self.send(Ins::GetVersion, &[Vec::new()])?;
        let version = AppVersion::parse(&response)?;
        info!("Connected to {version}");
        Ok(version)
    }

    pub fn get_public_key(&mut self, path: &DerivationPath) -> Result<PublicKeyResponse> {
        let response = self.send(Ins::GetPublicKey, &[path.pack()])?;
        PublicKeyResponse::parse(&response)
    }

    /// Same as `get_public_key` but the device shows the key for approval
    pub fn get_public_key_with_confirmation(
        &mut self,
        path: &DerivationPath,
    ) -> Result<PublicKeyResponse> {
        let response = self.send(Ins::VerifyAddress, &[path.pack()])?;
        PublicKeyResponse::parse(&response)
    }

    pub fn sign_tx(&mut self, path: &DerivationPath, tx: &[u8]) -> Result<Vec<u8>> {
        let len = u32::try_from(tx.len()).map_err(|_| {
            HostError::Encoding(format!("transaction of {} bytes is too large", tx.len()))
        })?;
        let mut framed = Vec::with_capacity(4 + tx.len());
        framed.extend_from_slice(&len.to_le_bytes());
        framed.extend_from_slice(tx);

        info!(
            "Signing {} byte transaction with {} over {} mode",
            tx.len(),
            path,
            self.mode
        );
        self.send(Ins::SignTx, &[framed, path.pack()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PeerMessage;
    use crate::testnet::ScriptedPeer;
    use crate::transport::StatusWord;

    #[test]
    fn test_version_parsing() {
        let mut response = vec![1, 2, 3];
        response.extend_from_slice(b"demo");
        let version = AppVersion::parse(&response).unwrap();
        assert_eq!(version.to_string(), "demo 1.2.3");
        assert!(AppVersion::parse(&[1, 2]).unwrap_err().is_protocol());
    }

    #[test]
    fn test_public_key_parsing() {
        let response = [2, 0xaa, 0xbb, 1, 0xcc];
        let parsed = PublicKeyResponse::parse(&response).unwrap();
        assert_eq!(parsed.public_key, vec![0xaa, 0xbb]);
        assert_eq!(parsed.chain_code, vec![0xcc]);
        assert!(PublicKeyResponse::parse(&[2, 0xaa, 0xbb, 1, 0xcc, 0])
            .unwrap_err()
            .is_protocol());
    }

    #[test]
    fn test_instruction_roundtrip() {
        for ins in [Ins::GetVersion, Ins::VerifyAddress, Ins::GetPublicKey, Ins::SignTx] {
            assert_eq!(Ins::try_from(ins as u8).unwrap(), ins);
        }
        assert!(Ins::try_from(9).is_err());
    }

    #[test]
    fn test_sign_frames_length_then_path() {
        let mut peer = ScriptedPeer::new();
        peer.queue_response(vec![0x55; 64]);
        let mut client = AppClient::new(peer, Settings::default());

        let path: DerivationPath = "m/44'/0'".parse().unwrap();
        let signature = client.sign_tx(&path, b"abc").unwrap();
        assert_eq!(signature, vec![0x55; 64]);

        let peer = client.into_transport();
        let mut expected = vec![3, 0, 0, 0];
        expected.extend_from_slice(b"abc");
        expected.extend_from_slice(&path.pack());
        assert_eq!(peer.sent(), &[expected]);
        assert_eq!(peer.headers()[0].ins, Ins::SignTx as u8);
    }

    #[test]
    fn test_block_mode_sends_start() {
        let mut peer = ScriptedPeer::new();
        let mut response = vec![0, 1, 0];
        response.extend_from_slice(b"app");
        peer.queue_response(PeerMessage::Final(response).encode());

        let mut client = AppClient::new(peer, Settings::default());
        client.set_send_mode(SendMode::Blocks);
        let version = client.get_app_and_version().unwrap();
        assert_eq!(version.name, "app");

        // One empty payload means a single sentinel root
        let sent = client.transport().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].len(), 33);
        assert!(sent[0][1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_peer_status_is_forwarded() {
        let mut peer = ScriptedPeer::new();
        peer.queue_error(HostError::Peer {
            status: StatusWord::Deny,
            data: Vec::new(),
        });
        let mut client = AppClient::new(peer, Settings::default());
        let path: DerivationPath = "m/44'".parse().unwrap();

        let err = client.get_public_key_with_confirmation(&path).unwrap_err();
        assert_eq!(err.status(), Some(StatusWord::Deny));
    }
}
