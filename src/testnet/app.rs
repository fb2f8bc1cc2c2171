use crate::client::{Ins, CLA};
use crate::core::SendMode;
use crate::error::{HostError, Result};
use crate::testnet::BlockPeer;
use crate::transport::{ApduHeader, Exchange, StatusWord};
use crate::utils::{pop_sized, sha256_concat, MAX_PATH_DEPTH};

pub const SIMULATED_APP_NAME: &str = "alamgu example";
pub const SIMULATED_APP_VERSION: (u8, u8, u8) = (0, 1, 0);

/// In-process stand-in for the signing application
///
/// Keys and signatures are deterministic digests of a seed, the packed
/// path and the transaction, so tests can predict every answer.
pub struct SimulatedApp {
    mode: SendMode,
    peer: BlockPeer,
    seed: [u8; 32],
    approve: bool,
    exchanges: usize,
    current_ins: Option<u8>,
}

impl SimulatedApp {
    pub fn new(mode: SendMode) -> Self {
        Self {
            mode,
            peer: BlockPeer::new(),
            seed: [0x5a; 32],
            approve: true,
            exchanges: 0,
            current_ins: None,
        }
    }

    pub fn with_peer(mut self, peer: BlockPeer) -> Self {
        self.peer = peer;
        self
    }

    /// Make every on-screen review come back declined
    pub fn rejecting(mut self) -> Self {
        self.approve = false;
        self
    }

    pub fn exchanges(&self) -> usize {
        self.exchanges
    }

    pub fn public_key_for(&self, packed_path: &[u8]) -> Vec<u8> {
        sha256_concat(&[&self.seed, packed_path]).to_vec()
    }

    pub fn chain_code_for(&self, packed_path: &[u8]) -> Vec<u8> {
        sha256_concat(&[&self.public_key_for(packed_path), b"chain code"]).to_vec()
    }

    pub fn signature_for(&self, packed_path: &[u8], tx: &[u8]) -> Vec<u8> {
        let key = self.public_key_for(packed_path);
        let mut signature = sha256_concat(&[&key, tx]).to_vec();
        signature.extend_from_slice(&sha256_concat(&[tx, &key]));
        signature
    }

    fn dispatch(
        &self,
        ins: Ins,
        payloads: &[Vec<u8>],
    ) -> std::result::Result<Vec<u8>, StatusWord> {
        match ins {
            Ins::GetVersion => {
                let (major, minor, patch) = SIMULATED_APP_VERSION;
                let mut out = vec![major, minor, patch];
                out.extend_from_slice(SIMULATED_APP_NAME.as_bytes());
                Ok(out)
            }
            Ins::GetPublicKey | Ins::VerifyAddress => {
                let path = payloads.first().ok_or(StatusWord::WrongApduLength)?;
                check_path(path)?;
                if ins == Ins::VerifyAddress && !self.approve {
                    return Err(StatusWord::Deny);
                }
                let key = self.public_key_for(path);
                let chain_code = self.chain_code_for(path);
                let mut out = vec![key.len() as u8];
                out.extend_from_slice(&key);
                out.push(chain_code.len() as u8);
                out.extend_from_slice(&chain_code);
                Ok(out)
            }
            Ins::SignTx => {
                if payloads.len() != 2 {
                    return Err(StatusWord::WrongApduLength);
                }
                let (len_bytes, tx) =
                    pop_sized(&payloads[0], 4).map_err(|_| StatusWord::WrongTxLength)?;
                let declared =
                    u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]);
                if declared as usize != tx.len() {
                    return Err(StatusWord::WrongTxLength);
                }
                check_path(&payloads[1])?;
                if !self.approve {
                    return Err(StatusWord::Deny);
                }
                Ok(self.signature_for(&payloads[1], tx))
            }
        }
    }
}

fn check_path(packed: &[u8]) -> std::result::Result<(), StatusWord> {
    match packed.split_first() {
        Some((count, rest))
            if (*count as usize) <= MAX_PATH_DEPTH && rest.len() == 4 * *count as usize =>
        {
            Ok(())
        }
        _ => Err(StatusWord::DisplayBip32PathFail),
    }
}

fn peer_error(status: StatusWord) -> HostError {
    HostError::Peer {
        status,
        data: Vec::new(),
    }
}

impl Exchange for SimulatedApp {
    fn exchange(&mut self, header: &ApduHeader, data: &[u8]) -> Result<Vec<u8>> {
        self.exchanges += 1;
        if header.cla != CLA {
            return Err(peer_error(StatusWord::ClaNotSupported));
        }
        if header.p1 != 0 || header.p2 != 0 {
            return Err(peer_error(StatusWord::WrongP1P2));
        }
        let ins = Ins::try_from(header.ins).map_err(|_| peer_error(StatusWord::InsNotSupported))?;

        match self.mode {
            SendMode::Simple => {
                if ins == Ins::SignTx {
                    return Err(peer_error(StatusWord::InsNotSupported));
                }
                self.dispatch(ins, &[data.to_vec()]).map_err(peer_error)
            }
            SendMode::Blocks => {
                // Instruction must stay the same for the whole operation
                if !self.peer.is_idle() && self.current_ins != Some(header.ins) {
                    self.peer.reset();
                    self.current_ins = None;
                    return Err(peer_error(StatusWord::BadState));
                }
                self.current_ins = Some(header.ins);

                let mut peer = std::mem::take(&mut self.peer);
                let reply = peer.handle(data, |payloads| self.dispatch(ins, payloads));
                self.peer = peer;
                if self.peer.is_idle() {
                    self.current_ins = None;
                }
                reply
            }
        }
    }
}
