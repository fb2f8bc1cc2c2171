//! Block protocol driver
//!
//! The host opens an operation with `START || roots` and then answers
//! whatever the peer asks for until the peer sends `FINAL`. The peer drives:
//! it pulls chunks by hash, pushes chunks it wants the host to hold, and
//! streams its result back in fragments.

use crate::core::chunk::{link_payloads, ChunkHash};
use crate::core::message::{HostMessage, PeerMessage};
use crate::core::ChunkStore;
use crate::error::{HostError, Result};
use crate::transport::{ApduHeader, Exchange, MAX_APDU_DATA_LEN};
use log::{debug, info, warn};
use std::time::{Duration, Instant};
use zeroize::Zeroize;

pub const DEFAULT_MAX_ROUNDS: usize = 10_000;
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Budgets that guarantee a run ends even against a misbehaving peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolLimits {
    /// Exchanges allowed in one operation, the START round included
    pub max_rounds: usize,
    /// Wall-clock budget for the whole operation
    pub operation_timeout: Duration,
}

impl Default for ProtocolLimits {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// START not yet built
    Sending,
    /// Waiting for (or dispatching) the peer's next message
    AwaitingPeer,
    Done,
    Failed,
}

/// Outcome of dispatching one peer message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Reply(HostMessage),
    Finished(Vec<u8>),
}

pub struct BlockProtocol {
    header: ApduHeader,
    store: ChunkStore,
    roots: Vec<ChunkHash>,
    limits: ProtocolLimits,
    state: DriverState,
    result: Vec<u8>,
    rounds: usize,
    missing: Vec<ChunkHash>,
    // Set while the outstanding request is a CHUNK_NOT_FOUND reply
    unanswered_miss: Option<ChunkHash>,
}

impl BlockProtocol {
    /// Driver over an already populated store
    pub fn new(
        header: ApduHeader,
        store: ChunkStore,
        roots: Vec<ChunkHash>,
        limits: ProtocolLimits,
    ) -> Self {
        Self {
            header,
            store,
            roots,
            limits,
            state: DriverState::Sending,
            result: Vec::new(),
            rounds: 0,
            missing: Vec::new(),
            unanswered_miss: None,
        }
    }

    /// Chunk `payloads` into a fresh store and build a driver over it
    pub fn from_payloads<P: AsRef<[u8]>>(
        header: ApduHeader,
        payloads: &[P],
        chunk_size: usize,
        limits: ProtocolLimits,
    ) -> Result<Self> {
        let mut store = ChunkStore::new();
        let roots = link_payloads(payloads, chunk_size, &mut store)?;
        Ok(Self::new(header, store, roots, limits))
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn roots(&self) -> &[ChunkHash] {
        &self.roots
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Hashes the peer asked for that the host could not serve
    pub fn missing_chunks(&self) -> &[ChunkHash] {
        &self.missing
    }

    /// Build the opening request and start waiting on the peer
    pub fn begin(&mut self) -> Result<Vec<u8>> {
        if self.state != DriverState::Sending {
            return Err(HostError::Protocol(format!(
                "cannot start an operation in state {:?}",
                self.state
            )));
        }
        let body = HostMessage::Start(self.roots.clone()).encode();
        if body.len() > MAX_APDU_DATA_LEN {
            let err = HostError::Encoding(format!(
                "{} root hashes do not fit in one frame",
                self.roots.len()
            ));
            return Err(self.fail(err));
        }
        self.state = DriverState::AwaitingPeer;
        Ok(body)
    }

    /// Dispatch one peer response
    pub fn step(&mut self, response: &[u8]) -> Result<Step> {
        if self.state != DriverState::AwaitingPeer {
            return Err(HostError::Protocol(format!(
                "response arrived in state {:?}",
                self.state
            )));
        }

        self.unanswered_miss = None;
        let message = match PeerMessage::decode(response) {
            Ok(message) => message,
            Err(e) => return Err(self.fail(e)),
        };

        let step = match message {
            PeerMessage::Accumulate(fragment) => self.on_accumulate(fragment),
            PeerMessage::Final(fragment) => self.on_final(fragment),
            PeerMessage::GetChunk(hash) => self.on_get_chunk(hash),
            PeerMessage::PutChunk(chunk) => self.on_put_chunk(chunk),
        };
        Ok(step)
    }

    fn on_accumulate(&mut self, fragment: Vec<u8>) -> Step {
        debug!("peer accumulated {} bytes", fragment.len());
        self.result.extend_from_slice(&fragment);
        Step::Reply(HostMessage::AccumulateAck)
    }

    fn on_final(&mut self, fragment: Vec<u8>) -> Step {
        self.result.extend_from_slice(&fragment);
        self.state = DriverState::Done;
        Step::Finished(std::mem::take(&mut self.result))
    }

    fn on_get_chunk(&mut self, hash: ChunkHash) -> Step {
        match self.store.get(&hash) {
            Some(chunk) => {
                debug!("serving chunk {hash} ({} bytes)", chunk.len());
                Step::Reply(HostMessage::ChunkFound(chunk.to_vec()))
            }
            None => {
                warn!("peer requested unknown chunk {hash}");
                self.missing.push(hash);
                self.unanswered_miss = Some(hash);
                Step::Reply(HostMessage::ChunkNotFound)
            }
        }
    }

    fn on_put_chunk(&mut self, chunk: Vec<u8>) -> Step {
        let hash = self.store.put(chunk);
        debug!("peer pushed chunk {hash}");
        Step::Reply(HostMessage::PutChunkAck)
    }

    /// Enter `Failed`, drop any partial result, and shape the error
    fn fail(&mut self, err: HostError) -> HostError {
        self.state = DriverState::Failed;
        self.result.zeroize();
        self.result.clear();

        // Only a failure answering the CHUNK_NOT_FOUND reply is blamed on the miss
        match (err, self.unanswered_miss.take()) {
            (HostError::Peer { status, data }, Some(hash)) => HostError::ChunkNotFound {
                hash: hash.to_hex(),
                status,
                data,
            },
            (err, _) => err,
        }
    }

    /// Drive the whole exchange; the store is dropped with the driver
    pub fn run<T: Exchange + ?Sized>(mut self, transport: &mut T) -> Result<Vec<u8>> {
        let deadline = Instant::now() + self.limits.operation_timeout;
        info!(
            "block transfer ins={:#04x}: {} roots, {} chunks",
            self.header.ins,
            self.roots.len(),
            self.store.len()
        );

        let mut request = self.begin()?;
        loop {
            if self.rounds >= self.limits.max_rounds {
                let err = HostError::RoundLimit {
                    rounds: self.limits.max_rounds,
                };
                return Err(self.fail(err));
            }
            if Instant::now() >= deadline {
                let err = HostError::Timeout(format!(
                    "block transfer exceeded {:?} after {} rounds",
                    self.limits.operation_timeout, self.rounds
                ));
                return Err(self.fail(err));
            }
            if request.len() > MAX_APDU_DATA_LEN {
                let err = HostError::Encoding(format!(
                    "reply of {} bytes does not fit in one frame",
                    request.len()
                ));
                return Err(self.fail(err));
            }

            self.rounds += 1;
            let response = match transport.exchange(&self.header, &request) {
                Ok(response) => response,
                Err(e) => return Err(self.fail(e)),
            };

            match self.step(&response)? {
                Step::Reply(message) => request = message.encode(),
                Step::Finished(result) => {
                    info!(
                        "block transfer finished after {} rounds, {} result bytes",
                        self.rounds,
                        result.len()
                    );
                    return Ok(result);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chunk::DEFAULT_CHUNK_SIZE;
    use crate::core::message::peer_tag;
    use crate::testnet::ScriptedPeer;
    use crate::transport::StatusWord;

    fn header() -> ApduHeader {
        ApduHeader::new(0, 3, 0, 0)
    }

    fn started(payloads: &[&[u8]]) -> BlockProtocol {
        let mut driver =
            BlockProtocol::from_payloads(header(), payloads, DEFAULT_CHUNK_SIZE, ProtocolLimits::default())
                .unwrap();
        driver.begin().unwrap();
        driver
    }

    fn get_chunk(hash: &ChunkHash) -> Vec<u8> {
        PeerMessage::GetChunk(*hash).encode()
    }

    #[test]
    fn test_begin_sends_roots_in_order() {
        let mut driver = BlockProtocol::from_payloads(
            header(),
            &[b"tx".as_slice(), b"path".as_slice()],
            DEFAULT_CHUNK_SIZE,
            ProtocolLimits::default(),
        )
        .unwrap();
        assert_eq!(driver.state(), DriverState::Sending);

        let body = driver.begin().unwrap();
        assert_eq!(body.len(), 1 + 2 * 32);
        assert_eq!(&body[1..33], driver.roots()[0].as_bytes());
        assert_eq!(&body[33..], driver.roots()[1].as_bytes());
        assert_eq!(driver.state(), DriverState::AwaitingPeer);
    }

    #[test]
    fn test_get_chunk_serves_linked_bytes_verbatim() {
        let mut driver = started(&[b"smalltx"]);
        let root = driver.roots()[0];
        let stored = driver.store().get(&root).unwrap().to_vec();

        let step = driver.step(&get_chunk(&root)).unwrap();
        assert_eq!(step, Step::Reply(HostMessage::ChunkFound(stored)));
        assert_eq!(driver.state(), DriverState::AwaitingPeer);
    }

    #[test]
    fn test_unknown_chunk_is_not_fatal() {
        let mut driver = started(&[b"smalltx"]);
        let unknown = ChunkHash::new([0x42; 32]);

        let step = driver.step(&get_chunk(&unknown)).unwrap();
        assert_eq!(step, Step::Reply(HostMessage::ChunkNotFound));
        assert_eq!(driver.state(), DriverState::AwaitingPeer);
        assert_eq!(driver.missing_chunks(), &[unknown]);

        // The loop keeps going afterwards
        let step = driver.step(&[peer_tag::FINAL, 7]).unwrap();
        assert_eq!(step, Step::Finished(vec![7]));
    }

    #[test]
    fn test_push_then_pull_returns_same_bytes() {
        let mut driver = started(&[b"smalltx"]);
        let pushed = b"peer-side state".to_vec();

        let step = driver.step(&PeerMessage::PutChunk(pushed.clone()).encode()).unwrap();
        assert_eq!(step, Step::Reply(HostMessage::PutChunkAck));

        let step = driver.step(&get_chunk(&ChunkHash::of(&pushed))).unwrap();
        assert_eq!(step, Step::Reply(HostMessage::ChunkFound(pushed)));
    }

    #[test]
    fn test_accumulation_order() {
        let mut driver = started(&[b"smalltx"]);

        for fragment in [b"ab", b"cd"] {
            let step = driver.step(&PeerMessage::Accumulate(fragment.to_vec()).encode()).unwrap();
            assert_eq!(step, Step::Reply(HostMessage::AccumulateAck));
        }
        let step = driver.step(&PeerMessage::Final(b"ef".to_vec()).encode()).unwrap();

        assert_eq!(step, Step::Finished(b"abcdef".to_vec()));
        assert_eq!(driver.state(), DriverState::Done);
    }

    #[test]
    fn test_unrecognized_tag_fails() {
        let mut driver = started(&[b"smalltx"]);
        driver.step(&PeerMessage::Accumulate(b"partial".to_vec()).encode()).unwrap();

        let err = driver.step(&[0x09, 1, 2, 3]).unwrap_err();
        assert!(err.is_protocol());
        assert_eq!(driver.state(), DriverState::Failed);

        // No further dispatch after failure
        assert!(driver.step(&[peer_tag::FINAL]).unwrap_err().is_protocol());
    }

    #[test]
    fn test_response_after_done_is_rejected() {
        let mut driver = started(&[b"smalltx"]);
        driver.step(&[peer_tag::FINAL]).unwrap();
        assert!(driver.step(&[peer_tag::FINAL]).unwrap_err().is_protocol());
    }

    #[test]
    fn test_short_get_chunk_is_protocol_violation() {
        let mut driver = started(&[b"smalltx"]);
        let err = driver.step(&[peer_tag::GET_CHUNK, 1, 2]).unwrap_err();
        assert!(err.is_protocol());
        assert_eq!(driver.state(), DriverState::Failed);
    }

    #[test]
    fn test_too_many_roots_do_not_fit() {
        let payloads: Vec<Vec<u8>> = (0..8).map(|i| vec![i]).collect();
        let mut driver =
            BlockProtocol::from_payloads(header(), &payloads, DEFAULT_CHUNK_SIZE, ProtocolLimits::default())
                .unwrap();
        assert!(matches!(driver.begin(), Err(HostError::Encoding(_))));
        assert_eq!(driver.state(), DriverState::Failed);
    }

    #[test]
    fn test_run_stops_at_round_limit() {
        let mut peer = ScriptedPeer::new().repeating(PeerMessage::Accumulate(vec![1]).encode());
        let limits = ProtocolLimits {
            max_rounds: 5,
            operation_timeout: Duration::from_secs(30),
        };
        let driver =
            BlockProtocol::from_payloads(header(), &[b"tx"], DEFAULT_CHUNK_SIZE, limits).unwrap();

        let err = driver.run(&mut peer).unwrap_err();
        assert_eq!(err, HostError::RoundLimit { rounds: 5 });
        assert_eq!(peer.sent().len(), 5);
    }

    #[test]
    fn test_run_stops_at_deadline() {
        let mut peer = ScriptedPeer::new()
            .repeating(PeerMessage::Accumulate(vec![1]).encode())
            .with_delay(Duration::from_millis(20));
        let limits = ProtocolLimits {
            max_rounds: usize::MAX,
            operation_timeout: Duration::from_millis(100),
        };
        let driver =
            BlockProtocol::from_payloads(header(), &[b"tx"], DEFAULT_CHUNK_SIZE, limits).unwrap();

        assert!(matches!(driver.run(&mut peer), Err(HostError::Timeout(_))));
    }

    #[test]
    fn test_transport_error_is_propagated() {
        let mut peer = ScriptedPeer::new();
        peer.queue_error(HostError::Transport("link down".to_string()));
        let driver = BlockProtocol::from_payloads(
            header(),
            &[b"tx"],
            DEFAULT_CHUNK_SIZE,
            ProtocolLimits::default(),
        )
        .unwrap();

        let err = driver.run(&mut peer).unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_peer_failure_after_miss_names_missing_chunk() {
        let unknown = ChunkHash::new([0x11; 32]);
        let mut peer = ScriptedPeer::new();
        peer.queue_response(PeerMessage::GetChunk(unknown).encode());
        peer.queue_error(HostError::Peer {
            status: StatusWord::TxParsingFail,
            data: vec![],
        });
        let driver = BlockProtocol::from_payloads(
            header(),
            &[b"tx"],
            DEFAULT_CHUNK_SIZE,
            ProtocolLimits::default(),
        )
        .unwrap();

        let err = driver.run(&mut peer).unwrap_err();
        assert_eq!(
            err,
            HostError::ChunkNotFound {
                hash: unknown.to_hex(),
                status: StatusWord::TxParsingFail,
                data: vec![],
            }
        );
        assert_eq!(peer.sent()[1], HostMessage::ChunkNotFound.encode());
    }

    #[test]
    fn test_later_peer_failure_is_not_blamed_on_miss() {
        let unknown = ChunkHash::new([0x11; 32]);
        let mut peer = ScriptedPeer::new();
        peer.queue_response(PeerMessage::GetChunk(unknown).encode());
        peer.queue_response(PeerMessage::Accumulate(b"ok".to_vec()).encode());
        peer.queue_error(HostError::Peer {
            status: StatusWord::Deny,
            data: vec![0xde, 0xad],
        });
        let driver = BlockProtocol::from_payloads(
            header(),
            &[b"tx"],
            DEFAULT_CHUNK_SIZE,
            ProtocolLimits::default(),
        )
        .unwrap();

        let err = driver.run(&mut peer).unwrap_err();
        assert_eq!(
            err,
            HostError::Peer {
                status: StatusWord::Deny,
                data: vec![0xde, 0xad],
            }
        );
    }
}
