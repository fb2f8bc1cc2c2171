use crate::core::message::{HostMessage, PeerMessage};
use crate::core::{unlink_chunk, ChunkHash};
use crate::error::{HostError, Result};
use crate::transport::{ApduHeader, Exchange, StatusWord};
use log::trace;
use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

/// Transport that replays queued responses and records what the host sent
#[derive(Default)]
pub struct ScriptedPeer {
    queued: VecDeque<Result<Vec<u8>>>,
    fallback: Option<Vec<u8>>,
    delay: Option<Duration>,
    sent: Vec<Vec<u8>>,
    headers: Vec<ApduHeader>,
}

impl ScriptedPeer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer with `body` forever once the queue runs dry
    pub fn repeating(mut self, body: Vec<u8>) -> Self {
        self.fallback = Some(body);
        self
    }

    /// Sleep this long before every answer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue_response(&mut self, body: Vec<u8>) {
        self.queued.push_back(Ok(body));
    }

    pub fn queue_error(&mut self, err: HostError) {
        self.queued.push_back(Err(err));
    }

    /// Request bodies in the order the host sent them
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    pub fn headers(&self) -> &[ApduHeader] {
        &self.headers
    }
}

impl Exchange for ScriptedPeer {
    fn exchange(&mut self, header: &ApduHeader, data: &[u8]) -> Result<Vec<u8>> {
        self.headers.push(*header);
        self.sent.push(data.to_vec());
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        match self.queued.pop_front() {
            Some(reply) => reply,
            None => self.fallback.clone().ok_or_else(|| {
                HostError::Transport("scripted peer has no queued responses".to_string())
            }),
        }
    }
}

enum Phase {
    Idle,
    Pulling {
        roots: Vec<ChunkHash>,
        next_root: usize,
        expecting: ChunkHash,
        pieces: Vec<Vec<u8>>,
        payloads: Vec<Vec<u8>>,
    },
    Pushing {
        payloads: Vec<Vec<u8>>,
    },
    Verifying {
        payloads: Vec<Vec<u8>>,
        hash: ChunkHash,
    },
    Emitting {
        output: Vec<u8>,
        offset: usize,
    },
}

/// Device half of the block protocol
///
/// Pulls every root by following links to the sentinel, which yields each
/// payload's slices in order. It can push a chunk and read it back before
/// streaming the application's answer as `ACCUMULATE` fragments and a `FINAL`.
pub struct BlockPeer {
    phase: Phase,
    fragment_size: usize,
    push: Option<Vec<u8>>,
}

impl Default for BlockPeer {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockPeer {
    pub const DEFAULT_FRAGMENT_SIZE: usize = 48;

    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            fragment_size: Self::DEFAULT_FRAGMENT_SIZE,
            push: None,
        }
    }

    pub fn with_fragment_size(mut self, fragment_size: usize) -> Self {
        self.fragment_size = fragment_size.max(1);
        self
    }

    /// Push `chunk` to the host once all payloads are pulled, then pull it back
    pub fn with_push(mut self, chunk: Vec<u8>) -> Self {
        self.push = Some(chunk);
        self
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    /// Drop any half-finished operation
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Answer one host request; `app` runs once every payload is in hand
    pub fn handle<F>(&mut self, body: &[u8], app: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&[Vec<u8>]) -> std::result::Result<Vec<u8>, StatusWord>,
    {
        let message = match HostMessage::decode(body) {
            Ok(message) => message,
            Err(_) => return self.abort(StatusWord::WrongApduLength),
        };
        trace!("peer got host tag {}", message.tag());

        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        match (phase, message) {
            (Phase::Idle, HostMessage::Start(roots)) => {
                self.pull_next(roots, 0, Vec::new(), app)
            }
            (
                Phase::Pulling {
                    roots,
                    next_root,
                    expecting,
                    mut pieces,
                    mut payloads,
                },
                HostMessage::ChunkFound(chunk),
            ) => {
                if ChunkHash::of(&chunk) != expecting {
                    return self.abort(StatusWord::TxHashFail);
                }
                let (link, piece) = match unlink_chunk(&chunk) {
                    Ok(parts) => parts,
                    Err(_) => return self.abort(StatusWord::TxParsingFail),
                };
                pieces.push(piece.to_vec());

                if link.is_zero() {
                    payloads.push(pieces.into_iter().flatten().collect());
                    self.pull_next(roots, next_root + 1, payloads, app)
                } else {
                    self.phase = Phase::Pulling {
                        roots,
                        next_root,
                        expecting: link,
                        pieces,
                        payloads,
                    };
                    Ok(PeerMessage::GetChunk(link).encode())
                }
            }
            (Phase::Pulling { .. }, HostMessage::ChunkNotFound) => {
                self.abort(StatusWord::TxParsingFail)
            }
            (Phase::Pushing { payloads }, HostMessage::PutChunkAck) => {
                let hash = match self.push.as_deref().map(ChunkHash::of) {
                    Some(hash) => hash,
                    None => return self.abort(StatusWord::BadState),
                };
                self.phase = Phase::Verifying { payloads, hash };
                Ok(PeerMessage::GetChunk(hash).encode())
            }
            (Phase::Verifying { payloads, hash }, HostMessage::ChunkFound(chunk)) => {
                if ChunkHash::of(&chunk) != hash {
                    return self.abort(StatusWord::TxHashFail);
                }
                if self.push.as_deref() != Some(chunk.as_slice()) {
                    return self.abort(StatusWord::BadState);
                }
                self.finish(&payloads, app)
            }
            (Phase::Emitting { output, offset }, HostMessage::AccumulateAck) => {
                Ok(self.emit(output, offset))
            }
            _ => self.abort(StatusWord::BadState),
        }
    }

    fn pull_next<F>(
        &mut self,
        roots: Vec<ChunkHash>,
        mut next_root: usize,
        mut payloads: Vec<Vec<u8>>,
        app: F,
    ) -> Result<Vec<u8>>
    where
        F: FnOnce(&[Vec<u8>]) -> std::result::Result<Vec<u8>, StatusWord>,
    {
        // The sentinel root stands for an empty payload and is never fetched
        while next_root < roots.len() && roots[next_root].is_zero() {
            payloads.push(Vec::new());
            next_root += 1;
        }

        if next_root < roots.len() {
            let expecting = roots[next_root];
            self.phase = Phase::Pulling {
                roots,
                next_root,
                expecting,
                pieces: Vec::new(),
                payloads,
            };
            return Ok(PeerMessage::GetChunk(expecting).encode());
        }

        match self.push.clone() {
            Some(chunk) => {
                self.phase = Phase::Pushing { payloads };
                Ok(PeerMessage::PutChunk(chunk).encode())
            }
            None => self.finish(&payloads, app),
        }
    }

    fn finish<F>(&mut self, payloads: &[Vec<u8>], app: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&[Vec<u8>]) -> std::result::Result<Vec<u8>, StatusWord>,
    {
        match app(payloads) {
            Ok(output) => Ok(self.emit(output, 0)),
            Err(status) => self.abort(status),
        }
    }

    fn emit(&mut self, output: Vec<u8>, offset: usize) -> Vec<u8> {
        let remaining = output.len() - offset;
        if remaining > self.fragment_size {
            let end = offset + self.fragment_size;
            let message = PeerMessage::Accumulate(output[offset..end].to_vec()).encode();
            self.phase = Phase::Emitting {
                output,
                offset: end,
            };
            message
        } else {
            self.phase = Phase::Idle;
            PeerMessage::Final(output[offset..].to_vec()).encode()
        }
    }

    fn abort(&mut self, status: StatusWord) -> Result<Vec<u8>> {
        self.phase = Phase::Idle;
        Err(HostError::Peer {
            status,
            data: Vec::new(),
        })
    }
}
