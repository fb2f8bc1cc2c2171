//! # APDU Block Host
//!
//! Host side of a request/response channel to a constrained signing device.
//! Payloads too large for one 255-byte APDU body are either streamed as raw
//! frames or split into SHA-256 linked chunks that the device pulls by hash.
//!
//! ## Layout
//! - `core/`: chunk linking, the chunk store, protocol messages and the
//!   block protocol driver
//! - `transport/`: APDU framing, status words and the emulator TCP socket
//! - `client/`: version, public key and signing requests
//! - `config/`: TOML settings with environment overrides
//! - `testnet/`: in-process device simulators
//! - `cli/`: command-line parsing for the binary
//!
//! A typical call picks a transport, wraps it in an `AppClient` and lets
//! the configured `SendMode` decide how payloads travel:
//!
//! ```no_run
//! use apdu_block_host::{AppClient, DerivationPath, Settings, TcpTransport};
//!
//! let settings = Settings::default();
//! let transport = TcpTransport::connect(&settings.emulator_addr, settings.exchange_timeout())?;
//! let mut client = AppClient::new(transport, settings);
//! let path: DerivationPath = "m/44'/535348'/0'".parse()?;
//! let signature = client.sign_tx(&path, b"raw transaction")?;
//! # Ok::<(), apdu_block_host::HostError>(())
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod testnet;
pub mod transport;
pub mod utils;

pub use cli::{Command, Opt};
pub use client::{AppClient, AppVersion, Ins, PublicKeyResponse};
pub use config::{Config, Settings, GLOBAL_CONFIG};
pub use core::{
    link_payload, link_payloads, send_chunks, BlockProtocol, BlockTransfer, ChunkHash,
    ChunkManifest, ChunkStore, DriverState, HostMessage, PeerMessage, ProtocolLimits, SendMode,
    SendStrategy, SimpleChunks, Step,
};
pub use error::{HostError, Result};
pub use transport::{ApduHeader, Exchange, StatusWord, TcpTransport};
pub use utils::{sha256_digest, DerivationPath};
