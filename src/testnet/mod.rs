//! In-process peers for exercising the host without a device
//!
//! `ScriptedPeer` replays canned answers, `BlockPeer` plays the device side
//! of the block protocol and `SimulatedApp` wraps it in a small signing
//! application.

pub mod app;
pub mod peer;
pub mod test_utils;

pub use app::{SimulatedApp, SIMULATED_APP_NAME, SIMULATED_APP_VERSION};
pub use peer::{BlockPeer, ScriptedPeer};
pub use test_utils::{fast_limits, reassemble, sample_payload};
