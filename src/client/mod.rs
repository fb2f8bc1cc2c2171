//! Client for the signing application
//!
//! Wraps any `Exchange` and turns high-level requests into instruction
//! payloads sent through the selected `SendMode`.

pub mod app_client;

pub use app_client::{AppClient, AppVersion, Ins, PublicKeyResponse, CLA, P1, P2};
