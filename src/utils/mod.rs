//! Utility functions and helpers
//!
//! Hashing, derivation path packing and response field parsing used
//! throughout the host.

pub mod buffer;
pub mod crypto;
pub mod path;

pub use buffer::{pop_size_prefixed, pop_sized};
pub use crypto::{sha256_concat, sha256_digest, SHA256_LEN};
pub use path::{DerivationPath, HARDENED_BIT, MAX_PATH_DEPTH};
