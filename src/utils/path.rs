use crate::error::{HostError, Result};
use std::fmt;
use std::str::FromStr;

/// Top bit of a path component marks it as hardened
pub const HARDENED_BIT: u32 = 0x8000_0000;

/// The peer accepts at most this many components
pub const MAX_PATH_DEPTH: usize = 10;

/// A parsed `m/44'/535348'/0'` style key derivation path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath {
    components: Vec<u32>,
}

impl DerivationPath {
    pub fn parse(path: &str) -> Result<Self> {
        let mut parts = path.split('/');
        if parts.next() != Some("m") {
            return Err(HostError::InvalidPath(format!(
                "{path}: master key `m` expected"
            )));
        }

        let mut components = Vec::new();
        for part in parts {
            if part.is_empty() {
                return Err(HostError::InvalidPath(format!("{path}: empty component")));
            }
            let (digits, hardened) = match part.strip_suffix('\'') {
                Some(digits) => (digits, true),
                None => (part, false),
            };
            let index: u32 = digits
                .parse()
                .map_err(|e| HostError::InvalidPath(format!("{path}: `{part}` {e}")))?;
            if index >= HARDENED_BIT {
                return Err(HostError::InvalidPath(format!(
                    "{path}: index {index} out of range"
                )));
            }
            components.push(if hardened { index | HARDENED_BIT } else { index });
        }

        if components.len() > MAX_PATH_DEPTH {
            return Err(HostError::InvalidPath(format!(
                "{path}: {} components, at most {MAX_PATH_DEPTH} allowed",
                components.len()
            )));
        }

        Ok(Self { components })
    }

    pub fn components(&self) -> &[u32] {
        &self.components
    }

    /// Count byte followed by each component as 4 little-endian bytes
    pub fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 4 * self.components.len());
        out.push(self.components.len() as u8);
        for component in &self.components {
            out.extend_from_slice(&component.to_le_bytes());
        }
        out
    }
}

impl FromStr for DerivationPath {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for component in &self.components {
            if component & HARDENED_BIT != 0 {
                write!(f, "/{}'", component & !HARDENED_BIT)?;
            } else {
                write!(f, "/{component}")?;
            }
        }
        Ok(())
    }
}
