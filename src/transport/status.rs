use crate::error::{HostError, Result};
use std::fmt;

/// Status words the application can append to a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusWord {
    Ok,
    Deny,
    WrongP1P2,
    InsNotSupported,
    ClaNotSupported,
    WrongApduLength,
    SwapTxParamMismatch,
    WrongResponseLength,
    DisplayBip32PathFail,
    DisplayAddressFail,
    DisplayAmountFail,
    WrongTxLength,
    TxParsingFail,
    TxHashFail,
    BadState,
    SignatureFail,
    Unknown(u16),
}

impl StatusWord {
    pub fn code(self) -> u16 {
        match self {
            StatusWord::Ok => 0x9000,
            StatusWord::Deny => 0x6985,
            StatusWord::WrongP1P2 => 0x6a86,
            StatusWord::InsNotSupported => 0x6d00,
            StatusWord::ClaNotSupported => 0x6e00,
            StatusWord::WrongApduLength => 0x6e03,
            StatusWord::SwapTxParamMismatch => 0x6e05,
            StatusWord::WrongResponseLength => 0xb000,
            StatusWord::DisplayBip32PathFail => 0xb001,
            StatusWord::DisplayAddressFail => 0xb002,
            StatusWord::DisplayAmountFail => 0xb003,
            StatusWord::WrongTxLength => 0xb004,
            StatusWord::TxParsingFail => 0xb005,
            StatusWord::TxHashFail => 0xb006,
            StatusWord::BadState => 0xb007,
            StatusWord::SignatureFail => 0xb008,
            StatusWord::Unknown(code) => code,
        }
    }

    pub fn to_bytes(self) -> [u8; 2] {
        self.code().to_be_bytes()
    }

    pub fn is_ok(self) -> bool {
        self == StatusWord::Ok
    }
}

impl From<u16> for StatusWord {
    fn from(code: u16) -> Self {
        match code {
            0x9000 => StatusWord::Ok,
            0x6985 => StatusWord::Deny,
            0x6a86 => StatusWord::WrongP1P2,
            0x6d00 => StatusWord::InsNotSupported,
            0x6e00 => StatusWord::ClaNotSupported,
            0x6e03 => StatusWord::WrongApduLength,
            0x6e05 => StatusWord::SwapTxParamMismatch,
            0xb000 => StatusWord::WrongResponseLength,
            0xb001 => StatusWord::DisplayBip32PathFail,
            0xb002 => StatusWord::DisplayAddressFail,
            0xb003 => StatusWord::DisplayAmountFail,
            0xb004 => StatusWord::WrongTxLength,
            0xb005 => StatusWord::TxParsingFail,
            0xb006 => StatusWord::TxHashFail,
            0xb007 => StatusWord::BadState,
            0xb008 => StatusWord::SignatureFail,
            other => StatusWord::Unknown(other),
        }
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusWord::Unknown(code) => write!(f, "unknown status {code:#06x}"),
            other => write!(f, "{other:?} ({:#06x})", other.code()),
        }
    }
}

/// Split a raw response into its body and trailing status word
pub fn split_status(raw: &[u8]) -> Result<(&[u8], StatusWord)> {
    if raw.len() < 2 {
        return Err(HostError::Transport(format!(
            "response of {} bytes has no status word",
            raw.len()
        )));
    }
    let (data, sw) = raw.split_at(raw.len() - 2);
    let status = StatusWord::from(u16::from_be_bytes([sw[0], sw[1]]));
    Ok((data, status))
}

/// Turn a body and status word into the caller-facing outcome
pub fn check(data: &[u8], status: StatusWord) -> Result<Vec<u8>> {
    if status.is_ok() {
        Ok(data.to_vec())
    } else {
        Err(HostError::Peer {
            status,
            data: data.to_vec(),
        })
    }
}
