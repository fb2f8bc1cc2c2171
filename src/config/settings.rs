use crate::core::block_protocol::{DEFAULT_MAX_ROUNDS, DEFAULT_OPERATION_TIMEOUT};
use crate::core::{ProtocolLimits, DEFAULT_CHUNK_SIZE, LINK_LEN};
use crate::error::{HostError, Result};
use crate::transport::MAX_APDU_DATA_LEN;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::new);

static DEFAULT_EMULATOR_ADDR: &str = "127.0.0.1:9999";
const DEFAULT_EXCHANGE_TIMEOUT_MS: u64 = 30_000;

const EMULATOR_ADDR_KEY: &str = "APDU_HOST_ADDR";
const CHUNK_SIZE_KEY: &str = "APDU_HOST_CHUNK_SIZE";
const MAX_ROUNDS_KEY: &str = "APDU_HOST_MAX_ROUNDS";
const USE_BLOCKS_KEY: &str = "APDU_HOST_BLOCKS";

/// Tunables for talking to a device, loadable from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `host:port` of the emulator APDU socket
    pub emulator_addr: String,
    /// Payload bytes per linked chunk
    pub chunk_size: usize,
    /// Body bytes per frame in simple mode
    pub max_frame_len: usize,
    /// Round budget for one block transfer
    pub max_rounds: usize,
    /// Per-exchange timeout
    pub exchange_timeout_ms: u64,
    /// Wall-clock budget for one block transfer
    pub operation_timeout_ms: u64,
    /// Use the block protocol instead of simple chunks
    pub use_block_protocol: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            emulator_addr: DEFAULT_EMULATOR_ADDR.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_frame_len: MAX_APDU_DATA_LEN,
            max_rounds: DEFAULT_MAX_ROUNDS,
            exchange_timeout_ms: DEFAULT_EXCHANGE_TIMEOUT_MS,
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT.as_millis() as u64,
            use_block_protocol: false,
        }
    }
}

impl Settings {
    /// Read settings from a TOML file; missing keys keep their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Settings> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            HostError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let settings: Settings = toml::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Override fields from `APDU_HOST_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = env::var(EMULATOR_ADDR_KEY) {
            self.emulator_addr = addr;
        }
        if let Ok(value) = env::var(CHUNK_SIZE_KEY) {
            self.chunk_size = value
                .parse()
                .map_err(|e| HostError::Config(format!("{CHUNK_SIZE_KEY}={value}: {e}")))?;
        }
        if let Ok(value) = env::var(MAX_ROUNDS_KEY) {
            self.max_rounds = value
                .parse()
                .map_err(|e| HostError::Config(format!("{MAX_ROUNDS_KEY}={value}: {e}")))?;
        }
        if let Ok(value) = env::var(USE_BLOCKS_KEY) {
            self.use_block_protocol = matches!(value.as_str(), "1" | "true" | "yes");
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        // A linked chunk plus its tag byte must fit one frame
        if self.chunk_size == 0 || LINK_LEN + self.chunk_size + 1 > MAX_APDU_DATA_LEN {
            return Err(HostError::Config(format!(
                "chunk_size must be between 1 and {}, got {}",
                MAX_APDU_DATA_LEN - LINK_LEN - 1,
                self.chunk_size
            )));
        }
        if self.max_frame_len == 0 || self.max_frame_len > MAX_APDU_DATA_LEN {
            return Err(HostError::Config(format!(
                "max_frame_len must be between 1 and {MAX_APDU_DATA_LEN}, got {}",
                self.max_frame_len
            )));
        }
        if self.max_rounds == 0 {
            return Err(HostError::Config("max_rounds must be positive".to_string()));
        }
        if self.exchange_timeout_ms == 0 || self.operation_timeout_ms == 0 {
            return Err(HostError::Config("timeouts must be positive".to_string()));
        }
        Ok(())
    }

    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_millis(self.exchange_timeout_ms)
    }

    pub fn limits(&self) -> ProtocolLimits {
        ProtocolLimits {
            max_rounds: self.max_rounds,
            operation_timeout: Duration::from_millis(self.operation_timeout_ms),
        }
    }
}

/// Process-wide settings shared by the CLI commands
pub struct Config {
    inner: RwLock<Settings>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Config {
        let mut settings = Settings::default();
        if let Err(e) = settings.apply_env() {
            log::warn!("Ignoring environment overrides: {e}");
            settings = Settings::default();
        }
        Config {
            inner: RwLock::new(settings),
        }
    }

    pub fn settings(&self) -> Settings {
        self.inner
            .read()
            .expect("Failed to acquire read lock on config - this should never happen")
            .clone()
    }

    pub fn replace(&self, settings: Settings) {
        let mut inner = self
            .inner
            .write()
            .expect("Failed to acquire write lock on config - this should never happen");
        *inner = settings;
    }

    pub fn set_emulator_addr(&self, addr: String) {
        let mut inner = self
            .inner
            .write()
            .expect("Failed to acquire write lock on config - this should never happen");
        inner.emulator_addr = addr;
    }

    pub fn set_use_block_protocol(&self, enabled: bool) {
        let mut inner = self
            .inner
            .write()
            .expect("Failed to acquire write lock on config - this should never happen");
        inner.use_block_protocol = enabled;
    }
}
