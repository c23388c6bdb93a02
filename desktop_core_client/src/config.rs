use desktop_protocol::DEFAULT_CHANNEL_NAME;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const ADDR_ENV: &str = "DESKTOP_CORE_ADDR";
pub const SHUTDOWN_GRACE_ENV: &str = "DESKTOP_CORE_SHUTDOWN_GRACE_MS";

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(100);
const DEFAULT_EVENT_CAPACITY: usize = 16;

/// Local channel the worker listens on.
///
/// Either a bare well-known name, resolved per platform, or an explicit
/// socket path / pipe name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAddress {
    name: String,
}

impl ChannelAddress {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn well_known() -> Self {
        Self::new(DEFAULT_CHANNEL_NAME)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn is_explicit(&self) -> bool {
        self.name.contains('/') || self.name.contains('\\')
    }

    #[cfg(unix)]
    pub fn socket_path(&self) -> PathBuf {
        if self.is_explicit() {
            return PathBuf::from(&self.name);
        }
        let dir = std::env::var_os("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);
        dir.join(format!("{}.sock", self.name))
    }

    #[cfg(windows)]
    pub fn pipe_name(&self) -> String {
        if self.is_explicit() {
            return self.name.clone();
        }
        format!(r"\\.\pipe\{}", self.name)
    }
}

impl Default for ChannelAddress {
    fn default() -> Self {
        Self::well_known()
    }
}

impl fmt::Display for ChannelAddress {
    #[cfg(unix)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_path().display())
    }

    #[cfg(windows)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pipe_name())
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub address: ChannelAddress,
    /// How long `close` waits for the change subscriber before abandoning it.
    pub shutdown_grace: Duration,
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: ChannelAddress::well_known(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(addr) = env_trimmed(ADDR_ENV) {
            config.address = ChannelAddress::new(addr);
        }

        if let Some(raw) = env_trimmed(SHUTDOWN_GRACE_ENV) {
            match raw.parse::<u64>() {
                Ok(ms) => config.shutdown_grace = Duration::from_millis(ms),
                Err(_) => {
                    tracing::warn!(
                        "ignoring {SHUTDOWN_GRACE_ENV}={raw:?}, expected milliseconds"
                    );
                }
            }
        }

        config
    }

    pub fn with_address(mut self, address: ChannelAddress) -> Self {
        self.address = address;
        self
    }
}

fn env_trimmed(key: &str) -> Option<String> {
    let value = std::env::var(key).ok()?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
