// ABOUTME: Supporting types for modem sessions: configuration, per-command options and status values
// ABOUTME: Provides builder-style configuration with defaults suited to slow, easily confused modems

use crate::connection::LINE_TERMINATOR;
use bytes::Bytes;
use std::time::Duration;

/// Terminator for ordinary commands
pub const COMMAND_TERMINATOR: &[u8] = b"\r";
/// Ends the text of an SMS at the `>` prompt (Ctrl-Z, SUBSTITUTE)
pub const SUBMIT_TERMINATOR: &[u8] = &[26];
/// Leaves the SMS prompt without sending (ESC)
pub const ABORT: &[u8] = &[27];

/// Configuration for a modem session
///
/// # Example
///
/// ```rust
/// use gsmmodem::client::ModemConfig;
/// use std::time::Duration;
///
/// // Defaults: 10s reads, 2s between busy retries, 10 retries
/// let config = ModemConfig::default();
///
/// // Faster polling, fewer retries
/// let config = ModemConfig::default()
///     .with_retry_delay(Duration::from_millis(500))
///     .with_max_retries(3);
/// ```
#[derive(Debug, Clone)]
pub struct ModemConfig {
    /// Longest wait for a single read from the transport (default: 10 seconds)
    pub read_timeout: Duration,

    /// How long to wait for the `>` prompt after `AT+CMGS` (default: 1 second)
    ///
    /// The prompt carries no line terminator, so the wait always runs to
    /// this timeout. Keep it short.
    pub prompt_timeout: Duration,

    /// How long the network may take to accept a submitted SMS (default: 60 seconds)
    pub submit_timeout: Duration,

    /// Pause after every command before the next may start (default: 100 ms)
    ///
    /// Modems are slow and get confused when commands arrive back to back.
    pub command_delay: Duration,

    /// Pause before retrying a command rejected with error 515 (default: 2 seconds)
    pub retry_delay: Duration,

    /// Retries after a 515 error before giving up (default: 10)
    ///
    /// A command is attempted at most `max_retries + 1` times.
    pub max_retries: u32,

    /// Interval between signal checks in `wait_for_network` (default: 1 second)
    pub network_poll_interval: Duration,

    /// Decode message text that looks like hex-encoded UTF-16 (default: true)
    pub decode_ucs2_hex: bool,

    /// Arguments for `AT+CNMI` issued during boot (default: `2,2,0,0,0`)
    ///
    /// `None` leaves new message indication untouched. Many handsets do not
    /// support it; failures are ignored either way.
    pub new_message_indication: Option<String>,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            prompt_timeout: Duration::from_secs(1),
            submit_timeout: Duration::from_secs(60),
            command_delay: Duration::from_millis(100),
            retry_delay: Duration::from_secs(2),
            max_retries: 10,
            network_poll_interval: Duration::from_secs(1),
            decode_ucs2_hex: true,
            new_message_indication: Some("2,2,0,0,0".to_string()),
        }
    }
}

impl ModemConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    pub fn with_command_delay(mut self, delay: Duration) -> Self {
        self.command_delay = delay;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_network_poll_interval(mut self, interval: Duration) -> Self {
        self.network_poll_interval = interval;
        self
    }

    pub fn with_ucs2_hex_decoding(mut self, enabled: bool) -> Self {
        self.decode_ucs2_hex = enabled;
        self
    }

    pub fn with_new_message_indication(mut self, cnmi: Option<String>) -> Self {
        self.new_message_indication = cnmi;
        self
    }
}

/// Options for a single command exchange
///
/// ```rust
/// use gsmmodem::client::CommandOptions;
/// use std::time::Duration;
///
/// let opts = CommandOptions::new()
///     .with_read_timeout(Duration::from_secs(1))
///     .ignore_errors();
/// assert!(!opts.raise_errors);
/// ```
#[derive(Debug, Clone)]
pub struct CommandOptions {
    /// Appended to the command when writing (default: `\r`)
    pub write_terminator: Bytes,
    /// Ends each response line (default: `\r\n`)
    pub read_terminator: Bytes,
    /// Overrides `ModemConfig::read_timeout` for this command only
    pub read_timeout: Option<Duration>,
    /// When false, device errors and timeouts produce `None` instead of `Err`
    pub raise_errors: bool,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            write_terminator: Bytes::from_static(COMMAND_TERMINATOR),
            read_terminator: Bytes::from_static(LINE_TERMINATOR),
            read_timeout: None,
            raise_errors: true,
        }
    }
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_write_terminator(mut self, terminator: impl Into<Bytes>) -> Self {
        self.write_terminator = terminator.into();
        self
    }

    pub fn with_read_terminator(mut self, terminator: impl Into<Bytes>) -> Self {
        self.read_terminator = terminator.into();
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Swallow device errors and timeouts
    pub fn ignore_errors(mut self) -> Self {
        self.raise_errors = false;
        self
    }
}

/// Lifecycle of a modem session
///
/// ```text
/// Disconnected → Connecting → Connected → Ready
/// ```
///
/// `boot()` moves a session to `Ready`. A failed boot leaves it `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Ready,
}

impl SessionState {
    pub fn is_connected(self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Ready)
    }
}

/// Identification reported by the modem. Contents are vendor-specific.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardwareInfo {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub revision: Option<String>,
    pub serial: Option<String>,
}
