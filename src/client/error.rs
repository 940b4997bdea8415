// ABOUTME: Error types for the GSM modem engine, from transport failures to device rejections
// ABOUTME: Maps +CMS/+CME coded errors to a structured ModemError with well-known descriptions

use std::io;
use thiserror::Error;

/// Error code the modem reports while it is still initializing or busy
/// processing a previous command. Commands failing with it are retried.
pub const BUSY_CODE: u32 = 515;

/// Comprehensive error type for modem operations
///
/// Covers every failure the engine can observe: opening the transport,
/// writing to or reading from it, the device rejecting a command, and
/// malformed structured responses.
#[derive(Debug, Error)]
pub enum GsmError {
    /// The transport could not be opened. Never retried.
    #[error("Could not connect to modem: {0}")]
    Connect(#[source] io::Error),

    /// Writing to the transport failed
    #[error("Write to modem failed: {0}")]
    Write(#[source] io::Error),

    /// Reading from the transport failed for a reason other than a timeout
    #[error("Read from modem failed: {0}")]
    Read(#[source] io::Error),

    /// No terminator arrived before the read timeout elapsed
    ///
    /// `pending` holds whatever was received before the timeout, which is
    /// meaningful when a non-standard terminator (such as the SMS prompt)
    /// was expected.
    #[error("Timed out waiting for modem (pending data: {pending:?})")]
    ReadTimeout { pending: String },

    /// The device rejected a command
    #[error("{0}")]
    Modem(ModemError),

    /// A structured response could not be parsed
    #[error("Could not parse modem response: {0}")]
    Parse(String),

    /// The device answered, but not in the way the operation requires
    #[error("Unexpected response to {command}: {response:?}")]
    UnexpectedResponse {
        command: String,
        response: Vec<String>,
    },

    /// Session not in the correct state for the operation
    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

/// Result type alias for modem operations
pub type GsmResult<T> = Result<T, GsmError>;

impl GsmError {
    /// True when the device reported it is busy (code 515) and the command
    /// should be retried shortly.
    pub fn is_busy(&self) -> bool {
        matches!(self, GsmError::Modem(err) if err.is_busy())
    }

    /// True for failures that `raise_errors = false` is allowed to swallow:
    /// device rejections and read timeouts. Transport failures are never
    /// swallowed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GsmError::Modem(_) | GsmError::ReadTimeout { .. })
    }
}

impl From<ModemError> for GsmError {
    fn from(err: ModemError) -> Self {
        GsmError::Modem(err)
    }
}

/// Which family of result code the device used to report an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// `+CMS ERROR: <n>` (message service, 3GPP 27.005)
    Cms,
    /// `+CME ERROR: <n>` (equipment, 3GPP 27.007)
    Cme,
    /// Bare `ERROR` or a vendor-specific failure string
    Uncoded,
}

impl ErrorCategory {
    /// Parse the category tag used in coded error lines (`CMS` or `CME`).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "CMS" => Some(ErrorCategory::Cms),
            "CME" => Some(ErrorCategory::Cme),
            _ => None,
        }
    }
}

/// A command rejected by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{}", summarize(.category, .code))]
pub struct ModemError {
    pub category: ErrorCategory,
    pub code: Option<u32>,
}

impl ModemError {
    pub fn coded(category: ErrorCategory, code: u32) -> Self {
        Self {
            category,
            code: Some(code),
        }
    }

    pub fn uncoded() -> Self {
        Self {
            category: ErrorCategory::Uncoded,
            code: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.code == Some(BUSY_CODE)
    }

    /// Human readable description of well-known codes
    pub fn description(&self) -> Option<&'static str> {
        let code = self.code?;
        if code == BUSY_CODE {
            return Some("initialization or command processing in progress");
        }
        match self.category {
            ErrorCategory::Cms => match code {
                300 => Some("ME failure"),
                301 => Some("SMS service of ME reserved"),
                302 => Some("operation not allowed"),
                303 => Some("operation not supported"),
                304 => Some("invalid PDU mode parameter"),
                305 => Some("invalid text mode parameter"),
                310 => Some("SIM not inserted"),
                311 => Some("SIM PIN required"),
                313 => Some("SIM failure"),
                314 => Some("SIM busy"),
                320 => Some("memory failure"),
                321 => Some("invalid memory index"),
                322 => Some("memory full"),
                330 => Some("SMSC address unknown"),
                331 => Some("no network service"),
                332 => Some("network timeout"),
                340 => Some("no +CNMA acknowledgement expected"),
                500 => Some("unknown error"),
                _ => None,
            },
            ErrorCategory::Cme => match code {
                0 => Some("phone failure"),
                3 => Some("operation not allowed"),
                4 => Some("operation not supported"),
                10 => Some("SIM not inserted"),
                11 => Some("SIM PIN required"),
                12 => Some("SIM PUK required"),
                13 => Some("SIM failure"),
                14 => Some("SIM busy"),
                16 => Some("incorrect password"),
                20 => Some("memory full"),
                21 => Some("invalid index"),
                30 => Some("no network service"),
                31 => Some("network timeout"),
                100 => Some("unknown error"),
                _ => None,
            },
            ErrorCategory::Uncoded => None,
        }
    }
}

fn summarize(category: &ErrorCategory, code: &Option<u32>) -> String {
    let tag = match category {
        ErrorCategory::Cms => "CMS",
        ErrorCategory::Cme => "CME",
        ErrorCategory::Uncoded => return "Modem error".to_string(),
    };
    let error = ModemError {
        category: *category,
        code: *code,
    };
    match (code, error.description()) {
        (Some(code), Some(desc)) => format!("{tag} error {code}: {desc}"),
        (Some(code), None) => format!("{tag} error {code}"),
        (None, _) => format!("{tag} error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_detection_ignores_category() {
        assert!(ModemError::coded(ErrorCategory::Cms, 515).is_busy());
        assert!(ModemError::coded(ErrorCategory::Cme, 515).is_busy());
        assert!(!ModemError::coded(ErrorCategory::Cms, 500).is_busy());
        assert!(!ModemError::uncoded().is_busy());

        let err = GsmError::from(ModemError::coded(ErrorCategory::Cms, 515));
        assert!(err.is_busy());
    }

    #[test]
    fn test_display_includes_description() {
        let err = ModemError::coded(ErrorCategory::Cms, 330);
        assert_eq!(err.to_string(), "CMS error 330: SMSC address unknown");

        let err = ModemError::coded(ErrorCategory::Cme, 9999);
        assert_eq!(err.to_string(), "CME error 9999");

        assert_eq!(ModemError::uncoded().to_string(), "Modem error");

        let err = ModemError::coded(ErrorCategory::Cme, 515);
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert_eq!(
            boxed.to_string(),
            "CME error 515: initialization or command processing in progress"
        );
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(GsmError::Modem(ModemError::uncoded()).is_recoverable());
        assert!(
            GsmError::ReadTimeout {
                pending: String::new()
            }
            .is_recoverable()
        );
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "gone");
        assert!(!GsmError::Write(io_err).is_recoverable());
        assert!(!GsmError::InvalidState("Not connected".to_string()).is_recoverable());
    }

    #[test]
    fn test_category_tags() {
        assert_eq!(ErrorCategory::from_tag("CMS"), Some(ErrorCategory::Cms));
        assert_eq!(ErrorCategory::from_tag("CME"), Some(ErrorCategory::Cme));
        assert_eq!(ErrorCategory::from_tag("CMX"), None);
    }
}
