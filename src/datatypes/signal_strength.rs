// ABOUTME: Signal quality reported by AT+CSQ as a tri-state value
// ABOUTME: Distinguishes a measured level from "not detectable" and from an unreadable reply

use regex::Regex;
use std::sync::LazyLock;

static CSQ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+CSQ: (\d+),").expect("CSQ pattern is valid"));

/// RSSI value the modem uses for "not known or not detectable"
pub const RSSI_UNKNOWN: u8 = 99;

/// Signal strength as reported by `AT+CSQ`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalStrength {
    /// RSSI level, 0 (weakest) to 31 (strongest)
    Known(u8),
    /// The modem answered but cannot detect the network (RSSI 99)
    Unknown,
    /// The modem did not answer, or the answer could not be parsed
    Error,
}

impl SignalStrength {
    /// Interpret a `+CSQ: <rssi>,<ber>` line.
    pub fn from_csq(line: &str) -> Self {
        let Some(caps) = CSQ.captures(line.trim()) else {
            return SignalStrength::Error;
        };
        match caps[1].parse::<u32>() {
            Ok(rssi) if rssi < u32::from(RSSI_UNKNOWN) => SignalStrength::Known(rssi as u8),
            Ok(_) => SignalStrength::Unknown,
            Err(_) => SignalStrength::Error,
        }
    }

    /// True when the modem reports a usable, non-zero signal.
    pub fn is_available(&self) -> bool {
        matches!(self, SignalStrength::Known(level) if *level > 0)
    }

    /// Approximate received power in dBm for a known level
    pub fn dbm(&self) -> Option<i32> {
        match self {
            SignalStrength::Known(level) => Some(-113 + 2 * i32::from((*level).min(31))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_level() {
        assert_eq!(SignalStrength::from_csq("+CSQ: 20,99"), SignalStrength::Known(20));
        assert!(SignalStrength::from_csq("+CSQ: 20,99").is_available());
    }

    #[test]
    fn test_undetectable_is_unknown_not_error() {
        assert_eq!(SignalStrength::from_csq("+CSQ: 99,99"), SignalStrength::Unknown);
        assert_ne!(SignalStrength::Unknown, SignalStrength::Error);
    }

    #[test]
    fn test_unparseable_is_error() {
        assert_eq!(SignalStrength::from_csq("garbage"), SignalStrength::Error);
        assert_eq!(SignalStrength::from_csq("+CSQ: ,99"), SignalStrength::Error);
    }

    #[test]
    fn test_zero_is_not_available() {
        let zero = SignalStrength::from_csq("+CSQ: 0,0");
        assert_eq!(zero, SignalStrength::Known(0));
        assert!(!zero.is_available());
        assert_eq!(zero.dbm(), Some(-113));
        assert_eq!(SignalStrength::Unknown.dbm(), None);
    }
}
