// ABOUTME: Defines text-mode storage status values used by AT+CMGL listings
// ABOUTME: Maps numeric status codes to the quoted labels modems expect in text mode

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// Storage status of an SMS held in modem memory (3GPP 27.005 §3.1)
///
/// ## Text mode labels
///
/// In text mode (`AT+CMGF=1`) the status is exchanged as a quoted label
/// rather than the numeric value used in PDU mode:
///
/// ```text
/// AT+CMGL="REC UNREAD"
/// +CMGL: 1,"REC UNREAD","+15551234",,"23/06/01,10:00:00-04"
/// ```
///
/// The numeric values are kept for callers that select a status by number.
#[derive(TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MessageStatus {
    /// Received, not yet read. Listing these marks them read on most devices.
    ReceivedUnread = 0,

    /// Received and read
    ReceivedRead = 1,

    /// Stored outgoing message, not yet sent
    StoredUnsent = 2,

    /// Stored outgoing message, sent
    StoredSent = 3,

    /// Every message (listing filter only)
    All = 4,
}

impl MessageStatus {
    /// Label used in text mode commands and listings
    pub fn label(self) -> &'static str {
        match self {
            MessageStatus::ReceivedUnread => "REC UNREAD",
            MessageStatus::ReceivedRead => "REC READ",
            MessageStatus::StoredUnsent => "STO UNSENT",
            MessageStatus::StoredSent => "STO SENT",
            MessageStatus::All => "ALL",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "REC UNREAD" => Some(MessageStatus::ReceivedUnread),
            "REC READ" => Some(MessageStatus::ReceivedRead),
            "STO UNSENT" => Some(MessageStatus::StoredUnsent),
            "STO SENT" => Some(MessageStatus::StoredSent),
            "ALL" => Some(MessageStatus::All),
            _ => None,
        }
    }

    /// Whether listings with this filter carry sender and timestamp fields
    pub fn is_received(self) -> bool {
        matches!(
            self,
            MessageStatus::ReceivedUnread | MessageStatus::ReceivedRead
        )
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_conversion() {
        assert_eq!(MessageStatus::try_from(0u8).unwrap(), MessageStatus::ReceivedUnread);
        assert_eq!(MessageStatus::try_from(4u8).unwrap(), MessageStatus::All);
        assert!(MessageStatus::try_from(5u8).is_err());
        assert_eq!(u8::from(MessageStatus::StoredSent), 3);
    }

    #[test]
    fn test_labels_round_trip() {
        for status in [
            MessageStatus::ReceivedUnread,
            MessageStatus::ReceivedRead,
            MessageStatus::StoredUnsent,
            MessageStatus::StoredSent,
            MessageStatus::All,
        ] {
            assert_eq!(MessageStatus::from_label(status.label()), Some(status));
        }
        assert_eq!(MessageStatus::from_label("UNKNOWN"), None);
    }
}
