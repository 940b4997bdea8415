// ABOUTME: Message types produced by the modem session: incoming SMS and stored listings
// ABOUTME: IncomingMessage can answer its sender through any SMS transmitter

use crate::client::error::GsmResult;
use crate::client::traits::SmsTransmitter;
use crate::datatypes::MessageStatus;
use chrono::NaiveDateTime;
use std::fmt;

/// A complete incoming SMS (single part or reassembled)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Sender number as reported by the network
    pub sender: String,
    /// Service center time stamp, `None` when the modem's format was not understood
    pub timestamp: Option<NaiveDateTime>,
    /// Decoded message text
    pub text: String,
}

impl IncomingMessage {
    pub fn new(
        sender: impl Into<String>,
        timestamp: Option<NaiveDateTime>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            timestamp,
            text: text.into(),
        }
    }

    /// Send `text` back to the sender of this message.
    pub async fn respond<T: SmsTransmitter>(&self, transmitter: &T, text: &str) -> GsmResult<()> {
        transmitter.send_sms(&self.sender, text).await
    }
}

impl fmt::Display for IncomingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<IncomingMessage from {}: {:?}>", self.sender, self.text)
    }
}

/// A message listed from modem storage with `AT+CMGL`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// Storage index, usable with `AT+CMGD`
    pub index: u32,
    pub status: MessageStatus,
    /// Only present for received messages
    pub sender: Option<String>,
    /// Only present for received messages
    pub timestamp: Option<NaiveDateTime>,
    pub text: String,
}
