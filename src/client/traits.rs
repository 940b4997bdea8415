// ABOUTME: Capability traits for SMS sending and receiving using native async functions
// ABOUTME: Lets message handling code work against a live modem or a test double

use crate::client::error::GsmResult;
use crate::message::IncomingMessage;

/// Something that can send an SMS
pub trait SmsTransmitter {
    /// Send `text` to `recipient`
    ///
    /// Returns once the device has accepted the message for delivery.
    async fn send_sms(&self, recipient: &str, text: &str) -> GsmResult<()>;
}

/// Something that yields incoming SMS
pub trait SmsReceiver {
    /// Take the oldest waiting message, if any
    ///
    /// `poll` gives the device a chance to deliver pending notifications
    /// first; `fetch_stored` also pulls unread messages out of device
    /// storage. An empty queue yields `None`, never an error.
    async fn next_message(&self, poll: bool, fetch_stored: bool) -> Option<IncomingMessage>;
}
