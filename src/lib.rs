//! Drive GSM modems with AT commands.
//!
//! The crate is layered the way bytes flow off the wire:
//!
//! * [`transport`] opens byte streams (serial device, TCP bridge)
//! * [`connection`] splits them into lines with per-read timeouts
//! * [`response`] collects lines up to `OK` or an error
//! * [`filter`] separates unsolicited output and incoming SMS
//! * [`assembler`] joins multipart messages and queues them
//! * [`client`] ties it together behind one lock per modem

pub mod assembler;
pub mod client;
pub mod connection;
pub mod datatypes;
pub mod encoding;
pub mod filter;
pub mod message;
pub mod response;
pub mod transport;


// Re-export the main client API for easy access
pub use client::{
    CommandOptions, GsmError, GsmResult, Modem, ModemConfig, ModemError, SmsReceiver,
    SmsTransmitter,
};
pub use message::{IncomingMessage, StoredMessage};
pub use transport::{Connector, SerialConnector, SerialSettings, TcpConnector, TransportOptions};
