// ABOUTME: GSM modem client module: the modem handle, its configuration and capability traits
// ABOUTME: Exports the session lifecycle, command options, error types and SMS traits

//! GSM Modem Client Module
//!
//! * **Serialized access** - one async lock per modem; a command and its
//!   response are never interleaved with another caller's
//! * **Pull-based delivery** - incoming SMS are harvested from the output of
//!   whatever command is in flight and queued until asked for
//! * **Native async traits** - `SmsTransmitter` and `SmsReceiver` use async
//!   fn in traits (no async_trait dependency)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gsmmodem::client::{Modem, ModemConfig, SmsReceiver, SmsTransmitter};
//! use gsmmodem::transport::TcpConnector;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ModemConfig::default().with_read_timeout(Duration::from_secs(5));
//! let modem = Modem::with_config(TcpConnector::new("localhost:7000"), config);
//! modem.boot().await?;
//!
//! modem.send_sms("+15551234", "Hello!").await?;
//!
//! if let Some(message) = modem.next_message(true, true).await {
//!     println!("{message}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Raw commands
//!
//! ```rust,no_run
//! # use gsmmodem::client::{CommandOptions, Modem};
//! # use gsmmodem::transport::TcpConnector;
//! # async fn example(modem: Modem<TcpConnector>) -> gsmmodem::GsmResult<()> {
//! // raises on device errors
//! let lines = modem.command("AT+CGMI").await?;
//!
//! // returns None instead
//! let opts = CommandOptions::new().ignore_errors();
//! let maybe = modem.execute("AT+WIND=0", &opts).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod modem;
mod session;
pub mod traits;
pub mod types;

pub use error::{BUSY_CODE, ErrorCategory, GsmError, GsmResult, ModemError};
pub use modem::Modem;
pub use traits::{SmsReceiver, SmsTransmitter};
pub use types::{CommandOptions, HardwareInfo, ModemConfig, SessionState};
