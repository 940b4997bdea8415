// ABOUTME: Public modem handle serializing all device access through one async lock
// ABOUTME: Provides connect/boot lifecycle, queries, SMS sending and the incoming message queue

use crate::client::error::{GsmError, GsmResult};
use crate::client::session::Session;
use crate::client::traits::{SmsReceiver, SmsTransmitter};
use crate::client::types::{CommandOptions, HardwareInfo, ModemConfig, SessionState};
use crate::connection::Connection;
use crate::datatypes::{MessageStatus, SignalStrength};
use crate::message::{IncomingMessage, StoredMessage};
use crate::transport::Connector;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A GSM modem driven with AT commands
///
/// Every public operation takes the session lock once and holds it for the
/// whole exchange, so commands issued from concurrent tasks never
/// interleave on the wire. Incoming messages are only read while some
/// command is in flight; call [`SmsReceiver::next_message`] (or
/// [`Modem::ping`]) regularly to give the modem a chance to deliver them.
///
/// ```rust,no_run
/// use gsmmodem::client::{Modem, SmsReceiver, SmsTransmitter};
/// use gsmmodem::transport::SerialConnector;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let modem = Modem::new(SerialConnector::new("/dev/ttyUSB0"));
/// modem.boot().await?;
/// modem.wait_for_network().await?;
///
/// modem.send_sms("+15551234", "Hello!").await?;
///
/// while let Some(message) = modem.next_message(true, true).await {
///     modem.respond(&message, "Thanks").await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct Modem<C: Connector> {
    connector: C,
    session: Mutex<Session<C::Stream>>,
}

impl<C: Connector> Modem<C> {
    pub fn new(connector: C) -> Self {
        Self::with_config(connector, ModemConfig::default())
    }

    pub fn with_config(connector: C, config: ModemConfig) -> Self {
        Self {
            connector,
            session: Mutex::new(Session::new(config)),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state
    }

    async fn open(&self, session: &mut Session<C::Stream>) -> GsmResult<()> {
        debug!("Connecting");
        session.state = SessionState::Connecting;
        match self.connector.open().await {
            Ok(stream) => {
                session.attach(Connection::new(stream));
                Ok(())
            }
            Err(err) => {
                session.state = SessionState::Disconnected;
                Err(GsmError::Connect(err))
            }
        }
    }

    /// Open the transport. Does nothing when already connected.
    pub async fn connect(&self) -> GsmResult<()> {
        let mut session = self.session.lock().await;
        if session.state.is_connected() {
            return Ok(());
        }
        self.open(&mut session).await
    }

    /// Drop the transport and open a new one.
    pub async fn reconnect(&self) -> GsmResult<()> {
        let mut session = self.session.lock().await;
        session.detach().await;
        self.open(&mut session).await
    }

    /// Close the transport. Returns `false` when nothing was connected.
    pub async fn disconnect(&self) -> bool {
        debug!("Disconnecting");
        self.session.lock().await.detach().await
    }

    /// Connect if needed and configure the modem for text mode SMS.
    pub async fn boot(&self) -> GsmResult<()> {
        let mut session = self.session.lock().await;
        if !session.state.is_connected() {
            self.open(&mut session).await?;
        }
        session.boot(false).await
    }

    /// Reconnect, reset the modem with `AT+CFUN=1` and boot it again.
    ///
    /// The reset drops the network connection, so
    /// [`Modem::wait_for_network`] is usually called afterwards.
    pub async fn reboot(&self) -> GsmResult<()> {
        let mut session = self.session.lock().await;
        info!("Rebooting modem");
        session.detach().await;
        self.open(&mut session).await?;
        session.boot(true).await
    }

    /// Issue a raw command.
    ///
    /// Returns the response lines with echo, blank lines, status
    /// notifications and incoming messages removed, or `None` when the
    /// command failed and `opts.raise_errors` is off.
    pub async fn execute(
        &self,
        command: &str,
        opts: &CommandOptions,
    ) -> GsmResult<Option<Vec<String>>> {
        self.session.lock().await.execute(command, opts).await
    }

    /// Issue a raw command with default options.
    pub async fn command(&self, command: &str) -> GsmResult<Vec<String>> {
        let lines = self.execute(command, &CommandOptions::new()).await?;
        Ok(lines.unwrap_or_default())
    }

    /// Issue a query, returning every response line (without `prefix`
    /// when given, dropping lines without it). Device errors give `None`.
    pub async fn query_list(
        &self,
        command: &str,
        prefix: Option<&str>,
    ) -> GsmResult<Option<Vec<String>>> {
        self.session.lock().await.query_list(command, prefix).await
    }

    /// Issue a query that answers with exactly one line.
    ///
    /// ```rust,no_run
    /// # use gsmmodem::client::Modem;
    /// # use gsmmodem::transport::TcpConnector;
    /// # async fn example(modem: Modem<TcpConnector>) -> gsmmodem::GsmResult<()> {
    /// let csq = modem.query("AT+CSQ", Some("+CSQ:")).await?;
    /// assert_eq!(csq.as_deref(), Some("20,99"));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn query(&self, command: &str, prefix: Option<&str>) -> GsmResult<Option<String>> {
        self.session.lock().await.query(command, prefix).await
    }

    /// Manufacturer-specific identification of the device
    pub async fn hardware(&self) -> GsmResult<HardwareInfo> {
        self.session.lock().await.hardware().await
    }

    pub async fn signal_strength(&self) -> GsmResult<SignalStrength> {
        self.session.lock().await.signal_strength().await
    }

    /// Poll the signal strength until the modem reports a usable network.
    ///
    /// Never gives up on its own. Run it under `tokio::time::timeout` or in
    /// a task that can be aborted when a bound is needed. The lock is
    /// released between polls.
    pub async fn wait_for_network(&self) -> GsmResult<SignalStrength> {
        loop {
            let (signal, interval) = {
                let mut session = self.session.lock().await;
                let signal = session.signal_strength().await?;
                (signal, session.config.network_poll_interval)
            };

            if signal.is_available() {
                info!(signal = ?signal, "Network available");
                return Ok(signal);
            }
            debug!(signal = ?signal, "Waiting for network");
            tokio::time::sleep(interval).await;
        }
    }

    /// Name of the current operator
    pub async fn network(&self) -> GsmResult<Option<String>> {
        self.session.lock().await.network().await
    }

    /// Service center number, `None` when the modem does not report one
    pub async fn service_center(&self) -> GsmResult<Option<String>> {
        self.session.lock().await.service_center().await
    }

    /// Change the service center. Returns whether the modem accepted it.
    pub async fn set_service_center(&self, number: &str) -> GsmResult<bool> {
        self.session.lock().await.set_service_center(number).await
    }

    /// Send a bare `AT`. Also gives the modem a chance to deliver incoming
    /// messages.
    pub async fn ping(&self) -> bool {
        self.session.lock().await.ping().await
    }

    /// Move unread messages from device storage into the incoming queue.
    /// Returns how many were found.
    pub async fn fetch_stored_messages(&self) -> GsmResult<usize> {
        let mut session = self.session.lock().await;
        let messages = session.list_messages(MessageStatus::ReceivedUnread).await?;
        Ok(messages.len())
    }

    /// List messages held in device storage.
    ///
    /// Listing unread messages marks them read on most devices, so they
    /// are also added to the incoming queue.
    pub async fn list_messages(&self, status: MessageStatus) -> GsmResult<Vec<StoredMessage>> {
        self.session.lock().await.list_messages(status).await
    }

    /// Delete a message from device storage by index
    pub async fn delete_message(&self, index: u32) -> GsmResult<()> {
        self.session.lock().await.delete_message(index).await
    }

    /// Reply to the sender of `message`
    pub async fn respond(&self, message: &IncomingMessage, text: &str) -> GsmResult<()> {
        message.respond(self, text).await
    }

    /// Number of complete messages waiting in the incoming queue
    pub async fn queued_messages(&self) -> usize {
        self.session.lock().await.assembler.queued()
    }
}

impl<C: Connector> SmsTransmitter for Modem<C> {
    async fn send_sms(&self, recipient: &str, text: &str) -> GsmResult<()> {
        self.session.lock().await.send_sms(recipient, text).await
    }
}

impl<C: Connector> SmsReceiver for Modem<C> {
    async fn next_message(&self, poll: bool, fetch_stored: bool) -> Option<IncomingMessage> {
        let mut session = self.session.lock().await;

        if poll {
            session.ping().await;
        }

        if fetch_stored {
            if let Err(err) = session.list_messages(MessageStatus::ReceivedUnread).await {
                warn!("Could not fetch stored messages: {}", err);
            }
        }

        session.assembler.pop()
    }
}
