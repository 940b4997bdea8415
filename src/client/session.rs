// ABOUTME: Command engine operating on an exclusively held modem session
// ABOUTME: Implements busy retries, notification harvesting, the SMS prompt exchange and message listings

use crate::assembler::Assembler;
use crate::client::error::{GsmError, GsmResult};
use crate::client::types::{
    ABORT, CommandOptions, HardwareInfo, ModemConfig, SUBMIT_TERMINATOR, SessionState,
};
use crate::connection::Connection;
use crate::datatypes::{
    MessageStatus, OperatorSelection, SignalStrength, parse_operator, parse_operator_name,
    parse_scts,
};
use crate::encoding::{encode_outgoing_text, needs_ucs2};
use crate::filter::filter_response;
use crate::message::StoredMessage;
use crate::response::{Reply, collect_response};
use bytes::{BufMut, Bytes, BytesMut};
use regex::Regex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::LazyLock;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

static CMGL_RECEIVED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\+CMGL: (\d+),"(.+?)","(.+?)",.*?,"(.+?)".*?$"#)
        .expect("received listing pattern is valid")
});

static CMGL_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\+CMGL: (\d+),"(.+?)".*?$"#).expect("listing pattern is valid")
});

static CSCA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\+CSCA:\s+"(\+?\d+)","#).expect("service center pattern is valid")
});

type CommandFuture<'a> = Pin<Box<dyn Future<Output = GsmResult<Reply>> + Send + 'a>>;

/// Everything that belongs to one connection to the modem.
///
/// A session is only ever reached through the modem's lock, so every method
/// here runs with exclusive access to the device. Methods call each other
/// freely: a nested command (such as the acknowledgement of an incoming
/// message) runs on the session the caller already holds.
#[derive(Debug)]
pub(crate) struct Session<S> {
    link: Option<Connection<S>>,
    pub(crate) state: SessionState,
    pub(crate) assembler: Assembler,
    /// `AT+COPN` table, loaded on first use
    known_networks: Option<HashMap<String, String>>,
    /// A command was written and its reply not fully read
    reply_pending: bool,
    /// The device showed the `>` prompt and waits for message text
    prompt_open: bool,
    pub(crate) config: ModemConfig,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub(crate) fn new(config: ModemConfig) -> Self {
        Self {
            link: None,
            state: SessionState::Disconnected,
            assembler: Assembler::new(config.decode_ucs2_hex),
            known_networks: None,
            reply_pending: false,
            prompt_open: false,
            config,
        }
    }

    pub(crate) fn attach(&mut self, connection: Connection<S>) {
        self.link = Some(connection);
        self.reply_pending = false;
        self.prompt_open = false;
        self.state = SessionState::Connected;
    }

    /// Drop the transport. Returns whether one was attached.
    pub(crate) async fn detach(&mut self) -> bool {
        self.state = SessionState::Disconnected;
        match self.link.take() {
            Some(mut connection) => {
                if let Err(err) = connection.shutdown().await {
                    debug!("Ignoring error while closing transport: {}", err);
                }
                true
            }
            None => false,
        }
    }

    fn connection(&mut self) -> GsmResult<&mut Connection<S>> {
        if !self.state.is_connected() {
            return Err(GsmError::InvalidState(format!(
                "modem is {:?}",
                self.state
            )));
        }
        self.link
            .as_mut()
            .ok_or_else(|| GsmError::InvalidState("no transport attached".to_string()))
    }

    /// Write `command` and collect the raw response, retrying while the
    /// device reports it is busy.
    ///
    /// An earlier exchange that was dropped half way (its future cancelled)
    /// can leave the device at the SMS prompt or still answering. That is
    /// cleaned up before anything new is written. Message text sent while
    /// the prompt is open continues the exchange instead.
    async fn exchange(&mut self, command: &str, opts: &CommandOptions) -> GsmResult<Reply> {
        let continues_prompt =
            self.prompt_open && opts.write_terminator[..] == *SUBMIT_TERMINATOR;
        if !continues_prompt && (self.reply_pending || self.prompt_open) {
            warn!(
                prompt_open = self.prompt_open,
                "Previous exchange was interrupted, resetting device"
            );
            self.abort_prompt().await;
        }

        let timeout = opts.read_timeout.unwrap_or(self.config.read_timeout);
        let mut payload = BytesMut::with_capacity(command.len() + opts.write_terminator.len());
        payload.put_slice(command.as_bytes());
        payload.put_slice(&opts.write_terminator);

        let mut attempt = 0;
        loop {
            self.reply_pending = true;
            let conn = self.connection()?;
            conn.write_all(&payload).await?;
            let result = collect_response(conn, &opts.read_terminator, timeout).await;

            self.reply_pending = false;
            self.prompt_open = matches!(
                &result,
                Ok(Reply::TimedOut { pending, .. }) if pending.starts_with('>')
            );

            match result {
                Err(err) if err.is_busy() && attempt < self.config.max_retries => {
                    attempt += 1;
                    debug!(
                        command,
                        attempt, "Modem busy, retrying in {:?}", self.config.retry_delay
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                result => return result,
            }
        }
    }

    /// Run one command exchange: write, collect, filter out unsolicited
    /// data and harvest incoming messages, then rest for `command_delay`.
    ///
    /// Returns the cleaned reply. A timeout is reported as
    /// [`Reply::TimedOut`] rather than an error.
    pub(crate) fn command<'a>(
        &'a mut self,
        command: &'a str,
        opts: &'a CommandOptions,
    ) -> CommandFuture<'a> {
        Box::pin(async move {
            let result = match self.exchange(command, opts).await {
                Ok(Reply::Complete(lines)) => Ok(Reply::Complete(self.harvest(command, lines).await)),
                Ok(Reply::TimedOut { lines, pending }) => Ok(Reply::TimedOut {
                    lines: self.harvest(command, lines).await,
                    pending,
                }),
                Err(err) => Err(err),
            };

            tokio::time::sleep(self.config.command_delay).await;
            result
        })
    }

    /// Filter `lines`, acknowledge and assemble every incoming message
    /// found among them, and return what is left.
    async fn harvest(&mut self, command: &str, lines: Vec<String>) -> Vec<String> {
        let filtered = filter_response(command, lines);

        for notification in filtered.notifications {
            let ack = CommandOptions::new().ignore_errors();
            if let Err(err) = self.execute("AT+CNMA", &ack).await {
                debug!("Ignoring failed message acknowledgement: {}", err);
            }
            self.assembler.accept(
                &notification.sender,
                &notification.timestamp,
                &notification.body,
            );
        }

        filtered.lines
    }

    /// Issue `command` and return its cleaned response lines.
    ///
    /// With `raise_errors` off, device rejections and timeouts produce
    /// `Ok(None)`. Transport failures are always returned.
    pub(crate) async fn execute(
        &mut self,
        command: &str,
        opts: &CommandOptions,
    ) -> GsmResult<Option<Vec<String>>> {
        let result = match self.command(command, opts).await {
            Ok(Reply::Complete(lines)) => Ok(lines),
            Ok(Reply::TimedOut { pending, .. }) => Err(GsmError::ReadTimeout { pending }),
            Err(err) => Err(err),
        };

        match result {
            Ok(lines) => Ok(Some(lines)),
            Err(err) if !opts.raise_errors && err.is_recoverable() => {
                debug!(command, "Ignoring error: {}", err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Issue a query and return its response lines.
    ///
    /// Device errors yield `None`. With a `prefix`, only lines starting
    /// with it are kept, with the prefix removed.
    pub(crate) async fn query_list(
        &mut self,
        command: &str,
        prefix: Option<&str>,
    ) -> GsmResult<Option<Vec<String>>> {
        let opts = CommandOptions::new().ignore_errors();
        let Some(lines) = self.execute(command, &opts).await? else {
            return Ok(None);
        };

        let lines = match prefix {
            Some(prefix) => lines
                .iter()
                .filter_map(|line| line.strip_prefix(prefix))
                .map(|rest| rest.trim().to_string())
                .collect(),
            None => lines,
        };
        Ok(Some(lines))
    }

    /// Issue a query expected to produce exactly one line.
    pub(crate) async fn query(
        &mut self,
        command: &str,
        prefix: Option<&str>,
    ) -> GsmResult<Option<String>> {
        let lines = self.query_list(command, prefix).await?;
        Ok(lines.and_then(|mut lines| match lines.len() {
            1 => lines.pop(),
            _ => None,
        }))
    }

    pub(crate) async fn boot(&mut self, reset: bool) -> GsmResult<()> {
        info!(reset, "Booting modem");
        let lenient = CommandOptions::new().ignore_errors();

        if reset {
            self.execute("AT+CFUN=1", &lenient).await?;
        }

        // echo off, verbose errors, no vendor notifications
        for command in ["ATE0", "AT+CMEE=1", "AT+WIND=0"] {
            self.execute(command, &lenient).await?;
        }

        if let Err(err) = self.execute("AT+CMGF=1", &CommandOptions::new()).await {
            warn!("Modem refused text mode, boot failed: {}", err);
            return Err(err);
        }

        self.execute("AT+CSCS=\"GSM\"", &lenient).await?;

        if let Some(cnmi) = self.config.new_message_indication.clone() {
            self.execute(&format!("AT+CNMI={cnmi}"), &lenient).await?;
        }

        self.state = SessionState::Ready;
        info!("Modem ready");
        Ok(())
    }

    pub(crate) async fn ping(&mut self) -> bool {
        match self.execute("AT", &CommandOptions::new()).await {
            Ok(_) => true,
            Err(err) => {
                debug!("Ping failed: {}", err);
                false
            }
        }
    }

    /// Send an SMS. Any failure leaves the device out of the text prompt.
    pub(crate) async fn send_sms(&mut self, recipient: &str, text: &str) -> GsmResult<()> {
        let mut saved_mode = None;
        let result = self.submit(recipient, text, &mut saved_mode).await;

        if let Err(err) = &result {
            warn!(recipient, "Sending SMS failed: {}", err);
            self.abort_prompt().await;
        }

        if let Some(mode) = saved_mode {
            let lenient = CommandOptions::new().ignore_errors();
            self.execute(&format!("AT+CSMP={mode}"), &lenient).await?;
            self.execute("AT+CSCS=\"GSM\"", &lenient).await?;
        }

        if result.is_ok() {
            info!(recipient, "SMS sent");
        }
        result
    }

    async fn submit(
        &mut self,
        recipient: &str,
        text: &str,
        saved_mode: &mut Option<String>,
    ) -> GsmResult<()> {
        let mut body = text.to_string();

        if needs_ucs2(text) {
            if let Some(csmp) = self.query("AT+CSMP?", Some("+CSMP:")).await? {
                let mut mode: Vec<&str> = csmp.split(',').map(str::trim).collect();
                if mode.len() > 3 {
                    *saved_mode = Some(mode.join(","));
                    mode[3] = "8";
                    self.execute(&format!("AT+CSMP={}", mode.join(",")), &CommandOptions::new())
                        .await?;
                    body = encode_outgoing_text(text);
                }
            }
        }

        // Some modems print the prompt and then an error, so wait the
        // whole prompt timeout instead of returning at the first `>`.
        let cmgs = format!("AT+CMGS=\"{recipient}\"");
        let prompt = CommandOptions::new().with_read_timeout(self.config.prompt_timeout);
        match self.command(&cmgs, &prompt).await? {
            Reply::TimedOut { pending, .. } if pending.starts_with('>') => {}
            Reply::TimedOut { pending, .. } => return Err(GsmError::ReadTimeout { pending }),
            Reply::Complete(lines) => {
                return Err(GsmError::UnexpectedResponse {
                    command: cmgs,
                    response: lines,
                });
            }
        }

        let submit = CommandOptions::new()
            .with_write_terminator(Bytes::from_static(SUBMIT_TERMINATOR))
            .with_read_timeout(self.config.submit_timeout);
        self.execute(&body, &submit).await?;
        Ok(())
    }

    /// Leave the SMS text prompt, dropping anything half typed, and throw
    /// away whatever the device still sends for up to `prompt_timeout`.
    ///
    /// ESC is ignored outside the prompt, so this is also how any other
    /// interrupted exchange is cleaned up.
    async fn abort_prompt(&mut self) {
        let drain = self.config.prompt_timeout;
        if let Some(conn) = self.link.as_mut() {
            match conn.write_all(ABORT).await {
                Ok(()) => {
                    if let Err(err) = conn.drain(drain).await {
                        warn!("Could not drain input after abort: {}", err);
                        conn.discard_buffered();
                    }
                }
                Err(err) => {
                    warn!("Could not abort SMS prompt: {}", err);
                    conn.discard_buffered();
                }
            }
        }

        self.reply_pending = false;
        self.prompt_open = false;
    }

    pub(crate) async fn hardware(&mut self) -> GsmResult<HardwareInfo> {
        Ok(HardwareInfo {
            manufacturer: self.query("AT+CGMI", None).await?,
            model: self.query("AT+CGMM", None).await?,
            revision: self.query("AT+CGMR", None).await?,
            serial: self.query("AT+CGSN", None).await?,
        })
    }

    pub(crate) async fn signal_strength(&mut self) -> GsmResult<SignalStrength> {
        Ok(match self.query("AT+CSQ", None).await? {
            Some(line) => SignalStrength::from_csq(&line),
            None => SignalStrength::Error,
        })
    }

    pub(crate) async fn service_center(&mut self) -> GsmResult<Option<String>> {
        let Some(line) = self.query("AT+CSCA?", None).await? else {
            return Ok(None);
        };
        Ok(CSCA.captures(&line).map(|caps| caps[1].to_string()))
    }

    pub(crate) async fn set_service_center(&mut self, number: &str) -> GsmResult<bool> {
        let opts = CommandOptions::new().ignore_errors();
        let result = self.execute(&format!("AT+CSCA=\"{number}\""), &opts).await?;
        Ok(result.is_some())
    }

    /// Name of the selected operator, or a description of the selection
    /// mode when no operator is reported.
    pub(crate) async fn network(&mut self) -> GsmResult<Option<String>> {
        let Some(reply) = self.query("AT+COPS?", Some("+COPS:")).await? else {
            return Ok(None);
        };

        match parse_operator(&reply) {
            Some(OperatorSelection::Mode(mode)) => Ok(Some(mode.to_string())),
            Some(OperatorSelection::Named(name)) => Ok(Some(name)),
            Some(OperatorSelection::Numeric(id)) => {
                let networks = self.known_networks().await?;
                Ok(networks.get(&id).cloned())
            }
            None => {
                warn!(reply = %reply, "Could not interpret operator selection");
                Ok(None)
            }
        }
    }

    async fn known_networks(&mut self) -> GsmResult<&HashMap<String, String>> {
        if self.known_networks.is_none() {
            let entries = self
                .query_list("AT+COPN", Some("+COPN:"))
                .await?
                .unwrap_or_default();

            let table = entries
                .iter()
                .map(|entry| parse_operator_name(entry))
                .collect::<GsmResult<HashMap<_, _>>>()
                .unwrap_or_else(|err| {
                    warn!("Could not read operator names: {}", err);
                    HashMap::new()
                });
            debug!("Loaded {} operator names", table.len());
            self.known_networks = Some(table);
        }

        Ok(self.known_networks.get_or_insert_with(HashMap::new))
    }

    /// List messages in device storage. Unread received messages are also
    /// added to the incoming queue.
    pub(crate) async fn list_messages(
        &mut self,
        status: MessageStatus,
    ) -> GsmResult<Vec<StoredMessage>> {
        let command = format!("AT+CMGL=\"{}\"", status.label());
        let lines = self
            .execute(&command, &CommandOptions::new())
            .await?
            .unwrap_or_default();

        let messages = self.parse_listing(&lines)?;
        debug!("Listed {} stored messages", messages.len());
        Ok(messages)
    }

    fn parse_listing(&mut self, lines: &[String]) -> GsmResult<Vec<StoredMessage>> {
        let mut messages = Vec::new();
        let mut lines = lines.iter().peekable();

        while let Some(header) = lines.next() {
            let caps = CMGL_HEADER
                .captures(header)
                .ok_or_else(|| GsmError::Parse(format!("bad message listing {header:?}")))?;

            let index = caps[1]
                .parse::<u32>()
                .map_err(|_| GsmError::Parse(format!("bad message index {header:?}")))?;
            let status = MessageStatus::from_label(&caps[2])
                .or_else(|| {
                    caps[2]
                        .parse::<u8>()
                        .ok()
                        .and_then(|n| MessageStatus::try_from(n).ok())
                })
                .ok_or_else(|| GsmError::Parse(format!("bad message status {header:?}")))?;

            let mut raw_text = String::new();
            while let Some(line) = lines.next_if(|line| !CMGL_HEADER.is_match(line)) {
                raw_text.push_str(line);
            }
            let raw_text = raw_text.trim();

            let (sender, timestamp) = match CMGL_RECEIVED.captures(header) {
                Some(caps) if status.is_received() => {
                    (Some(caps[3].to_string()), Some(caps[4].to_string()))
                }
                _ => (None, None),
            };

            if status == MessageStatus::ReceivedUnread {
                if let (Some(sender), Some(timestamp)) = (&sender, &timestamp) {
                    self.assembler.enqueue(sender, timestamp, raw_text);
                }
            }

            messages.push(StoredMessage {
                index,
                status,
                sender,
                timestamp: timestamp.as_deref().and_then(parse_scts),
                text: self.assembler.decode_text(raw_text),
            });
        }

        Ok(messages)
    }

    pub(crate) async fn delete_message(&mut self, index: u32) -> GsmResult<()> {
        self.execute(&format!("AT+CMGD={index}"), &CommandOptions::new())
            .await?;
        Ok(())
    }
}
