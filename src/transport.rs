//! Transport connectors
//!
//! The engine never opens sockets or device nodes itself. A [`Connector`]
//! produces a fresh byte stream whenever the session connects or
//! reconnects. Line settings such as baud rate or flow control belong to
//! the transport and are carried as opaque [`TransportOptions`]; the
//! engine never looks at them.

use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::debug;

/// Baud rate used when the options do not name one
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Opens byte streams to a modem
///
/// Implementations must be able to open repeatedly: a reboot tears the
/// stream down and asks for a new one.
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a new stream to the device
    fn open(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Opaque key/value transport settings, passed through untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions(BTreeMap<String, String>);

impl TransportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a setting
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Connects to a modem exposed over TCP (ser2net and similar bridges)
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    options: TransportOptions,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            options: TransportOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TransportOptions) -> Self {
        self.options = options;
        self
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn open(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send {
        let addr = self.addr.clone();
        debug!(addr = %addr, options = ?self.options, "Opening TCP transport");
        async move {
            let stream = TcpStream::connect(addr).await?;
            stream.set_nodelay(true)?;
            Ok::<_, io::Error>(stream)
        }
    }
}

/// Line settings for a serial port, read from [`TransportOptions`]
///
/// Recognized keys: `baudrate`, `bytesize` (5 to 8), `parity` (`N`, `E`
/// or `O`), `stopbits` (1 or 2), `rtscts` and `xonxoff` (`1`/`true` to
/// enable). Anything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

impl SerialSettings {
    pub fn from_options(options: &TransportOptions) -> io::Result<Self> {
        let mut settings = Self::default();

        if let Some(baud) = options.get("baudrate") {
            settings.baud_rate = baud
                .parse()
                .map_err(|_| invalid_option("baudrate", baud))?;
        }

        if let Some(bits) = options.get("bytesize") {
            settings.data_bits = match bits {
                "5" => DataBits::Five,
                "6" => DataBits::Six,
                "7" => DataBits::Seven,
                "8" => DataBits::Eight,
                _ => return Err(invalid_option("bytesize", bits)),
            };
        }

        if let Some(parity) = options.get("parity") {
            settings.parity = match parity.to_ascii_uppercase().as_str() {
                "N" | "NONE" => Parity::None,
                "E" | "EVEN" => Parity::Even,
                "O" | "ODD" => Parity::Odd,
                _ => return Err(invalid_option("parity", parity)),
            };
        }

        if let Some(stop) = options.get("stopbits") {
            settings.stop_bits = match stop {
                "1" => StopBits::One,
                "2" => StopBits::Two,
                _ => return Err(invalid_option("stopbits", stop)),
            };
        }

        // hardware flow control wins when both are requested
        if flag(options, "xonxoff")? {
            settings.flow_control = FlowControl::Software;
        }
        if flag(options, "rtscts")? {
            settings.flow_control = FlowControl::Hardware;
        }

        Ok(settings)
    }
}

fn flag(options: &TransportOptions, key: &str) -> io::Result<bool> {
    match options.get(key) {
        None => Ok(false),
        Some("1") | Some("true") => Ok(true),
        Some("0") | Some("false") => Ok(false),
        Some(value) => Err(invalid_option(key, value)),
    }
}

fn invalid_option(key: &str, value: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("invalid serial option {key}={value}"),
    )
}

/// Connects to a modem through a serial device such as `/dev/ttyUSB0`
///
/// The port is opened with the line settings from the connector's
/// [`TransportOptions`] (see [`SerialSettings`]), 115200 8N1 without flow
/// control by default.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    path: PathBuf,
    options: TransportOptions,
}

impl SerialConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: TransportOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TransportOptions) -> Self {
        self.options = options;
        self
    }
}

impl Connector for SerialConnector {
    type Stream = SerialStream;

    fn open(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send {
        let path = self.path.to_string_lossy().into_owned();
        let settings = SerialSettings::from_options(&self.options);
        async move {
            let settings = settings?;
            debug!(path = %path, settings = ?settings, "Opening serial transport");

            // registering with the reactor needs the runtime, so open here
            // rather than before the future is polled
            let stream = tokio_serial::new(path, settings.baud_rate)
                .data_bits(settings.data_bits)
                .parity(settings.parity)
                .stop_bits(settings.stop_bits)
                .flow_control(settings.flow_control)
                .open_native_async()?;
            Ok::<_, io::Error>(stream)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_options_are_opaque() {
        let options = TransportOptions::new()
            .with("baudrate", "115200")
            .with("rtscts", "1");

        assert_eq!(options.get("baudrate"), Some("115200"));
        assert_eq!(options.get("parity"), None);
        assert_eq!(options.iter().count(), 2);
    }

    #[test]
    fn test_serial_settings_default_to_8n1() {
        let settings = SerialSettings::from_options(&TransportOptions::new()).unwrap();
        assert_eq!(settings, SerialSettings::default());
        assert_eq!(settings.baud_rate, 115_200);
        assert_eq!(settings.flow_control, FlowControl::None);
    }

    #[test]
    fn test_serial_settings_from_options() {
        let options = TransportOptions::new()
            .with("baudrate", "9600")
            .with("bytesize", "7")
            .with("parity", "E")
            .with("stopbits", "2")
            .with("rtscts", "1");

        let settings = SerialSettings::from_options(&options).unwrap();
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.data_bits, DataBits::Seven);
        assert_eq!(settings.parity, Parity::Even);
        assert_eq!(settings.stop_bits, StopBits::Two);
        assert_eq!(settings.flow_control, FlowControl::Hardware);

        let options = TransportOptions::new().with("xonxoff", "true");
        let settings = SerialSettings::from_options(&options).unwrap();
        assert_eq!(settings.flow_control, FlowControl::Software);
    }

    #[test]
    fn test_serial_settings_reject_bad_values() {
        for (key, value) in [
            ("baudrate", "fast"),
            ("bytesize", "9"),
            ("parity", "X"),
            ("stopbits", "3"),
            ("rtscts", "maybe"),
        ] {
            let options = TransportOptions::new().with(key, value);
            let err = SerialSettings::from_options(&options).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{key}={value}");
        }
    }

    #[tokio::test]
    async fn test_serial_connector_rejects_bad_options_before_opening() {
        let connector = SerialConnector::new("/nonexistent/ttyGSM0")
            .with_options(TransportOptions::new().with("baudrate", "fast"));
        let err = connector.open().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_serial_connector_reports_missing_device() {
        let connector = SerialConnector::new("/nonexistent/ttyGSM0");
        assert!(connector.open().await.is_err());
    }
}
