// ABOUTME: Demo application that boots a modem, waits for the network and polls for incoming SMS
// ABOUTME: Optionally sends one message first and answers every incoming message with an echo

use argh::FromArgs;
use gsmmodem::client::{Modem, ModemConfig, SmsReceiver, SmsTransmitter};
use gsmmodem::transport::{Connector, SerialConnector, TcpConnector, TransportOptions};
use std::error::Error;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Poll a GSM modem for incoming SMS
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debugging (logs all modem traffic)
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// serial device node of the modem (default: /dev/ttyUSB0)
    #[argh(option)]
    device: Option<String>,

    /// reach the modem through a TCP serial bridge at this host:port instead
    #[argh(option)]
    bridge: Option<String>,

    /// baud rate, passed on to the transport (default: 115200)
    #[argh(option, short = 'b')]
    baud: Option<u32>,

    /// seconds between polls (default: 2)
    #[argh(option, short = 'i')]
    interval: Option<u64>,

    /// send this message before polling
    #[argh(option, short = 'm')]
    message: Option<String>,

    /// the recipient of --message
    #[argh(option, short = 't')]
    to: Option<String>,

    /// reply to every incoming message with its own text
    #[argh(switch, short = 'e')]
    echo: bool,
}

async fn run<C: Connector>(modem: Modem<C>, cli_args: CliArgs) -> Result<(), Box<dyn Error>> {
    modem.boot().await?;

    let hardware = modem.hardware().await?;
    println!(
        "Modem: {} {}",
        hardware.manufacturer.unwrap_or_default(),
        hardware.model.unwrap_or_default()
    );

    println!("Waiting for network...");
    let signal = modem.wait_for_network().await?;
    let network = modem.network().await?.unwrap_or_else(|| "unknown".to_owned());
    println!("Network: {network} (signal {signal:?})");

    if let (Some(message), Some(to)) = (cli_args.message, cli_args.to) {
        modem.send_sms(&to, &message).await?;
        println!("Sent message to {to}");
    }

    let interval = Duration::from_secs(cli_args.interval.unwrap_or(2));
    loop {
        match modem.next_message(true, true).await {
            Some(message) => {
                println!("{message}");
                if cli_args.echo {
                    if let Err(e) = modem.respond(&message, &message.text).await {
                        eprintln!("Reply failed: {e}");
                    }
                }
            }
            None => tokio::time::sleep(interval).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let level = if cli_args.debugging {
        Level::TRACE
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let options =
        TransportOptions::new().with("baudrate", cli_args.baud.unwrap_or(115_200).to_string());
    let config = ModemConfig::default();

    match cli_args.bridge.clone() {
        Some(addr) => {
            let connector = TcpConnector::new(addr).with_options(options);
            run(Modem::with_config(connector, config), cli_args).await
        }
        None => {
            let path = cli_args
                .device
                .clone()
                .unwrap_or_else(|| "/dev/ttyUSB0".to_owned());
            let connector = SerialConnector::new(path).with_options(options);
            run(Modem::with_config(connector, config), cli_args).await
        }
    }
}
