mod datetime;
mod message_status;
mod network;
mod signal_strength;

pub use datetime::{SCTS_FORMAT, parse_scts};
pub use message_status::MessageStatus;
pub use network::{
    OperatorSelection, parse_operator, parse_operator_name, plmn_mode_name, split_fields,
};
pub use signal_strength::{RSSI_UNKNOWN, SignalStrength};
