// ABOUTME: Parses service center time stamps (SCTS) attached to incoming SMS
// ABOUTME: Handles the YY/MM/DD,HH:MM:SS format and its quarter-hour timezone suffix

use chrono::{Duration, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

/// SCTS layout once the timezone suffix is removed
pub const SCTS_FORMAT: &str = "%y/%m/%d,%H:%M:%S";

/// Minutes in one unit of the SCTS timezone suffix
const TZ_UNIT_MINUTES: i64 = 15;

static TZ_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([-+])(\d+)$").expect("timezone pattern is valid"));

/// Parse a service center time stamp such as `23/06/01,10:00:00-04`.
///
/// The format is not standardized across modems but looks like
/// `YY/MM/DD,HH:MM:SS`, usually followed by a signed timezone offset
/// measured in quarter hours. The offset is removed before parsing and then
/// subtracted from the parsed time, so `-04` moves the result one hour
/// later.
///
/// Returns `None` for anything that does not parse. A missing timestamp is
/// never worth failing an incoming message over.
pub fn parse_scts(timestamp: &str) -> Option<NaiveDateTime> {
    let timestamp = timestamp.trim();

    let (stamp, offset) = match TZ_SUFFIX.captures(timestamp) {
        Some(caps) => {
            let quarters: i64 = caps[2].parse().ok()?;
            let minutes = quarters.checked_mul(TZ_UNIT_MINUTES)?;
            let minutes = if &caps[1] == "-" { -minutes } else { minutes };
            let start = caps.get(0)?.start();
            (&timestamp[..start], Duration::try_minutes(minutes)?)
        }
        None => (timestamp, Duration::zero()),
    };

    let parsed = NaiveDateTime::parse_from_str(stamp, SCTS_FORMAT).ok()?;
    parsed.checked_sub_signed(offset)
}
