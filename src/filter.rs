//! Unsolicited data filtering
//!
//! Modems interleave unsolicited output with command responses: leftover
//! command echo, blank spacer lines, status notifications and incoming SMS
//! delivered with `+CMT:`. This module separates them from the lines the
//! issued command actually produced.

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// Prefix of an incoming SMS notification
pub const CMT_PREFIX: &str = "+CMT:";

static CMT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\+CMT: "(.+?)",.*?,"(.+?)".*?$"#).expect("CMT pattern is valid")
});

/// Status notifications some modems emit no matter how they are configured.
/// Each maps to the command that queries the same status, whose response
/// must keep them.
const STATUS_NOTIFICATIONS: &[(&str, &str)] = &[
    ("+WIND:", "AT+WIND"),
    ("+CREG:", "AT+CREG"),
    ("+CGREG:", "AT+CGREG"),
];

/// An incoming SMS extracted from a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub sender: String,
    /// Raw service center timestamp, parsed later
    pub timestamp: String,
    pub body: String,
}

/// A response split into the command's own output and the incoming
/// messages found inside it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filtered {
    pub lines: Vec<String>,
    pub notifications: Vec<Notification>,
}

/// Clean the raw lines of a response to `command`.
///
/// 1. The first line is dropped once if it repeats the command (echo).
/// 2. Blank lines are dropped, and so are status notifications unless
///    `command` queries that status.
/// 3. Every `+CMT:` line and the body line after it are extracted.
pub fn filter_response(command: &str, mut lines: Vec<String>) -> Filtered {
    if lines.first().is_some_and(|first| first == command) {
        lines.remove(0);
    }

    let lines: Vec<String> = lines
        .into_iter()
        .filter(|line| !line.is_empty() && !is_unsolicited_status(command, line))
        .collect();

    extract_notifications(lines)
}

fn is_unsolicited_status(command: &str, line: &str) -> bool {
    STATUS_NOTIFICATIONS
        .iter()
        .any(|(prefix, query)| line.starts_with(prefix) && !command.starts_with(query))
}

/// Pull `+CMT:` notifications (header plus body line) out of `lines`.
///
/// A header that cannot be parsed, or that has no body line after it, is
/// skipped on its own and the scan carries on.
pub fn extract_notifications(lines: Vec<String>) -> Filtered {
    let mut filtered = Filtered::default();
    let mut lines = lines.into_iter().peekable();

    while let Some(line) = lines.next() {
        if !line.starts_with(CMT_PREFIX) {
            filtered.lines.push(line);
            continue;
        }

        let Some(caps) = CMT_HEADER.captures(&line) else {
            warn!(line = %line, "Skipping unparseable incoming message notification");
            continue;
        };
        let Some(body) = lines.next() else {
            warn!(line = %line, "Incoming message notification without a body");
            continue;
        };

        filtered.notifications.push(Notification {
            sender: caps[1].to_string(),
            timestamp: caps[2].to_string(),
            body: body.trim().to_string(),
        });
    }

    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_echo_dropped_once() {
        let filtered = filter_response("AT+CGMI", lines(&["AT+CGMI", "AT+CGMI", "ACME"]));
        assert_eq!(filtered.lines, lines(&["AT+CGMI", "ACME"]));
    }

    #[test]
    fn test_echo_only_checked_on_first_line() {
        let filtered = filter_response("AT+CGMI", lines(&["ACME", "AT+CGMI"]));
        assert_eq!(filtered.lines, lines(&["ACME", "AT+CGMI"]));
    }

    #[test]
    fn test_blank_lines_dropped() {
        let filtered = filter_response("AT+CSQ", lines(&["", "+CSQ: 20,99", ""]));
        assert_eq!(filtered.lines, lines(&["+CSQ: 20,99"]));
    }

    #[test]
    fn test_status_notifications_only_kept_when_queried() {
        let raw = lines(&["+CREG: 1", "+CSQ: 20,99"]);
        let filtered = filter_response("AT+CSQ", raw);
        assert_eq!(filtered.lines, lines(&["+CSQ: 20,99"]));

        let filtered = filter_response("AT+CREG?", lines(&["+CREG: 0,1"]));
        assert_eq!(filtered.lines, lines(&["+CREG: 0,1"]));

        let filtered = filter_response("AT", lines(&["+WIND: 4"]));
        assert!(filtered.lines.is_empty());
    }

    #[test]
    fn test_incoming_message_extracted() {
        let raw = lines(&[
            "+CSQ: 20,99",
            r#"+CMT: "+15551234",,"23/06/01,10:00:00-04""#,
            "Hello there",
        ]);
        let filtered = filter_response("AT+CSQ", raw);

        assert_eq!(filtered.lines, lines(&["+CSQ: 20,99"]));
        assert_eq!(
            filtered.notifications,
            vec![Notification {
                sender: "+15551234".to_string(),
                timestamp: "23/06/01,10:00:00-04".to_string(),
                body: "Hello there".to_string(),
            }]
        );
    }

    #[test]
    fn test_unparseable_notification_skipped() {
        let raw = lines(&[
            "+CMT: garbage",
            r#"+CMT: "+1",,"23/06/01,10:00:00""#,
            "second",
            "tail",
        ]);
        let filtered = extract_notifications(raw);

        assert_eq!(filtered.notifications.len(), 1);
        assert_eq!(filtered.notifications[0].sender, "+1");
        assert_eq!(filtered.notifications[0].body, "second");
        assert_eq!(filtered.lines, lines(&["tail"]));
    }

    #[test]
    fn test_notification_without_body_skipped() {
        let raw = lines(&["OTHER", r#"+CMT: "+1",,"23/06/01,10:00:00""#]);
        let filtered = extract_notifications(raw);

        assert!(filtered.notifications.is_empty());
        assert_eq!(filtered.lines, lines(&["OTHER"]));
    }
}
