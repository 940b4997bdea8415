//! Response collection
//!
//! A command response is every line the modem sends until a terminal line:
//! `OK`, `ERROR`, a coded `+CMS ERROR: <n>` / `+CME ERROR: <n>`, or one of
//! a few vendor-specific failure strings. Any other line is content (or an
//! unsolicited notification, sorted out later by [`crate::filter`]).
//!
//! There is no cap on the number of lines: the first terminal line always
//! ends the response.

use crate::client::error::{ErrorCategory, GsmResult, ModemError};
use crate::connection::{Connection, ReadOutcome};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

static CODED_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+(CM[ES]) ERROR: (\d+)$").expect("coded error pattern is valid")
});

/// Non-standard failure strings some modems print instead of `ERROR`.
/// Some Huawei E220s answer unsupported commands this way.
pub const VENDOR_ERRORS: &[&str] = &["COMMAND NOT SUPPORT"];

/// Classification of a single trimmed response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseLine<'a> {
    Ok,
    CodedError {
        category: ErrorCategory,
        code: u32,
    },
    UncodedError,
    Content(&'a str),
}

impl ResponseLine<'_> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResponseLine::Content(_))
    }
}

/// Classify a trimmed line. Matchers are tried in a fixed order.
pub fn classify(line: &str) -> ResponseLine<'_> {
    if line == "OK" {
        return ResponseLine::Ok;
    }

    if let Some(caps) = CODED_ERROR.captures(line) {
        let category = ErrorCategory::from_tag(&caps[1]);
        let code = caps[2].parse::<u32>().ok();
        if let (Some(category), Some(code)) = (category, code) {
            return ResponseLine::CodedError { category, code };
        }
    }

    if line == "ERROR" || VENDOR_ERRORS.contains(&line) {
        return ResponseLine::UncodedError;
    }

    ResponseLine::Content(line)
}

/// Outcome of waiting for a complete response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The response ended with `OK`. The `OK` itself is not included.
    Complete(Vec<String>),
    /// A read timed out before any terminal line arrived
    TimedOut {
        lines: Vec<String>,
        pending: String,
    },
}

/// Read lines until a terminal line arrives.
///
/// Coded and uncoded errors are returned as `GsmError::Modem`. A timeout is
/// not an error at this level: it is reported as [`Reply::TimedOut`] so
/// callers expecting one (the SMS prompt) can inspect the partial data.
pub async fn collect_response<S>(
    conn: &mut Connection<S>,
    terminator: &[u8],
    timeout: Duration,
) -> GsmResult<Reply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut lines = Vec::new();

    loop {
        let raw = match conn.read_until(terminator, timeout).await? {
            ReadOutcome::Line(raw) => raw,
            ReadOutcome::TimedOut(pending) => return Ok(Reply::TimedOut { lines, pending }),
        };

        let line = raw.trim();
        match classify(line) {
            ResponseLine::Ok => return Ok(Reply::Complete(lines)),
            ResponseLine::CodedError { category, code } => {
                return Err(ModemError::coded(category, code).into());
            }
            ResponseLine::UncodedError => return Err(ModemError::uncoded().into()),
            ResponseLine::Content(content) => lines.push(content.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::error::GsmError;
    use crate::connection::LINE_TERMINATOR;
    use tokio::io::{AsyncWriteExt, duplex};

    const SHORT: Duration = Duration::from_millis(50);

    #[test]
    fn test_classify_terminals() {
        assert_eq!(classify("OK"), ResponseLine::Ok);
        assert_eq!(classify("ERROR"), ResponseLine::UncodedError);
        assert_eq!(classify("COMMAND NOT SUPPORT"), ResponseLine::UncodedError);
        assert_eq!(
            classify("+CMS ERROR: 515"),
            ResponseLine::CodedError {
                category: ErrorCategory::Cms,
                code: 515
            }
        );
        assert_eq!(
            classify("+CME ERROR: 10"),
            ResponseLine::CodedError {
                category: ErrorCategory::Cme,
                code: 10
            }
        );
    }

    #[test]
    fn test_classify_content_that_looks_terminal() {
        // only exact matches terminate
        assert_eq!(classify("OKAY"), ResponseLine::Content("OKAY"));
        assert_eq!(classify("ERRORS: 0"), ResponseLine::Content("ERRORS: 0"));
        assert_eq!(
            classify("+CMS ERROR: abc"),
            ResponseLine::Content("+CMS ERROR: abc")
        );
        assert_eq!(
            classify("+CMT: \"+123\",,\"OK\""),
            ResponseLine::Content("+CMT: \"+123\",,\"OK\"")
        );
        assert!(!classify("").is_terminal());
    }

    #[tokio::test]
    async fn test_collect_excludes_terminal_line() {
        let (client, mut device) = duplex(1024);
        let mut conn = Connection::new(client);
        device
            .write_all(b"\r\n+CGMI: ACME\r\n\r\nOK\r\n")
            .await
            .unwrap();

        let reply = collect_response(&mut conn, LINE_TERMINATOR, SHORT)
            .await
            .unwrap();
        assert_eq!(
            reply,
            Reply::Complete(vec![
                String::new(),
                "+CGMI: ACME".to_string(),
                String::new()
            ])
        );
    }

    #[tokio::test]
    async fn test_collect_raises_coded_error() {
        let (client, mut device) = duplex(1024);
        let mut conn = Connection::new(client);
        device.write_all(b"\r\n+CME ERROR: 11\r\n").await.unwrap();

        let err = collect_response(&mut conn, LINE_TERMINATOR, SHORT)
            .await
            .unwrap_err();
        match err {
            GsmError::Modem(modem) => {
                assert_eq!(modem.category, ErrorCategory::Cme);
                assert_eq!(modem.code, Some(11));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_collect_raises_uncoded_error() {
        let (client, mut device) = duplex(1024);
        let mut conn = Connection::new(client);
        device.write_all(b"\r\nERROR\r\n").await.unwrap();

        let err = collect_response(&mut conn, LINE_TERMINATOR, SHORT)
            .await
            .unwrap_err();
        assert!(matches!(err, GsmError::Modem(m) if m.code.is_none()));
    }

    #[tokio::test]
    async fn test_collect_reports_timeout_with_lines() {
        let (client, mut device) = duplex(1024);
        let mut conn = Connection::new(client);
        device.write_all(b"\r\n> ").await.unwrap();

        let reply = collect_response(&mut conn, LINE_TERMINATOR, SHORT)
            .await
            .unwrap();
        assert_eq!(
            reply,
            Reply::TimedOut {
                lines: vec![String::new()],
                pending: "> ".to_string()
            }
        );
    }
}
