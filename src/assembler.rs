//! Incoming message assembly
//!
//! Turns `+CMT:` notifications and stored-message listings into
//! [`IncomingMessage`]s. Bodies of concatenated SMS arrive one fragment per
//! notification and are held per sender until the final fragment shows up.
//!
//! ## Fragment layout
//!
//! ```text
//! offset  0     1    2..4   5       6    7..
//!         0x82  '@'  ....   flag    ..   payload
//! ```
//!
//! A flag of `0xAD` marks the final fragment. Fragments are joined in the
//! order they were delivered; no reordering is attempted.

use crate::datatypes::parse_scts;
use crate::encoding::decode_incoming_text;
use crate::message::IncomingMessage;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// First two characters of every multipart fragment
const FRAGMENT_MARKER: [char; 2] = ['\u{82}', '@'];
/// Position of the final-fragment flag
const FINAL_FLAG_OFFSET: usize = 5;
/// Flag value of the final fragment
const FINAL_FLAG: char = '\u{ad}';
/// Position where the fragment's text starts
const PAYLOAD_OFFSET: usize = 7;

/// One piece of a concatenated message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub payload: String,
    pub is_final: bool,
}

impl Fragment {
    /// Parse `body` as a fragment. Returns `None` for ordinary bodies.
    pub fn parse(body: &str) -> Option<Fragment> {
        let mut chars = body.chars();
        if chars.next() != Some(FRAGMENT_MARKER[0]) || chars.next() != Some(FRAGMENT_MARKER[1]) {
            return None;
        }

        Some(Fragment {
            payload: body.chars().skip(PAYLOAD_OFFSET).collect(),
            is_final: body.chars().nth(FINAL_FLAG_OFFSET) == Some(FINAL_FLAG),
        })
    }
}

/// Reassembles multipart messages and queues completed ones
#[derive(Debug)]
pub struct Assembler {
    /// Fragments received so far, per sender
    pending: HashMap<String, Vec<String>>,
    /// Completed messages, oldest first
    queue: VecDeque<IncomingMessage>,
    decode_ucs2_hex: bool,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Assembler {
    pub fn new(decode_ucs2_hex: bool) -> Self {
        Self {
            pending: HashMap::new(),
            queue: VecDeque::new(),
            decode_ucs2_hex,
        }
    }

    /// Accept the body of an incoming notification.
    ///
    /// Returns `true` when a complete message was queued, `false` when the
    /// body was a non-final fragment that is now waiting for the rest.
    pub fn accept(&mut self, sender: &str, timestamp: &str, body: &str) -> bool {
        let text = match Fragment::parse(body) {
            None => body.to_string(),
            Some(fragment) => {
                let parts = self.pending.entry(sender.to_string()).or_default();
                parts.push(fragment.payload);
                if !fragment.is_final {
                    debug!(sender, parts = parts.len(), "Holding message fragment");
                    return false;
                }
                self.pending.remove(sender).unwrap_or_default().concat()
            }
        };

        self.enqueue(sender, timestamp, &text);
        true
    }

    /// Queue a complete message, decoding its text and timestamp.
    pub fn enqueue(&mut self, sender: &str, timestamp: &str, text: &str) {
        let text = self.decode_text(text);
        debug!(sender, "Adding incoming message");
        self.queue
            .push_back(IncomingMessage::new(sender, parse_scts(timestamp), text));
    }

    pub fn decode_text(&self, text: &str) -> String {
        if self.decode_ucs2_hex {
            decode_incoming_text(text)
        } else {
            text.to_string()
        }
    }

    /// Take the oldest queued message
    pub fn pop(&mut self) -> Option<IncomingMessage> {
        self.queue.pop_front()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Number of fragments held for `sender`, if a reassembly is in flight
    pub fn pending_fragments(&self, sender: &str) -> Option<usize> {
        self.pending.get(sender).map(Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(flag: char, payload: &str) -> String {
        format!("\u{82}@ab{flag}{flag}x{payload}")
    }

    #[test]
    fn test_fragment_parse() {
        assert_eq!(Fragment::parse("hello"), None);
        assert_eq!(Fragment::parse(""), None);
        assert_eq!(Fragment::parse("\u{82}"), None);

        let body = fragment('a', "Hello, ");
        assert_eq!(
            Fragment::parse(&body),
            Some(Fragment {
                payload: "Hello, ".to_string(),
                is_final: false
            })
        );

        let body = fragment(FINAL_FLAG, "world");
        assert!(Fragment::parse(&body).unwrap().is_final);
    }

    #[test]
    fn test_short_fragment_has_empty_payload() {
        let parsed = Fragment::parse("\u{82}@ab").unwrap();
        assert_eq!(parsed.payload, "");
        assert!(!parsed.is_final);
    }

    #[test]
    fn test_single_part_message_queued() {
        let mut assembler = Assembler::default();
        assert!(assembler.accept("+1555", "23/06/01,10:00:00", "Hi"));

        let msg = assembler.pop().unwrap();
        assert_eq!(msg.sender, "+1555");
        assert_eq!(msg.text, "Hi");
        assert!(msg.timestamp.is_some());
        assert!(assembler.pop().is_none());
    }

    #[test]
    fn test_multipart_reassembly() {
        let mut assembler = Assembler::default();

        assert!(!assembler.accept("+1555", "23/06/01,10:00:00", &fragment('a', "Hello, ")));
        assert_eq!(assembler.pending_fragments("+1555"), Some(1));
        assert_eq!(assembler.queued(), 0);

        assert!(assembler.accept("+1555", "23/06/01,10:00:05", &fragment(FINAL_FLAG, "world")));
        assert_eq!(assembler.pending_fragments("+1555"), None);
        assert_eq!(assembler.queued(), 1);

        let msg = assembler.pop().unwrap();
        assert_eq!(msg.text, "Hello, world");
    }

    #[test]
    fn test_reassembly_is_per_sender() {
        let mut assembler = Assembler::default();

        assembler.accept("A", "", &fragment('a', "one "));
        assembler.accept("B", "", "plain from B");
        assembler.accept("B", "", &fragment('a', "b1 "));
        assembler.accept("A", "", &fragment(FINAL_FLAG, "two"));

        assert_eq!(assembler.pop().unwrap().text, "plain from B");
        assert_eq!(assembler.pop().unwrap().text, "one two");
        assert_eq!(assembler.pending_fragments("B"), Some(1));
    }

    #[test]
    fn test_unparseable_timestamp_still_queues() {
        let mut assembler = Assembler::default();
        assembler.accept("+1", "not a time", "text");
        assert_eq!(assembler.pop().unwrap().timestamp, None);
    }

    #[test]
    fn test_hex_decoding_can_be_disabled() {
        let mut assembler = Assembler::new(false);
        assembler.enqueue("+1", "", "00480069");
        assert_eq!(assembler.pop().unwrap().text, "00480069");

        let mut assembler = Assembler::new(true);
        assembler.enqueue("+1", "", "00480069");
        assert_eq!(assembler.pop().unwrap().text, "Hi");
    }
}
