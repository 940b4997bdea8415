//! Message text encoding guesses
//!
//! Neither `+CMT:` notifications nor stored messages say how their text is
//! encoded. Modems deliver UCS2 messages as hex strings, so text that looks
//! like hex-encoded UTF-16 is decoded as such.
//!
//! This is a heuristic: a plain text message that happens to consist only of
//! uppercase hex digits with a length divisible by four (`"CAFE"`) will be
//! decoded too. `ModemConfig::decode_ucs2_hex` turns it off.

/// Decode `text` if it looks like hex-encoded UTF-16, otherwise return it
/// unchanged. A failed decode also returns the original text.
pub fn decode_incoming_text(text: &str) -> String {
    if !looks_like_ucs2_hex(text) {
        return text.to_string();
    }

    let bom = text[..4].to_ascii_lowercase();
    let digits = if bom == "feff" || bom == "fffe" {
        text.to_string()
    } else {
        format!("feff{text}")
    };

    decode_utf16_hex(&digits).unwrap_or_else(|| text.to_string())
}

fn looks_like_ucs2_hex(text: &str) -> bool {
    !text.is_empty()
        && text.len() % 4 == 0
        && text
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
}

/// Decode hex digits holding UTF-16 with a leading byte order mark.
fn decode_utf16_hex(digits: &str) -> Option<String> {
    let bytes = hex::decode(digits).ok()?;

    let (bom, body) = bytes.split_at_checked(2)?;
    let little_endian = match bom {
        [0xFE, 0xFF] => false,
        [0xFF, 0xFE] => true,
        _ => return None,
    };
    if body.len() % 2 != 0 {
        return None;
    }

    let units = body.chunks_exact(2).map(|unit| {
        if little_endian {
            u16::from_le_bytes([unit[0], unit[1]])
        } else {
            u16::from_be_bytes([unit[0], unit[1]])
        }
    });

    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .ok()
}

/// True when `text` cannot be sent in the GSM default alphabet text mode
/// without conversion.
pub fn needs_ucs2(text: &str) -> bool {
    !text.is_ascii()
}

/// Encode `text` as big-endian UTF-16 hex digits with a `feff` marker, the
/// form modems expect once the data coding scheme is switched to UCS2.
pub fn encode_outgoing_text(text: &str) -> String {
    let bytes: Vec<u8> = text.encode_utf16().flat_map(u16::to_be_bytes).collect();
    format!("feff{}", hex::encode_upper(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(decode_incoming_text("Hello there"), "Hello there");
        assert_eq!(decode_incoming_text(""), "");
        // lowercase hex is not treated as UCS2
        assert_eq!(decode_incoming_text("00680069abcd"), "00680069abcd");
        // length not a multiple of four
        assert_eq!(decode_incoming_text("004800"), "004800");
    }

    #[test]
    fn test_hex_without_bom_is_big_endian() {
        assert_eq!(decode_incoming_text("00480069"), "Hi");
        assert_eq!(decode_incoming_text("04120441043A"), "\u{412}\u{441}\u{43a}");
    }

    #[test]
    fn test_hex_with_bom() {
        assert_eq!(decode_incoming_text("FEFF00480069"), "Hi");
        assert_eq!(decode_incoming_text("FFFE48006900"), "Hi");
    }

    #[test]
    fn test_invalid_utf16_keeps_original() {
        // lone high surrogate
        assert_eq!(decode_incoming_text("D800"), "D800");
    }

    #[test]
    fn test_coincidental_hex_is_decoded() {
        // known limitation of the heuristic
        assert_eq!(decode_incoming_text("CAFE"), "\u{cafe}");
    }

    #[test]
    fn test_encode_outgoing_text() {
        assert_eq!(encode_outgoing_text("Hi"), "feff00480069");
        assert_eq!(encode_outgoing_text("é"), "feff00E9");
        // characters outside the BMP become surrogate pairs
        assert_eq!(encode_outgoing_text("\u{1F600}"), "feffD83DDE00");
        assert!(needs_ucs2("é"));
        assert!(!needs_ucs2("plain"));
    }
}
