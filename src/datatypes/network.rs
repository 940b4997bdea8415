// ABOUTME: Parsing helpers for operator selection (AT+COPS) and operator names (AT+COPN)
// ABOUTME: Includes the quoted comma-separated field splitter most AT query replies need

use crate::client::error::{GsmError, GsmResult};

/// Split a comma-separated AT reply into fields.
///
/// Fields may be double-quoted (quotes are removed, `""` inside a quoted
/// field is a literal quote). Whitespace around unquoted fields is trimmed.
///
/// ```
/// use gsmmodem::datatypes::split_fields;
///
/// let fields = split_fields(r#"0,0,"MTN Rwanda",2"#).unwrap();
/// assert_eq!(fields, vec!["0", "0", "MTN Rwanda", "2"]);
/// ```
pub fn split_fields(line: &str) -> GsmResult<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut was_quoted = false;
    let mut chars = line.trim().chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => quoted = false,
            ('"', false) if field.trim().is_empty() => {
                field.clear();
                quoted = true;
                was_quoted = true;
            }
            (',', false) => {
                fields.push(finish_field(&mut field, was_quoted));
                was_quoted = false;
            }
            _ => field.push(c),
        }
    }

    if quoted {
        return Err(GsmError::Parse(format!("unterminated quote in {line:?}")));
    }
    fields.push(finish_field(&mut field, was_quoted));
    Ok(fields)
}

fn finish_field(field: &mut String, was_quoted: bool) -> String {
    let value = std::mem::take(field);
    if was_quoted { value } else { value.trim().to_string() }
}

/// Network selection mode from the first `+COPS:` field
pub fn plmn_mode_name(mode: &str) -> Option<&'static str> {
    match mode {
        "0" => Some("(Automatic)"),
        "1" => Some("(Manual)"),
        "2" => Some("(Deregistered)"),
        "3" => Some("(Unreadable)"),
        _ => None,
    }
}

/// What a `+COPS:` reply says about the current operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorSelection {
    /// No operator fields, only the selection mode description
    Mode(&'static str),
    /// Operator given as a long or short alphanumeric name
    Named(String),
    /// Operator given as a numeric id that needs an `AT+COPN` lookup
    Numeric(String),
}

/// Interpret the fields of `+COPS: <mode>[,<format>,<oper>]`.
///
/// Returns `None` for replies that cannot be interpreted.
pub fn parse_operator(reply: &str) -> Option<OperatorSelection> {
    let fields = split_fields(reply).ok()?;
    match fields.as_slice() {
        [mode] => plmn_mode_name(mode).map(OperatorSelection::Mode),
        [_, format, oper, ..] if format == "0" || format == "1" => {
            Some(OperatorSelection::Named(oper.clone()))
        }
        [_, format, oper, ..] if format == "2" => Some(OperatorSelection::Numeric(oper.clone())),
        _ => None,
    }
}

/// Parse one `+COPN: <numeric>,<alpha>` entry (prefix already removed)
pub fn parse_operator_name(entry: &str) -> GsmResult<(String, String)> {
    let fields = split_fields(entry)?;
    match fields.as_slice() {
        [numeric, alpha, ..] => Ok((numeric.clone(), alpha.clone())),
        _ => Err(GsmError::Parse(format!("bad operator entry {entry:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_fields() {
        assert_eq!(split_fields("20,99").unwrap(), vec!["20", "99"]);
        assert_eq!(
            split_fields(r#""+250788110333",145"#).unwrap(),
            vec!["+250788110333", "145"]
        );
        assert_eq!(split_fields(r#"1,"say ""hi""",x"#).unwrap(), vec!["1", r#"say "hi""#, "x"]);
        assert_eq!(split_fields("a,,b").unwrap(), vec!["a", "", "b"]);
        assert_eq!(split_fields(r#""a, b""#).unwrap(), vec!["a, b"]);
    }

    #[test]
    fn test_split_fields_rejects_unterminated_quote() {
        assert!(matches!(split_fields(r#"1,"open"#), Err(GsmError::Parse(_))));
    }

    #[test]
    fn test_parse_operator() {
        assert_eq!(
            parse_operator("0"),
            Some(OperatorSelection::Mode("(Automatic)"))
        );
        assert_eq!(
            parse_operator(r#"0,0,"MTN Rwanda",2"#),
            Some(OperatorSelection::Named("MTN Rwanda".to_string()))
        );
        assert_eq!(
            parse_operator(r#"0,2,"63510",2"#),
            Some(OperatorSelection::Numeric("63510".to_string()))
        );
        assert_eq!(parse_operator("7"), None);
        assert_eq!(parse_operator(r#"0,"#), None);
    }

    #[test]
    fn test_parse_operator_name() {
        assert_eq!(
            parse_operator_name(r#""63510","MTN Rwanda""#).unwrap(),
            ("63510".to_string(), "MTN Rwanda".to_string())
        );
        assert!(parse_operator_name("lonely").is_err());
    }
}
