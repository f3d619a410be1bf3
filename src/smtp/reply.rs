//! SMTP server replies and EHLO extension lists.

use crate::error::SmtpError;
use std::collections::HashMap;
use std::fmt;

/// A complete, possibly multi-line, server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Three digit reply code.
    pub code: u16,
    /// Text of each line with the code and separator removed.
    pub lines: Vec<String>,
}

impl Reply {
    pub fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Parse the raw lines of one reply (line endings already stripped).
    ///
    /// Every line must start with the same three digit code followed by
    /// `-` (continuation), a space or nothing.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self, SmtpError> {
        let mut code = None;
        let mut lines = Vec::with_capacity(raw.len());

        for line in raw {
            let line = line.as_ref();
            let (line_code, text) = split_line(line)?;
            match code {
                None => code = Some(line_code),
                Some(c) if c != line_code => {
                    return Err(SmtpError::MalformedReply(format!(
                        "inconsistent reply codes {} and {}",
                        c, line_code
                    )));
                }
                Some(_) => {}
            }
            lines.push(text.to_string());
        }

        let code = code.ok_or_else(|| SmtpError::MalformedReply("empty reply".to_string()))?;
        Ok(Self { code, lines })
    }

    /// Reply text, one line per reply line.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// 2xx
    pub fn is_positive(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// 3xx
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text())
    }
}

/// Split a reply line into its code and text.
pub(crate) fn split_line(line: &str) -> Result<(u16, &str), SmtpError> {
    let malformed = || SmtpError::MalformedReply(line.to_string());

    let digits = line.get(..3).ok_or_else(malformed)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let code = digits.parse::<u16>().map_err(|_| malformed())?;

    match line.as_bytes().get(3) {
        None => Ok((code, "")),
        Some(b' ') | Some(b'-') => Ok((code, &line[4..])),
        Some(_) => Err(malformed()),
    }
}

/// Whether a raw reply line ends the reply.
pub(crate) fn is_last_line(line: &str) -> bool {
    line.as_bytes().get(3) != Some(&b'-')
}

/// Service extensions advertised in an EHLO reply.
///
/// Keywords are stored uppercase; the parameter string is kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions {
    entries: HashMap<String, String>,
}

impl Extensions {
    /// Build from a positive EHLO reply. The first line is the server greeting.
    pub fn from_ehlo(reply: &Reply) -> Self {
        let entries = reply
            .lines
            .iter()
            .skip(1)
            .filter_map(|line| {
                let mut parts = line.trim().splitn(2, ' ');
                let keyword = parts.next().filter(|k| !k.is_empty())?;
                let params = parts.next().unwrap_or("").trim();
                Some((keyword.to_ascii_uppercase(), params.to_string()))
            })
            .collect();
        Self { entries }
    }

    /// Whether `keyword` (case-insensitive) was advertised.
    pub fn supports(&self, keyword: &str) -> bool {
        self.entries.contains_key(&keyword.to_ascii_uppercase())
    }

    /// Parameters of an advertised extension.
    pub fn params(&self, keyword: &str) -> Option<&str> {
        self.entries
            .get(&keyword.to_ascii_uppercase())
            .map(String::as_str)
    }

    /// SASL mechanisms listed by the `AUTH` extension.
    pub fn auth_mechanisms(&self) -> Vec<String> {
        self.params("AUTH")
            .map(|p| {
                p.split_whitespace()
                    .map(|m| m.to_ascii_uppercase())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_line() {
        let reply = Reply::parse(&["250 2.1.0 Ok"]).unwrap();
        assert_eq!(reply.code, 250);
        assert_eq!(reply.lines, vec!["2.1.0 Ok"]);
        assert!(reply.is_positive());
        assert_eq!(reply.to_string(), "250 2.1.0 Ok");
    }

    #[test]
    fn parse_multi_line() {
        let reply = Reply::parse(&["250-mail.example.com", "250-SIZE 1000", "250 8BITMIME"]).unwrap();
        assert_eq!(reply.code, 250);
        assert_eq!(reply.lines.len(), 3);
        assert_eq!(reply.text(), "mail.example.com\nSIZE 1000\n8BITMIME");
    }

    #[test]
    fn parse_bare_code() {
        let reply = Reply::parse(&["354"]).unwrap();
        assert_eq!(reply.code, 354);
        assert!(reply.is_intermediate());
        assert_eq!(reply.text(), "");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            Reply::parse(&["hello"]),
            Err(SmtpError::MalformedReply(_))
        ));
        assert!(matches!(
            Reply::parse(&["25"]),
            Err(SmtpError::MalformedReply(_))
        ));
        assert!(matches!(
            Reply::parse(&["250xOk"]),
            Err(SmtpError::MalformedReply(_))
        ));
        assert!(Reply::parse::<&str>(&[]).is_err());
    }

    #[test]
    fn parse_rejects_mixed_codes() {
        assert!(Reply::parse(&["250-first", "251 second"]).is_err());
    }

    #[test]
    fn last_line_detection() {
        assert!(!is_last_line("250-SIZE"));
        assert!(is_last_line("250 OK"));
        assert!(is_last_line("250"));
    }

    #[test]
    fn extensions_from_ehlo() {
        let reply = Reply::parse(&[
            "250-mail.example.com Hello",
            "250-starttls",
            "250-AUTH PLAIN login",
            "250-SIZE 35882577",
            "250 SMTPUTF8",
        ])
        .unwrap();
        let ext = Extensions::from_ehlo(&reply);

        assert!(ext.supports("STARTTLS"));
        assert!(ext.supports("smtputf8"));
        assert!(ext.supports("AUTH"));
        assert!(!ext.supports("8BITMIME"));
        assert!(!ext.supports("MAIL.EXAMPLE.COM"));
        assert_eq!(ext.params("SIZE"), Some("35882577"));
        assert_eq!(ext.auth_mechanisms(), vec!["PLAIN", "LOGIN"]);
    }

    #[test]
    fn extensions_empty_for_greeting_only() {
        let reply = Reply::parse(&["250 mail.example.com"]).unwrap();
        let ext = Extensions::from_ehlo(&reply);
        assert!(ext.is_empty());
        assert!(ext.auth_mechanisms().is_empty());
    }
}
