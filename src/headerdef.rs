//! # List of email headers the core looks at.

use mailparse::{MailHeader, MailHeaderMap};
use strum_macros::Display;

#[derive(Debug, Display, Clone, PartialEq, Eq)]
#[strum(serialize_all = "kebab-case")]
#[allow(dead_code)]
pub enum HeaderDef {
    MessageId,
    Subject,
    Date,
    From_,
    To,
    Cc,
    InReplyTo,
    References,
    ChatVersion,
    Autocrypt,
    AutocryptGossip,
    AutocryptSetupMessage,
    SecureJoin,
}

impl HeaderDef {
    /// Returns the header name.
    pub fn get_headername(&self) -> String {
        self.to_string()
    }
}

pub trait HeaderDefMap {
    fn get_header_value(&self, headerdef: HeaderDef) -> Option<String>;
    fn get_header_values(&self, headerdef: HeaderDef) -> Vec<String>;
}

impl HeaderDefMap for [MailHeader<'_>] {
    fn get_header_value(&self, headerdef: HeaderDef) -> Option<String> {
        self.get_first_value(&headerdef.get_headername())
    }
    fn get_header_values(&self, headerdef: HeaderDef) -> Vec<String> {
        self.get_all_values(&headerdef.get_headername())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that kebab_case serialization works as expected.
    #[test]
    fn kebab_test() {
        assert_eq!(HeaderDef::From_.to_string(), "from");
        assert_eq!(HeaderDef::Autocrypt.to_string(), "autocrypt");
        assert_eq!(HeaderDef::AutocryptGossip.to_string(), "autocrypt-gossip");
        assert_eq!(
            HeaderDef::AutocryptSetupMessage.to_string(),
            "autocrypt-setup-message"
        );
    }

    #[test]
    fn test_get_header_value_case_insensitive() {
        let (headers, _) =
            mailparse::parse_headers(b"fRoM: Bob\naUtoCryPt-GosSip: addr=a@b.c\n\n").unwrap();
        assert_eq!(
            headers.get_header_value(HeaderDef::AutocryptGossip),
            Some("addr=a@b.c".to_string())
        );
        assert_eq!(headers.get_header_value(HeaderDef::From_), Some("Bob".to_string()));
        assert_eq!(headers.get_header_value(HeaderDef::Subject), None);
    }
}
