//! Small helpers shared across the crate.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Error, Result};
use rand::{thread_rng, Rng};

/// Returns the current unix time in seconds.
pub(crate) fn time() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Compares two email addresses, normalizing them beforehand.
pub(crate) fn addr_cmp(addr1: &str, addr2: &str) -> bool {
    let norm1 = addr_normalize(addr1).to_lowercase();
    let norm2 = addr_normalize(addr2).to_lowercase();

    norm1 == norm2
}

/// Takes a user-entered email address and normalizes it.
pub(crate) fn addr_normalize(addr: &str) -> &str {
    let norm = addr.trim();

    if norm.starts_with("mailto:") {
        norm.get(7..).unwrap_or(norm)
    } else {
        norm
    }
}

/// A wrapper around a validated email address.
///
/// Validation is deliberately shallow: the address must be at least
/// three characters, contain a single `@` with a non-empty local part,
/// and the domain must contain a dot. Everything stricter belongs to
/// the provider, not to us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    pub local: String,
    pub domain: String,
}

impl EmailAddress {
    pub fn new(input: &str) -> Result<Self> {
        input.parse()
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

impl FromStr for EmailAddress {
    type Err = Error;

    fn from_str(input: &str) -> Result<EmailAddress> {
        if input.len() < 3 {
            bail!("Email address {:?} is too short", input);
        }
        if !input.contains('@') {
            bail!("Email address {:?} does not contain '@'", input);
        }

        let mut parts = input.rsplitn(2, '@');
        match (parts.next(), parts.next()) {
            (Some(domain), Some(local)) => {
                if local.is_empty() {
                    bail!("Email address {:?} has an empty local part", input);
                }
                if domain.is_empty() || domain.starts_with('.') || !domain.contains('.') {
                    bail!("Email address {:?} has an invalid domain", input);
                }
                Ok(EmailAddress {
                    local: local.to_string(),
                    domain: domain.to_string(),
                })
            }
            _ => bail!("Cannot parse email address {:?}", input),
        }
    }
}

/// Generates a random id suitable for various unique identifiers.
pub(crate) fn create_id() -> String {
    // ASCII alphanumeric without lookalikes, 11 chars give
    // a good deal more than 64 bit of entropy.
    const CHARS: &[char] = &[
        'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'm', 'n', 'o', 'p', 'q', 'r', 's',
        't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L',
        'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '2', '3', '4', '5', '6',
        '7', '8', '9',
    ];

    let mut rng = thread_rng();
    (0..11).map(|_| CHARS[rng.gen_range(0..CHARS.len())]).collect()
}

/// Generates a Message-ID for outgoing messages.
pub(crate) fn create_outgoing_rfc724_mid(grpid: Option<&str>, from_addr: &str) -> String {
    let hostname = from_addr
        .find('@')
        .map(|k| &from_addr[k..])
        .unwrap_or("@nohost");

    match grpid {
        Some(grpid) => format!("Gr.{}.{}{}", grpid, create_id(), hostname),
        None => format!("Mr.{}.{}{}", create_id(), create_id(), hostname),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addr_cmp() {
        assert!(addr_cmp("AA@AA.ORG", "aa@aa.ORG"));
        assert!(addr_cmp(" aa@aa.ORG ", "AA@AA.ORG"));
        assert!(addr_cmp(" mailto:AA@AA.ORG", "Aa@Aa.orG"));
        assert!(!addr_cmp("aa@aa.org", "ab@aa.org"));
    }

    #[test]
    fn test_emailaddress_parse() {
        assert!(EmailAddress::new("").is_err());
        assert_eq!(
            EmailAddress::new("user@domain.tld").unwrap(),
            EmailAddress {
                local: "user".into(),
                domain: "domain.tld".into(),
            }
        );
        assert!(EmailAddress::new("no-at-sign").is_err());
        assert!(EmailAddress::new("@domain.tld").is_err());
        assert!(EmailAddress::new("user@nodot").is_err());
        assert!(EmailAddress::new("tt").is_err());
    }

    #[test]
    fn test_create_id() {
        let buf = create_id();
        assert_eq!(buf.len(), 11);
        assert_ne!(create_id(), create_id());
    }

    #[test]
    fn test_create_outgoing_rfc724_mid() {
        let mid = create_outgoing_rfc724_mid(None, "foo@bar.de");
        assert!(mid.starts_with("Mr."));
        assert!(mid.ends_with("@bar.de"));

        let mid = create_outgoing_rfc724_mid(Some("HcxyMARjyJy"), "foo@bar.de");
        assert!(mid.starts_with("Gr.HcxyMARjyJy."));
        assert!(mid.ends_with("@bar.de"));
    }
}
