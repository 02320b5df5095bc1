//! # Autocrypt header module.
//!
//! Parse and create [Autocrypt-headers](https://autocrypt.org/en/latest/level1.html#the-autocrypt-header).

use std::str::FromStr;
use std::{fmt, str};

use anyhow::{bail, Context as _, Error, Result};
use mailparse::MailHeader;
use num_derive::{FromPrimitive, ToPrimitive};

use crate::headerdef::{HeaderDef, HeaderDefMap};
use crate::key::{DcKey, SignedPublicKey};
use crate::tools::{addr_cmp, addr_normalize, EmailAddress};

/// Possible values for the `prefer-encrypt` attribute.
///
/// `Reset` is an internal value and never appears on the wire.
#[derive(Default, PartialEq, Eq, Debug, Clone, Copy, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum EncryptPreference {
    #[default]
    NoPreference = 0,
    Mutual = 1,
    Reset = 20,
}

impl fmt::Display for EncryptPreference {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            EncryptPreference::Mutual => write!(fmt, "mutual"),
            EncryptPreference::NoPreference => write!(fmt, "nopreference"),
            EncryptPreference::Reset => write!(fmt, "reset"),
        }
    }
}

impl str::FromStr for EncryptPreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mutual" => Ok(EncryptPreference::Mutual),
            "nopreference" => Ok(EncryptPreference::NoPreference),
            _ => bail!("Cannot parse encryption preference {}", s),
        }
    }
}

/// An `Autocrypt:` or `Autocrypt-Gossip:` header.
#[derive(Debug, Clone)]
pub struct Aheader {
    pub addr: String,
    pub public_key: SignedPublicKey,
    pub prefer_encrypt: EncryptPreference,
}

impl Aheader {
    /// Creates a new autocrypt header.
    pub fn new(
        addr: String,
        public_key: SignedPublicKey,
        prefer_encrypt: EncryptPreference,
    ) -> Self {
        Aheader {
            addr,
            public_key,
            prefer_encrypt,
        }
    }

    /// Selects the single valid `Autocrypt:` header of a message.
    ///
    /// Per Autocrypt Level 1, a message effectively has an Autocrypt
    /// header only if exactly one valid header matches the `From`
    /// address. With zero or multiple matching headers `None` is
    /// returned; unparseable headers are skipped.
    pub fn from_headers(wanted_from: &str, headers: &[MailHeader<'_>]) -> Option<Self> {
        let mut res = None;
        for value in headers.get_header_values(HeaderDef::Autocrypt) {
            let header = match Self::from_str(&value) {
                Ok(header) => header,
                Err(_) => continue,
            };
            if !addr_cmp(&header.addr, wanted_from) {
                continue;
            }
            if res.is_some() {
                // more than one matching header, none wins
                return None;
            }
            res = Some(header);
        }
        res
    }
}

impl fmt::Display for Aheader {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "addr={};", self.addr)?;
        if self.prefer_encrypt == EncryptPreference::Mutual {
            write!(fmt, " prefer-encrypt=mutual;")?;
        }

        // adds a whitespace every 78 characters, this allows
        // the email crate to wrap the lines according to RFC 5322
        // (which may insert a linebreak before every whitespace)
        let keydata = self.public_key.to_base64().chars().enumerate().fold(
            String::new(),
            |mut res, (i, c)| {
                if i % 78 == 78 - "keydata=".len() {
                    res.push(' ')
                }
                res.push(c);
                res
            },
        );
        write!(fmt, " keydata={keydata}")
    }
}

impl str::FromStr for Aheader {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut addr: Option<String> = None;
        let mut keydata: Option<String> = None;
        let mut prefer_encrypt = EncryptPreference::default();

        for attribute in s.split(';') {
            let attribute: Vec<&str> = attribute.trim().splitn(2, '=').collect();
            let (key, value) = match &attribute[..] {
                [key, value] => (key.trim(), value.trim()),
                _ => continue,
            };

            match key {
                "addr" => {
                    if addr.is_some() {
                        bail!("Duplicate addr attribute");
                    }
                    let value = addr_normalize(value).to_lowercase();
                    EmailAddress::new(&value)
                        .with_context(|| format!("Bad addr attribute: {value:?}"))?;
                    addr = Some(value);
                }
                "keydata" => {
                    if keydata.is_some() {
                        bail!("Duplicate keydata attribute");
                    }
                    keydata = Some(value.to_string());
                }
                "prefer-encrypt" => {
                    // unknown values are treated like a missing attribute
                    prefer_encrypt = value.parse().unwrap_or_default();
                }
                key => {
                    // Autocrypt Level 1: unknown attributes starting with an
                    // underscore can be safely ignored, any other unknown
                    // attribute makes the whole header invalid.
                    if !key.starts_with('_') {
                        bail!("Unknown Autocrypt attribute found");
                    }
                }
            }
        }

        let addr = addr.context("Autocrypt header has no addr")?;
        let public_key = keydata
            .context("keydata attribute is not found")
            .and_then(|raw| {
                SignedPublicKey::from_base64(&raw).context("autocrypt key cannot be decoded")
            })
            .and_then(|key| {
                key.verify()
                    .and(Ok(key))
                    .context("autocrypt key cannot be verified")
            })?;

        Ok(Aheader {
            addr,
            public_key,
            prefer_encrypt,
        })
    }
}
