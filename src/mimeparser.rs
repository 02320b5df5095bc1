//! # MIME message parsing and decryption.

use std::collections::{HashMap, HashSet};

use anyhow::{Context as _, Result};
use mailparse::{MailHeader, ParsedMail};

use crate::aheader::Aheader;
use crate::context::Context;
use crate::decrypt::{
    keyring_from_peerstate, prepare_decryption, try_decrypt, validate_detached_signature,
};
use crate::headerdef::{HeaderDef, HeaderDefMap};
use crate::key::{load_self_secret_keyring, Fingerprint};
use crate::peerstate::{handle_degrade_event, Peerstate};
use crate::tools::time;

/// Upper bound for the iterative decryption of nested encrypted
/// layers; guarantees termination even on adversarial nesting.
const MAX_DECRYPT_LAYERS: usize = 10;

/// An incoming message after parsing, decryption and peerstate
/// bookkeeping.
#[derive(Debug)]
pub struct MimeMessage {
    /// Merged header map with lowercase header names. Protected
    /// headers of the decrypted part override their outer
    /// counterparts.
    headers: HashMap<String, String>,

    /// The address of the `From` header's first mailbox, lowercased.
    pub from: String,

    /// The addresses of the outer `To` and `Cc` headers, lowercased.
    pub recipients: Vec<String>,

    /// The decrypted message tree; the original one when nothing was
    /// encrypted.
    pub decoded_data: Vec<u8>,

    /// Whether the outermost body was successfully decrypted.
    encrypted: bool,

    /// Fingerprints of the keys that validly signed the outermost
    /// decrypted layer. Empty for unsigned or wrongly signed messages.
    pub signatures: HashSet<Fingerprint>,

    /// The addresses for which `Autocrypt-Gossip:` headers were
    /// applied, filtered to the outer recipient list.
    pub gossipped_addr: HashSet<String>,

    /// Whether an encrypted payload was found but could not be
    /// decrypted.
    pub decrypting_failed: bool,

    /// The sent timestamp of the envelope `Date`, clamped to now.
    pub timestamp_sent: i64,
}

impl MimeMessage {
    /// Parses a message, decrypting and updating peerstates along the
    /// way.
    pub async fn from_bytes(context: &Context, body: &[u8]) -> Result<MimeMessage> {
        let mail = mailparse::parse_mail(body)?;

        let timestamp_sent = get_timestamp_sent(&mail.headers, time());
        let from = get_from(&mail.headers).context("no From: header in message")?;
        let recipients = get_recipients(&mail.headers);

        let mut decryption_info =
            prepare_decryption(context, &mail, &from, timestamp_sent).await?;

        let private_keyring = load_self_secret_keyring(context).await?;
        let public_keyring_for_validate = keyring_from_peerstate(&decryption_info.peerstate);

        // Outer headers first; the protected headers of the decrypted
        // part override them below.
        let mut headers = HashMap::new();
        merge_headers(&mut headers, &mail.headers);

        let mut signatures: HashSet<Fingerprint> = Default::default();
        let mut gossip_headers: Vec<String> = Vec::new();
        let mut encrypted = false;
        let mut decrypting_failed = false;
        let mut raw = body.to_vec();

        for _ in 0..MAX_DECRYPT_LAYERS {
            let mail = mailparse::parse_mail(&raw)?;
            match try_decrypt(&mail, &private_keyring, &public_keyring_for_validate).await {
                Ok(Some((decrypted, layer_signatures))) => {
                    if !encrypted {
                        // Only the outermost layer's signatures count;
                        // attacker-controlled inner layers cannot
                        // inflate the set.
                        signatures = layer_signatures;
                        let decrypted_mail = mailparse::parse_mail(&decrypted)?;
                        gossip_headers = decrypted_mail
                            .headers
                            .get_header_values(HeaderDef::AutocryptGossip);
                        encrypted = true;
                    }
                    raw = decrypted;
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(context, "decryption failed: {:#}", err);
                    decrypting_failed = true;
                    break;
                }
            }
        }

        if !encrypted && !decrypting_failed {
            // A signed-only message carries a detached signature instead.
            let mail = mailparse::parse_mail(&raw)?;
            if let Some((content, detached_signatures)) =
                validate_detached_signature(&mail, &public_keyring_for_validate)?
            {
                signatures = detached_signatures;
                raw = content;
            }
        }

        if encrypted {
            let decrypted_mail = mailparse::parse_mail(&raw)?;
            merge_headers(&mut headers, &decrypted_mail.headers);
        }
        if signatures.is_empty() {
            // Spoofable without a signature.
            remove_secured_headers(&mut headers);
        }

        // Handle gossip headers of the outermost decrypted part. See
        // <https://autocrypt.org/level1.html#key-gossip> for the trust
        // rules.
        let mut gossipped_addr: HashSet<String> = Default::default();
        if encrypted && !signatures.is_empty() && !gossip_headers.is_empty() {
            gossipped_addr =
                update_gossip_peerstates(context, timestamp_sent, &recipients, gossip_headers)
                    .await?;
        }

        // Report pending degrade events of the sender before returning.
        if let Some(peerstate) = &mut decryption_info.peerstate {
            handle_degrade_event(context, peerstate);
            peerstate.degrade_event = Default::default();
        }

        Ok(MimeMessage {
            headers,
            from,
            recipients,
            decoded_data: raw,
            encrypted,
            signatures,
            gossipped_addr,
            decrypting_failed,
            timestamp_sent,
        })
    }

    /// Returns whether the outermost message body was successfully
    /// decrypted.
    pub fn was_encrypted(&self) -> bool {
        self.encrypted && !self.decrypting_failed
    }

    /// Returns a merged header value.
    pub fn get_header(&self, headerdef: HeaderDef) -> Option<&str> {
        self.headers
            .get(&headerdef.get_headername())
            .map(|s| s.as_str())
    }

    /// Returns the subject, protected headers taking precedence.
    pub fn get_subject(&self) -> Option<String> {
        self.get_header(HeaderDef::Subject)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Returns whether the message is an Autocrypt Setup Message.
    pub fn is_setupmessage(&self) -> bool {
        if matches!(self.get_setup_attachment(), Ok(Some(_))) {
            return true;
        }

        // Fallback: a plain message whose body is the armored setup
        // payload itself.
        let Ok(mail) = mailparse::parse_mail(&self.decoded_data) else {
            return false;
        };
        let Ok(body) = mail.get_body() else {
            return false;
        };
        let body = body.trim_start();
        body.starts_with("-----BEGIN PGP MESSAGE-----") && body.contains("Passphrase-Begin")
    }

    /// Returns the body of the `application/autocrypt-setup` part, if
    /// the message has one.
    pub fn get_setup_attachment(&self) -> Result<Option<String>> {
        let mail = mailparse::parse_mail(&self.decoded_data)?;

        fn find(mail: &ParsedMail<'_>) -> Option<String> {
            if mail.ctype.mimetype == "application/autocrypt-setup" {
                return mail.get_body().ok();
            }
            mail.subparts.iter().find_map(find)
        }

        Ok(find(&mail))
    }
}

async fn update_gossip_peerstates(
    context: &Context,
    message_time: i64,
    recipients: &[String],
    gossip_headers: Vec<String>,
) -> Result<HashSet<String>> {
    let mut gossipped_addr: HashSet<String> = Default::default();

    for value in gossip_headers {
        let gossip_header = match value.parse::<Aheader>() {
            Ok(header) => header,
            Err(err) => {
                warn!(context, "Failed parsing Autocrypt-Gossip header: {:#}", err);
                continue;
            }
        };

        if !recipients.contains(&gossip_header.addr) {
            warn!(
                context,
                "Ignoring gossiped \"{}\" as the address is not in To/Cc list.",
                &gossip_header.addr,
            );
            continue;
        }
        if context.is_self_addr(&gossip_header.addr).await? {
            info!(
                context,
                "Ignoring gossiped \"{}\", it is our own address.", &gossip_header.addr,
            );
            continue;
        }

        let peerstate = match Peerstate::from_addr(context, &gossip_header.addr).await? {
            Some(mut peerstate) => {
                peerstate.apply_gossip(&gossip_header, message_time);
                peerstate.save_to_db(&context.sql, false).await?;
                peerstate
            }
            None => {
                let peerstate = Peerstate::from_gossip(&gossip_header, message_time);
                peerstate.save_to_db(&context.sql, true).await?;
                peerstate
            }
        };
        handle_degrade_event(context, &peerstate);

        gossipped_addr.insert(gossip_header.addr.clone());
    }

    Ok(gossipped_addr)
}

fn get_timestamp_sent(headers: &[MailHeader<'_>], now: i64) -> i64 {
    headers
        .get_header_value(HeaderDef::Date)
        .and_then(|value| mailparse::dateparse(&value).ok())
        // The envelope date is the only clock we trust from the peer,
        // and even that one only up to the local wall clock.
        .map_or(0, |value| value.clamp(0, now))
}

/// Returns the address of the first `From` mailbox, lowercased.
pub(crate) fn get_from(headers: &[MailHeader<'_>]) -> Option<String> {
    let value = headers.get_header_value(HeaderDef::From_)?;
    let addrs = mailparse::addrparse(&value).ok()?;
    for addr in addrs.iter() {
        match addr {
            mailparse::MailAddr::Single(info) => return Some(info.addr.to_lowercase()),
            mailparse::MailAddr::Group(group) => {
                if let Some(info) = group.addrs.first() {
                    return Some(info.addr.to_lowercase());
                }
            }
        }
    }
    None
}

/// Returns the addresses of the `To` and `Cc` headers, lowercased.
pub(crate) fn get_recipients(headers: &[MailHeader<'_>]) -> Vec<String> {
    let mut res = Vec::new();
    for headerdef in [HeaderDef::To, HeaderDef::Cc] {
        let Some(value) = headers.get_header_value(headerdef) else {
            continue;
        };
        let Ok(addrs) = mailparse::addrparse(&value) else {
            continue;
        };
        for addr in addrs.iter() {
            match addr {
                mailparse::MailAddr::Single(info) => res.push(info.addr.to_lowercase()),
                mailparse::MailAddr::Group(group) => {
                    for info in &group.addrs {
                        res.push(info.addr.to_lowercase());
                    }
                }
            }
        }
    }
    res
}

fn merge_headers(headers: &mut HashMap<String, String>, fields: &[MailHeader<'_>]) {
    for field in fields {
        let key = field.get_key().to_lowercase();
        // transport trace headers are not interesting to anyone
        if key == "received" || key == "return-path" {
            continue;
        }
        headers.insert(key, field.get_value());
    }
}

fn remove_secured_headers(headers: &mut HashMap<String, String>) {
    headers.remove("secure-join-fingerprint");
    headers.remove("secure-join-auth");
    headers.remove("chat-verified");
    headers.remove("autocrypt-gossip");
}
