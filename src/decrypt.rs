//! End-to-end decryption support.

use std::collections::HashSet;

use anyhow::Result;
use mailparse::ParsedMail;

use crate::aheader::Aheader;
use crate::context::Context;
use crate::key::{Fingerprint, SignedPublicKey, SignedSecretKey};
use crate::keyring::Keyring;
use crate::peerstate::Peerstate;
use crate::pgp;

/// Decryption state prepared from the outer message before any
/// decryption takes place.
#[derive(Debug, Default)]
pub struct DecryptionInfo {
    /// The From address, taken from the unencrypted outer header.
    pub from: String,
    /// The valid `Autocrypt:` header, if any.
    pub autocrypt_header: Option<Aheader>,
    /// The sender's peerstate after the header was applied; it is used
    /// to validate the signatures.
    pub peerstate: Option<Peerstate>,
    /// The time the message claims to have been sent, clamped to now.
    pub message_time: i64,
}

/// Applies the outer `Autocrypt:` header to the sender's peerstate and
/// returns the [DecryptionInfo] for the decryption passes.
pub(crate) async fn prepare_decryption(
    context: &Context,
    mail: &ParsedMail<'_>,
    from: &str,
    message_time: i64,
) -> Result<DecryptionInfo> {
    let autocrypt_header = Aheader::from_headers(from, &mail.headers);

    // Reports are never expected to carry an Autocrypt header,
    // MUAs commonly leave them plaintext.
    let allow_degrade = !contains_report(mail);

    let peerstate = get_autocrypt_peerstate(
        context,
        from,
        autocrypt_header.as_ref(),
        message_time,
        allow_degrade,
    )
    .await?;

    Ok(DecryptionInfo {
        from: from.to_string(),
        autocrypt_header,
        peerstate,
        message_time,
    })
}

/// Returns a reference to the encrypted payload of a valid PGP/MIME message.
///
/// Returns `None` if the message is not a valid PGP/MIME message.
fn get_autocrypt_mime<'a, 'b>(mail: &'a ParsedMail<'b>) -> Option<&'a ParsedMail<'b>> {
    if mail.ctype.mimetype != "multipart/encrypted" {
        return None;
    }
    if let [first_part, second_part] = &mail.subparts[..] {
        if first_part.ctype.mimetype == "application/pgp-encrypted"
            && second_part.ctype.mimetype == "application/octet-stream"
        {
            Some(second_part)
        } else {
            None
        }
    } else {
        None
    }
}

/// Returns a reference to the encrypted payload of a ["Mixed
/// Up"][pgpmime-message-mangling] message.
///
/// According to [RFC 3156] encrypted messages should have
/// `multipart/encrypted` MIME type and two parts, but Microsoft
/// Exchange and ProtonMail IMAP/SMTP Bridge are known to mangle this
/// structure by changing the type to `multipart/mixed` and prepending
/// an empty part at the start.
///
/// Returns `None` if the message is not a "Mixed Up" message.
///
/// [RFC 3156]: https://www.rfc-editor.org/info/rfc3156
/// [pgpmime-message-mangling]: https://tools.ietf.org/id/draft-dkg-openpgp-pgpmime-message-mangling-00.html
fn get_mixed_up_mime<'a, 'b>(mail: &'a ParsedMail<'b>) -> Option<&'a ParsedMail<'b>> {
    if mail.ctype.mimetype != "multipart/mixed" {
        return None;
    }
    if let [first_part, second_part, third_part] = &mail.subparts[..] {
        if first_part.ctype.mimetype == "text/plain"
            && second_part.ctype.mimetype == "application/pgp-encrypted"
            && third_part.ctype.mimetype == "application/octet-stream"
        {
            Some(third_part)
        } else {
            None
        }
    } else {
        None
    }
}

/// Returns a reference to the encrypted payload of a message turned
/// into an attachment.
///
/// Some providers append a plaintext footer to outgoing messages.
/// There is no plain text part in encrypted messages, so the whole
/// message is turned into a `multipart/mixed` MIME with an empty
/// footer part first and the original encrypted message second.
fn get_attachment_mime<'a, 'b>(mail: &'a ParsedMail<'b>) -> Option<&'a ParsedMail<'b>> {
    if mail.ctype.mimetype != "multipart/mixed" {
        return None;
    }
    if let [first_part, second_part] = &mail.subparts[..] {
        if first_part.ctype.mimetype == "text/plain"
            && second_part.ctype.mimetype == "multipart/encrypted"
        {
            get_autocrypt_mime(second_part)
        } else {
            None
        }
    } else {
        None
    }
}

/// Tries to decrypt a message, but only if it is structured as an
/// Autocrypt message.
///
/// Returns the decrypted body and a set of valid signature
/// fingerprints if successful. If the message is wrongly signed, the
/// decrypted body is still returned but the set is empty.
pub(crate) async fn try_decrypt(
    mail: &ParsedMail<'_>,
    private_keyring: &Keyring<SignedSecretKey>,
    public_keyring_for_validate: &Keyring<SignedPublicKey>,
) -> Result<Option<(Vec<u8>, HashSet<Fingerprint>)>> {
    let encrypted_data_part = match get_autocrypt_mime(mail)
        .or_else(|| get_mixed_up_mime(mail))
        .or_else(|| get_attachment_mime(mail))
    {
        None => {
            // not an autocrypt mime message, abort and ignore
            return Ok(None);
        }
        Some(res) => res,
    };

    decrypt_part(
        encrypted_data_part,
        private_keyring.clone(),
        public_keyring_for_validate.clone(),
    )
    .await
}

/// Returns `Ok(None)` if nothing encrypted was found.
async fn decrypt_part(
    mail: &ParsedMail<'_>,
    private_keyring: Keyring<SignedSecretKey>,
    public_keyring_for_validate: Keyring<SignedPublicKey>,
) -> Result<Option<(Vec<u8>, HashSet<Fingerprint>)>> {
    let data = mail.get_body_raw()?;

    if !has_decrypted_pgp_armor(&data) {
        return Ok(None);
    }

    let (plain, ret_valid_signatures) = pgp::pk_decrypt(
        data,
        private_keyring,
        public_keyring_for_validate.clone(),
    )
    .await?;

    // Check for detached signatures.
    // If the decrypted part is a multipart/signed, then there is a
    // detached signature.
    let decrypted_part = mailparse::parse_mail(&plain)?;
    if let Some((content, valid_detached_signatures)) =
        validate_detached_signature(&decrypted_part, &public_keyring_for_validate)?
    {
        Ok(Some((content, valid_detached_signatures)))
    } else {
        // If the message was wrongly or not signed, still return the
        // plain text. The caller has to check if the signatures set is
        // empty then.
        Ok(Some((plain, ret_valid_signatures)))
    }
}

fn has_decrypted_pgp_armor(input: &[u8]) -> bool {
    if let Some(index) = input.iter().position(|b| *b > b' ') {
        if input.len() - index > 26 {
            if let Some(window) = input.get(index..index + 27) {
                return window == b"-----BEGIN PGP MESSAGE-----";
            }
        }
    }

    false
}

/// Validates signatures of a multipart/signed message part, as defined
/// in RFC 1847.
///
/// Returns `None` if the part is not a multipart/signed part,
/// otherwise the signed content and the set of key fingerprints for
/// which there is a valid signature.
pub(crate) fn validate_detached_signature(
    mail: &ParsedMail<'_>,
    public_keyring_for_validate: &Keyring<SignedPublicKey>,
) -> Result<Option<(Vec<u8>, HashSet<Fingerprint>)>> {
    if mail.ctype.mimetype != "multipart/signed" {
        return Ok(None);
    }

    if let [first_part, second_part] = &mail.subparts[..] {
        // First part is the content, second part is the signature.
        let content = first_part.raw_bytes;
        let signature = second_part.get_body_raw()?;
        let ret_valid_signatures =
            pgp::pk_validate(content, &signature, public_keyring_for_validate)?;

        Ok(Some((content.to_vec(), ret_valid_signatures)))
    } else {
        Ok(None)
    }
}

/// Builds the signature validation keyring from a peerstate.
///
/// Both the gossip key and the direct key count; either may be absent.
pub(crate) fn keyring_from_peerstate(
    peerstate: &Option<Peerstate>,
) -> Keyring<SignedPublicKey> {
    let mut public_keyring_for_validate: Keyring<SignedPublicKey> = Keyring::new();
    if let Some(peerstate) = peerstate {
        if let Some(key) = &peerstate.gossip_key {
            public_keyring_for_validate.add(key.clone());
        }
        if let Some(key) = &peerstate.public_key {
            public_keyring_for_validate.add(key.clone());
        }
    }
    public_keyring_for_validate
}

/// Applies an Autocrypt header to the sender's peerstate and saves it.
///
/// Without a header, a message from a known peer degrades the
/// encryption state unless `allow_degrade` is unset or the message is
/// older than the peer's last Autocrypt message.
///
/// Returns the updated peerstate.
pub(crate) async fn get_autocrypt_peerstate(
    context: &Context,
    from: &str,
    autocrypt_header: Option<&Aheader>,
    message_time: i64,
    allow_degrade: bool,
) -> Result<Option<Peerstate>> {
    let mut peerstate = Peerstate::from_addr(context, from).await?;

    if let Some(header) = autocrypt_header {
        if let Some(ref mut peerstate) = peerstate {
            peerstate.apply_header(header, message_time);
            peerstate.save_to_db(&context.sql, false).await?;
        } else {
            let p = Peerstate::from_header(header, message_time);
            p.save_to_db(&context.sql, true).await?;
            peerstate = Some(p);
        }
    } else if let Some(ref mut peerstate) = peerstate {
        if allow_degrade && message_time > 0 && message_time > peerstate.last_seen_autocrypt {
            peerstate.degrade_encryption(message_time);
            peerstate.save_to_db(&context.sql, false).await?;
        }
    }

    Ok(peerstate)
}

/// Returns true if the tree contains a `multipart/report` part anywhere.
pub(crate) fn contains_report(mail: &ParsedMail<'_>) -> bool {
    mail.ctype.mimetype == "multipart/report" || mail.subparts.iter().any(contains_report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_decrypted_pgp_armor() {
        let data = b" -----BEGIN PGP MESSAGE-----";
        assert_eq!(has_decrypted_pgp_armor(data), true);

        let data = b"    \n-----BEGIN PGP MESSAGE-----";
        assert_eq!(has_decrypted_pgp_armor(data), true);

        let data = b"    -----BEGIN PGP MESSAGE---";
        assert_eq!(has_decrypted_pgp_armor(data), false);

        let data = b"blas";
        assert_eq!(has_decrypted_pgp_armor(data), false);
    }

    const ENCRYPTED_EML: &str = "From: alice@example.org\r\n\
To: bob@example.net\r\n\
Content-Type: multipart/encrypted; protocol=\"application/pgp-encrypted\"; boundary=\"bb\"\r\n\
\r\n\
--bb\r\n\
Content-Type: application/pgp-encrypted\r\n\
\r\n\
Version: 1\r\n\
--bb\r\n\
Content-Type: application/octet-stream\r\n\
\r\n\
-----BEGIN PGP MESSAGE-----\r\n\
base64\r\n\
-----END PGP MESSAGE-----\r\n\
--bb--\r\n";

    #[test]
    fn test_get_autocrypt_mime() {
        let mail = mailparse::parse_mail(ENCRYPTED_EML.as_bytes()).unwrap();
        assert!(get_autocrypt_mime(&mail).is_some());
        assert!(get_mixed_up_mime(&mail).is_none());
        assert!(get_attachment_mime(&mail).is_none());
        assert!(!contains_report(&mail));
    }

    #[test]
    fn test_get_mixed_up_mime() {
        // "Mixed Up" mangling prepends an empty text part.
        let raw = "From: alice@example.org\r\n\
Content-Type: multipart/mixed; boundary=\"bb\"\r\n\
\r\n\
--bb\r\n\
Content-Type: text/plain\r\n\
\r\n\
Empty Message\r\n\
--bb\r\n\
Content-Type: application/pgp-encrypted\r\n\
\r\n\
Version: 1\r\n\
--bb\r\n\
Content-Type: application/octet-stream\r\n\
\r\n\
-----BEGIN PGP MESSAGE-----\r\n\
base64\r\n\
-----END PGP MESSAGE-----\r\n\
--bb--\r\n";
        let mail = mailparse::parse_mail(raw.as_bytes()).unwrap();
        assert!(get_autocrypt_mime(&mail).is_none());
        assert!(get_mixed_up_mime(&mail).is_some());
        assert!(get_attachment_mime(&mail).is_none());
    }

    #[test]
    fn test_get_attachment_mime() {
        // A footer part prepended, the original message attached.
        let raw = "From: alice@example.org\r\n\
Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
\r\n\
--outer\r\n\
Content-Type: text/plain\r\n\
\r\n\
Corporate footer\r\n\
--outer\r\n\
Content-Type: multipart/encrypted; protocol=\"application/pgp-encrypted\"; boundary=\"bb\"\r\n\
\r\n\
--bb\r\n\
Content-Type: application/pgp-encrypted\r\n\
\r\n\
Version: 1\r\n\
--bb\r\n\
Content-Type: application/octet-stream\r\n\
\r\n\
-----BEGIN PGP MESSAGE-----\r\n\
base64\r\n\
-----END PGP MESSAGE-----\r\n\
--bb--\r\n\
--outer--\r\n";
        let mail = mailparse::parse_mail(raw.as_bytes()).unwrap();
        assert!(get_autocrypt_mime(&mail).is_none());
        assert!(get_mixed_up_mime(&mail).is_none());
        assert!(get_attachment_mime(&mail).is_some());
    }

    #[test]
    fn test_contains_report() {
        let raw = "From: alice@example.org\r\n\
Content-Type: multipart/report; report-type=disposition-notification; boundary=\"bb\"\r\n\
\r\n\
--bb\r\n\
Content-Type: text/plain\r\n\
\r\n\
read\r\n\
--bb--\r\n";
        let mail = mailparse::parse_mail(raw.as_bytes()).unwrap();
        assert!(contains_report(&mail));
    }
}
