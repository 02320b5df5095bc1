//! # MIME message production.

use anyhow::{bail, format_err, Result};
use chrono::{DateTime, Utc};
use lettre_email::{mime, Address, Header, PartBuilder};

use crate::context::Context;
use crate::e2ee::EncryptHelper;
use crate::peerstate::{Peerstate, PeerstateVerifiedStatus};
use crate::stock_str;
use crate::tools::{addr_cmp, create_outgoing_rfc724_mid, time};

/// Helper to construct mime messages.
#[derive(Debug)]
pub struct MimeFactory {
    pub from_addr: String,
    pub from_displayname: String,

    /// Vector of pairs of recipient name and address.
    pub recipients: Vec<(String, String)>,

    pub timestamp: i64,
    pub subject: String,
    pub in_reply_to: String,
    pub references: String,

    /// Additional headers from the chat layer, e.g. `Chat-Group-ID`.
    /// They take part in the memory-hole migration: everything
    /// matching `Subject`, `Secure-Join*` or `Chat-*` except
    /// `Chat-Version` moves into the encrypted part.
    pub extra_headers: Vec<(String, String)>,

    pub force_plaintext: bool,
    pub e2ee_guaranteed: bool,
    pub min_verified: PeerstateVerifiedStatus,
}

/// A rendered email message, ready for the transport.
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub message: Vec<u8>,
    pub is_encrypted: bool,
    pub is_gossiped: bool,
    pub rfc724_mid: String,
    pub subject: String,
}

impl MimeFactory {
    pub fn new(from_addr: impl Into<String>, recipients: Vec<(String, String)>) -> Self {
        MimeFactory {
            from_addr: from_addr.into(),
            from_displayname: String::new(),
            recipients,
            timestamp: time(),
            subject: String::new(),
            in_reply_to: String::new(),
            references: String::new(),
            extra_headers: Vec::new(),
            force_plaintext: false,
            e2ee_guaranteed: false,
            min_verified: PeerstateVerifiedStatus::Unverified,
        }
    }

    /// Plain addresses of all recipients.
    pub fn recipients(&self) -> Vec<String> {
        self.recipients
            .iter()
            .map(|(_, addr)| addr.clone())
            .collect()
    }

    async fn peerstates_for_recipients(
        &self,
        context: &Context,
    ) -> Result<Vec<(Option<Peerstate>, String)>> {
        let self_addr = context.get_primary_self_addr().await?;

        let mut res = Vec::new();
        for (_, addr) in self
            .recipients
            .iter()
            .filter(|(_, addr)| !addr_cmp(addr, &self_addr))
        {
            res.push((Peerstate::from_addr(context, addr).await?, addr.clone()));
        }

        Ok(res)
    }

    /// Renders the message.
    ///
    /// `body` is the message body subtree; when the message is
    /// encrypted it becomes the protected part carrying the
    /// memory-hole headers.
    pub async fn render(self, context: &Context, body: PartBuilder) -> Result<RenderedEmail> {
        let mut protected_headers: Vec<Header> = Vec::new();
        let mut unprotected_headers: Vec<Header> = Vec::new();

        let from = if self.from_displayname.is_empty() {
            Address::new_mailbox(self.from_addr.clone())
        } else {
            Address::new_mailbox_with_name(self.from_displayname.clone(), self.from_addr.clone())
        };

        let mut to: Vec<Address> = Vec::new();
        for (name, addr) in &self.recipients {
            if name.is_empty() {
                to.push(Address::new_mailbox(addr.clone()));
            } else {
                to.push(Address::new_mailbox_with_name(name.clone(), addr.clone()));
            }
        }

        unprotected_headers.push(
            Header::new_with_value("From".into(), vec![from])
                .map_err(|err| format_err!("invalid From header: {}", err))?,
        );
        unprotected_headers.push(
            Header::new_with_value("To".into(), to)
                .map_err(|err| format_err!("invalid To header: {}", err))?,
        );

        let date = DateTime::<Utc>::from_timestamp(self.timestamp, 0)
            .unwrap_or_else(Utc::now)
            .to_rfc2822();
        unprotected_headers.push(Header::new("Date".into(), date));

        unprotected_headers.push(Header::new("MIME-Version".into(), "1.0".into()));

        let rfc724_mid = create_outgoing_rfc724_mid(None, &self.from_addr);
        unprotected_headers.push(Header::new(
            "Message-ID".into(),
            render_rfc724_mid(&rfc724_mid),
        ));

        if !self.in_reply_to.is_empty() {
            unprotected_headers.push(Header::new("In-Reply-To".into(), self.in_reply_to.clone()));
        }
        if !self.references.is_empty() {
            unprotected_headers.push(Header::new("References".into(), self.references.clone()));
        }

        // The subject is a memory-hole header, it moves into the
        // encrypted part.
        let subject_str = self.subject.clone();
        protected_headers.push(Header::new("Subject".into(), encode_words(&subject_str)));

        for (name, value) in &self.extra_headers {
            if is_protected_header(name) {
                protected_headers.push(Header::new(name.clone(), value.clone()));
            } else {
                unprotected_headers.push(Header::new(name.clone(), value.clone()));
            }
        }

        let encrypt_helper = EncryptHelper::new(context).await?;

        // Whether the message gets encrypted or not, the outer header
        // block announces our key.
        let aheader = encrypt_helper.get_aheader().to_string();
        unprotected_headers.push(Header::new("Autocrypt".into(), aheader));

        let peerstates = self.peerstates_for_recipients(context).await?;
        let should_encrypt = encrypt_helper.should_encrypt(
            context,
            self.e2ee_guaranteed,
            self.min_verified,
            &peerstates,
        )?;
        let is_encrypted = should_encrypt && !self.force_plaintext;

        if self.e2ee_guaranteed && !is_encrypted {
            bail!("End-to-end encryption is required but cannot be used");
        }

        let mut message = body;
        let mut is_gossiped = false;

        let outer_message = if is_encrypted {
            // Add gossip headers in chats with multiple recipients.
            if peerstates.len() > 1 {
                for (peerstate, _addr) in &peerstates {
                    if let Some(peerstate) = peerstate {
                        if let Some(header) = peerstate.render_gossip_header(self.min_verified) {
                            message =
                                message.header(Header::new("Autocrypt-Gossip".into(), header));
                            is_gossiped = true;
                        }
                    }
                }
            }

            // Store the protected headers in the inner message.
            for header in protected_headers.into_iter() {
                message = message.header(header);
            }

            // Tag the inner message as the carrier of the protected headers.
            let mut existing_ct = message
                .get_header("Content-Type".to_string())
                .and_then(|h| h.get_value::<String>().ok())
                .unwrap_or_else(|| "text/plain; charset=utf-8;".to_string());
            if !existing_ct.ends_with(';') {
                existing_ct += ";";
            }
            message = message.replace_header(Header::new(
                "Content-Type".to_string(),
                format!("{existing_ct} protected-headers=\"v1\";"),
            ));

            let encrypted = encrypt_helper
                .encrypt(context, self.min_verified, message, peerstates)
                .await?;

            let mut outer_message = PartBuilder::new().header((
                "Content-Type".to_string(),
                "multipart/encrypted; protocol=\"application/pgp-encrypted\"".to_string(),
            ));

            // The outer subject is only a placeholder, the real one
            // travels within the encrypted part.
            outer_message = outer_message.header(Header::new(
                "Subject".into(),
                stock_str::encrypted_msg(context).await,
            ));

            for header in unprotected_headers.into_iter() {
                outer_message = outer_message.header(header);
            }

            outer_message
                .child(
                    // Autocrypt part 1
                    PartBuilder::new()
                        .content_type(&"application/pgp-encrypted".parse::<mime::Mime>().unwrap())
                        .header(("Content-Description", "PGP/MIME version identification"))
                        .header(("Content-Transfer-Encoding", "7bit"))
                        .body("Version: 1\r\n")
                        .build(),
                )
                .child(
                    // Autocrypt part 2
                    PartBuilder::new()
                        .content_type(
                            &"application/octet-stream; name=\"encrypted.asc\""
                                .parse::<mime::Mime>()
                                .unwrap(),
                        )
                        .header(("Content-Description", "OpenPGP encrypted message"))
                        .header(("Content-Disposition", "inline; filename=\"encrypted.asc\";"))
                        .header(("Content-Transfer-Encoding", "7bit"))
                        .body(encrypted)
                        .build(),
                )
        } else {
            // In the unencrypted case all headers go to the outer message.
            for header in protected_headers.into_iter() {
                message = message.header(header);
            }
            for header in unprotected_headers.into_iter() {
                message = message.header(header);
            }
            message
        };

        Ok(RenderedEmail {
            message: outer_message.build().as_string().into_bytes(),
            is_encrypted,
            is_gossiped,
            rfc724_mid,
            subject: subject_str,
        })
    }
}

/// Returns whether a header moves into the encrypted part.
fn is_protected_header(name: &str) -> bool {
    let name = name.to_lowercase();
    name == "subject"
        || name.starts_with("secure-join")
        || (name.starts_with("chat-") && name != "chat-version")
}

fn render_rfc724_mid(rfc724_mid: &str) -> String {
    let rfc724_mid = rfc724_mid.trim();

    if rfc724_mid.starts_with('<') {
        rfc724_mid.to_string()
    } else {
        format!("<{rfc724_mid}>")
    }
}

fn encode_words(word: &str) -> String {
    encoded_words::encode(word, None, encoded_words::EncodingFlag::Shortest, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aheader::EncryptPreference;
    use crate::test_utils::{header, TestContext};

    fn text_part(text: &str) -> PartBuilder {
        PartBuilder::new()
            .content_type(&mime::TEXT_PLAIN_UTF_8)
            .body(text)
    }

    async fn peer_known_as_mutual(t: &TestContext, addr: &str) {
        let peerstate =
            Peerstate::from_header(&header(addr, EncryptPreference::Mutual), time() - 100);
        peerstate.save_to_db(&t.ctx.sql, true).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_render_plaintext() {
        let t = TestContext::new_alice().await;

        let mut factory = MimeFactory::new(
            "alice@example.org",
            vec![("".to_string(), "unknown@example.com".to_string())],
        );
        factory.subject = "Hi".to_string();
        factory
            .extra_headers
            .push(("Chat-Version".to_string(), "1.0".to_string()));

        let rendered = factory.render(&t.ctx, text_part("hello")).await.unwrap();
        assert!(!rendered.is_encrypted);
        assert!(!rendered.is_gossiped);

        let message = String::from_utf8(rendered.message.clone()).unwrap();
        let mail = mailparse::parse_mail(rendered.message.as_slice()).unwrap();
        use mailparse::MailHeaderMap;
        assert_eq!(
            mail.headers.get_first_value("Subject").as_deref(),
            Some("Hi")
        );
        assert_eq!(
            mail.headers.get_first_value("Chat-Version").as_deref(),
            Some("1.0")
        );
        assert!(mail.headers.get_first_value("Autocrypt").is_some());
        assert!(message.contains("hello"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_render_encrypted() {
        let t = TestContext::new_alice().await;
        peer_known_as_mutual(&t, "bob@example.net").await;

        let mut factory = MimeFactory::new(
            "alice@example.org",
            vec![("".to_string(), "bob@example.net".to_string())],
        );
        factory.subject = "The plan".to_string();
        factory
            .extra_headers
            .push(("Chat-Group-ID".to_string(), "HcxyMARjyJy".to_string()));

        let rendered = factory.render(&t.ctx, text_part("hello")).await.unwrap();
        assert!(rendered.is_encrypted);
        // a single recipient gets no gossip
        assert!(!rendered.is_gossiped);

        let mail = mailparse::parse_mail(rendered.message.as_slice()).unwrap();
        use mailparse::MailHeaderMap;
        assert_eq!(mail.ctype.mimetype, "multipart/encrypted");
        assert_eq!(mail.subparts.len(), 2);
        assert_eq!(
            mail.subparts[0].ctype.mimetype,
            "application/pgp-encrypted"
        );
        assert_eq!(mail.subparts[1].ctype.mimetype, "application/octet-stream");
        assert!(String::from_utf8_lossy(&mail.subparts[1].get_body_raw().unwrap())
            .starts_with("-----BEGIN PGP MESSAGE-----"));

        // memory hole: the real subject and the chat headers are gone
        // from the outer header block
        assert_eq!(
            mail.headers.get_first_value("Subject").as_deref(),
            Some("Encrypted message")
        );
        assert!(mail.headers.get_first_value("Chat-Group-ID").is_none());
        assert!(mail.headers.get_first_value("Autocrypt").is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_gossip_needs_multiple_recipients() {
        let t = TestContext::new_alice().await;
        peer_known_as_mutual(&t, "bob@example.net").await;
        peer_known_as_mutual(&t, "carol@example.com").await;

        let factory = MimeFactory::new(
            "alice@example.org",
            vec![
                ("".to_string(), "bob@example.net".to_string()),
                ("".to_string(), "carol@example.com".to_string()),
            ],
        );
        let rendered = factory.render(&t.ctx, text_part("hi all")).await.unwrap();
        assert!(rendered.is_encrypted);
        assert!(rendered.is_gossiped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_one_unknown_recipient_disables_encryption() {
        let t = TestContext::new_alice().await;
        peer_known_as_mutual(&t, "bob@example.net").await;

        let factory = MimeFactory::new(
            "alice@example.org",
            vec![
                ("".to_string(), "bob@example.net".to_string()),
                ("".to_string(), "unknown@example.com".to_string()),
            ],
        );
        let rendered = factory.render(&t.ctx, text_part("hi all")).await.unwrap();
        assert!(!rendered.is_encrypted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_encryption_required_fails() {
        let t = TestContext::new_alice().await;

        let mut factory = MimeFactory::new(
            "alice@example.org",
            vec![("".to_string(), "unknown@example.com".to_string())],
        );
        factory.e2ee_guaranteed = true;
        assert!(factory.render(&t.ctx, text_part("hello")).await.is_err());

        // forcing plaintext on a guaranteed-encrypted message is refused, too
        let t = TestContext::new_alice().await;
        peer_known_as_mutual(&t, "bob@example.net").await;
        let mut factory = MimeFactory::new(
            "alice@example.org",
            vec![("".to_string(), "bob@example.net".to_string())],
        );
        factory.e2ee_guaranteed = true;
        factory.force_plaintext = true;
        assert!(factory.render(&t.ctx, text_part("hello")).await.is_err());
    }
}
