//! # [Autocrypt Peer State](https://autocrypt.org/level1.html#peer-state-management) module.

use std::collections::HashSet;

use anyhow::Result;
use num_traits::FromPrimitive;

use crate::aheader::{Aheader, EncryptPreference};
use crate::context::Context;
use crate::events::Event;
use crate::key::{DcKey, Fingerprint, SignedPublicKey};
use crate::sql::Sql;

/// The key slot [Peerstate::set_verified] operates on.
#[derive(Debug)]
pub enum PeerstateKeyType {
    GossipKey,
    PublicKey,
}

/// Verification level required when picking an encryption key.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum PeerstateVerifiedStatus {
    Unverified = 0,
    //Verified = 1, // not used
    BidirectVerified = 2,
}

/// What [Peerstate::save_to_db] has to write.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ToSave {
    Timestamps = 0x01,
    All = 0x02,
}

/// Events the UI must be told about after the next save.
///
/// The caller is responsible for clearing the flags once reported;
/// they accumulate until then.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct DegradeEvent {
    /// Recoverable by an incoming encrypted mail.
    pub encryption_paused: bool,

    /// Recoverable by a new verify.
    pub fingerprint_changed: bool,
}

impl DegradeEvent {
    pub fn is_empty(self) -> bool {
        self == Self::default()
    }
}

/// Peerstate represents the state of an Autocrypt peer.
#[derive(Debug, PartialEq, Eq)]
pub struct Peerstate {
    pub addr: String,
    pub last_seen: i64,
    pub last_seen_autocrypt: i64,
    pub prefer_encrypt: EncryptPreference,
    pub public_key: Option<SignedPublicKey>,
    pub public_key_fingerprint: Option<Fingerprint>,
    pub gossip_key: Option<SignedPublicKey>,
    pub gossip_timestamp: i64,
    pub gossip_key_fingerprint: Option<Fingerprint>,
    pub verified_key: Option<SignedPublicKey>,
    pub verified_key_fingerprint: Option<Fingerprint>,
    pub to_save: Option<ToSave>,
    pub degrade_event: DegradeEvent,
}

impl Peerstate {
    pub fn new(addr: String) -> Self {
        Peerstate {
            addr,
            last_seen: 0,
            last_seen_autocrypt: 0,
            prefer_encrypt: Default::default(),
            public_key: None,
            public_key_fingerprint: None,
            gossip_key: None,
            gossip_key_fingerprint: None,
            gossip_timestamp: 0,
            verified_key: None,
            verified_key_fingerprint: None,
            to_save: None,
            degrade_event: Default::default(),
        }
    }

    /// Creates a fresh peerstate from an incoming `Autocrypt:` header.
    pub fn from_header(header: &Aheader, message_time: i64) -> Self {
        let mut res = Self::new(header.addr.clone());

        res.last_seen = message_time;
        res.last_seen_autocrypt = message_time;
        res.to_save = Some(ToSave::All);
        res.prefer_encrypt = header.prefer_encrypt;
        res.public_key = Some(header.public_key.clone());
        res.recalc_fingerprint();

        res
    }

    /// Creates a fresh peerstate from an `Autocrypt-Gossip:` header.
    ///
    /// Note that `last_seen` stays zero: gossip says nothing about
    /// direct contact with the peer.
    pub fn from_gossip(gossip_header: &Aheader, message_time: i64) -> Self {
        let mut res = Self::new(gossip_header.addr.clone());

        res.gossip_timestamp = message_time;
        res.to_save = Some(ToSave::All);
        res.gossip_key = Some(gossip_header.public_key.clone());
        res.recalc_fingerprint();

        res
    }

    /// Loads a peerstate by address, case-insensitively.
    pub async fn from_addr(context: &Context, addr: &str) -> Result<Option<Peerstate>> {
        let query = "SELECT addr, last_seen, last_seen_autocrypt, prefer_encrypted, public_key,
                            gossip_timestamp, gossip_key, public_key_fingerprint,
                            gossip_key_fingerprint, verified_key, verified_key_fingerprint
                       FROM acpeerstates
                      WHERE addr=? COLLATE NOCASE;";
        let res = context
            .sql
            .query_row_optional(query, (addr,), Self::from_row)
            .await?;
        Ok(res)
    }

    /// Loads a peerstate by key fingerprint.
    ///
    /// Matches either the public or the gossip key fingerprint; when
    /// both match different rows, the row matching on the public key
    /// fingerprint wins.
    pub async fn from_fingerprint(
        context: &Context,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Peerstate>> {
        let query = "SELECT addr, last_seen, last_seen_autocrypt, prefer_encrypted, public_key,
                            gossip_timestamp, gossip_key, public_key_fingerprint,
                            gossip_key_fingerprint, verified_key, verified_key_fingerprint
                       FROM acpeerstates
                      WHERE public_key_fingerprint=? OR gossip_key_fingerprint=?
                      ORDER BY public_key_fingerprint=? DESC;";
        let fp = fingerprint.hex();
        let res = context
            .sql
            .query_row_optional(query, (&fp, &fp, &fp), Self::from_row)
            .await?;
        Ok(res)
    }

    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Peerstate> {
        let res = Peerstate {
            addr: row.get("addr")?,
            last_seen: row.get("last_seen")?,
            last_seen_autocrypt: row.get("last_seen_autocrypt")?,
            prefer_encrypt: EncryptPreference::from_i64(row.get("prefer_encrypted")?)
                .unwrap_or_default(),
            public_key: row
                .get::<_, Option<Vec<u8>>>("public_key")?
                .and_then(|blob| SignedPublicKey::from_slice(&blob).ok()),
            public_key_fingerprint: row
                .get::<_, Option<String>>("public_key_fingerprint")?
                .and_then(|fp| fp.parse::<Fingerprint>().ok()),
            gossip_key: row
                .get::<_, Option<Vec<u8>>>("gossip_key")?
                .and_then(|blob| SignedPublicKey::from_slice(&blob).ok()),
            gossip_key_fingerprint: row
                .get::<_, Option<String>>("gossip_key_fingerprint")?
                .and_then(|fp| fp.parse::<Fingerprint>().ok()),
            gossip_timestamp: row.get("gossip_timestamp")?,
            verified_key: row
                .get::<_, Option<Vec<u8>>>("verified_key")?
                .and_then(|blob| SignedPublicKey::from_slice(&blob).ok()),
            verified_key_fingerprint: row
                .get::<_, Option<String>>("verified_key_fingerprint")?
                .and_then(|fp| fp.parse::<Fingerprint>().ok()),
            to_save: None,
            degrade_event: Default::default(),
        };
        Ok(res)
    }

    /// Recomputes both fingerprints from the current keys.
    ///
    /// A changed, previously known public or gossip fingerprint raises
    /// the fingerprint-changed degrade event; the very first
    /// fingerprint never does.
    pub fn recalc_fingerprint(&mut self) {
        if let Some(ref public_key) = self.public_key {
            let old_public_fingerprint = self.public_key_fingerprint.take();
            self.public_key_fingerprint = Some(public_key.fingerprint());

            if old_public_fingerprint != self.public_key_fingerprint {
                self.to_save = Some(ToSave::All);
                if old_public_fingerprint.is_some() {
                    self.degrade_event.fingerprint_changed = true;
                }
            }
        }

        if let Some(ref gossip_key) = self.gossip_key {
            let old_gossip_fingerprint = self.gossip_key_fingerprint.take();
            self.gossip_key_fingerprint = Some(gossip_key.fingerprint());

            if old_gossip_fingerprint != self.gossip_key_fingerprint {
                self.to_save = Some(ToSave::All);
                if old_gossip_fingerprint.is_some() {
                    self.degrade_event.fingerprint_changed = true;
                }
            }
        }
    }

    /// Degrades encryption after a message without an `Autocrypt:`
    /// header arrived from a peer that announced a preference before.
    pub fn degrade_encryption(&mut self, message_time: i64) {
        if self.prefer_encrypt == EncryptPreference::Mutual {
            self.degrade_event.encryption_paused = true;
        }

        self.prefer_encrypt = EncryptPreference::Reset;
        self.last_seen = message_time;
        self.to_save = Some(ToSave::All);
    }

    /// Updates the peerstate from an incoming `Autocrypt:` header.
    ///
    /// Only messages newer than the last seen Autocrypt message have an
    /// effect; out-of-order arrival never overwrites newer state.
    pub fn apply_header(&mut self, header: &Aheader, message_time: i64) {
        if !crate::tools::addr_cmp(&self.addr, &header.addr) {
            return;
        }

        if message_time > self.last_seen_autocrypt {
            self.last_seen = message_time;
            self.last_seen_autocrypt = message_time;
            self.to_save = Some(self.to_save.unwrap_or(ToSave::Timestamps));

            if (header.prefer_encrypt == EncryptPreference::Mutual
                || header.prefer_encrypt == EncryptPreference::NoPreference)
                && header.prefer_encrypt != self.prefer_encrypt
            {
                if self.prefer_encrypt == EncryptPreference::Mutual
                    && header.prefer_encrypt != EncryptPreference::Mutual
                {
                    self.degrade_event.encryption_paused = true;
                }
                self.prefer_encrypt = header.prefer_encrypt;
                self.to_save = Some(ToSave::All);
            }

            if self.public_key.as_ref() != Some(&header.public_key) {
                self.public_key = Some(header.public_key.clone());
                self.recalc_fingerprint();
                self.to_save = Some(ToSave::All);
            }
        }
    }

    /// Updates the gossip key from an `Autocrypt-Gossip:` header.
    ///
    /// Touches only the gossip slots; in particular the encryption
    /// preference is never changed by gossip.
    pub fn apply_gossip(&mut self, gossip_header: &Aheader, message_time: i64) {
        if !crate::tools::addr_cmp(&self.addr, &gossip_header.addr) {
            return;
        }

        if message_time > self.gossip_timestamp {
            self.gossip_timestamp = message_time;
            self.to_save = Some(self.to_save.unwrap_or(ToSave::Timestamps));

            if self.gossip_key.as_ref() != Some(&gossip_header.public_key) {
                self.gossip_key = Some(gossip_header.public_key.clone());
                self.recalc_fingerprint();
                self.to_save = Some(ToSave::All);
            }
        }
    }

    /// Renders an `Autocrypt-Gossip:` header value for this peer.
    ///
    /// The gossiped header never carries a `prefer-encrypt` attribute;
    /// rendering with `NoPreference` omits it.
    pub fn render_gossip_header(&self, min_verified: PeerstateVerifiedStatus) -> Option<String> {
        let key = self.peek_key(min_verified)?;
        let header = Aheader::new(
            self.addr.clone(),
            key.clone(),
            EncryptPreference::NoPreference,
        );
        Some(header.to_string())
    }

    /// Takes the key to encrypt to, consuming the peerstate.
    pub fn take_key(mut self, min_verified: PeerstateVerifiedStatus) -> Option<SignedPublicKey> {
        match min_verified {
            PeerstateVerifiedStatus::BidirectVerified => self.verified_key.take(),
            PeerstateVerifiedStatus::Unverified => {
                self.public_key.take().or_else(|| self.gossip_key.take())
            }
        }
    }

    /// Returns a reference to the key to encrypt to, if any.
    pub fn peek_key(&self, min_verified: PeerstateVerifiedStatus) -> Option<&SignedPublicKey> {
        match min_verified {
            PeerstateVerifiedStatus::BidirectVerified => self.verified_key.as_ref(),
            PeerstateVerifiedStatus::Unverified => {
                self.public_key.as_ref().or(self.gossip_key.as_ref())
            }
        }
    }

    /// Copies the given key into the verified slot.
    ///
    /// The stored fingerprint of `which_key` must equal
    /// `fingerprint`; this protects against the key changing between
    /// out-of-band display and confirmation. Returns whether the
    /// verification was set.
    pub fn set_verified(
        &mut self,
        which_key: PeerstateKeyType,
        fingerprint: &Fingerprint,
        verified: PeerstateVerifiedStatus,
    ) -> bool {
        if verified != PeerstateVerifiedStatus::BidirectVerified {
            return false;
        }

        match which_key {
            PeerstateKeyType::PublicKey => {
                if self.public_key_fingerprint.is_some()
                    && self.public_key_fingerprint.as_ref() == Some(fingerprint)
                {
                    self.to_save = Some(ToSave::All);
                    self.verified_key = self.public_key.clone();
                    self.verified_key_fingerprint = self.public_key_fingerprint.clone();
                    true
                } else {
                    false
                }
            }
            PeerstateKeyType::GossipKey => {
                if self.gossip_key_fingerprint.is_some()
                    && self.gossip_key_fingerprint.as_ref() == Some(fingerprint)
                {
                    self.to_save = Some(ToSave::All);
                    self.verified_key = self.gossip_key.clone();
                    self.verified_key_fingerprint = self.gossip_key_fingerprint.clone();
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Returns true if the verified key fingerprint is in the given set.
    pub fn has_verified_key(&self, fingerprints: &HashSet<Fingerprint>) -> bool {
        if let Some(vkc) = &self.verified_key_fingerprint {
            fingerprints.contains(vkc) && self.verified_key.is_some()
        } else {
            false
        }
    }

    /// Saves the peerstate.
    ///
    /// With `create` the row is inserted first; depending on
    /// [Peerstate::to_save] either only the timestamps or the full
    /// record are written. After a successful save the caller is
    /// expected to report [Peerstate::degrade_event] via
    /// [handle_degrade_event] and clear it.
    pub async fn save_to_db(&self, sql: &Sql, create: bool) -> crate::sql::Result<()> {
        if create {
            sql.execute(
                "INSERT OR REPLACE INTO acpeerstates (addr) VALUES(?);",
                (&self.addr,),
            )
            .await?;
        }

        if self.to_save == Some(ToSave::All) || create {
            sql.execute(
                "UPDATE acpeerstates
                    SET last_seen=?, last_seen_autocrypt=?, prefer_encrypted=?, public_key=?,
                        gossip_timestamp=?, gossip_key=?, public_key_fingerprint=?,
                        gossip_key_fingerprint=?, verified_key=?, verified_key_fingerprint=?
                  WHERE addr=?;",
                rusqlite::params![
                    self.last_seen,
                    self.last_seen_autocrypt,
                    self.prefer_encrypt as i64,
                    self.public_key.as_ref().map(DcKey::to_bytes),
                    self.gossip_timestamp,
                    self.gossip_key.as_ref().map(DcKey::to_bytes),
                    self.public_key_fingerprint.as_ref().map(|fp| fp.hex()),
                    self.gossip_key_fingerprint.as_ref().map(|fp| fp.hex()),
                    self.verified_key.as_ref().map(DcKey::to_bytes),
                    self.verified_key_fingerprint.as_ref().map(|fp| fp.hex()),
                    &self.addr,
                ],
            )
            .await?;
        } else if self.to_save == Some(ToSave::Timestamps) {
            sql.execute(
                "UPDATE acpeerstates
                    SET last_seen=?, last_seen_autocrypt=?, gossip_timestamp=?
                  WHERE addr=?;",
                rusqlite::params![
                    self.last_seen,
                    self.last_seen_autocrypt,
                    self.gossip_timestamp,
                    &self.addr,
                ],
            )
            .await?;
        }

        Ok(())
    }
}

/// Reports the pending degrade events of a peerstate to the UI.
///
/// To be called after a successful [Peerstate::save_to_db]; the caller
/// clears the flags afterwards.
pub fn handle_degrade_event(context: &Context, peerstate: &Peerstate) {
    if peerstate.degrade_event.encryption_paused {
        context.emit_event(Event::EncryptionPaused {
            addr: peerstate.addr.clone(),
        });
    }
    if peerstate.degrade_event.fingerprint_changed {
        context.emit_event(Event::FingerprintChanged {
            addr: peerstate.addr.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_utils::{alice_keypair, bob_public_key, gossip_header, header, TestContext};

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_peerstate_save_to_db() {
        let ctx = TestContext::new().await;
        let addr = "hello@mail.com";

        let pub_key = alice_keypair().public;

        let mut peerstate = Peerstate {
            addr: addr.into(),
            last_seen: 10,
            last_seen_autocrypt: 11,
            prefer_encrypt: EncryptPreference::Mutual,
            public_key: Some(pub_key.clone()),
            public_key_fingerprint: Some(pub_key.fingerprint()),
            gossip_key: Some(pub_key.clone()),
            gossip_timestamp: 12,
            gossip_key_fingerprint: Some(pub_key.fingerprint()),
            verified_key: Some(pub_key.clone()),
            verified_key_fingerprint: Some(pub_key.fingerprint()),
            to_save: Some(ToSave::All),
            degrade_event: Default::default(),
        };

        assert!(
            peerstate.save_to_db(&ctx.ctx.sql, true).await.is_ok(),
            "failed to save to db"
        );

        let peerstate_new = Peerstate::from_addr(&ctx.ctx, addr)
            .await
            .expect("failed to load peerstate from db")
            .expect("no peerstate found in the database");

        // clear to_save, as that is not persisted
        peerstate.to_save = None;
        assert_eq!(peerstate, peerstate_new);

        let peerstate_new2 = Peerstate::from_fingerprint(&ctx.ctx, &pub_key.fingerprint())
            .await
            .expect("failed to load peerstate from db")
            .expect("no peerstate found in the database");
        assert_eq!(peerstate, peerstate_new2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_peerstate_double_create() {
        let ctx = TestContext::new().await;
        let addr = "hello@mail.com";
        let pub_key = alice_keypair().public;

        let peerstate = Peerstate {
            addr: addr.into(),
            last_seen: 10,
            last_seen_autocrypt: 11,
            prefer_encrypt: EncryptPreference::Mutual,
            public_key: Some(pub_key.clone()),
            public_key_fingerprint: Some(pub_key.fingerprint()),
            gossip_key: None,
            gossip_timestamp: 12,
            gossip_key_fingerprint: None,
            verified_key: None,
            verified_key_fingerprint: None,
            to_save: Some(ToSave::All),
            degrade_event: Default::default(),
        };

        assert!(
            peerstate.save_to_db(&ctx.ctx.sql, true).await.is_ok(),
            "failed to save"
        );
        assert!(
            peerstate.save_to_db(&ctx.ctx.sql, true).await.is_ok(),
            "double-call with create failed"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_peerstate_with_empty_gossip_key_save_to_db() {
        let ctx = TestContext::new().await;
        let addr = "hello@mail.com";

        let pub_key = alice_keypair().public;

        let mut peerstate = Peerstate {
            addr: addr.into(),
            last_seen: 10,
            last_seen_autocrypt: 11,
            prefer_encrypt: EncryptPreference::Mutual,
            public_key: Some(pub_key.clone()),
            public_key_fingerprint: Some(pub_key.fingerprint()),
            gossip_key: None,
            gossip_timestamp: 12,
            gossip_key_fingerprint: None,
            verified_key: None,
            verified_key_fingerprint: None,
            to_save: Some(ToSave::All),
            degrade_event: Default::default(),
        };

        assert!(
            peerstate.save_to_db(&ctx.ctx.sql, true).await.is_ok(),
            "failed to save"
        );

        let peerstate_new = Peerstate::from_addr(&ctx.ctx, addr)
            .await
            .expect("failed to load peerstate from db")
            .expect("no peerstate found in the database");

        peerstate.to_save = None;
        assert_eq!(peerstate, peerstate_new);
    }

    #[test]
    fn test_from_header() {
        let header = header("bob@example.net", EncryptPreference::Mutual);
        let peerstate = Peerstate::from_header(&header, 1716000000);

        assert_eq!(peerstate.addr, "bob@example.net");
        assert_eq!(peerstate.last_seen, 1716000000);
        assert_eq!(peerstate.last_seen_autocrypt, 1716000000);
        assert_eq!(peerstate.prefer_encrypt, EncryptPreference::Mutual);
        assert!(peerstate.public_key.is_some());
        assert!(peerstate.public_key_fingerprint.is_some());
        assert_eq!(peerstate.to_save, Some(ToSave::All));
        assert!(peerstate.degrade_event.is_empty());
    }

    #[test]
    fn test_from_gossip() {
        let gossip = gossip_header("carol@example.com");
        let peerstate = Peerstate::from_gossip(&gossip, 1716000000);

        assert_eq!(peerstate.addr, "carol@example.com");
        assert_eq!(peerstate.last_seen, 0);
        assert_eq!(peerstate.last_seen_autocrypt, 0);
        assert_eq!(peerstate.gossip_timestamp, 1716000000);
        assert!(peerstate.gossip_key.is_some());
        assert!(peerstate.gossip_key_fingerprint.is_some());
        assert!(peerstate.public_key.is_none());
    }

    /// For any sequence of applied headers, the final key is the one
    /// from the header with the largest message time, regardless of
    /// arrival order.
    #[test]
    fn test_apply_header_monotone() {
        let old_header = header("bob@example.net", EncryptPreference::Mutual);
        let mut new_header = header("bob@example.net", EncryptPreference::Mutual);
        new_header.public_key = bob_public_key();

        let mut peerstate = Peerstate::from_header(&new_header, 200);
        let new_fingerprint = peerstate.public_key_fingerprint.clone();

        // an older message arrives late and must not overwrite anything
        peerstate.apply_header(&old_header, 100);
        assert_eq!(peerstate.public_key.as_ref(), Some(&new_header.public_key));
        assert_eq!(peerstate.public_key_fingerprint, new_fingerprint);
        assert_eq!(peerstate.last_seen_autocrypt, 200);
    }

    #[test]
    fn test_apply_header_wrong_addr_is_noop() {
        let bob_header = header("bob@example.net", EncryptPreference::Mutual);
        let mut peerstate = Peerstate::from_header(&bob_header, 100);

        let other = header("mallory@example.net", EncryptPreference::NoPreference);
        peerstate.apply_header(&other, 200);

        assert_eq!(peerstate.last_seen_autocrypt, 100);
        assert_eq!(peerstate.prefer_encrypt, EncryptPreference::Mutual);
    }

    /// A single Mutual -> NoPreference transition raises
    /// encryption-paused exactly once; a later NoPreference -> Mutual
    /// transition does not clear it.
    #[test]
    fn test_degrade_raised_once() {
        let mutual = header("bob@example.net", EncryptPreference::Mutual);
        let nopref = header("bob@example.net", EncryptPreference::NoPreference);

        let mut peerstate = Peerstate::from_header(&mutual, 100);
        assert!(peerstate.degrade_event.is_empty());

        peerstate.apply_header(&nopref, 200);
        assert!(peerstate.degrade_event.encryption_paused);
        assert!(!peerstate.degrade_event.fingerprint_changed);

        peerstate.apply_header(&mutual, 300);
        // still set, reporting and clearing is up to the caller
        assert!(peerstate.degrade_event.encryption_paused);
    }

    #[test]
    fn test_degrade_encryption() {
        let mutual = header("bob@example.net", EncryptPreference::Mutual);
        let mut peerstate = Peerstate::from_header(&mutual, 100);

        peerstate.degrade_encryption(150);
        assert!(peerstate.degrade_event.encryption_paused);
        assert_eq!(peerstate.prefer_encrypt, EncryptPreference::Reset);
        assert_eq!(peerstate.last_seen, 150);
        assert_eq!(peerstate.last_seen_autocrypt, 100);
        assert_eq!(peerstate.to_save, Some(ToSave::All));
    }

    /// Degrading a peer that never announced Mutual does not pause
    /// anything, it only resets the preference.
    #[test]
    fn test_degrade_encryption_nopreference() {
        let nopref = header("bob@example.net", EncryptPreference::NoPreference);
        let mut peerstate = Peerstate::from_header(&nopref, 100);

        peerstate.degrade_encryption(150);
        assert!(!peerstate.degrade_event.encryption_paused);
        assert_eq!(peerstate.prefer_encrypt, EncryptPreference::Reset);
    }

    /// The very first fingerprint never raises fingerprint-changed.
    #[test]
    fn test_first_fingerprint_is_silent() {
        let mut peerstate = Peerstate::new("bob@example.net".to_string());
        peerstate.public_key = Some(alice_keypair().public);
        peerstate.recalc_fingerprint();

        assert!(peerstate.public_key_fingerprint.is_some());
        assert!(!peerstate.degrade_event.fingerprint_changed);

        // a changed key does raise the event
        peerstate.public_key = Some(bob_public_key());
        peerstate.recalc_fingerprint();
        assert!(peerstate.degrade_event.fingerprint_changed);
    }

    /// A key rotation through apply_header raises fingerprint-changed
    /// and may restore the Mutual preference at the same time.
    #[test]
    fn test_key_rotation() {
        let mutual = header("bob@example.net", EncryptPreference::Mutual);
        let mut peerstate = Peerstate::from_header(&mutual, 100);
        peerstate.degrade_encryption(200);
        peerstate.degrade_event = Default::default();

        let mut rotated = header("bob@example.net", EncryptPreference::Mutual);
        rotated.public_key = bob_public_key();
        peerstate.apply_header(&rotated, 300);

        assert_eq!(peerstate.prefer_encrypt, EncryptPreference::Mutual);
        assert_eq!(
            peerstate.public_key_fingerprint,
            Some(bob_public_key().fingerprint())
        );
        assert!(peerstate.degrade_event.fingerprint_changed);
    }

    /// Gossip never touches the encryption preference or the direct key.
    #[test]
    fn test_apply_gossip() {
        let mutual = header("bob@example.net", EncryptPreference::Mutual);
        let mut peerstate = Peerstate::from_header(&mutual, 100);

        let mut gossip = gossip_header("bob@example.net");
        gossip.public_key = bob_public_key();
        gossip.prefer_encrypt = EncryptPreference::Mutual;
        peerstate.apply_gossip(&gossip, 200);

        assert_eq!(peerstate.gossip_timestamp, 200);
        assert_eq!(peerstate.gossip_key.as_ref(), Some(&gossip.public_key));
        assert_eq!(peerstate.prefer_encrypt, EncryptPreference::Mutual);
        assert_eq!(peerstate.last_seen_autocrypt, 100);
        assert_eq!(peerstate.public_key.as_ref(), Some(&mutual.public_key));

        // out-of-order gossip is ignored
        let old_gossip = gossip_header("bob@example.net");
        peerstate.apply_gossip(&old_gossip, 150);
        assert_eq!(peerstate.gossip_key.as_ref(), Some(&gossip.public_key));
        assert_eq!(peerstate.gossip_timestamp, 200);
    }

    #[test]
    fn test_render_gossip_header_no_prefer_encrypt() {
        let mutual = header("bob@example.net", EncryptPreference::Mutual);
        let peerstate = Peerstate::from_header(&mutual, 100);

        let rendered = peerstate
            .render_gossip_header(PeerstateVerifiedStatus::Unverified)
            .unwrap();
        assert!(rendered.starts_with("addr=bob@example.net;"));
        assert!(!rendered.contains("prefer-encrypt"));
    }

    #[test]
    fn test_peek_key() {
        let mut peerstate = Peerstate::new("bob@example.net".to_string());
        assert!(peerstate
            .peek_key(PeerstateVerifiedStatus::Unverified)
            .is_none());

        let gossip_key = bob_public_key();
        peerstate.gossip_key = Some(gossip_key.clone());
        assert_eq!(
            peerstate.peek_key(PeerstateVerifiedStatus::Unverified),
            Some(&gossip_key)
        );

        let public_key = alice_keypair().public;
        peerstate.public_key = Some(public_key.clone());
        assert_eq!(
            peerstate.peek_key(PeerstateVerifiedStatus::Unverified),
            Some(&public_key)
        );

        // no verified key present
        assert!(peerstate
            .peek_key(PeerstateVerifiedStatus::BidirectVerified)
            .is_none());
    }

    #[test]
    fn test_set_verified() {
        let mutual = header("bob@example.net", EncryptPreference::Mutual);
        let mut peerstate = Peerstate::from_header(&mutual, 100);
        let fingerprint = peerstate.public_key_fingerprint.clone().unwrap();

        // mismatching fingerprint must not verify
        let wrong = bob_public_key().fingerprint();
        assert!(!peerstate.set_verified(
            PeerstateKeyType::PublicKey,
            &wrong,
            PeerstateVerifiedStatus::BidirectVerified
        ));
        assert!(peerstate.verified_key.is_none());

        assert!(peerstate.set_verified(
            PeerstateKeyType::PublicKey,
            &fingerprint,
            PeerstateVerifiedStatus::BidirectVerified
        ));
        assert_eq!(peerstate.verified_key, peerstate.public_key);
        assert_eq!(
            peerstate.verified_key_fingerprint,
            peerstate.public_key_fingerprint
        );

        let mut fingerprints = HashSet::new();
        fingerprints.insert(fingerprint);
        assert!(peerstate.has_verified_key(&fingerprints));
        assert!(!peerstate.has_verified_key(&HashSet::new()));
    }
}
