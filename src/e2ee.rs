//! End-to-end encryption support.

use anyhow::{bail, Context as _, Result};
use num_traits::FromPrimitive;

use crate::aheader::{Aheader, EncryptPreference};
use crate::config::Config;
use crate::context::Context;
use crate::key::{load_self_public_key, load_self_secret_key, SignedPublicKey};
use crate::keyring::Keyring;
use crate::peerstate::{Peerstate, PeerstateVerifiedStatus};
use crate::pgp;

#[derive(Debug)]
pub struct EncryptHelper {
    pub prefer_encrypt: EncryptPreference,
    pub addr: String,
    pub public_key: SignedPublicKey,
}

impl EncryptHelper {
    pub async fn new(context: &Context) -> Result<EncryptHelper> {
        let prefer_encrypt =
            EncryptPreference::from_i32(context.get_config_int(Config::E2eeEnabled).await?)
                .unwrap_or_default();
        let addr = context.get_primary_self_addr().await?;
        let public_key = load_self_public_key(context).await?;

        Ok(EncryptHelper {
            prefer_encrypt,
            addr,
            public_key,
        })
    }

    pub fn get_aheader(&self) -> Aheader {
        let pk = self.public_key.clone();
        let addr = self.addr.to_string();
        Aheader::new(addr, pk, self.prefer_encrypt)
    }

    /// Determines if we can and should encrypt.
    ///
    /// Encryption is used when the own preference is `mutual` or the
    /// message guarantees end-to-end encryption, and every recipient
    /// has a known key selectable at `min_verified` and either prefers
    /// `mutual` as well or the guarantee is set. A single recipient
    /// failing these checks disables encryption for the whole message.
    ///
    /// Returns an error if `e2ee_guaranteed` is set but encryption is
    /// not possible; such a message must not be sent.
    pub fn should_encrypt(
        &self,
        context: &Context,
        e2ee_guaranteed: bool,
        min_verified: PeerstateVerifiedStatus,
        peerstates: &[(Option<Peerstate>, String)],
    ) -> Result<bool> {
        if self.prefer_encrypt != EncryptPreference::Mutual && !e2ee_guaranteed {
            return Ok(false);
        }

        for (peerstate, addr) in peerstates {
            match peerstate {
                Some(peerstate) => {
                    info!(
                        context,
                        "peerstate for {:?} is {}", addr, peerstate.prefer_encrypt
                    );
                    if peerstate.peek_key(min_verified).is_none() {
                        if e2ee_guaranteed {
                            bail!("e2ee required, but no key found for {}", addr);
                        }
                        return Ok(false);
                    }
                    if peerstate.prefer_encrypt != EncryptPreference::Mutual && !e2ee_guaranteed {
                        return Ok(false);
                    }
                }
                None => {
                    let msg = format!("peerstate for {addr:?} missing, cannot encrypt");
                    if e2ee_guaranteed {
                        bail!("{}", msg);
                    }
                    info!(context, "{}", msg);
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }

    /// Tries to encrypt the passed in `mail`.
    ///
    /// The own public key is always part of the encryption keyring so
    /// the message stays readable on all own devices, including the
    /// copy uploaded to the sent folder.
    pub async fn encrypt(
        self,
        context: &Context,
        min_verified: PeerstateVerifiedStatus,
        mail_to_encrypt: lettre_email::PartBuilder,
        peerstates: Vec<(Option<Peerstate>, String)>,
    ) -> Result<String> {
        let mut keyring: Keyring<SignedPublicKey> = Keyring::new();

        for (peerstate, addr) in peerstates
            .into_iter()
            .filter_map(|(state, addr)| state.map(|s| (s, addr)))
        {
            let key = peerstate
                .take_key(min_verified)
                .with_context(|| format!("proper enc-key for {addr} missing, cannot encrypt"))?;
            keyring.add(key);
        }
        keyring.add(self.public_key.clone());
        let sign_key = load_self_secret_key(context).await?;

        let raw_message = mail_to_encrypt.build().as_string().into_bytes();

        let ctext = pgp::pk_encrypt(&raw_message, keyring, Some(sign_key)).await?;

        Ok(ctext)
    }
}

/// Ensures a private key exists for the configured user.
///
/// Normally the private key is generated when the first message is
/// sent but in a few locations there are no such guarantees,
/// e.g. when exporting keys or rendering the setup message, and
/// calling this function ensures a private key will be present.
///
/// If this succeeds you are also guaranteed that the
/// [Config::ConfiguredAddr] is configured; this address is returned.
pub async fn ensure_secret_key_exists(context: &Context) -> Result<String> {
    let self_addr = context.get_primary_self_addr().await?;
    load_self_public_key(context).await?;
    Ok(self_addr)
}
