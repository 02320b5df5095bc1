//! Cryptographic key module.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Cursor;
use std::sync::atomic::Ordering;

use anyhow::{ensure, Context as _, Result};
use pgp::composed::Deserializable;
use pgp::types::KeyTrait;

use crate::context::Context;
use crate::keyring::Keyring;
use crate::tools::{time, EmailAddress};

// Re-export key types.
pub use crate::pgp::KeyPair;
pub use pgp::composed::{SignedPublicKey, SignedSecretKey};

/// Convenience trait for working with keys.
///
/// This trait is implemented for rPGP's [SignedPublicKey] and
/// [SignedSecretKey] types and makes working with them a little
/// easier.
pub trait DcKey: pgp::ser::Serialize + Deserializable + KeyTrait + Clone {
    /// Creates a key from raw binary OpenPGP data.
    fn from_slice(bytes: &[u8]) -> Result<Self> {
        ensure!(!bytes.is_empty(), "empty key material");
        Ok(<Self as Deserializable>::from_bytes(Cursor::new(bytes))?)
    }

    /// Creates a key from a base64 string.
    fn from_base64(data: &str) -> Result<Self> {
        // strip newlines and other whitespace
        let cleaned: String = data.split_whitespace().collect();
        let bytes = base64::decode(cleaned.as_bytes())?;
        Self::from_slice(&bytes)
    }

    /// Creates a key from an ASCII-armored string.
    ///
    /// Returns the key and a map of any headers contained in the armor.
    fn from_asc(data: &str) -> Result<(Self, BTreeMap<String, String>)> {
        let bytes = data.trim().as_bytes();
        let res = Self::from_armor_single(Cursor::new(bytes)).context("invalid ASCII armor")?;
        Ok(res)
    }

    /// Serialises the key to raw binary OpenPGP data.
    fn to_bytes(&self) -> Vec<u8> {
        // Not using Serialize::to_bytes() to make clear *why* it is
        // safe to ignore this error.
        // Because we write to a Vec<u8> the io::Write impls never
        // fail and we can hide this error.
        let mut buf = Vec::new();
        self.to_writer(&mut buf).unwrap();
        buf
    }

    /// Serialises the key to a base64 string.
    fn to_base64(&self) -> String {
        base64::encode(DcKey::to_bytes(self))
    }

    /// Serialises the key to an ASCII-armored string.
    ///
    /// The optional header line is inserted between the BEGIN line and
    /// the base64 body.
    fn to_asc(&self, header: Option<(&str, &str)>) -> String;

    /// The fingerprint of the key.
    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(KeyTrait::fingerprint(self))
    }

    /// Whether the key is a private key.
    fn is_private() -> bool;
}

fn armor_headers(header: Option<(&str, &str)>) -> Option<BTreeMap<String, String>> {
    header.map(|(key, value)| {
        let mut m = BTreeMap::new();
        m.insert(key.to_string(), value.to_string());
        m
    })
}

impl DcKey for SignedPublicKey {
    fn to_asc(&self, header: Option<(&str, &str)>) -> String {
        let headers = armor_headers(header);
        self.to_armored_string(headers.as_ref())
            .expect("failed to serialize key")
    }

    fn is_private() -> bool {
        false
    }
}

impl DcKey for SignedSecretKey {
    fn to_asc(&self, header: Option<(&str, &str)>) -> String {
        let headers = armor_headers(header);
        self.to_armored_string(headers.as_ref())
            .expect("failed to serialize key")
    }

    fn is_private() -> bool {
        true
    }
}

/// Loads the user's default public key, generating a keypair on first use.
pub async fn load_self_public_key(context: &Context) -> Result<SignedPublicKey> {
    let public_key = context
        .sql
        .query_get_value::<Vec<u8>>(
            "SELECT public_key
               FROM keypairs
              WHERE addr=(SELECT value FROM config WHERE keyname='configured_addr')
                AND is_default=1;",
            (),
        )
        .await?;
    match public_key {
        Some(bytes) => SignedPublicKey::from_slice(&bytes),
        None => {
            let keypair = generate_keypair(context).await?;
            Ok(keypair.public)
        }
    }
}

/// Loads the user's default secret key, generating a keypair on first use.
pub async fn load_self_secret_key(context: &Context) -> Result<SignedSecretKey> {
    let private_key = context
        .sql
        .query_get_value::<Vec<u8>>(
            "SELECT private_key
               FROM keypairs
              WHERE addr=(SELECT value FROM config WHERE keyname='configured_addr')
                AND is_default=1;",
            (),
        )
        .await?;
    match private_key {
        Some(bytes) => SignedSecretKey::from_slice(&bytes),
        None => {
            let keypair = generate_keypair(context).await?;
            Ok(keypair.secret)
        }
    }
}

/// Loads all of the user's secret keys, the default key first.
///
/// The ordering matters for decryption: the first successfully
/// decrypting key wins. The keyring may be empty; other than
/// [load_self_secret_key] this never triggers a key generation.
pub async fn load_self_secret_keyring(context: &Context) -> Result<Keyring<SignedSecretKey>> {
    let mut keyring = Keyring::new();
    for bytes in context
        .sql
        .query_map(
            "SELECT private_key
               FROM keypairs
              WHERE addr=(SELECT value FROM config WHERE keyname='configured_addr')
              ORDER BY is_default DESC;",
            (),
            |row| row.get::<_, Vec<u8>>(0),
        )
        .await?
    {
        match SignedSecretKey::from_slice(&bytes) {
            Ok(key) => keyring.add(key),
            Err(err) => warn!(context, "Invalid secret key in the database: {:#}", err),
        }
    }
    Ok(keyring)
}

async fn generate_keypair(context: &Context) -> Result<KeyPair> {
    let addr = context.get_primary_self_addr().await?;
    let addr = EmailAddress::new(&addr)?;

    // A second caller fails fast instead of queueing behind a
    // multi-second key generation.
    ensure!(
        context
            .generating_keypair
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok(),
        "Key generation is already running"
    );

    let res = do_generate_keypair(context, addr).await;
    context.generating_keypair.store(false, Ordering::SeqCst);
    res
}

async fn do_generate_keypair(context: &Context, addr: EmailAddress) -> Result<KeyPair> {
    // The key may have appeared while we were racing for the guard.
    let keypair = context
        .sql
        .query_row_optional(
            "SELECT public_key, private_key
               FROM keypairs
              WHERE addr=?
                AND is_default=1;",
            (addr.to_string(),),
            |row| {
                let pub_bytes: Vec<u8> = row.get(0)?;
                let sec_bytes: Vec<u8> = row.get(1)?;
                Ok((pub_bytes, sec_bytes))
            },
        )
        .await?;

    match keypair {
        Some((pub_bytes, sec_bytes)) => Ok(KeyPair {
            addr,
            public: SignedPublicKey::from_slice(&pub_bytes)?,
            secret: SignedSecretKey::from_slice(&sec_bytes)?,
        }),
        None => {
            let start = std::time::Instant::now();
            info!(context, "Generating keypair for {}.", addr);
            let gen_addr = addr.clone();
            let keypair =
                tokio::task::spawn_blocking(move || crate::pgp::create_keypair(gen_addr)).await??;
            store_self_keypair(context, &keypair, KeyPairUse::Default).await?;
            info!(
                context,
                "Keypair generated in {:.3}s.",
                start.elapsed().as_secs()
            );
            Ok(keypair)
        }
    }
}

/// Use of a [KeyPair] for encryption or decryption.
///
/// This is used by [store_self_keypair] to know what kind of key is
/// being saved.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum KeyPairUse {
    /// The default key used to encrypt new messages.
    Default,
    /// Only used to decrypt existing messages.
    ReadOnly,
}

/// Stores the keypair as an owned keypair for its address in the database.
///
/// If either the public or private key is already present in the
/// database, that entry is removed first regardless of the address
/// associated with it. Practically this means saving the same key
/// again overwrites it.
pub async fn store_self_keypair(
    context: &Context,
    keypair: &KeyPair,
    default: KeyPairUse,
) -> Result<()> {
    let public_key = DcKey::to_bytes(&keypair.public);
    let secret_key = DcKey::to_bytes(&keypair.secret);
    let addr = keypair.addr.to_string();
    let is_default = match default {
        KeyPairUse::Default => 1i64,
        KeyPairUse::ReadOnly => 0i64,
    };

    context
        .sql
        .transaction(move |transaction| {
            transaction.execute(
                "DELETE FROM keypairs WHERE public_key=? OR private_key=?;",
                (&public_key, &secret_key),
            )?;
            if is_default != 0 {
                transaction.execute("UPDATE keypairs SET is_default=0;", ())?;
            }
            transaction.execute(
                "INSERT INTO keypairs (addr, is_default, public_key, private_key, created)
                 VALUES (?,?,?,?,?);",
                (&addr, is_default, &public_key, &secret_key, time()),
            )?;
            Ok(())
        })
        .await?;

    Ok(())
}

/// A key fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    pub fn new(v: Vec<u8>) -> Fingerprint {
        Fingerprint(v)
    }

    /// Make a hex string from the fingerprint.
    ///
    /// Use [std::fmt::Display] or [ToString::to_string] to get a
    /// human-readable formatted string.
    pub fn hex(&self) -> String {
        hex::encode_upper(&self.0)
    }
}

/// Make a fingerprint human-readable.
///
/// A space every four hex digits and a newline after every twenty;
/// stripped of whitespace the result equals [Fingerprint::hex].
impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let hex = self.hex();
        for (i, c) in hex.chars().enumerate() {
            if i > 0 && i % 20 == 0 {
                writeln!(f)?;
            } else if i > 0 && i % 4 == 0 {
                write!(f, " ")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// Parse a human-readable or otherwise formatted fingerprint.
///
/// Anything that is not a hex digit is ignored.
impl std::str::FromStr for Fingerprint {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self> {
        let hex_repr: String = input.chars().filter(|c| c.is_ascii_hexdigit()).collect();
        let v = hex::decode(hex_repr)?;
        Ok(Fingerprint::new(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{alice_keypair, TestContext, ALICE_SECRET_KEY_ASC};

    #[test]
    fn test_from_slice_roundtrip() {
        let keypair = alice_keypair();

        let binary = DcKey::to_bytes(&keypair.public);
        let public_key2 = SignedPublicKey::from_slice(&binary).expect("invalid public key");
        assert_eq!(keypair.public, public_key2);

        let binary = DcKey::to_bytes(&keypair.secret);
        let private_key2 = SignedSecretKey::from_slice(&binary).expect("invalid private key");
        assert_eq!(keypair.secret, private_key2);
    }

    #[test]
    fn test_from_slice_bad_data() {
        let mut bad_data: [u8; 4096] = [0; 4096];
        for (i, v) in bad_data.iter_mut().enumerate() {
            *v = (i & 0xff) as u8;
        }
        for j in 0..(4096 / 40) {
            assert!(SignedPublicKey::from_slice(&bad_data[j..j + 4096 / 2 + j]).is_err());
        }
        assert!(SignedPublicKey::from_slice(&[]).is_err());
    }

    #[test]
    fn test_from_asc() {
        let (private_key, _headers) =
            SignedSecretKey::from_asc(ALICE_SECRET_KEY_ASC).expect("failed to decode");
        let binary = DcKey::to_bytes(&private_key);
        SignedSecretKey::from_slice(&binary).expect("invalid private key");
    }

    #[test]
    fn test_ascii_roundtrip() {
        let keypair = alice_keypair();

        let asc = keypair.public.to_asc(None);
        let (public_key2, _) = SignedPublicKey::from_asc(&asc).expect("invalid public key");
        assert_eq!(keypair.public, public_key2);

        let asc = keypair.secret.to_asc(None);
        let (private_key2, _) = SignedSecretKey::from_asc(&asc).expect("invalid private key");
        assert_eq!(keypair.secret, private_key2);
    }

    #[test]
    fn test_asc_header_roundtrip() {
        let keypair = alice_keypair();

        let asc = keypair
            .secret
            .to_asc(Some(("Autocrypt-Prefer-Encrypt", "mutual")));
        assert!(asc.contains("Autocrypt-Prefer-Encrypt: mutual"));

        let (key, headers) = SignedSecretKey::from_asc(&asc).unwrap();
        assert_eq!(key, keypair.secret);
        assert_eq!(
            headers.get("Autocrypt-Prefer-Encrypt").map(|s| s.as_str()),
            Some("mutual")
        );
    }

    #[test]
    fn test_base64_roundtrip() {
        let keypair = alice_keypair();

        let base64 = keypair.public.to_base64();
        let public_key2 = SignedPublicKey::from_base64(&base64).expect("invalid public key");
        assert_eq!(keypair.public, public_key2);

        // the parser must tolerate whitespace within the base64
        let chunked: String = base64
            .chars()
            .enumerate()
            .flat_map(|(i, c)| {
                if i > 0 && i % 64 == 0 {
                    vec![' ', '\r', '\n', c]
                } else {
                    vec![c]
                }
            })
            .collect();
        let public_key3 = SignedPublicKey::from_base64(&chunked).expect("invalid public key");
        assert_eq!(keypair.public, public_key3);
    }

    #[test]
    fn test_fingerprint_stability() {
        // The fingerprint is deterministic, and the formatted view
        // stripped of whitespace equals the plain hex form.
        let keypair = alice_keypair();
        let fp1 = keypair.public.fingerprint();
        let fp2 = keypair.public.fingerprint();
        assert_eq!(fp1, fp2);

        let formatted = fp1.to_string();
        let stripped: String = formatted.split_whitespace().collect();
        assert_eq!(stripped, fp1.hex());
    }

    #[test]
    fn test_fingerprint_display() {
        let fp: Fingerprint = "1234567890ABCDABCDEFABCDEF1234567890ABCD"
            .parse()
            .unwrap();
        assert_eq!(
            fp.to_string(),
            "1234 5678 90AB CDAB CDEF\nABCD EF12 3456 7890 ABCD"
        );
    }

    #[test]
    fn test_fingerprint_parse_formatted() {
        let fp: Fingerprint = " 1234  567890 \n AbcD abcdef ABCDEF ".parse().unwrap();
        assert_eq!(fp.hex(), "1234567890ABCDABCDEFABCDEF");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_load_self_existing() {
        let t = TestContext::new_alice().await;
        let alice = alice_keypair();
        let pubkey = load_self_public_key(&t.ctx).await.unwrap();
        assert_eq!(alice.public, pubkey);
        let seckey = load_self_secret_key(&t.ctx).await.unwrap();
        assert_eq!(alice.secret, seckey);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_load_self_keyring_order() {
        let t = TestContext::new_alice().await;
        let keyring = load_self_secret_keyring(&t.ctx).await.unwrap();
        assert_eq!(keyring.keys(), [alice_keypair().secret]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_save_self_key_twice() {
        // Saving the same key twice should result in only one row in
        // the keypairs table.
        let t = TestContext::new().await;
        t.configure_addr("alice@example.org").await;
        let keypair = alice_keypair();

        let nrows = || async {
            t.ctx
                .sql
                .query_get_value::<u32>("SELECT COUNT(*) FROM keypairs;", ())
                .await
                .unwrap()
                .unwrap()
        };
        assert_eq!(nrows().await, 0);
        store_self_keypair(&t.ctx, &keypair, KeyPairUse::Default)
            .await
            .unwrap();
        assert_eq!(nrows().await, 1);
        store_self_keypair(&t.ctx, &keypair, KeyPairUse::Default)
            .await
            .unwrap();
        assert_eq!(nrows().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[ignore] // generating keys is expensive
    async fn test_load_self_generate_public() {
        let t = TestContext::new().await;
        t.configure_addr("alice@example.org").await;
        let key = load_self_public_key(&t.ctx).await;
        assert!(key.is_ok());
    }
}
