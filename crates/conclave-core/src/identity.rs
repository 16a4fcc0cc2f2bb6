//! Local identity and public keys.

use std::fmt;

use ed25519_dalek::{SigningKey, VerifyingKey};

use crate::env::Environment;

/// Number of key bytes shown in a fingerprint.
const FINGERPRINT_LEN: usize = 8;

/// Opaque public key blob as reported by the engine.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Short hex fingerprint for display.
    pub fn fingerprint(&self) -> String {
        let len = self.0.len().min(FINGERPRINT_LEN);
        hex::encode(&self.0[..len])
    }
}

impl From<VerifyingKey> for PublicKey {
    fn from(key: VerifyingKey) -> Self {
        Self(key.to_bytes().to_vec())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.fingerprint())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

/// Local user: sanitized account name and Ed25519 keypair.
#[derive(Clone)]
pub struct Identity {
    username: String,
    signing_key: SigningKey,
}

impl Identity {
    /// Generate a fresh keypair for `account` from the environment's entropy.
    pub fn generate<E: Environment>(account: &str, env: &E) -> Self {
        let mut seed = [0u8; 32];
        env.random_bytes(&mut seed);
        Self::from_signing_key(account, SigningKey::from_bytes(&seed))
    }

    /// Build an identity around an existing key.
    pub fn from_signing_key(account: &str, signing_key: SigningKey) -> Self {
        Self { username: sanitize_name(account), signing_key }
    }

    /// Sanitized username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Public half of the keypair.
    pub fn public_key(&self) -> PublicKey {
        self.signing_key.verifying_key().into()
    }

    /// Private half of the keypair, handed to the engine when a session opens.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Strip the server part of an account name (`alice@example.org` → `alice`).
pub fn sanitize_name(account: &str) -> String {
    account.find('@').map_or(account, |pos| &account[..pos]).to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_everything_after_at() {
        assert_eq!(sanitize_name("alice@jabber.example/home"), "alice");
        assert_eq!(sanitize_name("bob"), "bob");
        assert_eq!(sanitize_name("@nobody"), "");
        assert_eq!(sanitize_name("carol@a@b"), "carol");
    }

    #[test]
    fn fingerprint_is_truncated_hex() {
        let key = PublicKey::from_bytes(vec![0xab; 32]);
        assert_eq!(key.fingerprint(), "abababababababab");

        let short = PublicKey::from_bytes(vec![0x01, 0x02]);
        assert_eq!(short.fingerprint(), "0102");
    }

    #[test]
    fn identity_debug_hides_private_key() {
        let identity = Identity::from_signing_key("dave@host", SigningKey::from_bytes(&[7u8; 32]));
        let debug = format!("{identity:?}");
        assert!(debug.contains("dave"));
        assert!(!debug.contains("signing_key"));
    }
}
