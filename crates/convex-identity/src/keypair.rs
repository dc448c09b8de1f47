//! Ed25519 keypair held by a peer for signing its Orders and Blocks.

use crate::{IdentityError, PublicKey, Result, Signature, NAMESPACE};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// An Ed25519 keypair for signing.
pub struct Keypair {
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl Keypair {
    /// Generates a new random keypair.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Derives a deterministic keypair from a numeric seed.
    ///
    /// Only suitable for devnets and tests: anyone who knows the seed knows
    /// the secret key.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(NAMESPACE);
        hasher.update(seed.to_le_bytes());
        let mut secret = Zeroizing::new([0u8; 32]);
        secret.copy_from_slice(&hasher.finalize());
        Self::from_signing_key(SigningKey::from_bytes(&secret))
    }

    /// Creates a keypair from a secret key (32 bytes).
    ///
    /// # Errors
    ///
    /// Returns an error if the secret key is not 32 bytes long.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(IdentityError::InvalidSecretKey);
        }

        let mut secret = Zeroizing::new([0u8; 32]);
        secret.copy_from_slice(bytes);

        Ok(Self::from_signing_key(SigningKey::from_bytes(&secret)))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = PublicKey::from_verifying_key(signing_key.verifying_key());
        Self {
            signing_key,
            public_key,
        }
    }

    /// Returns the public key for this keypair.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Signs a message with this keypair under the Convex namespace.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        let mut payload = Vec::with_capacity(NAMESPACE.len() + message.len());
        payload.extend_from_slice(NAMESPACE);
        payload.extend_from_slice(message);
        Signature::from_bytes(self.signing_key.sign(&payload).to_bytes())
    }

    /// Returns the secret key bytes.
    ///
    /// # Security
    ///
    /// Handle with care. The returned bytes are zeroized on drop.
    #[must_use]
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(&self.signing_key.to_bytes()))
    }
}
