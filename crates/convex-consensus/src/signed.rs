//! Signed, content-addressed values.
//!
//! Blocks, Orders and transactions travel between peers as [`Signed`]
//! envelopes. Both hashes of an envelope are computed once, when it is
//! built, so equality checks and tie-breaks never re-encode the value.

use crate::error::Result;
use convex_identity::{Keypair, PublicKey, Signature};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// SHA-256 content hash of a value's canonical (JSON) encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueHash([u8; 32]);

impl ValueHash {
    /// Creates a hash from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Hashes the canonical encoding of a value.
    pub fn of<T: Serialize + ?Sized>(value: &T) -> Self {
        let bytes = serde_json::to_vec(value).expect("value serialization should not fail");
        Self::digest(&[bytes.as_slice()])
    }

    fn digest(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        let mut id = [0u8; 32];
        id.copy_from_slice(&hasher.finalize());
        Self(id)
    }
}

impl fmt::Display for ValueHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

struct SignedInner<T> {
    value: T,
    signer: PublicKey,
    signature: Signature,
    value_hash: ValueHash,
    id: ValueHash,
}

/// A value bound to the public key that signed it.
///
/// Cloning is a reference-count bump, so Orders can reference the same
/// signed Block without copying it.
pub struct Signed<T> {
    inner: Arc<SignedInner<T>>,
}

impl<T: Serialize> Signed<T> {
    /// Signs `value` with `keypair`. The signed message is the value hash.
    pub fn sign(keypair: &Keypair, value: T) -> Self {
        let value_hash = ValueHash::of(&value);
        let signature = keypair.sign(value_hash.as_bytes());
        Self::assemble(value, value_hash, keypair.public_key(), signature)
    }

    /// Rebuilds an envelope from its parts without checking the signature.
    pub fn from_parts(value: T, signer: PublicKey, signature: Signature) -> Self {
        let value_hash = ValueHash::of(&value);
        Self::assemble(value, value_hash, signer, signature)
    }

    fn assemble(value: T, value_hash: ValueHash, signer: PublicKey, signature: Signature) -> Self {
        let id = ValueHash::digest(&[
            value_hash.as_bytes().as_slice(),
            signer.as_bytes().as_slice(),
            signature.as_bytes().as_slice(),
        ]);
        Self {
            inner: Arc::new(SignedInner {
                value,
                signer,
                signature,
                value_hash,
                id,
            }),
        }
    }
}

impl<T> Signed<T> {
    /// Returns the signed value.
    pub fn value(&self) -> &T {
        &self.inner.value
    }

    /// Returns the key that claims to have signed this value.
    pub fn signer(&self) -> PublicKey {
        self.inner.signer
    }

    /// Returns the signature.
    pub fn signature(&self) -> &Signature {
        &self.inner.signature
    }

    /// Returns the hash of the value alone (the signed message).
    pub fn value_hash(&self) -> ValueHash {
        self.inner.value_hash
    }

    /// Returns the content hash of the whole envelope.
    ///
    /// This is the identity used for deduplication and for deterministic
    /// tie-breaks between competing blocks.
    pub fn id(&self) -> ValueHash {
        self.inner.id
    }

    /// Checks the signature against the claimed signer.
    ///
    /// Merging assumes this already happened at the transport boundary.
    pub fn verify(&self) -> Result<()> {
        self.inner
            .signer
            .verify(self.inner.value_hash.as_bytes(), &self.inner.signature)?;
        Ok(())
    }

    /// Returns true if both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Clone for Signed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Signed<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.inner.id == other.inner.id
    }
}

impl<T> Eq for Signed<T> {}

impl<T> std::hash::Hash for Signed<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for Signed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signed")
            .field("signer", &self.inner.signer)
            .field("id", &self.inner.id.to_hex())
            .field("value", &self.inner.value)
            .finish()
    }
}

#[derive(Serialize)]
struct SignedRef<'a, T> {
    value: &'a T,
    signer: &'a PublicKey,
    signature: &'a Signature,
}

#[derive(Deserialize)]
struct SignedParts<T> {
    value: T,
    signer: PublicKey,
    signature: Signature,
}

impl<T: Serialize> Serialize for Signed<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        SignedRef {
            value: &self.inner.value,
            signer: &self.inner.signer,
            signature: &self.inner.signature,
        }
        .serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Signed<T>
where
    T: Serialize + Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let parts = SignedParts::<T>::deserialize(deserializer)?;
        Ok(Self::from_parts(parts.value, parts.signer, parts.signature))
    }
}
