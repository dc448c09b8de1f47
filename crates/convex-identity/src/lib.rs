//! # Convex Identity
//!
//! Ed25519 identities for Convex peers. A peer's [`PublicKey`] is the key
//! under which its Order is filed in every Belief, and its [`Keypair`] signs
//! the Orders and Blocks it proposes.
//!
//! ## Example
//!
//! ```rust
//! use convex_identity::Keypair;
//!
//! let keypair = Keypair::from_seed(7);
//!
//! let message = b"order digest";
//! let signature = keypair.sign(message);
//!
//! assert!(keypair.public_key().verify(message, &signature).is_ok());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod keypair;
mod public_key;
mod signature;

pub use error::{IdentityError, Result};
pub use keypair::Keypair;
pub use public_key::PublicKey;
pub use signature::Signature;

/// Domain separation prefix mixed into every signed message.
pub const NAMESPACE: &[u8] = b"_CONVEX_BELIEF";
