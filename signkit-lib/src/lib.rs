//! Signkit library.
//!
//! Request signing and verification engine for payment channel
//! integrations: the security boundary that authenticates outbound API
//! calls and inbound webhook callbacks. The crate intentionally stays
//! stateless and I/O-free — transport, retry, and key storage belong to
//! callers, which hand key bytes in once at startup.
//!
//! # Features
//!
//! - **Canonical Serialization**: deterministic `key=value&...` strings
//!   from unordered field mappings, with the exclusion and ordering rules
//!   both parties must share
//! - **Dual-Mode Signatures**: symmetric keyed MD5 hash or asymmetric RSA
//!   PKCS#1 v1.5, selected per call
//! - **Trust Elevation**: loopback messages verify against the locally
//!   derived public key instead of the counterparty's
//! - **Key Exchange**: RSA-OAEP (SHA-256) encryption for out-of-band
//!   symmetric key delivery
//!
//! # Example
//!
//! ```
//! use signkit_lib::{Message, SignScheme, Signer};
//! use serde_json::json;
//!
//! let signer = Signer::builder().shared_secret("s3cret").build()?;
//!
//! let mut message = Message::new();
//! message.insert("order_sn".into(), json!("SN20160101"));
//! message.insert("amount".into(), json!(100));
//!
//! let signature = signer.sign(&message, SignScheme::Md5)?;
//! message.insert("sign".into(), signature.into());
//! assert!(signer.verify(&message, SignScheme::Md5));
//! # Ok::<(), signkit_lib::SignError>(())
//! ```

pub mod canonical;
pub mod errors;
pub mod keys;
pub mod signer;

pub use canonical::CanonicalRules;
pub use errors::SignError;
pub use keys::{PrivateKey, PublicKey, RsaHash};
pub use signer::{SignScheme, Signer, SignerBuilder};

/// Common result alias for signing operations.
pub type Result<T> = std::result::Result<T, SignError>;

/// Unordered field mapping signed or verified as one unit.
///
/// Scalar values (strings, numbers, booleans) may participate in signing;
/// `null`, empty strings, and nested objects/arrays never do. Values must
/// not contain the `&` or `=` separator characters.
pub type Message = serde_json::Map<String, serde_json::Value>;
