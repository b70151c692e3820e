//! # Request Signing and Verification
//!
//! ## Security Model
//!
//! Every authenticated exchange with the payment channel reduces to one
//! canonical string (see [`crate::canonical`]) and one of two schemes:
//!
//! - **MD5**: symmetric keyed hash. The shared secret is appended to the
//!   canonical string before hashing; both parties must hold the secret.
//! - **RSA**: PKCS#1 v1.5 signature over an MD5 or SHA-1 digest of the
//!   canonical string, base64-encoded for transport.
//!
//! Signing fails loud on configuration mistakes (missing key material).
//! Verification fails closed: every failure mode, from a missing signature
//! field to undecodable base64 to a key that will not parse, observes as
//! `false`, so the caller treats "verification failed" uniformly and the
//! failure cause is not probeable from outside.
//!
//! ## Trust Elevation
//!
//! An inbound message carrying a truthy trust-elevation field (default
//! `_is_inner`) is verified against the public key derived from the local
//! private key rather than the counterparty key: loopback traffic signs
//! with the same key pair it verifies against, and no second key exchange
//! is needed. The flag is caller-controlled and not itself authenticated;
//! the key-selection decision is isolated in one private function
//! (`Signer::verification_key`) so any future hardening lands in one place.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::canonical::CanonicalRules;
use crate::errors::SignError;
use crate::keys::{PrivateKey, PublicKey, RsaHash};
use crate::{Message, Result};

/// Default field name the shared secret is rendered under when hashing.
pub const DEFAULT_SECRET_FIELD: &str = "key";

/// Default field name holding the computed signature.
pub const DEFAULT_SIGN_FIELD: &str = "sign";

/// Default field name of the trust-elevation flag.
///
/// `_`-prefixed, so it never participates in the canonical string unless a
/// deployment opts it into the include set.
pub const DEFAULT_INNER_FLAG_FIELD: &str = "_is_inner";

/// Signature scheme, matched exhaustively everywhere it is consumed.
///
/// Wire tags outside `{MD5, RSA}` are unrepresentable here; they are
/// rejected when parsing (see [`FromStr`]), which is the only door tag
/// strings come through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignScheme {
    /// Symmetric keyed MD5 hash of the canonical string.
    Md5,
    /// RSA PKCS#1 v1.5 signature of the digested canonical string.
    Rsa {
        /// Digest applied before signing. `Md5` is the partner default.
        hash: RsaHash,
        /// Emit/consume URL-safe base64 instead of the standard alphabet.
        urlsafe: bool,
    },
}

impl SignScheme {
    /// The RSA scheme with partner-default parameters (MD5 digest,
    /// standard base64 alphabet).
    pub fn rsa() -> Self {
        Self::Rsa {
            hash: RsaHash::default(),
            urlsafe: false,
        }
    }
}

impl FromStr for SignScheme {
    type Err = SignError;

    fn from_str(tag: &str) -> Result<Self> {
        match tag {
            "MD5" => Ok(Self::Md5),
            "RSA" => Ok(Self::rsa()),
            other => Err(SignError::unknown_sign_type(other)),
        }
    }
}

impl fmt::Display for SignScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => write!(f, "MD5"),
            Self::Rsa { .. } => write!(f, "RSA"),
        }
    }
}

/// Builder for [`Signer`].
///
/// Field names and ordering flags default to the partner protocol's
/// conventions; key material is optional because many deployments use only
/// one scheme. `build` parses any encoded keys, so a bad deployment fails
/// at startup rather than on the first request.
#[derive(Default)]
pub struct SignerBuilder {
    secret_field: Option<Option<String>>,
    sign_field: Option<String>,
    inner_flag_field: Option<String>,
    ignore_case: Option<bool>,
    uppercase_hex: bool,
    exclude_fields: Vec<String>,
    include_fields: Vec<String>,
    shared_secret: Option<String>,
    private_key: Option<PrivateKey>,
    private_key_encoded: Option<String>,
    public_key: Option<PublicKey>,
    public_key_encoded: Option<String>,
}

impl SignerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared secret for the MD5 scheme.
    pub fn shared_secret(mut self, secret: impl Into<String>) -> Self {
        self.shared_secret = Some(secret.into());
        self
    }

    /// Name the shared secret is rendered under in the hashed string
    /// (default `"key"`).
    pub fn secret_field(mut self, name: impl Into<String>) -> Self {
        self.secret_field = Some(Some(name.into()));
        self
    }

    /// Append the bare secret with no `&name=` prefix, for partners whose
    /// protocol concatenates the secret directly.
    pub fn secret_without_field(mut self) -> Self {
        self.secret_field = Some(None);
        self
    }

    /// Name of the field holding the computed signature (default `"sign"`).
    pub fn sign_field(mut self, name: impl Into<String>) -> Self {
        self.sign_field = Some(name.into());
        self
    }

    /// Name of the trust-elevation flag field (default `"_is_inner"`).
    pub fn inner_flag_field(mut self, name: impl Into<String>) -> Self {
        self.inner_flag_field = Some(name.into());
        self
    }

    /// Sort canonical fields case-insensitively (default) or byte-wise.
    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = Some(ignore_case);
        self
    }

    /// Uppercase the MD5 scheme's hex output (default lowercase).
    pub fn uppercase_hex(mut self, uppercase: bool) -> Self {
        self.uppercase_hex = uppercase;
        self
    }

    /// Field names excluded from canonical strings in addition to the
    /// signature field.
    pub fn exclude_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_fields
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// `_`-prefixed field names that participate in canonical strings.
    pub fn include_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_fields
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Local private key, already loaded.
    pub fn private_key(mut self, key: PrivateKey) -> Self {
        self.private_key = Some(key);
        self
    }

    /// Local private key as PEM or base64-of-DER text, parsed by `build`.
    pub fn private_key_encoded(mut self, encoded: impl Into<String>) -> Self {
        self.private_key_encoded = Some(encoded.into());
        self
    }

    /// Counterparty public key, already loaded.
    pub fn public_key(mut self, key: PublicKey) -> Self {
        self.public_key = Some(key);
        self
    }

    /// Counterparty public key as PEM or base64-of-DER text, parsed by
    /// `build`.
    pub fn public_key_encoded(mut self, encoded: impl Into<String>) -> Self {
        self.public_key_encoded = Some(encoded.into());
        self
    }

    /// Parse any encoded key material and produce an immutable [`Signer`].
    ///
    /// # Errors
    ///
    /// `SignError::KeyFormat` if encoded key material does not decode. A
    /// key supplied both loaded and encoded uses the loaded one.
    pub fn build(self) -> Result<Signer> {
        let private_key = match (self.private_key, self.private_key_encoded) {
            (Some(key), _) => Some(key),
            (None, Some(encoded)) => Some(PrivateKey::load(encoded)?),
            (None, None) => None,
        };
        let public_key = match (self.public_key, self.public_key_encoded) {
            (Some(key), _) => Some(key),
            (None, Some(encoded)) => Some(PublicKey::load(encoded)?),
            (None, None) => None,
        };

        let rules = CanonicalRules::new(
            self.sign_field
                .unwrap_or_else(|| DEFAULT_SIGN_FIELD.to_string()),
        )
        .ignore_case(self.ignore_case.unwrap_or(true))
        .exclude_fields(self.exclude_fields)
        .include_fields(self.include_fields);

        Ok(Signer {
            rules,
            secret_field: self
                .secret_field
                .unwrap_or_else(|| Some(DEFAULT_SECRET_FIELD.to_string())),
            inner_flag_field: self
                .inner_flag_field
                .unwrap_or_else(|| DEFAULT_INNER_FLAG_FIELD.to_string()),
            uppercase_hex: self.uppercase_hex,
            shared_secret: self.shared_secret.map(Zeroizing::new),
            private_key,
            public_key,
        })
    }
}

/// Signs outbound messages and verifies inbound ones.
///
/// Immutable after `build`; share freely across threads. Re-keying means
/// building a fresh `Signer`, there is no in-place `init`.
pub struct Signer {
    rules: CanonicalRules,
    secret_field: Option<String>,
    inner_flag_field: String,
    uppercase_hex: bool,
    shared_secret: Option<Zeroizing<String>>,
    private_key: Option<PrivateKey>,
    public_key: Option<PublicKey>,
}

impl Signer {
    pub fn builder() -> SignerBuilder {
        SignerBuilder::new()
    }

    /// Canonical-string rules this signer applies.
    pub fn rules(&self) -> &CanonicalRules {
        &self.rules
    }

    /// Produce the signature value for `data` under `scheme`.
    ///
    /// The returned string goes under the configured signature field; it is
    /// never inserted into `data` here.
    ///
    /// # Errors
    ///
    /// Configuration errors only: `NoSharedSecret` for the MD5 scheme
    /// without a secret, `NoPrivateKey` for the RSA scheme without a
    /// private key.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self, data), fields(scheme = %scheme))
    )]
    pub fn sign(&self, data: &Message, scheme: SignScheme) -> Result<String> {
        match scheme {
            SignScheme::Md5 => self.md5_sign(data),
            SignScheme::Rsa { hash, urlsafe } => self.rsa_sign(data, hash, urlsafe),
        }
    }

    /// Check the signature carried in `data` under `scheme`.
    ///
    /// Fail closed: always a definite boolean, never an error. The internal
    /// step distinguishes configuration problems from mismatches; both are
    /// deliberately collapsed here so callers cannot branch on the cause.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self, data), fields(scheme = %scheme))
    )]
    pub fn verify(&self, data: &Message, scheme: SignScheme) -> bool {
        self.try_verify(data, scheme).unwrap_or(false)
    }

    /// MD5 keyed-hash signature of `data`.
    pub fn md5_sign(&self, data: &Message) -> Result<String> {
        self.keyed_digest(&self.rules.canonical_string(data))
    }

    /// RSA signature of `data`.
    pub fn rsa_sign(&self, data: &Message, hash: RsaHash, urlsafe: bool) -> Result<String> {
        self.sign_canonical(&self.rules.canonical_string(data), hash, urlsafe)
    }

    /// RSA-sign an externally canonicalized string.
    pub fn sign_canonical(&self, src: &str, hash: RsaHash, urlsafe: bool) -> Result<String> {
        self.private_key
            .as_ref()
            .ok_or(SignError::NoPrivateKey)?
            .sign_to_base64(hash, src.as_bytes(), urlsafe)
    }

    fn try_verify(&self, data: &Message, scheme: SignScheme) -> Result<bool> {
        let provided = match data.get(self.rules.sign_field()).and_then(Value::as_str) {
            Some(value) => value,
            None => return Ok(false),
        };
        let src = self.rules.canonical_string(data);
        match scheme {
            SignScheme::Md5 => {
                let expected = self.keyed_digest(&src)?;
                Ok(expected.as_bytes().ct_eq(provided.as_bytes()).into())
            }
            SignScheme::Rsa { hash, urlsafe } => {
                let key = self.verification_key(data)?;
                Ok(key.verify_base64(hash, src.as_bytes(), provided, urlsafe))
            }
        }
    }

    fn keyed_digest(&self, src: &str) -> Result<String> {
        let secret = self.shared_secret.as_ref().ok_or(SignError::NoSharedSecret)?;
        let salted = match &self.secret_field {
            Some(name) => format!("{}&{}={}", src, name, secret.as_str()),
            None => format!("{}{}", src, secret.as_str()),
        };
        let digest = Md5::digest(salted.as_bytes());
        Ok(if self.uppercase_hex {
            hex::encode_upper(digest)
        } else {
            hex::encode(digest)
        })
    }

    /// Select the public key an inbound RSA signature is checked against.
    ///
    /// A truthy trust-elevation flag selects the key derived from the local
    /// private key; otherwise the configured counterparty key is used. The
    /// flag itself is not authenticated — a known trade-off of the partner
    /// protocol, kept behind this single function.
    fn verification_key(&self, data: &Message) -> Result<Cow<'_, PublicKey>> {
        if self.elevated_trust_requested(data) {
            let private = self.private_key.as_ref().ok_or(SignError::NoPrivateKey)?;
            Ok(Cow::Owned(private.public_key()))
        } else {
            self.public_key
                .as_ref()
                .map(Cow::Borrowed)
                .ok_or(SignError::NoPublicKey)
        }
    }

    fn elevated_trust_requested(&self, data: &Message) -> bool {
        data.get(&self.inner_flag_field).is_some_and(is_truthy)
    }
}

/// Truthiness the way the partner's webhook senders compute it: `null`,
/// `false`, zero, and empty strings/arrays/objects are falsy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// Secret material stays out of debug output.
impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("rules", &self.rules)
            .field("secret_field", &self.secret_field)
            .field("inner_flag_field", &self.inner_flag_field)
            .field("uppercase_hex", &self.uppercase_hex)
            .field("has_shared_secret", &self.shared_secret.is_some())
            .field("private_key", &self.private_key)
            .field("public_key", &self.public_key)
            .finish()
    }
}
