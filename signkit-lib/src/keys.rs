//! RSA key material for the asymmetric signing scheme.
//!
//! Keys arrive from deployment configuration in three shapes, depending on
//! which collaborator stored them: raw DER bytes, PEM-wrapped text, or
//! base64-of-DER text. `load` accepts all three, in PKCS#1 or PKCS#8 form
//! for private keys and PKCS#1 or SPKI form for public keys.
//!
//! # Security Properties
//!
//! - **Capability split**: operations requiring private material exist only
//!   on [`PrivateKey`]; a key loaded from public material cannot sign or
//!   decrypt, enforced at compile time.
//! - **Immutability**: keys never change after `load`; both types are safe
//!   for concurrent read-only use.
//! - **Digest selection**: PKCS#1 v1.5 signatures use MD5 or SHA-1 because
//!   the partner protocol requires them. Neither is a recommendation; they
//!   are kept selectable strictly for interoperability.
//!
//! Encryption uses RSA-OAEP with SHA-256, serving the out-of-band exchange
//! of symmetric keys consumed by an external AES utility.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use md5::{Digest, Md5};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding,
};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::errors::SignError;
use crate::Result;

const PEM_MARKER: &str = "-----BEGIN";

/// Digest applied to the canonical bytes before a PKCS#1 v1.5 signature.
///
/// `Md5` is the partner protocol's default; `Sha1` is its alternative mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsaHash {
    #[default]
    Md5,
    Sha1,
}

impl RsaHash {
    fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Md5 => Md5::digest(data).to_vec(),
            Self::Sha1 => Sha1::digest(data).to_vec(),
        }
    }

    fn padding(self) -> Pkcs1v15Sign {
        match self {
            Self::Md5 => Pkcs1v15Sign::new::<Md5>(),
            Self::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
        }
    }
}

/// An RSA private key and the operations requiring private material.
#[derive(Clone)]
pub struct PrivateKey {
    inner: RsaPrivateKey,
}

/// An RSA public key: verification and encryption only.
#[derive(Clone, PartialEq)]
pub struct PublicKey {
    inner: RsaPublicKey,
}

impl PrivateKey {
    /// Load a private key from raw DER, PEM text, or base64-of-DER text.
    ///
    /// PKCS#8 is tried first, then PKCS#1. ASCII whitespace inside base64
    /// input is tolerated (keys stored in config files are often wrapped).
    pub fn load(input: impl AsRef<[u8]>) -> Result<Self> {
        let input = input.as_ref();
        if let Some(pem) = pem_text(input) {
            return RsaPrivateKey::from_pkcs8_pem(pem)
                .ok()
                .or_else(|| RsaPrivateKey::from_pkcs1_pem(pem).ok())
                .map(|inner| Self { inner })
                .ok_or_else(|| SignError::key_format("not a PEM-encoded RSA private key"));
        }
        if let Some(der) = base64_der(input) {
            if let Some(inner) = private_from_der(&der) {
                return Ok(Self { inner });
            }
        }
        private_from_der(input)
            .map(|inner| Self { inner })
            .ok_or_else(|| SignError::key_format("not a PKCS#1 or PKCS#8 RSA private key"))
    }

    /// Derive the matching public key as a new, independent instance.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: self.inner.to_public_key(),
        }
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.inner.size() * 8
    }

    /// Digest `data` with `hash` and sign the digest with PKCS#1 v1.5.
    pub fn sign(&self, hash: RsaHash, data: &[u8]) -> Result<Vec<u8>> {
        self.inner
            .sign(hash.padding(), &hash.digest(data))
            .map_err(SignError::crypto)
    }

    /// Sign and base64-encode, in the standard or URL-safe alphabet.
    pub fn sign_to_base64(&self, hash: RsaHash, data: &[u8], urlsafe: bool) -> Result<String> {
        Ok(alphabet(urlsafe).encode(self.sign(hash, data)?))
    }

    /// Decrypt an RSA-OAEP (SHA-256) ciphertext.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.inner
            .decrypt(Oaep::new::<Sha256>(), ciphertext)
            .map_err(SignError::crypto)
    }

    /// Decrypt a base64-encoded RSA-OAEP ciphertext.
    pub fn decrypt_base64(&self, ciphertext: &str) -> Result<Vec<u8>> {
        let raw = STANDARD
            .decode(ciphertext.trim())
            .map_err(SignError::crypto)?;
        self.decrypt(&raw)
    }

    /// Export as a PKCS#8 PEM document.
    ///
    /// The returned buffer zeroizes on drop; callers persisting it own the
    /// cleartext from that point on.
    pub fn to_pem(&self) -> Result<Zeroizing<String>> {
        self.inner
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(SignError::crypto)
    }

    /// Export as base64-of-DER (PKCS#8), the shape `load` accepts back.
    pub fn to_der_base64(&self) -> Result<String> {
        let der = self.inner.to_pkcs8_der().map_err(SignError::crypto)?;
        Ok(STANDARD.encode(der.as_bytes()))
    }
}

impl PublicKey {
    /// Load a public key from raw DER, PEM text, or base64-of-DER text.
    ///
    /// SPKI (X.509 `SubjectPublicKeyInfo`) is tried first, then PKCS#1.
    pub fn load(input: impl AsRef<[u8]>) -> Result<Self> {
        let input = input.as_ref();
        if let Some(pem) = pem_text(input) {
            return RsaPublicKey::from_public_key_pem(pem)
                .ok()
                .or_else(|| RsaPublicKey::from_pkcs1_pem(pem).ok())
                .map(|inner| Self { inner })
                .ok_or_else(|| SignError::key_format("not a PEM-encoded RSA public key"));
        }
        if let Some(der) = base64_der(input) {
            if let Some(inner) = public_from_der(&der) {
                return Ok(Self { inner });
            }
        }
        public_from_der(input)
            .map(|inner| Self { inner })
            .ok_or_else(|| SignError::key_format("not a PKCS#1 or SPKI RSA public key"))
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.inner.size() * 8
    }

    /// Verify a PKCS#1 v1.5 signature over `data`.
    ///
    /// Never errors: malformed and mismatched signatures both observe as
    /// `false`, so callers cannot be probed through failure modes.
    pub fn verify(&self, hash: RsaHash, data: &[u8], signature: &[u8]) -> bool {
        self.inner
            .verify(hash.padding(), &hash.digest(data), signature)
            .is_ok()
    }

    /// Verify a base64-encoded signature. Undecodable input is `false`.
    pub fn verify_base64(&self, hash: RsaHash, data: &[u8], signature: &str, urlsafe: bool) -> bool {
        match alphabet(urlsafe).decode(signature.trim()) {
            Ok(raw) => self.verify(hash, data, &raw),
            Err(_) => false,
        }
    }

    /// Encrypt with RSA-OAEP (SHA-256).
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.inner
            .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha256>(), data)
            .map_err(SignError::crypto)
    }

    /// Encrypt and base64-encode.
    pub fn encrypt_to_base64(&self, data: &[u8]) -> Result<String> {
        Ok(STANDARD.encode(self.encrypt(data)?))
    }

    /// Export as an SPKI PEM document.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_public_key_pem(LineEnding::LF)
            .map_err(SignError::crypto)
    }

    /// Export as base64-of-DER (SPKI), the shape `load` accepts back.
    pub fn to_der_base64(&self) -> Result<String> {
        let der = self.inner.to_public_key_der().map_err(SignError::crypto)?;
        Ok(STANDARD.encode(der.as_bytes()))
    }
}

impl From<RsaPrivateKey> for PrivateKey {
    fn from(inner: RsaPrivateKey) -> Self {
        Self { inner }
    }
}

impl From<RsaPublicKey> for PublicKey {
    fn from(inner: RsaPublicKey) -> Self {
        Self { inner }
    }
}

// Key material stays out of debug output.
impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

fn alphabet(urlsafe: bool) -> &'static base64::engine::GeneralPurpose {
    if urlsafe {
        &URL_SAFE
    } else {
        &STANDARD
    }
}

fn pem_text(input: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(input).ok()?;
    text.trim_start().starts_with(PEM_MARKER).then_some(text)
}

fn base64_der(input: &[u8]) -> Option<Vec<u8>> {
    let text = std::str::from_utf8(input).ok()?;
    let compact: String = text.split_ascii_whitespace().collect();
    STANDARD.decode(compact).ok()
}

fn private_from_der(der: &[u8]) -> Option<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_der(der)
        .ok()
        .or_else(|| RsaPrivateKey::from_pkcs1_der(der).ok())
}

fn public_from_der(der: &[u8]) -> Option<RsaPublicKey> {
    RsaPublicKey::from_public_key_der(der)
        .ok()
        .or_else(|| RsaPublicKey::from_pkcs1_der(der).ok())
}
